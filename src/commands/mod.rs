pub mod analytics;
pub mod call;
pub mod comment;
pub mod dashboard;
pub mod export;
pub mod init;
pub mod list;
pub mod map;
pub mod metrics;
pub mod profile;
pub mod reconcile;
pub mod report;
pub mod show;
pub mod status;
pub mod vote;
