pub mod analytics;
pub mod api;
pub mod auth;
pub mod commands;
pub mod config;
pub mod db;
pub mod geocode;
pub mod models;
