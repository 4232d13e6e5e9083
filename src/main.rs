use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::env;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use citypulse::auth::{require_user, Route, Session};
use citypulse::commands;
use citypulse::config::{self, Config};
use citypulse::db::Database;
use citypulse::geocode::{NominatimGeocoder, ReverseGeocoder};
use citypulse::models::{Category, IssueFilter, IssueSort, Status};

#[derive(Parser)]
#[command(name = "citypulse")]
#[command(about = "Report and track civic issues in your city")]
#[command(version)]
struct Cli {
    /// Act as the profile with this email
    #[arg(long = "as", global = true, env = "CITYPULSE_USER")]
    as_user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize citypulse in the current directory
    Init {
        /// Reset config.json to the defaults
        #[arg(short, long)]
        force: bool,
    },

    /// Create a citizen profile
    Signup {
        email: String,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        phone: Option<String>,
    },

    /// Show or edit profiles
    Profile {
        #[command(subcommand)]
        action: ProfileCommands,
    },

    /// Report a new issue
    Report {
        title: String,
        #[arg(short, long)]
        description: String,
        /// One of the ten categories, e.g. road_maintenance
        #[arg(short, long)]
        category: String,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        #[arg(short, long)]
        address: Option<String>,
        #[arg(short, long)]
        ward: Option<String>,
        #[arg(long)]
        photo: Option<String>,
        /// Look up the address from the coordinates
        #[arg(long)]
        geocode: bool,
    },

    /// Reverse-geocode a location
    Locate {
        #[arg(allow_hyphen_values = true)]
        lat: f64,
        #[arg(allow_hyphen_values = true)]
        lng: f64,
    },

    /// List issues
    List {
        #[command(flatten)]
        filter: FilterArgs,
        /// Sort order (newest, votes)
        #[arg(long, default_value = "newest")]
        sort: String,
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Only issues reported by the current user
        #[arg(long)]
        mine: bool,
        #[arg(long)]
        json: bool,
    },

    /// Show issue details
    Show {
        id: i64,
        #[arg(long)]
        json: bool,
    },

    /// Toggle your upvote on an issue
    Vote { id: i64 },

    /// Add a comment to an issue
    Comment { id: i64, text: String },

    /// Change an issue's status (staff)
    Status {
        id: i64,
        /// unresolved, in_progress or resolved
        status: String,
        #[arg(short, long)]
        comment: Option<String>,
        #[arg(long)]
        after_photo: Option<String>,
    },

    /// Staff dashboard
    Dashboard {
        #[arg(long)]
        json: bool,
    },

    /// Ward and category analytics (staff)
    Analytics {
        #[arg(long)]
        json: bool,
    },

    /// Write issue pins as GeoJSON
    Map {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Export issues
    Export {
        #[command(subcommand)]
        format: ExportCommands,
    },

    /// Daily metric snapshots
    Metrics {
        #[command(subcommand)]
        action: MetricsCommands,
    },

    /// Check vote counters and status history (staff)
    Reconcile {
        /// Recount drifted vote counters
        #[arg(long)]
        fix: bool,
    },

    /// Call a write endpoint with a raw JSON body
    Api {
        /// create-issue, toggle-vote, change-status, post-comment or update-profile
        endpoint: String,
        /// Request body; read from stdin when omitted
        #[arg(short, long)]
        body: Option<String>,
    },
}

#[derive(clap::Args)]
struct FilterArgs {
    #[arg(short, long)]
    status: Option<Status>,
    #[arg(short, long)]
    category: Option<Category>,
    #[arg(short, long)]
    ward: Option<String>,
    /// Match against title and description
    #[arg(long)]
    search: Option<String>,
}

impl FilterArgs {
    fn into_filter(self) -> IssueFilter {
        IssueFilter {
            status: self.status,
            category: self.category,
            ward: self.ward,
            search: self.search,
            ..Default::default()
        }
    }
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Show your profile and activity
    Show,
    /// Update your name and phone
    Edit {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        phone: Option<String>,
    },
    /// Assign a role (citizen, moderator, admin)
    SetRole { email: String, role: String },
}

#[derive(Subcommand)]
enum ExportCommands {
    Json {
        #[arg(short, long)]
        output: Option<String>,
    },
    Markdown {
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
enum MetricsCommands {
    /// Load snapshots from a JSON array
    Import { path: PathBuf },
    /// Show snapshots in a trailing window
    Show {
        #[arg(short, long, default_value_t = 30)]
        days: u32,
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(filter);

    if env::var_os("CITYPULSE_LOG_JSON").is_some() {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .compact()
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

struct App {
    db: Database,
    config: Config,
    session: Option<Session>,
}

fn open(as_user: Option<&str>) -> Result<App> {
    let data_dir = config::find_data_dir()?;
    let config = Config::load(&data_dir)?;
    let db = Database::open(&data_dir.join(config::DB_FILE)).context("Failed to open database")?;
    let session = Session::resolve(&db, as_user)?;
    Ok(App {
        db,
        config,
        session,
    })
}

fn parse_sort(sort: &str) -> Result<IssueSort> {
    match sort {
        "newest" => Ok(IssueSort::Newest),
        "votes" | "most-voted" => Ok(IssueSort::MostVoted),
        other => bail!("Invalid sort '{}'. Must be one of: newest, votes", other),
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let as_user = cli.as_user.as_deref();

    match cli.command {
        Commands::Init { force } => {
            let cwd = env::current_dir()?;
            commands::init::run(&cwd, force)
        }

        Commands::Signup { email, name, phone } => {
            let ctx = open(None)?;
            commands::profile::signup(&ctx.db, &email, name.as_deref(), phone.as_deref())
        }

        Commands::Profile { action } => {
            let ctx = open(as_user)?;
            match action {
                ProfileCommands::Show => commands::profile::show(&ctx.db, ctx.session.as_ref()),
                ProfileCommands::Edit { name, phone } => {
                    commands::profile::edit(&ctx.db, ctx.session.as_ref(), &name, phone.as_deref())
                }
                ProfileCommands::SetRole { email, role } => {
                    commands::profile::set_role(&ctx.db, &email, &role)
                }
            }
        }

        Commands::Report {
            title,
            description,
            category,
            lat,
            lng,
            address,
            ward,
            photo,
            geocode,
        } => {
            let ctx = open(as_user)?;
            let geocoder = geocode.then(|| NominatimGeocoder::new(&ctx.config));
            let args = commands::report::ReportArgs {
                title: &title,
                description: &description,
                category: &category,
                latitude: lat,
                longitude: lng,
                address: address.as_deref(),
                ward: ward.as_deref(),
                photo_url: photo.as_deref(),
            };
            commands::report::run(
                &ctx.db,
                ctx.session.as_ref(),
                args,
                geocoder.as_ref().map(|g| g as &dyn ReverseGeocoder),
            )
        }

        Commands::Locate { lat, lng } => {
            let config = match config::find_data_dir() {
                Ok(dir) => Config::load(&dir)?,
                Err(_) => Config::default(),
            };
            commands::report::locate(&NominatimGeocoder::new(&config), lat, lng)
        }

        Commands::List {
            filter,
            sort,
            limit,
            mine,
            json,
        } => {
            let ctx = open(as_user)?;
            let mut filter = filter.into_filter();
            filter.sort = parse_sort(&sort)?;
            filter.limit = limit;
            if mine {
                let session = require_user(ctx.session.as_ref(), Route::Login)?;
                filter.user_id = Some(session.user_id);
            }
            commands::list::run(&ctx.db, &filter, json)
        }

        Commands::Show { id, json } => {
            let ctx = open(as_user)?;
            commands::show::run(&ctx.db, ctx.session.as_ref(), id, json)
        }

        Commands::Vote { id } => {
            let ctx = open(as_user)?;
            commands::vote::run(&ctx.db, ctx.session.as_ref(), id)
        }

        Commands::Comment { id, text } => {
            let ctx = open(as_user)?;
            commands::comment::run(&ctx.db, ctx.session.as_ref(), id, &text)
        }

        Commands::Status {
            id,
            status,
            comment,
            after_photo,
        } => {
            let ctx = open(as_user)?;
            commands::status::run(
                &ctx.db,
                ctx.session.as_ref(),
                id,
                &status,
                comment.as_deref(),
                after_photo.as_deref(),
            )
        }

        Commands::Dashboard { json } => {
            let ctx = open(as_user)?;
            commands::dashboard::run(
                &ctx.db,
                ctx.session.as_ref(),
                &ctx.config.dashboard_options(),
                json,
            )
        }

        Commands::Analytics { json } => {
            let ctx = open(as_user)?;
            commands::analytics::run(
                &ctx.db,
                ctx.session.as_ref(),
                &ctx.config.analytics_options(),
                json,
            )
        }

        Commands::Map { filter, output } => {
            let ctx = open(as_user)?;
            commands::map::run(&ctx.db, &filter.into_filter(), output.as_deref())
        }

        Commands::Export { format } => {
            let ctx = open(as_user)?;
            match format {
                ExportCommands::Json { output } => {
                    commands::export::run_json(&ctx.db, output.as_deref())
                }
                ExportCommands::Markdown { output } => {
                    commands::export::run_markdown(&ctx.db, output.as_deref())
                }
            }
        }

        Commands::Metrics { action } => {
            let ctx = open(as_user)?;
            match action {
                MetricsCommands::Import { path } => {
                    commands::metrics::import(&ctx.db, &path).map(|_| ())
                }
                MetricsCommands::Show { days, json } => {
                    commands::metrics::show(&ctx.db, days, json)
                }
            }
        }

        Commands::Reconcile { fix } => {
            let ctx = open(as_user)?;
            commands::reconcile::run(&ctx.db, ctx.session.as_ref(), fix)
        }

        Commands::Api { endpoint, body } => {
            let ctx = open(as_user)?;
            commands::call::run(&ctx.db, ctx.session.as_ref(), &endpoint, body.as_deref())
        }
    }
}
