//! Vidya CLI
//!
//! Browse the report catalog, discover blog posts and moderate submissions.

mod commands;
mod style;

use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use style::*;
use vidya_catalog::{CatalogStore, Config};

const BANNER: &str = r#"
  ██╗   ██╗██╗██████╗ ██╗   ██╗ █████╗
  ██║   ██║██║██╔══██╗╚██╗ ██╔╝██╔══██╗
  ██║   ██║██║██║  ██║ ╚████╔╝ ███████║
  ╚██╗ ██╔╝██║██║  ██║  ╚██╔╝  ██╔══██║
   ╚████╔╝ ██║██████╔╝   ██║   ██║  ██║
    ╚═══╝  ╚═╝╚═════╝    ╚═╝   ╚═╝  ╚═╝
"#;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "vidya")]
#[command(version)]
#[command(about = "Vidya Catalog - Vulnerability reports and security blogs", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file
    #[arg(short, long, env = "VIDYA_CONFIG", default_value = "config.toml", global = true)]
    config: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List approved reports with filters
    #[command(visible_alias = "r")]
    Reports {
        /// Free-text search
        #[arg(short = 'q', long, default_value = "")]
        search: String,

        /// Category label, or "All"
        #[arg(long, default_value = "All")]
        category: String,

        /// Publication year, or "All"
        #[arg(long, default_value = "All")]
        year: String,

        /// Organization, or "All"
        #[arg(long, default_value = "All")]
        organization: String,

        /// Severity, or "All"
        #[arg(long, default_value = "All")]
        severity: String,

        /// newest, oldest, severity-high, severity-low, title-asc, title-desc
        #[arg(short, long, default_value = "newest")]
        sort: String,

        /// Show the available filter choices instead
        #[arg(long)]
        facets: bool,
    },

    /// Discover security blog posts
    #[command(visible_alias = "b")]
    Blogs {
        /// Search text
        query: Option<String>,

        /// Page number
        #[arg(short, long, default_value = "1")]
        page: u32,
    },

    /// Show a single blog article
    #[command(visible_alias = "a")]
    Article {
        /// Article id
        id: String,
    },

    /// Approve or reject a pending report (admin only)
    Approve {
        /// Report id
        id: String,

        /// Reject instead of approve
        #[arg(long)]
        reject: bool,

        /// Admin account email
        #[arg(short, long, env = "VIDYA_ADMIN_EMAIL")]
        email: String,
    },

    /// Load the starter catalog and create the admin account
    Seed {
        /// Admin username
        #[arg(long, default_value = "admin")]
        username: String,

        /// Admin email
        #[arg(short, long, env = "VIDYA_ADMIN_EMAIL")]
        email: String,
    },
}

/// Shared state for commands
pub struct Context {
    pub config: Config,
    pub store: Arc<CatalogStore>,
}

impl Context {
    fn open(config_path: &str) -> anyhow::Result<Self> {
        let config = Config::load_from(config_path)?;
        let store = CatalogStore::new(&config.database.path)
            .with_context(|| format!("Failed to open database {}", config.database.path))?;
        Ok(Self {
            config,
            store: Arc::new(store),
        })
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt().with_env_filter("info").init();
    }

    let result = match Context::open(&cli.config) {
        Ok(ctx) => run(ctx, cli.command).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(ctx: Context, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Reports {
            search,
            category,
            year,
            organization,
            severity,
            sort,
            facets,
        } => {
            if facets {
                return commands::reports::facets(&ctx);
            }
            let filters = commands::reports::Filters {
                search,
                category,
                year,
                organization,
                severity,
                sort,
            };
            commands::reports::run(&ctx, filters)
        }
        Commands::Blogs { query, page } => {
            commands::blogs::run(&ctx, query.as_deref().unwrap_or(""), page).await
        }
        Commands::Article { id } => commands::blogs::article(&ctx, &id).await,
        Commands::Approve { id, reject, email } => {
            commands::approve::run(&ctx, &id, &email, reject).await
        }
        Commands::Seed { username, email } => {
            print_banner();
            commands::seed::run(&ctx, &username, &email)
        }
    }
}

pub fn print_banner() {
    println!("{}", style_cyan(BANNER));
    println!(
        "  {} {}",
        style_dim("Vidya Catalog"),
        style_dim(&format!("v{}", VERSION))
    );
    println!();
}
