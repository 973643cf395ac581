//! submgr: subscription manager for a fleet of proxy nodes.
//!
//! # Usage
//!
//! ```text
//! submgr --config submgr.toml add alice --level 5
//! submgr sub 6f1c2a3e-9b4d-4e5f-8a7b-1c2d3e4f5a6b --plain
//! submgr server
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "submgr",
    about = "Subscription manager for proxy node fleets",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Configuration file.
    #[arg(short, long, global = true, default_value = "submgr.toml")]
    config: PathBuf,

    /// Nodes that must succeed; failures elsewhere only warn.
    #[arg(long = "require", global = true, value_name = "NODE", conflicts_with = "at_least")]
    require: Vec<String>,

    /// Succeed when at least this many nodes succeed.
    #[arg(long, global = true, value_name = "N")]
    at_least: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a subscriber and grant it on every authorized node
    Add {
        name: String,
        #[arg(short, long, default_value = "0")]
        level: u32,
        /// Subscriber id (UUID). Generated when omitted.
        #[arg(long)]
        id: Option<String>,
        /// Unix timestamp after which the subscriber loses access.
        #[arg(long)]
        expires_at: Option<u64>,
    },
    /// Delete a subscriber and revoke it from every node
    Rm { id: String },
    /// List stored subscribers
    List {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Push every authorized entry to the fleet without removing anything
    Load,
    /// Remove every entry from every node
    Empty,
    /// Print a subscriber's feed
    Sub {
        id: String,
        /// Newline-joined URIs instead of base64.
        #[arg(long)]
        plain: bool,
    },
    /// Converge every node on the stored subscribers once
    Reconcile,
    /// Serve feeds over HTTP and reconcile periodically
    Server {
        /// Override the configured listen address.
        #[arg(long)]
        listen: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,submgr=debug")),
        )
        .init();

    let cli = Cli::parse();
    let policy = commands::success_policy(cli.require, cli.at_least);
    let ctx = commands::Context::load(&cli.config)?;

    match cli.command {
        Commands::Add {
            name,
            level,
            id,
            expires_at,
        } => commands::subscriber::add(&ctx, &policy, &name, level, id, expires_at).await,
        Commands::Rm { id } => commands::subscriber::remove(&ctx, &policy, &id).await,
        Commands::List { format } => commands::subscriber::list(&ctx, &format),
        Commands::Sub { id, plain } => commands::subscriber::feed(&ctx, &id, plain),
        Commands::Load => commands::fleet::load(&ctx, &policy).await,
        Commands::Empty => commands::fleet::empty(&ctx, &policy).await,
        Commands::Reconcile => commands::fleet::reconcile(&ctx, &policy).await,
        Commands::Server { listen } => commands::server::run(ctx, listen).await,
    }
}
