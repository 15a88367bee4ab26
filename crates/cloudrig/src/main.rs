mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cloudrig")]
#[command(
    about = "Declare AWS resources in a manifest, then plan, apply and sweep them",
    long_about = None
)]
struct Cli {
    /// Project directory holding .cloudrig/state.json
    #[arg(short = 'C', long, global = true, env = "CLOUDRIG_DIR", default_value = ".")]
    dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the changes needed to reach the manifest
    Plan {
        /// Resource manifest (YAML or JSON)
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Create, update and delete resources to match the manifest
    Apply {
        /// Resource manifest (YAML or JSON)
        #[arg(short, long)]
        file: PathBuf,
        /// Apply without asking
        #[arg(short, long)]
        yes: bool,
    },
    /// Destroy the resources declared in a manifest, or everything in state
    Destroy {
        /// Only destroy the resources declared here
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Destroy without asking
        #[arg(short, long)]
        yes: bool,
    },
    /// Inspect the recorded state
    #[command(subcommand)]
    State(StateCommands),
    /// Delete leftover acceptance-test resources in a region
    Sweep {
        #[arg(short, long, env = "AWS_REGION")]
        region: String,
        /// Only run these sweepers (and the ones they depend on)
        #[arg(long = "sweeper")]
        sweepers: Vec<String>,
    },
    /// Look up a service quota
    Quota {
        /// Service code, e.g. vpc
        #[arg(long)]
        service_code: String,
        #[arg(long, conflicts_with = "quota_name", required_unless_present = "quota_name")]
        quota_code: Option<String>,
        #[arg(long)]
        quota_name: Option<String>,
        /// Print the raw attributes as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or change the tags of any supported resource
    Tags {
        arn: String,
        /// Add or overwrite a tag (KEY=VALUE)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
        /// Remove a tag
        #[arg(long = "remove", value_name = "KEY")]
        remove: Vec<String>,
    },
    /// Check the configured AWS credentials
    Auth,
    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum StateCommands {
    /// List recorded resources
    List {
        /// Re-read every resource from AWS first
        #[arg(long)]
        refresh: bool,
    },
    /// Print one recorded resource as JSON
    Show {
        /// Resource key (type.name)
        key: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Version => {
            println!("cloudrig {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Plan { file } => commands::plan::handle(&cli.dir, &file).await,
        Commands::Apply { file, yes } => commands::apply::handle(&cli.dir, &file, yes).await,
        Commands::Destroy { file, yes } => {
            commands::destroy::handle(&cli.dir, file.as_deref(), yes).await
        }
        Commands::State(StateCommands::List { refresh }) => {
            commands::state::handle_list(&cli.dir, refresh).await
        }
        Commands::State(StateCommands::Show { key }) => {
            commands::state::handle_show(&cli.dir, &key).await
        }
        Commands::Sweep { region, sweepers } => commands::sweep::handle(&region, &sweepers).await,
        Commands::Quota {
            service_code,
            quota_code,
            quota_name,
            json,
        } => commands::quota::handle(&service_code, quota_code, quota_name, json).await,
        Commands::Tags { arn, set, remove } => commands::tags::handle(&arn, &set, &remove).await,
        Commands::Auth => commands::auth::handle().await,
    }
}
