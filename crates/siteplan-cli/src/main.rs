//! siteplan CLI tool.

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "siteplan")]
#[command(about = "Static site deployment descriptors", long_about = None)]
struct Cli {
    /// Path to the site configuration
    #[arg(long, short, env = "SITEPLAN_CONFIG", default_value = "siteplan.kdl")]
    config: String,

    /// Custom variable for interpolation (name=value), repeatable
    #[arg(long = "var", value_parser = parse_var)]
    vars: Vec<(String, String)>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: Format,

    /// Enable debug logging
    #[arg(long, short)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the site configuration
    Validate,
    /// Print the build specification sent to the platform
    Buildspec {
        /// Build spec name (all specs if omitted)
        name: Option<String>,
    },
    /// Dry-run the deployment against a simulated platform
    Plan {
        /// Use a placeholder token instead of resolving the source credential
        #[arg(long)]
        skip_credentials: bool,
    },
    /// Print the declared outputs for a registered application
    Outputs {
        /// Platform application id
        #[arg(long, env = "SITEPLAN_APP_ID")]
        app_id: String,
        /// Platform default domain
        #[arg(long, env = "SITEPLAN_DEFAULT_DOMAIN")]
        default_domain: String,
    },
}

fn parse_var(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .filter(|(name, _)| !name.is_empty())
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected name=value, got {:?}", raw))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let site = commands::load(&cli.config, &cli.vars)?;

    match cli.command {
        Commands::Validate => {
            commands::validate(&site, cli.format)?;
        }
        Commands::Buildspec { name } => {
            commands::buildspec(&site, name.as_deref())?;
        }
        Commands::Plan { skip_credentials } => {
            commands::plan::run(site, skip_credentials, cli.format).await?;
        }
        Commands::Outputs {
            app_id,
            default_domain,
        } => {
            commands::outputs(&site, app_id, default_domain, cli.format)?;
        }
    }

    Ok(())
}
