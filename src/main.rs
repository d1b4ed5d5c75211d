use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use simple_labels::models::CreateLabelInput;
use simple_labels::persist::{LabelPaths, LoadSource, PersistenceManager};
use simple_labels::EngineConfig;

#[derive(Parser)]
#[command(name = "simple-labels")]
#[command(about = "Inspect SimpleLabels label files")]
struct Cli {
    /// Engine config file (JSON). Missing files fall back to defaults.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the labels a session would load
    Show {
        /// Session folder
        session: PathBuf,
    },
    /// Print the label file locations for a session
    Paths {
        /// Session folder
        session: PathBuf,
    },
    /// Print the effective configuration
    Config,
}

/// Initialize tracing on stderr so stdout stays clean for output.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "simple_labels=info".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path).with_env(),
        None => EngineConfig::from_env(),
    };
    let paths = LabelPaths::new(config.mod_data_root());

    match cli.command {
        Commands::Show { session } => {
            let mut persistence = PersistenceManager::new(paths, config.migration_delay());
            let outcome = persistence.load(&session, Instant::now());

            let source = match outcome.source {
                LoadSource::Session => "session file",
                LoadSource::Legacy => "legacy file (not yet migrated)",
                LoadSource::Empty => "nothing saved",
            };
            println!("{} labels from {}", outcome.labels.len(), source);

            for payload in outcome.labels {
                let label = CreateLabelInput::from(payload);
                println!(
                    "{}  {:?}  color={} size={}",
                    label.id,
                    label.text,
                    label.label_color.as_deref().unwrap_or("-"),
                    label
                        .label_size
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                );
            }
        }
        Commands::Paths { session } => {
            println!("legacy:  {}", paths.legacy_file().display());
            println!("session: {}", paths.session_file(&session).display());
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
