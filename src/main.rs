//! Cluster configuration tool.
//!
//! # Architecture Overview
//!
//! ```text
//!   TT_* environment ──▶ EnvCollector ─────────────┐ (highest priority)
//!                                                   ▼
//!   cluster.yaml ──▶ FileDataCollector ──▶ YamlDataMergeCollector ──▶ merge
//!                                                   │
//!                                                   ▼
//!                                            ClusterConfig
//!                          ┌────────────┬───────────┼──────────────┐
//!                          ▼            ▼           ▼              ▼
//!                        show       instances    validate   replace-instance
//!                                                                  │
//!                                                                  ▼
//!                                      YamlConfigPublisher ──▶ FileDataPublisher
//! ```
//!
//! Network backends are reached through the library; the binary works on files.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};

use cluster_config::cluster::{
    collect_cluster_config, instances, instantiate, replace_instance_config, validate_cluster,
    ClusterConfig,
};
use cluster_config::collector::env::default_formatter;
use cluster_config::collector::{
    Collector, CollectorFactory, Connection, EnvCollector, Location, PublisherFactory,
};
use cluster_config::observability::logging;
use cluster_config::settings::{load_settings, ToolSettings};
use cluster_config::tree::PathConfig;
use cluster_config::validation::tarantool_schema;

#[derive(Parser)]
#[command(name = "cluster-config")]
#[command(about = "Inspect, validate and edit a cluster configuration", long_about = None)]
struct Cli {
    /// Cluster configuration file
    #[arg(short, long, default_value = "config.yaml")]
    file: PathBuf,

    /// Tool settings file (TOML)
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Ignore configuration from environment variables
    #[arg(long)]
    no_env: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the cluster configuration, or the effective configuration of an instance
    Show {
        #[arg(short, long)]
        instance: Option<String>,
    },
    /// List instance names
    Instances,
    /// Validate every instance against the configuration schema
    Validate,
    /// Replace the configuration of an instance and write the file back
    ReplaceInstance {
        /// Instance name
        name: String,
        /// YAML file with the new instance configuration
        #[arg(long)]
        from: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let settings = match &cli.settings {
        Some(path) => load_settings(path)?,
        None => ToolSettings::default(),
    };
    if let Err(err) = logging::init(&settings.logging) {
        eprintln!("Failed to initialize logging: {}", err);
    }

    // Environment values must not leak into a file written back to disk.
    let writes = matches!(cli.command, Commands::ReplaceInstance { .. });
    let use_env = settings.env.enabled && !cli.no_env && !writes;
    let cluster = collect(&cli.file, &settings, use_env).await?;

    tracing::info!(
        file = %cli.file.display(),
        env = use_env,
        instances = instances(&cluster).len(),
        "Configuration loaded"
    );

    match cli.command {
        Commands::Show { instance } => {
            let config = match instance {
                Some(name) => instantiate(&cluster, &name),
                None => cluster.to_config().clone(),
            };
            print!("{}", config.to_yaml()?);
        }
        Commands::Instances => {
            for name in instances(&cluster) {
                println!("{}", name);
            }
        }
        Commands::Validate => {
            if let Err(errors) = validate_cluster(&cluster, tarantool_schema()) {
                for error in &errors {
                    eprintln!("{}", error);
                }
                return Err(format!("configuration is invalid: {} scope(s) failed", errors.len()).into());
            }
            println!("configuration is valid");
        }
        Commands::ReplaceInstance { name, from } => {
            let data = tokio::fs::read(&from).await?;
            let config = PathConfig::from_yaml(&data)?;
            let updated = replace_instance_config(&cluster, &name, &config)?;

            let publisher = PublisherFactory::new()
                .publisher(&Connection::File(cli.file.clone()), &file_location())?;
            publisher.publish(updated.to_config()).await?;

            tracing::info!(instance = %name, file = %cli.file.display(), "Instance configuration replaced");
        }
    }

    Ok(())
}

/// The file backend ignores prefix, key and timeout.
fn file_location() -> Location {
    Location::new("", "", Duration::ZERO)
}

/// Collect the cluster document, environment first.
async fn collect(
    file: &Path,
    settings: &ToolSettings,
    use_env: bool,
) -> Result<ClusterConfig, Box<dyn std::error::Error>> {
    let mut collectors: Vec<Box<dyn Collector>> = Vec::new();
    if use_env {
        collectors.push(Box::new(EnvCollector::new(default_formatter(
            settings.env.prefix.clone(),
        ))));
    }

    collectors.push(
        CollectorFactory::new().collector(&Connection::File(file.to_path_buf()), &file_location())?,
    );

    Ok(collect_cluster_config(&collectors).await?)
}
