#![forbid(unsafe_code)]

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use std::path::PathBuf;
use tracing::{Level as TraceLevel, info};
use tracing_subscriber::FmtSubscriber;

use gsplot::config::{ArgValue, CallArgs, ConfigResolver, ConfigStore, schema, search_paths};
use gsplot::history::{self, RunHistoryLogger};

/// Inspect gsplot configuration resolution and run history
#[derive(Debug, Parser)]
#[command(name = "gsplot", version)]
struct Cli {
    /// Use this config file instead of searching ./, ~/.config/gsplot/ and ~/
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List candidate config paths and the one that was loaded
    Paths,
    /// Print the resolved parameters of a feature
    Resolve {
        feature: String,
        /// Call-site option as key=value (value parsed as JSON, else taken as a string)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
        /// Force an option to its built-in default, ignoring the config file
        #[arg(long = "default", value_name = "KEY")]
        use_default: Vec<String>,
    },
    /// List built-in feature schemas
    Features,
    /// Summarize recorded runs by version and commit
    History {
        #[arg(long)]
        metadata_dir: Option<PathBuf>,
    },
}

fn parse_assignment(raw: &str) -> Result<(String, Value)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected KEY=VALUE, got '{raw}'"))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.trim().to_string(), value))
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Paths => {
            let store = ConfigStore::load(cli.config.as_deref())?;
            if cli.config.is_none() {
                for path in search_paths() {
                    let marker = if path.is_file() { "found" } else { "missing" };
                    println!("{marker:>8}  {}", path.display());
                }
            }
            match store.source() {
                Some(path) => println!("  loaded  {}", path.display()),
                None => println!("  loaded  (none, built-in defaults only)"),
            }
            let document = store.document();
            if document.is_empty() {
                println!("  config  (empty)");
            } else if let Some(params) = document.backend_params() {
                println!(" rcParams {} passed to the backend", params.len());
            }
        }
        Command::Resolve {
            feature,
            set,
            use_default,
        } => {
            let store = ConfigStore::load(cli.config.as_deref())?;

            let mut args = CallArgs::new();
            for raw in &set {
                let (key, value) = parse_assignment(raw)?;
                args.insert(key, ArgValue::Value(value));
            }
            for key in use_default {
                args.insert(key, ArgValue::UseDefault);
            }

            let resolved = ConfigResolver::new(&store)
                .resolve_builtin(&feature, &args)
                .with_context(|| format!("Failed to resolve options for '{feature}'"))?;

            let report: serde_json::Map<String, Value> = resolved
                .iter()
                .map(|(name, option)| (name.to_string(), json!({"value": option.value, "source": option.source})))
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("Failed to serialize resolved parameters")?
            );

            let mut logger = RunHistoryLogger::from_store(&store);
            logger.record(&[resolved], gsplot::VERSION, gsplot::commit());
        }
        Command::Features => {
            for schema in schema::builtin_schemas() {
                println!("{}", schema.name());
                for spec in schema.options() {
                    println!("  {:<18} {:<20} default {}", spec.name, spec.kind.to_string(), spec.default);
                }
                let aliases: Vec<String> = schema
                    .aliases()
                    .map(|(alias, option)| format!("{alias}={option}"))
                    .collect();
                if !aliases.is_empty() {
                    println!("  aliases: {}", aliases.join(", "));
                }
            }
        }
        Command::History { metadata_dir } => {
            let dir = metadata_dir.unwrap_or_else(RunHistoryLogger::default_metadata_dir);
            let logger = RunHistoryLogger::new(dir, true);
            let log_path = logger.log_path();

            let records = history::read_history(&log_path)
                .with_context(|| format!("Failed to read history from {}", log_path.display()))?;
            info!(path = %log_path.display(), records = records.len(), "Read run history");

            for version in history::version_summary(&records) {
                println!("{}", version.version);
                for commit in version.commits {
                    println!("  {}  {}", commit.commit, commit.date);
                }
            }

            if let Some(snapshot) = history::read_snapshot(&logger.snapshot_path())
                .with_context(|| format!("Failed to read {}", logger.snapshot_path().display()))?
            {
                println!("last run: {} ({} {})", snapshot.date, snapshot.version, snapshot.commit);
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    // Parse log level from environment variable
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    run(Cli::parse())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assignment_json_value() {
        let (key, value) = parse_assignment("size=[10, 7]").unwrap();
        assert_eq!(key, "size");
        assert_eq!(value, json!([10, 7]));
    }

    #[test]
    fn test_parse_assignment_falls_back_to_string() {
        let (key, value) = parse_assignment("mosaic=AB;CC").unwrap();
        assert_eq!(key, "mosaic");
        assert_eq!(value, json!("AB;CC"));
    }

    #[test]
    fn test_parse_assignment_requires_equals() {
        assert!(parse_assignment("store").is_err());
    }

    #[test]
    fn test_cli_parses_resolve() {
        let cli = Cli::try_parse_from([
            "gsplot", "--config", "cfg.json", "resolve", "axes", "--set", "store=true", "--default", "clear",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("cfg.json")));
        match cli.command {
            Command::Resolve { feature, set, use_default } => {
                assert_eq!(feature, "axes");
                assert_eq!(set, vec!["store=true"]);
                assert_eq!(use_default, vec!["clear"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
