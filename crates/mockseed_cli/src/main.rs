//! `mockseed` command-line entry point.
//!
//! # Responsibility
//! - Parse arguments, load the recipe, and run the requested services.
//! - Write one document per service and print a `key=value` summary line.
//! - Re-check written documents for reference integrity.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use log::info;
use mockseed_core::{
    default_log_level, init_logging, output_file_name, render_document,
    verify_document, write_document, BackendRegistry, RunConfig, VocabularySet,
};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "mockseed")]
#[command(about = "Synthetic mock-backend state generator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate state documents for one service or all of them
    Generate {
        /// Service name, or `all`
        #[arg(short, long, default_value = "all")]
        service: String,
        /// YAML recipe with run parameters
        #[arg(short, long)]
        recipe: Option<PathBuf>,
        /// YAML file replacing built-in vocabulary lists
        #[arg(long)]
        vocab: Option<PathBuf>,
        #[arg(long)]
        seed: Option<u64>,
        /// Owners per service, fixtures included
        #[arg(long)]
        owners: Option<u32>,
        /// Reference time as RFC 3339; defaults to the wall clock
        #[arg(long)]
        now: Option<String>,
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,
        #[arg(long)]
        log_level: Option<String>,
        /// Write rolling log files here instead of stderr
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },
    /// List registered services
    Services,
    /// Check every reference in a written document
    Verify {
        #[arg(short, long)]
        service: String,
        #[arg(short, long)]
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Generate {
            service,
            recipe,
            vocab,
            seed,
            owners,
            now,
            out_dir,
            log_level,
            log_dir,
        } => {
            setup_logging(log_level.as_deref(), log_dir.as_deref())?;
            let mut config = match recipe {
                Some(path) => RunConfig::load(&path)
                    .with_context(|| format!("failed to load recipe {}", path.display()))?,
                None => RunConfig::default(),
            };
            if seed.is_some() {
                config.seed = seed;
            }
            if let Some(owners) = owners {
                config.owners = owners;
            }
            if let Some(raw) = now {
                config.reference_time = Some(parse_now(&raw)?);
            }
            let vocab = match vocab {
                Some(path) => Some(
                    VocabularySet::load(&path)
                        .with_context(|| format!("failed to load vocabulary {}", path.display()))?,
                ),
                None => None,
            };
            run_generate(&service, &config, vocab.as_ref(), &out_dir)?
        }
        Commands::Services => {
            let registry = BackendRegistry::with_builtin()?;
            for name in registry.names() {
                println!("{name}");
            }
        }
        Commands::Verify { service, input } => verify(&service, &input)?,
    }
    Ok(())
}

fn setup_logging(level: Option<&str>, dir: Option<&Path>) -> Result<()> {
    let dir = match dir {
        Some(dir) if dir.is_relative() => Some(
            std::env::current_dir()
                .context("failed to resolve working directory")?
                .join(dir),
        ),
        other => other.map(Path::to_path_buf),
    };
    let dir = dir.map(|dir| dir.to_string_lossy().into_owned());
    init_logging(level.unwrap_or(default_log_level()), dir.as_deref())
        .map_err(|err| anyhow!("failed to initialize logging: {err}"))
}

fn parse_now(raw: &str) -> Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("--now is not an RFC 3339 timestamp: {raw}"))?;
    Ok(parsed.with_timezone(&Utc))
}

fn run_generate(
    service: &str,
    config: &RunConfig,
    vocab: Option<&VocabularySet>,
    out_dir: &Path,
) -> Result<()> {
    let registry = BackendRegistry::with_builtin()?;
    config.check_services(&registry.names())?;

    let backends = if service == "all" {
        registry.iter().cloned().collect::<Vec<_>>()
    } else {
        vec![registry.get(service)?]
    };

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    for backend in backends {
        let name = backend.name();
        let outcome = registry
            .generate(name, config, vocab)
            .with_context(|| format!("generation failed for {name}"))?;
        let document = render_document(backend.as_ref(), &outcome.state);
        let path = out_dir.join(output_file_name(name));
        write_document(&path, &document)?;
        info!("event=service_done module=cli service={name}");
        println!(
            "service={} owners={} items={} path={} recoveries={}",
            name,
            outcome.state.owners.len(),
            outcome.state.item_count(),
            path.display(),
            outcome.report.summary()
        );
    }
    Ok(())
}

fn verify(service: &str, input: &Path) -> Result<()> {
    let registry = BackendRegistry::with_builtin()?;
    let backend = registry.get(service)?;
    let raw = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let document: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", input.display()))?;

    let violations = verify_document(
        &document,
        backend.reference_fields(),
        backend.well_known_keys(),
    );
    for violation in &violations {
        println!("violation {violation}");
    }
    if !violations.is_empty() {
        bail!(
            "{} reference violation(s) in {}",
            violations.len(),
            input.display()
        );
    }
    println!("service={service} path={} violations=0", input.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{parse_now, Cli};
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn now_accepts_offsets() {
        let now = parse_now("2024-03-01T12:00:00+02:00").unwrap();
        assert_eq!(now.to_rfc3339(), "2024-03-01T10:00:00+00:00");
    }

    #[test]
    fn now_rejects_garbage() {
        assert!(parse_now("yesterday").is_err());
    }
}
