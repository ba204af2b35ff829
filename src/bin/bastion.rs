//! Bastion CLI
//!
//! Offline helpers around the engine: generate signing secrets, evaluate
//! scope authorization, and decode signed token artifacts.

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bastion_iam::{ArtifactSigner, Config, Decision, Scope, ScopeAuthorizer};
use clap::{Parser, Subcommand};
use rand::RngCore;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "bastion")]
#[command(about = "Namespaced IAM authorization and token tooling")]
struct Args {
    /// Log filter directive (overridden by RUST_LOG; defaults to the
    /// config's `logging.level`, then "info")
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a random base64 signing secret
    Keygen {
        /// Secret length in bytes
        #[arg(short, long, default_value = "32")]
        bytes: usize,
    },

    /// Check whether held scopes cover requested scopes
    Authorize {
        /// Held scopes: a JSON array, or a path to a file containing one
        #[arg(long)]
        held: String,

        /// Requested scopes: a JSON array, or a path to a file containing one
        #[arg(long)]
        requested: String,
    },

    /// Verify and decode a signed token artifact
    Inspect {
        /// Engine configuration file (TOML) holding the signing secret
        #[arg(short, long)]
        config: PathBuf,

        /// The artifact to decode
        artifact: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Loaded before the subscriber so its logging level can apply
    let config = match &args.command {
        Command::Inspect { config, .. } => Some(load_config(config)?),
        _ => None,
    };

    let directive = log_directive(args.log_level.as_deref(), config.as_ref());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(directive)),
        )
        .with_writer(std::io::stderr)
        .init();

    match (args.command, config) {
        (Command::Keygen { bytes }, _) => keygen(bytes),
        (Command::Authorize { held, requested }, _) => authorize(&held, &requested),
        (Command::Inspect { artifact, .. }, Some(config)) => inspect(&config, &artifact),
        (Command::Inspect { config, .. }, None) => bail!("{} was not loaded", config.display()),
    }
}

/// `--log-level` wins over the config's `logging.level`
fn log_directive(cli: Option<&str>, config: Option<&Config>) -> String {
    cli.map(str::to_string)
        .or_else(|| config.map(|c| c.logging.level.clone()))
        .unwrap_or_else(|| "info".to_string())
}

fn load_config(path: &Path) -> Result<Config> {
    Config::from_file(path).with_context(|| format!("loading {}", path.display()))
}

fn keygen(bytes: usize) -> Result<()> {
    if bytes < 16 {
        bail!("refusing to generate a secret shorter than 16 bytes");
    }
    let mut secret = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut secret);
    println!("{}", STANDARD.encode(&secret));
    Ok(())
}

fn authorize(held: &str, requested: &str) -> Result<()> {
    let held = load_scopes(held).context("reading --held")?;
    let requested = load_scopes(requested).context("reading --requested")?;
    debug!(held = held.len(), requested = requested.len(), "evaluating scopes");

    match ScopeAuthorizer::evaluate(&held, &requested) {
        Decision::Allow => {
            println!("ALLOW");
            Ok(())
        }
        Decision::Deny {
            namespace,
            resource,
            action,
        } => {
            println!(
                "DENY namespace={:?} resource={:?} action={:?}",
                namespace, resource, action
            );
            std::process::exit(1);
        }
    }
}

fn inspect(config: &Config, artifact: &str) -> Result<()> {
    info!("decoding artifact");

    let signer = ArtifactSigner::new(config.signing.secret.as_bytes());
    let claims = signer
        .decode(artifact.trim())
        .context("artifact rejected")?;

    println!("{}", serde_json::to_string_pretty(&claims)?);
    Ok(())
}

/// Parse inline JSON, falling back to reading the argument as a file path
fn load_scopes(raw: &str) -> Result<Vec<Scope>> {
    let trimmed = raw.trim_start();
    let json = if trimmed.starts_with('[') {
        raw.to_string()
    } else {
        std::fs::read_to_string(raw).with_context(|| format!("cannot read {}", raw))?
    };
    serde_json::from_str(&json).context("expected a JSON array of scopes")
}
