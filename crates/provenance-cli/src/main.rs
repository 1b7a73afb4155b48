//! Provenance CLI - register devices and verify image signatures

use anyhow::{bail, Context};
use chrono::{SecondsFormat, Utc};
use clap::{Args, Parser, Subcommand};
use provenance_core::{
    AttemptContext, Provenance, ProvenanceConfig, ProvenanceError, PublicKeyInput,
    RegisterRequest, VerificationRequest,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "provenance")]
#[command(about = "Image provenance - device identity registry and signature verification")]
#[command(version)]
struct Cli {
    /// Configuration file path (defaults apply when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a device public key
    Register(RegisterArgs),
    /// Verify a signature over a digest or an image file
    Verify(VerifyArgs),
    /// Show one device by public key id
    Device {
        /// Public key id
        key_id: String,
    },
    /// List all devices by sequence
    Devices,
    /// Show verification statistics and fleet summary
    Stats,
    /// Check configuration validity
    Check,
}

#[derive(Args)]
struct RegisterArgs {
    /// Client installation id
    #[arg(long)]
    installation_id: String,
    /// Device model
    #[arg(long)]
    model: String,
    /// Operating system name
    #[arg(long)]
    os_name: Option<String>,
    /// Operating system version
    #[arg(long)]
    os_version: Option<String>,
    /// Public key id
    #[arg(long)]
    key_id: String,
    /// Base64 compressed secp256k1 public key
    #[arg(long)]
    public_key: String,
    /// Key algorithm
    #[arg(long, default_value = "secp256k1")]
    algorithm: String,
    /// Public key fingerprint (derived when omitted)
    #[arg(long)]
    fingerprint: Option<String>,
    /// Client device fingerprint
    #[arg(long)]
    device_fingerprint: String,
}

#[derive(Args)]
struct VerifyArgs {
    /// Public key id
    #[arg(long)]
    key_id: String,
    /// Base64 compact signature
    #[arg(long)]
    signature: String,
    /// Claimed RFC 3339 timestamp (defaults to now)
    #[arg(long)]
    timestamp: Option<String>,
    /// Hex SHA-512 digest of the content
    #[arg(long, conflicts_with = "image", required_unless_present = "image")]
    digest: Option<String>,
    /// Image file to hash and verify
    #[arg(long)]
    image: Option<PathBuf>,
}

#[derive(Serialize)]
struct StatsReport {
    verification: provenance_core::AuditStats,
    fleet: provenance_core::FleetSummary,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ProvenanceConfig> {
    match path {
        Some(path) => ProvenanceConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display())),
        None => Ok(ProvenanceConfig::default()),
    }
}

fn init_logging(config: &ProvenanceConfig) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&config.log_filter))
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn register(provenance: &Provenance, args: RegisterArgs) -> anyhow::Result<()> {
    let request = RegisterRequest {
        installation_id: args.installation_id,
        device_model: args.model,
        os_name: args.os_name,
        os_version: args.os_version,
        public_key: PublicKeyInput {
            id: args.key_id,
            bytes: args.public_key,
            algorithm: args.algorithm,
            fingerprint: args.fingerprint,
        },
        device_fingerprint: args.device_fingerprint,
    };

    let registration = provenance.register(&request)?;
    print_json(&registration)
}

fn verify(provenance: &Provenance, args: VerifyArgs) -> anyhow::Result<()> {
    let timestamp = args
        .timestamp
        .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));
    let context = AttemptContext {
        client_addr: None,
        user_agent: Some(format!("provenance-cli/{}", env!("CARGO_PKG_VERSION"))),
    };

    let verdict = match (args.digest, args.image) {
        (Some(digest), _) => {
            let request = VerificationRequest::new(digest, args.signature, args.key_id, timestamp)
                .with_context(context);
            provenance.verify_image_signature(&request)?
        }
        (None, Some(path)) => {
            let limit = provenance.config().verification.max_content_bytes;
            let image = read_image(&path, limit)?;
            provenance.verify_image(&image, &args.signature, &args.key_id, &timestamp, context)?
        }
        (None, None) => bail!("either --digest or --image is required"),
    };

    print_json(&verdict)
}

/// Reads an image file, refusing files above `limit` before loading them.
fn read_image(path: &Path, limit: usize) -> anyhow::Result<Vec<u8>> {
    let size = std::fs::metadata(path)
        .with_context(|| format!("reading {}", path.display()))?
        .len();
    if size > limit as u64 {
        return Err(ProvenanceError::ContentTooLarge {
            size: usize::try_from(size).unwrap_or(usize::MAX),
            limit,
        }
        .into());
    }

    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    init_logging(&config);

    if let Commands::Check = cli.command {
        config.validate()?;
        tracing::info!("configuration OK");
        return print_json(&config);
    }

    let provenance = Provenance::new(config)?;

    match cli.command {
        Commands::Register(args) => register(&provenance, args)?,
        Commands::Verify(args) => verify(&provenance, args)?,
        Commands::Device { key_id } => match provenance.lookup(&key_id)? {
            Some(record) => print_json(&record)?,
            None => bail!("no device with key id {:?}", key_id),
        },
        Commands::Devices => print_json(&provenance.list_devices()?)?,
        Commands::Stats => print_json(&StatsReport {
            verification: provenance.stats()?,
            fleet: provenance.fleet_summary()?,
        })?,
        Commands::Check => {}
    }

    provenance.flush()?;
    Ok(())
}
