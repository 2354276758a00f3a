//! keygrant CLI - hardware-bound identities and revocable delegations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use keygrant::{
    Base, Capability, Delegation, Did, Expiration, FileStore, HttpRegistry, Session,
    SessionConfig, SoftwareCredentialAdapter,
};
use rand::RngCore;
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

const DEVICE_KEY_FILE: &str = "device.key";
const STORE_DIR: &str = "store";

/// keygrant CLI
#[derive(Parser)]
#[command(name = "keygrant")]
#[command(about = "Hardware-bound identities and revocable delegations", long_about = None)]
struct Cli {
    /// Data directory (default: platform data dir)
    #[arg(short, long, global = true, env = "KEYGRANT_HOME")]
    data_dir: Option<PathBuf>,

    /// Revocation registry base URL
    #[arg(
        long,
        global = true,
        env = "KEYGRANT_REGISTRY_URL",
        default_value = "http://127.0.0.1:8600"
    )]
    registry: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Identity management
    Identity {
        #[command(subcommand)]
        action: IdentityAction,
    },
    /// Create, import and manage delegations
    Delegation {
        #[command(subcommand)]
        action: DelegationAction,
    },
}

#[derive(Subcommand)]
enum IdentityAction {
    /// Create the device credential and signing identity
    Init,
    /// Show the current identity
    Show,
    /// Print the public identity as JSON (safe to share)
    Export,
}

#[derive(Subcommand)]
enum DelegationAction {
    /// Grant capabilities to another DID
    Create {
        /// Recipient DID
        #[arg(short, long)]
        audience: String,
        /// Capability as `action` (on your own DID) or `resource=action`
        #[arg(short = 'c', long = "can", required = true)]
        capabilities: Vec<String>,
        /// Lifetime in hours (default: never expires)
        #[arg(long)]
        hours: Option<u32>,
        /// Content id of a received delegation backing this one
        #[arg(long = "proof")]
        proofs: Vec<String>,
        /// Encode the token as base64url
        #[arg(long)]
        base64url: bool,
    },
    /// Import a delegation token
    Import {
        token: String,
        /// Local label
        #[arg(short, long)]
        name: Option<String>,
    },
    /// List created and received delegations
    List,
    /// Check that a delegation is usable now
    Validate {
        id: String,
        /// Ignore cached registry answers
        #[arg(long)]
        refresh: bool,
    },
    /// Revoke a delegation you issued or received
    Revoke {
        id: String,
        #[arg(short, long)]
        reason: Option<String>,
    },
    /// Print a stored delegation's token
    Export {
        id: String,
        #[arg(long)]
        base64url: bool,
    },
}

fn get_data_dir(cli_path: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = cli_path {
        return Ok(path);
    }

    let proj_dirs = directories::ProjectDirs::from("dev", "keygrant", "keygrant")
        .context("Could not determine data directory")?;
    Ok(proj_dirs.data_dir().to_path_buf())
}

fn load_device_key(data_dir: &Path) -> Result<[u8; 32]> {
    let path = data_dir.join(DEVICE_KEY_FILE);
    let contents = Zeroizing::new(std::fs::read_to_string(&path).with_context(|| {
        format!(
            "No device key at {}. Run `keygrant identity init` first.",
            path.display()
        )
    })?);

    let bytes = Zeroizing::new(hex::decode(contents.trim()).context("Invalid device key file")?);
    bytes
        .as_slice()
        .try_into()
        .context("Device key must be 32 bytes")
}

fn save_device_key(data_dir: &Path, key: &[u8; 32]) -> Result<()> {
    std::fs::create_dir_all(data_dir)?;
    let path = data_dir.join(DEVICE_KEY_FILE);
    std::fs::write(&path, Zeroizing::new(hex::encode(key)).as_bytes())?;

    // Set restrictive permissions on Unix
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}

struct Paths {
    data_dir: PathBuf,
    registry: String,
}

impl Paths {
    async fn open(&self) -> Result<Session> {
        let device_key = Zeroizing::new(load_device_key(&self.data_dir)?);
        let config = SessionConfig::default();
        let registry = HttpRegistry::new(config.registry_config(&self.registry))
            .context("Invalid registry URL")?;
        let store = FileStore::new(self.data_dir.join(STORE_DIR));

        Session::open(
            &SoftwareCredentialAdapter::new(*device_key),
            Arc::new(store),
            Arc::new(registry),
            config,
        )
        .await
        .context("Could not open session")
    }
}

fn parse_capability(arg: &str, me: &Did) -> Result<Capability> {
    let cap = match arg.split_once('=') {
        Some((resource, action)) => Capability::new(resource, action),
        None => Capability::new(me.to_string(), arg),
    };
    cap.with_context(|| format!("Invalid capability: {arg}"))
}

fn print_delegation(delegation: &Delegation) {
    let state = delegation.state_at(Utc::now());
    match &delegation.name {
        Some(name) => println!("  {} ({name}) [{state:?}]", delegation.content_id),
        None => println!("  {} [{state:?}]", delegation.content_id),
    }
    println!("    from: {}", delegation.issuer);
    println!("    to:   {}", delegation.audience);
    for cap in &delegation.capabilities {
        println!("    can:  {cap}");
    }
    if let Some(exp) = delegation.expires_at {
        println!("    expires: {}", exp.to_rfc3339());
    }
}

async fn cmd_identity_init(ctx: &Paths) -> Result<()> {
    let path = ctx.data_dir.join(DEVICE_KEY_FILE);
    if path.exists() {
        anyhow::bail!("Identity already exists at {}", ctx.data_dir.display());
    }

    let mut key = Zeroizing::new([0u8; 32]);
    rand::rngs::OsRng.fill_bytes(&mut key[..]);
    save_device_key(&ctx.data_dir, &key)?;

    let session = ctx.open().await?;
    println!("Created new identity:");
    println!("  DID: {}", session.did());
    println!("  Data: {}", ctx.data_dir.display());
    session.lock().await?;

    Ok(())
}

async fn cmd_identity_show(ctx: &Paths) -> Result<()> {
    let session = ctx.open().await?;

    println!("Identity:");
    println!("  DID: {}", session.did());
    println!("  Key ID: {}", session.did().key_id());
    println!("  Credential: {}", session.credential_id());
    println!("  Data: {}", ctx.data_dir.display());
    session.lock().await?;

    Ok(())
}

async fn cmd_identity_export(ctx: &Paths) -> Result<()> {
    let session = ctx.open().await?;

    let export = serde_json::json!({
        "did": session.did().to_string(),
        "publicKey": hex::encode(session.public_key()),
    });
    println!("{}", serde_json::to_string_pretty(&export)?);
    session.lock().await?;

    Ok(())
}

async fn cmd_delegation(ctx: &Paths, action: DelegationAction) -> Result<()> {
    let session = ctx.open().await?;
    let delegations = session.delegations();

    match action {
        DelegationAction::Create {
            audience,
            capabilities,
            hours,
            proofs,
            base64url,
        } => {
            let audience: Did = audience.parse().context("Invalid audience DID")?;
            let capabilities = capabilities
                .iter()
                .map(|arg| parse_capability(arg, session.did()))
                .collect::<Result<Vec<_>>>()?;
            let expiration = hours.map_or(Expiration::Never, Expiration::RelativeHours);

            let created = delegations
                .create(&audience, capabilities, expiration, &proofs)
                .await?;
            let token = if base64url {
                delegations
                    .export(&created.content_id, Base::Base64Url)
                    .await?
            } else {
                created.token.clone()
            };

            eprintln!("Created {}", created.content_id);
            println!("{token}");
        }
        DelegationAction::Import { token, name } => {
            let imported = delegations.import(token.trim(), name).await?;
            for warning in &imported.warnings {
                eprintln!("warning: {warning}");
            }
            if imported.added {
                println!("Imported:");
            } else {
                println!("Already known:");
            }
            print_delegation(&imported.delegation);
        }
        DelegationAction::List => {
            println!("Created:");
            for delegation in delegations.list_created().await {
                print_delegation(&delegation);
            }
            println!("Received:");
            for delegation in delegations.list_received().await {
                print_delegation(&delegation);
            }
        }
        DelegationAction::Validate { id, refresh } => {
            if refresh {
                delegations.is_revoked(&id, true).await?;
            }
            let delegation = delegations.ensure_usable(&id).await?;
            println!("✓ {} is valid", delegation.content_id);
        }
        DelegationAction::Revoke { id, reason } => {
            let revoked = delegations.revoke(&id, reason).await?;
            println!("Revoked {}", revoked.content_id);
        }
        DelegationAction::Export { id, base64url } => {
            let base = if base64url {
                Base::Base64Url
            } else {
                Base::Base64
            };
            println!("{}", delegations.export(&id, base).await?);
        }
    }

    session.lock().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = Paths {
        data_dir: get_data_dir(cli.data_dir)?,
        registry: cli.registry,
    };

    match cli.command {
        Commands::Identity { action } => match action {
            IdentityAction::Init => cmd_identity_init(&ctx).await,
            IdentityAction::Show => cmd_identity_show(&ctx).await,
            IdentityAction::Export => cmd_identity_export(&ctx).await,
        },
        Commands::Delegation { action } => cmd_delegation(&ctx, action).await,
    }
}
