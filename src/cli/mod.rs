//! CLI command handling.
//!
//! Provides subcommands for:
//! - Showing pairing state and partner presence (`status`)
//! - Generating a code for your partner (`generate`)
//! - Redeeming your partner's code (`redeem`)
//! - Unpairing on this device (`unpair`)
//! - Viewing and editing your profile (`profile`)
//! - Streaming pairing events (`watch`)
//!
//! Every command runs against the file-backed stores: the profile lives in
//! `<data dir>/<user id>/`, and the directory named by `IWBH_SHARED_DIR`
//! stands in for the shared document store, so two users on one machine
//! can pair with each other.

mod pairing;
mod profile;

pub use pairing::{PairingCommand, run_pairing_command};
pub use profile::{ProfileArgs, run_profile_command};

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::error::IdentityError;
use crate::identity::{Identity, StaticIdentity};
use crate::pairing::PairingCoordinator;
use crate::remote::FileDocumentStore;
use crate::store::FileKeyValueStore;

#[derive(Parser, Debug)]
#[command(name = "iwbh")]
#[command(about = "Pair with your partner and keep up with their presence")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Stable user id of the signed-in user
    #[arg(long, global = true, env = "IWBH_USER_ID")]
    pub user_id: Option<String>,

    /// Display name used for a fresh profile
    #[arg(long, global = true, env = "IWBH_DISPLAY_NAME")]
    pub display_name: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(flatten)]
    Pairing(PairingCommand),

    /// Show or edit your profile
    Profile(ProfileArgs),
}

impl Cli {
    /// Identity from `--user-id` / `--display-name` (or their env vars).
    pub fn identity(&self) -> anyhow::Result<Identity> {
        let user_id = self.user_id.clone().ok_or_else(|| {
            IdentityError::Unavailable("set --user-id or IWBH_USER_ID".to_string())
        })?;
        Ok(Identity::new(
            user_id,
            self.display_name.clone().unwrap_or_default(),
        )?)
    }
}

/// Install the global tracing subscriber. Logs go to stderr.
pub fn init_logging(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("iwbh=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Start a coordinator over the file-backed stores named by `config`.
pub async fn connect(config: &Config, identity: Identity) -> anyhow::Result<PairingCoordinator> {
    let local = FileKeyValueStore::new(config.storage.data_dir.join(&identity.user_id));
    let remote = FileDocumentStore::new(&config.storage.shared_dir);
    tracing::debug!(
        data_dir = %local.root().display(),
        shared_dir = %remote.root().display(),
        "Opening stores"
    );
    let coordinator = PairingCoordinator::start(
        &StaticIdentity::new(identity),
        Arc::new(local),
        Arc::new(remote),
        config.pairing.clone(),
    )
    .await?;
    Ok(coordinator)
}

/// Run a parsed command to completion.
pub async fn run_command(coordinator: &PairingCoordinator, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Pairing(cmd) => run_pairing_command(coordinator, cmd).await,
        Command::Profile(args) => run_profile_command(coordinator, args).await,
    }
}
