//! IWBH command line.
//!
//! # Usage
//!
//! ```bash
//! # Show your pairing state
//! iwbh --user-id alex status
//!
//! # Generate a code and wait for your partner to redeem it
//! iwbh --user-id alex generate --wait
//!
//! # Redeem your partner's code
//! iwbh --user-id sam redeem 482913
//! ```

use clap::Parser;

use iwbh::Config;
use iwbh::cli::{Cli, connect, init_logging, run_command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    let config = Config::from_env()?;
    let identity = cli.identity()?;
    let coordinator = connect(&config, identity).await?;

    let result = run_command(&coordinator, cli.command).await;
    if let Err(e) = coordinator.shutdown().await {
        tracing::warn!(error = %e, "Coordinator did not shut down cleanly");
    }
    result
}
