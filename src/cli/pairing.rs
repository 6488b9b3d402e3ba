//! Pairing CLI commands.

use clap::Subcommand;
use tokio::sync::broadcast;

use crate::pairing::{PairingCoordinator, PairingEvent, PairingState, PartnerInfo};

#[derive(Subcommand, Debug, Clone)]
pub enum PairingCommand {
    /// Show pairing state and partner presence
    Status {
        /// Print the state as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate a pairing code for your partner
    Generate {
        /// Keep running until the code is redeemed or expires
        #[arg(long)]
        wait: bool,
    },

    /// Redeem your partner's pairing code
    Redeem {
        /// The six-digit code shown on your partner's device
        code: String,
    },

    /// Unpair from your partner on this device
    Unpair,

    /// Stream pairing events until interrupted
    Watch,
}

/// Run a pairing command.
pub async fn run_pairing_command(
    coordinator: &PairingCoordinator,
    cmd: PairingCommand,
) -> anyhow::Result<()> {
    match cmd {
        PairingCommand::Status { json } => status(coordinator, json).await,
        PairingCommand::Generate { wait } => generate(coordinator, wait).await,
        PairingCommand::Redeem { code } => redeem(coordinator, &code).await,
        PairingCommand::Unpair => unpair(coordinator).await,
        PairingCommand::Watch => watch(coordinator).await,
    }
}

async fn status(coordinator: &PairingCoordinator, json: bool) -> anyhow::Result<()> {
    let state = coordinator.state().await?;
    let profile = coordinator.profile().await?;

    if json {
        let out = serde_json::json!({
            "state": state,
            "profile": profile,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("User: {} ({})", profile.display_name, profile.user_id);
    println!("State: {}", state);
    if let PairingState::WaitingForPartner(pending) = &state {
        println!(
            "  Code {} expires at {}",
            pending.code,
            pending.expires_at.format("%H:%M:%S UTC")
        );
    }
    if let Some(partner) = &profile.partner_profile {
        println!("Partner:");
        print_partner(partner);
    }
    Ok(())
}

async fn generate(coordinator: &PairingCoordinator, wait: bool) -> anyhow::Result<()> {
    let mut events = coordinator.subscribe();
    let pending = coordinator.generate_code().await?;

    println!("Your pairing code: {}", pending.code);
    println!(
        "Valid until {}. Share it with your partner.",
        pending.expires_at.format("%H:%M:%S UTC")
    );
    if !wait {
        return Ok(());
    }

    println!("Waiting for your partner (Ctrl-C to stop)...");
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(PairingEvent::Paired { partner_id }) => {
                    println!("Paired with {}.", partner_id);
                    return Ok(());
                }
                Ok(PairingEvent::CodeExpired { code }) if code == pending.code => {
                    println!("Code {} expired. Run `iwbh generate` for a new one.", code);
                    return Ok(());
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            },
            _ = tokio::signal::ctrl_c() => {
                println!("Stopped waiting; the code stays valid until it expires.");
                return Ok(());
            }
        }
    }
}

async fn redeem(coordinator: &PairingCoordinator, code: &str) -> anyhow::Result<()> {
    let partner_id = coordinator.redeem_code(code).await?;
    println!("Paired with {}.", partner_id);
    if let Some(partner) = coordinator.profile().await?.partner_profile {
        print_partner(&partner);
    }
    Ok(())
}

async fn unpair(coordinator: &PairingCoordinator) -> anyhow::Result<()> {
    let before = coordinator.state().await?;
    coordinator.unpair().await?;
    match before {
        PairingState::Paired { partner_id } => println!("Unpaired from {}.", partner_id),
        _ => println!("Not paired; cleared any pending code."),
    }
    Ok(())
}

async fn watch(coordinator: &PairingCoordinator) -> anyhow::Result<()> {
    let mut events = coordinator.subscribe();
    println!("State: {}", coordinator.state().await?);
    println!("Watching pairing events (Ctrl-C to stop)...");
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => println!("{}", describe(&event)),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            },
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

fn print_partner(partner: &PartnerInfo) {
    println!("  {} {}", partner.emoji, partner.display_name);
    if !partner.bio.is_empty() {
        println!("  {}", partner.bio);
    }
    if partner.is_online {
        println!("  Online");
    } else {
        println!(
            "  Last seen {}",
            partner.last_seen.format("%Y-%m-%d %H:%M UTC")
        );
    }
}

fn describe(event: &PairingEvent) -> String {
    match event {
        PairingEvent::StateChanged { from, to } => format!("state: {} -> {}", from, to),
        PairingEvent::CodeIssued(pending) => format!("code issued: {}", pending.code),
        PairingEvent::CodeExpired { code } => format!("code expired: {}", code),
        PairingEvent::Paired { partner_id } => format!("paired with {}", partner_id),
        PairingEvent::Unpaired { former_partner } => match former_partner {
            Some(partner) => format!("unpaired from {}", partner),
            None => "unpaired".to_string(),
        },
        PairingEvent::PartnerPresence(info) => format!(
            "partner {} is {}",
            info.display_name,
            if info.is_online { "online" } else { "offline" }
        ),
        PairingEvent::Failed { reason } => format!("failed: {}", reason),
    }
}
