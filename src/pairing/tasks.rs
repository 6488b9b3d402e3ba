//! Background tasks that feed the coordinator's inbox.
//!
//! None of these touch pairing state. Each one forwards an input (a timer
//! firing, a document change, a heartbeat tick) as a [`Command`] through a
//! weak sender, so a task never keeps the coordinator alive on its own.
//! The coordinator aborts them when the state they serve is left.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::code::PairCode;
use super::coordinator::Command;
use super::model::{PairingNotice, PartnerInfo};
use crate::remote::{DocumentChange, Subscription};

/// Handles of the tasks a coordinator may be running.
#[derive(Default)]
pub(super) struct Tasks {
    pub expiry: Option<JoinHandle<()>>,
    pub notices: Option<JoinHandle<()>>,
    pub presence: Option<JoinHandle<()>>,
    pub heartbeat: Option<JoinHandle<()>>,
}

impl Tasks {
    pub fn cancel(slot: &mut Option<JoinHandle<()>>) {
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }

    pub fn cancel_all(&mut self) {
        Self::cancel(&mut self.expiry);
        Self::cancel(&mut self.notices);
        Self::cancel(&mut self.presence);
        Self::cancel(&mut self.heartbeat);
    }
}

impl Drop for Tasks {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

/// Send into the inbox if the coordinator is still alive.
async fn forward(inbox: &mpsc::WeakSender<Command>, command: Command) -> bool {
    match inbox.upgrade() {
        Some(tx) => tx.send(command).await.is_ok(),
        None => false,
    }
}

/// Time left until `deadline`, zero if it has passed.
pub(super) fn until(deadline: DateTime<Utc>) -> Duration {
    (deadline - Utc::now()).to_std().unwrap_or(Duration::ZERO)
}

/// Fire `CodeExpired(code)` after `delay`.
pub(super) fn spawn_expiry_timer(
    inbox: mpsc::WeakSender<Command>,
    code: PairCode,
    delay: Duration,
) -> JoinHandle<()> {
    let deadline = tokio::time::Instant::now() + delay;
    tokio::spawn(async move {
        tokio::time::sleep_until(deadline).await;
        tracing::debug!(code = %code, "Pairing code timer fired");
        forward(&inbox, Command::CodeExpired(code)).await;
    })
}

/// Forward pairing notices written for this user.
pub(super) fn spawn_notice_forwarder(
    inbox: mpsc::WeakSender<Command>,
    mut subscription: Subscription,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(change) = subscription.next().await {
            let DocumentChange::Written(document) = change else {
                continue;
            };
            match serde_json::from_value::<PairingNotice>(document) {
                Ok(notice) => {
                    if !forward(&inbox, Command::NoticeReceived(notice)).await {
                        break;
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Ignoring malformed pairing notice"),
            }
        }
    })
}

/// Forward every published presence record of the partner.
pub(super) fn spawn_presence_forwarder(
    inbox: mpsc::WeakSender<Command>,
    mut subscription: Subscription,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(change) = subscription.next().await {
            match change {
                DocumentChange::Written(document) => {
                    match serde_json::from_value::<PartnerInfo>(document) {
                        Ok(info) => {
                            if !forward(&inbox, Command::PresenceChanged(info)).await {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Ignoring malformed partner presence")
                        }
                    }
                }
                DocumentChange::Deleted => {
                    tracing::debug!("Partner presence record was removed");
                }
            }
        }
        tracing::debug!("Partner presence feed closed");
    })
}

/// Tick `Heartbeat` every `interval`, starting one interval from now.
pub(super) fn spawn_heartbeat(
    inbox: mpsc::WeakSender<Command>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            timer.tick().await;
            if !forward(&inbox, Command::Heartbeat).await {
                break;
            }
        }
    })
}

/// Fold a presence update into the cached partner record.
///
/// Only liveness fields are merged into an existing cache entry; the first
/// record seen is cached whole.
pub(super) fn merge_presence(cached: &mut Option<PartnerInfo>, update: PartnerInfo) {
    match cached {
        Some(existing) => {
            existing.is_online = update.is_online;
            existing.last_seen = update.last_seen;
        }
        None => *cached = Some(update),
    }
}
