//! Pairing coordinator for one local user.
//!
//! A single actor task owns the profile and the pairing state. Callers talk
//! to it through a cloneable [`PairingCoordinator`] handle; timers and
//! document subscriptions talk to it through the same inbox. Every command
//! runs to completion before the next one is taken, so a timer firing can
//! never interleave with a user-triggered transition.
//!
//! ```text
//! handle ──┐
//! timer  ──┼──► inbox ──► Session (state + profile) ──► events (broadcast)
//! notices ─┤                    │
//! presence ┘                    ├──► KeyValueStore   (profile)
//!                               └──► DocumentStore   (codes, notices, presence)
//! ```

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, oneshot};

use super::code::PairCode;
use super::model::{
    PairingCodeRecord, PairingNotice, PartnerInfo, ProfileUpdate, UserProfile,
};
use super::state::{PairingEvent, PairingState, PendingCode};
use super::tasks::{self, Tasks};
use crate::config::{DEFAULT_CODE_TTL, PairingConfig};
use crate::error::{Error, PairingError};
use crate::identity::{Identity, IdentitySource};
use crate::remote::{
    DocumentStore, collections, create_document, read_document, write_document,
};
use crate::store::KeyValueStore;

/// Local store key holding the serialized [`UserProfile`].
pub const PROFILE_KEY: &str = "iwbh.userProfile";

/// Pending commands before senders start waiting.
const INBOX_CAPACITY: usize = 64;

/// Source of candidate pairing codes.
pub type CodeSource = Box<dyn FnMut() -> PairCode + Send + Sync>;

type Reply<T> = oneshot::Sender<T>;

/// Messages processed by the session actor.
pub(super) enum Command {
    GenerateCode(Reply<Result<PendingCode, PairingError>>),
    RedeemCode {
        input: String,
        reply: Reply<Result<String, PairingError>>,
    },
    BeginCodeEntry(Reply<Result<PairingState, PairingError>>),
    CancelCodeEntry(Reply<PairingState>),
    Unpair(Reply<()>),
    UpdateProfile {
        update: ProfileUpdate,
        reply: Reply<UserProfile>,
    },
    SetOnline {
        online: bool,
        reply: Reply<Result<(), PairingError>>,
    },
    Snapshot(Reply<(PairingState, UserProfile)>),
    Shutdown(Reply<()>),
    CodeExpired(PairCode),
    NoticeReceived(PairingNotice),
    PresenceChanged(PartnerInfo),
    Heartbeat,
}

/// Handle to a running pairing session.
#[derive(Clone)]
pub struct PairingCoordinator {
    user_id: String,
    inbox: mpsc::Sender<Command>,
    events: broadcast::Sender<PairingEvent>,
}

impl std::fmt::Debug for PairingCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PairingCoordinator")
            .field("user_id", &self.user_id)
            .field("running", &!self.inbox.is_closed())
            .finish()
    }
}

impl PairingCoordinator {
    /// Restore the session for the signed-in user and start the actor.
    pub async fn start(
        identity: &dyn IdentitySource,
        local: Arc<dyn KeyValueStore>,
        remote: Arc<dyn DocumentStore>,
        config: PairingConfig,
    ) -> Result<Self, Error> {
        Self::start_with_code_source(identity, local, remote, config, Box::new(PairCode::random))
            .await
    }

    /// Like [`start`](Self::start), drawing candidate codes from `codes`.
    pub async fn start_with_code_source(
        identity: &dyn IdentitySource,
        local: Arc<dyn KeyValueStore>,
        remote: Arc<dyn DocumentStore>,
        config: PairingConfig,
        codes: CodeSource,
    ) -> Result<Self, Error> {
        let identity = identity.identity()?;
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        let session = Session::restore(
            identity.clone(),
            local,
            remote,
            config,
            events.clone(),
            tx.downgrade(),
            codes,
        )
        .await?;
        tokio::spawn(session.run(rx));

        tracing::info!(user_id = %identity.user_id, "Pairing coordinator started");
        Ok(Self {
            user_id: identity.user_id,
            inbox: tx,
            events,
        })
    }

    /// The local user this coordinator acts for.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Subscribe to pairing events. Only events after this call are seen.
    pub fn subscribe(&self) -> broadcast::Receiver<PairingEvent> {
        self.events.subscribe()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, PairingError> {
        let (reply, rx) = oneshot::channel();
        self.inbox
            .send(make(reply))
            .await
            .map_err(|_| PairingError::CoordinatorStopped)?;
        rx.await.map_err(|_| PairingError::CoordinatorStopped)
    }

    /// Issue a fresh pairing code, invalidating any previous one.
    pub async fn generate_code(&self) -> Result<PendingCode, PairingError> {
        self.request(Command::GenerateCode).await?
    }

    /// Redeem a partner's code. Returns the new partner's user id.
    pub async fn redeem_code(&self, code: &str) -> Result<String, PairingError> {
        let input = code.to_string();
        self.request(|reply| Command::RedeemCode { input, reply })
            .await?
    }

    /// Enter the code-entry sub-state (UI only).
    pub async fn begin_code_entry(&self) -> Result<PairingState, PairingError> {
        self.request(Command::BeginCodeEntry).await?
    }

    /// Leave the code-entry sub-state without redeeming.
    pub async fn cancel_code_entry(&self) -> Result<PairingState, PairingError> {
        self.request(Command::CancelCodeEntry).await
    }

    /// Drop the partnership (and any pending code) on this device.
    pub async fn unpair(&self) -> Result<(), PairingError> {
        self.request(Command::Unpair).await
    }

    /// Edit presentation fields of the local profile.
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<UserProfile, PairingError> {
        self.request(|reply| Command::UpdateProfile { update, reply })
            .await
    }

    /// Publish this user's presence with the given online flag.
    pub async fn set_online(&self, online: bool) -> Result<(), PairingError> {
        self.request(|reply| Command::SetOnline { online, reply })
            .await?
    }

    pub async fn state(&self) -> Result<PairingState, PairingError> {
        Ok(self.request(Command::Snapshot).await?.0)
    }

    pub async fn profile(&self) -> Result<UserProfile, PairingError> {
        Ok(self.request(Command::Snapshot).await?.1)
    }

    /// Publish offline presence, cancel all background work and stop.
    pub async fn shutdown(&self) -> Result<(), PairingError> {
        self.request(Command::Shutdown).await
    }
}

/// The actor: sole owner of pairing state for one user.
struct Session {
    identity: Identity,
    profile: UserProfile,
    state: PairingState,
    local: Arc<dyn KeyValueStore>,
    remote: Arc<dyn DocumentStore>,
    config: PairingConfig,
    events: broadcast::Sender<PairingEvent>,
    inbox: mpsc::WeakSender<Command>,
    codes: CodeSource,
    tasks: Tasks,
    /// A code we gave up (expired or replaced) whose record a redeemer had
    /// already consumed. Its notice is accepted until we pair or unpair.
    orphaned_code: Option<PairCode>,
}

impl Session {
    async fn restore(
        identity: Identity,
        local: Arc<dyn KeyValueStore>,
        remote: Arc<dyn DocumentStore>,
        config: PairingConfig,
        events: broadcast::Sender<PairingEvent>,
        inbox: mpsc::WeakSender<Command>,
        codes: CodeSource,
    ) -> Result<Self, Error> {
        let stored = local
            .get(PROFILE_KEY)
            .await
            .map_err(PairingError::LocalStore)?;
        let mut profile = match stored {
            Some(bytes) => match serde_json::from_slice::<UserProfile>(&bytes) {
                Ok(profile) if profile.user_id == identity.user_id => profile,
                Ok(profile) => {
                    tracing::warn!(
                        stored_user = %profile.user_id,
                        user_id = %identity.user_id,
                        "Stored profile belongs to another user, starting fresh"
                    );
                    UserProfile::new(&identity.user_id, &identity.display_name)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Stored profile is unreadable, starting fresh");
                    UserProfile::new(&identity.user_id, &identity.display_name)
                }
            },
            None => UserProfile::new(&identity.user_id, &identity.display_name),
        };

        let state = PairingState::from_profile(&profile);
        state.apply_to(&mut profile);
        tracing::info!(state = state.label(), "Restored pairing state");

        let mut session = Self {
            identity,
            profile,
            state,
            local,
            remote,
            config,
            events,
            inbox,
            codes,
            tasks: Tasks::default(),
            orphaned_code: None,
        };
        session.persist().await;
        session.resume().await;
        Ok(session)
    }

    /// Re-establish the background work implied by the restored state.
    async fn resume(&mut self) {
        match self.state.clone() {
            PairingState::Paired { partner_id } => self.open_presence(&partner_id).await,
            PairingState::WaitingForPartner(pending) => {
                self.watch_notices().await;
                if pending.expires_at <= Utc::now() {
                    self.expire_code(pending.code).await;
                } else {
                    self.arm_expiry(&pending);
                    self.check_notice().await;
                }
            }
            _ => {}
        }

        if let Err(e) = self.publish_presence(true).await {
            tracing::warn!(error = %e, "Could not publish presence at startup");
        }
        if let Some(interval) = self.config.heartbeat_interval {
            self.tasks.heartbeat = Some(tasks::spawn_heartbeat(self.inbox.clone(), interval));
        }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        while let Some(command) = rx.recv().await {
            if !self.handle(command).await {
                return;
            }
        }
        tracing::debug!("All coordinator handles dropped");
        self.shutdown().await;
    }

    /// Process one command. Returns `false` once the session has stopped.
    async fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::GenerateCode(reply) => {
                let _ = reply.send(self.generate_code().await);
            }
            Command::RedeemCode { input, reply } => {
                let _ = reply.send(self.redeem_code(&input).await);
            }
            Command::BeginCodeEntry(reply) => {
                let _ = reply.send(self.begin_code_entry());
            }
            Command::CancelCodeEntry(reply) => {
                if self.state == PairingState::EnteringCode {
                    self.transition(PairingState::Unpaired);
                }
                let _ = reply.send(self.state.clone());
            }
            Command::Unpair(reply) => {
                self.unpair().await;
                let _ = reply.send(());
            }
            Command::UpdateProfile { update, reply } => {
                update.apply_to(&mut self.profile);
                self.persist().await;
                if let Err(e) = self.publish_presence(true).await {
                    tracing::warn!(error = %e, "Could not publish updated profile");
                }
                let _ = reply.send(self.profile.clone());
            }
            Command::SetOnline { online, reply } => {
                let _ = reply.send(self.publish_presence(online).await);
            }
            Command::Snapshot(reply) => {
                let _ = reply.send((self.state.clone(), self.profile.clone()));
            }
            Command::CodeExpired(code) => self.expire_code(code).await,
            Command::NoticeReceived(notice) => self.on_notice(notice).await,
            Command::PresenceChanged(info) => self.on_presence(info).await,
            Command::Heartbeat => {
                if let Err(e) = self.publish_presence(true).await {
                    tracing::warn!(error = %e, "Presence heartbeat failed");
                }
            }
            Command::Shutdown(reply) => {
                self.shutdown().await;
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    // --- transitions ---

    async fn generate_code(&mut self) -> Result<PendingCode, PairingError> {
        if let Some(partner_id) = self.state.partner_id() {
            return Err(PairingError::AlreadyPaired {
                partner_id: partner_id.to_string(),
            });
        }

        let previous = self.state.pending().cloned();
        self.transition(PairingState::GeneratingCode);

        if let Some(old) = &previous {
            Tasks::cancel(&mut self.tasks.expiry);
            match self
                .remote
                .delete(collections::PAIR_CODES, old.code.as_str())
                .await
            {
                Ok(true) => {
                    tracing::info!(code = %old.code, "Invalidated previous pairing code");
                }
                Ok(false) => {
                    // A redeemer consumed the old code first and is pairing
                    // with us; its notice must still be honoured.
                    tracing::info!(code = %old.code, "Previous pairing code was already redeemed");
                    self.orphaned_code = Some(old.code.clone());
                    self.check_notice().await;
                    if let Some(partner_id) = self.state.partner_id() {
                        return Err(PairingError::AlreadyPaired {
                            partner_id: partner_id.to_string(),
                        });
                    }
                }
                Err(e) => {
                    return Err(self
                        .fail(PairingError::NetworkFailure(e), previous.clone())
                        .await);
                }
            }
        }

        let pending = match self.issue_code().await {
            Ok(pending) => pending,
            Err(e) => return Err(self.fail(e, None).await),
        };

        self.transition(PairingState::WaitingForPartner(pending.clone()));
        self.persist().await;
        self.arm_expiry(&pending);
        self.watch_notices().await;
        self.emit(PairingEvent::CodeIssued(pending.clone()));
        Ok(pending)
    }

    /// Draw codes until one can be claimed in the shared store.
    async fn issue_code(&mut self) -> Result<PendingCode, PairingError> {
        let ttl = chrono::Duration::from_std(self.config.code_ttl).unwrap_or_else(|_| {
            chrono::Duration::seconds(DEFAULT_CODE_TTL.as_secs() as i64)
        });
        let attempts = self.config.max_code_attempts.max(1);

        for attempt in 1..=attempts {
            let code = (self.codes)();
            let now = Utc::now();

            let existing = read_document::<PairingCodeRecord>(
                self.remote.as_ref(),
                collections::PAIR_CODES,
                code.as_str(),
            )
            .await
            .map_err(PairingError::NetworkFailure)?;
            match existing {
                Some(record) if !record.is_expired_at(now) => {
                    tracing::debug!(attempt, "Pairing code collision, drawing again");
                    continue;
                }
                Some(_) => {
                    tracing::debug!(code = %code, "Removing stale pairing code record");
                    self.remote
                        .delete(collections::PAIR_CODES, code.as_str())
                        .await
                        .map_err(PairingError::NetworkFailure)?;
                }
                None => {}
            }

            let record = PairingCodeRecord {
                owner_user_id: self.identity.user_id.clone(),
                created_at: now,
                expires_at: now + ttl,
            };
            let created = create_document(
                self.remote.as_ref(),
                collections::PAIR_CODES,
                code.as_str(),
                &record,
            )
            .await
            .map_err(PairingError::NetworkFailure)?;
            if created {
                tracing::info!(code = %code, expires_at = %record.expires_at, "Issued pairing code");
                return Ok(PendingCode {
                    code,
                    expires_at: record.expires_at,
                });
            }
            tracing::debug!(attempt, "Pairing code claimed concurrently, drawing again");
        }

        Err(PairingError::CodeSpaceExhausted { attempts })
    }

    async fn redeem_code(&mut self, input: &str) -> Result<String, PairingError> {
        let code = PairCode::parse(input)?;
        if let Some(partner_id) = self.state.partner_id() {
            return Err(PairingError::AlreadyPaired {
                partner_id: partner_id.to_string(),
            });
        }

        let record = match read_document::<PairingCodeRecord>(
            self.remote.as_ref(),
            collections::PAIR_CODES,
            code.as_str(),
        )
        .await
        {
            Ok(record) => record,
            Err(e) => return Err(self.fail_keeping_pending(e).await),
        };
        let invalid = || PairingError::InvalidCode {
            code: code.to_string(),
        };
        let Some(record) = record else {
            return Err(invalid());
        };
        if record.is_expired_at(Utc::now()) {
            return Err(invalid());
        }
        if record.owner_user_id == self.identity.user_id {
            return Err(PairingError::SelfPairing);
        }

        // Single consumption: only the caller whose delete removed the
        // record may pair through it.
        match self
            .remote
            .delete(collections::PAIR_CODES, code.as_str())
            .await
        {
            Ok(true) => {}
            Ok(false) => return Err(invalid()),
            Err(e) => return Err(self.fail_keeping_pending(e).await),
        }

        let notice = PairingNotice {
            partner_id: self.identity.user_id.clone(),
            partner_display_name: self.profile.display_name.clone(),
            code: code.clone(),
            paired_at: Utc::now(),
        };
        if let Err(e) = write_document(
            self.remote.as_ref(),
            collections::PAIRING_NOTICES,
            &record.owner_user_id,
            &notice,
        )
        .await
        {
            return Err(self.fail_keeping_pending(e).await);
        }

        if let Some(own) = self.state.pending().cloned() {
            Tasks::cancel(&mut self.tasks.expiry);
            self.discard_remote_code(&own.code).await;
        }
        self.orphaned_code = None;

        tracing::info!(code = %code, partner_id = %record.owner_user_id, "Redeemed partner's pairing code");
        self.enter_paired(record.owner_user_id.clone()).await;
        Ok(record.owner_user_id)
    }

    fn begin_code_entry(&mut self) -> Result<PairingState, PairingError> {
        match &self.state {
            PairingState::Paired { partner_id } => Err(PairingError::AlreadyPaired {
                partner_id: partner_id.clone(),
            }),
            PairingState::Unpaired | PairingState::Failed { pending: None, .. } => {
                self.transition(PairingState::EnteringCode);
                Ok(self.state.clone())
            }
            _ => Ok(self.state.clone()),
        }
    }

    async fn unpair(&mut self) {
        let former_partner = self.state.partner_id().map(str::to_string);
        let pending = self.state.pending().cloned();

        Tasks::cancel(&mut self.tasks.presence);
        Tasks::cancel(&mut self.tasks.expiry);
        Tasks::cancel(&mut self.tasks.notices);
        self.orphaned_code = None;
        if let Some(pending) = pending {
            self.discard_remote_code(&pending.code).await;
        }

        self.transition(PairingState::Unpaired);
        self.persist().await;
        tracing::info!(former_partner = ?former_partner, "Unpaired");
        self.emit(PairingEvent::Unpaired { former_partner });
    }

    /// Timer-driven expiry of `code`. A no-op unless `code` is still held.
    async fn expire_code(&mut self, code: PairCode) {
        let held = self.state.pending().is_some_and(|p| p.code == code);
        if !held {
            tracing::debug!(code = %code, state = self.state.label(), "Ignoring stale code expiry");
            return;
        }
        Tasks::cancel(&mut self.tasks.expiry);

        let consumed = match self
            .remote
            .delete(collections::PAIR_CODES, code.as_str())
            .await
        {
            Ok(removed) => !removed,
            Err(e) => {
                // Redeemers also reject the record by its expiry time.
                tracing::warn!(code = %code, error = %e, "Could not delete expired pairing code");
                false
            }
        };

        if consumed {
            // A redeemer's delete beat ours; its notice may already be here.
            self.orphaned_code = Some(code.clone());
            self.check_notice().await;
            if self.state.partner_id().is_some() {
                return;
            }
        } else {
            Tasks::cancel(&mut self.tasks.notices);
        }

        self.transition(PairingState::Unpaired);
        self.persist().await;
        tracing::info!(code = %code, "Pairing code expired");
        self.emit(PairingEvent::CodeExpired { code });
    }

    async fn on_notice(&mut self, notice: PairingNotice) {
        let for_pending = self.state.pending().is_some_and(|p| p.code == notice.code);
        let for_orphan = self.orphaned_code.as_ref() == Some(&notice.code)
            && self.state.partner_id().is_none();
        if !(for_pending || for_orphan) {
            tracing::debug!(code = %notice.code, "Ignoring pairing notice for a code no longer held");
            return;
        }
        if notice.partner_id == self.identity.user_id {
            tracing::warn!("Ignoring pairing notice naming ourselves");
            return;
        }

        tracing::info!(
            partner_id = %notice.partner_id,
            partner = %notice.partner_display_name,
            code = %notice.code,
            "Partner redeemed our pairing code"
        );
        Tasks::cancel(&mut self.tasks.expiry);
        if let Some(own) = self.state.pending().cloned()
            && own.code != notice.code
        {
            self.discard_remote_code(&own.code).await;
        }
        self.orphaned_code = None;
        self.enter_paired(notice.partner_id).await;

        if let Err(e) = self
            .remote
            .delete(collections::PAIRING_NOTICES, &self.identity.user_id)
            .await
        {
            tracing::warn!(error = %e, "Could not clear consumed pairing notice");
        }
    }

    async fn on_presence(&mut self, info: PartnerInfo) {
        if self.state.partner_id() != Some(info.user_id.as_str()) {
            tracing::debug!(user_id = %info.user_id, "Dropping presence for a non-partner");
            return;
        }
        tasks::merge_presence(&mut self.profile.partner_profile, info);
        self.persist().await;
        if let Some(cached) = &self.profile.partner_profile {
            tracing::debug!(online = cached.is_online, "Partner presence updated");
            self.emit(PairingEvent::PartnerPresence(cached.clone()));
        }
    }

    async fn enter_paired(&mut self, partner_id: String) {
        Tasks::cancel(&mut self.tasks.notices);
        self.transition(PairingState::Paired {
            partner_id: partner_id.clone(),
        });
        self.persist().await;
        self.emit(PairingEvent::Paired {
            partner_id: partner_id.clone(),
        });
        self.open_presence(&partner_id).await;
    }

    async fn fail_keeping_pending(&mut self, e: crate::error::StoreError) -> PairingError {
        let pending = self.state.pending().cloned();
        self.fail(PairingError::NetworkFailure(e), pending).await
    }

    /// Enter `Failed`, keeping `pending` live if it still is.
    async fn fail(&mut self, err: PairingError, pending: Option<PendingCode>) -> PairingError {
        let reason = err.to_string();
        tracing::warn!(error = %reason, "Pairing operation failed");
        match &pending {
            Some(pending) => self.arm_expiry(pending),
            None => {
                Tasks::cancel(&mut self.tasks.expiry);
                if self.orphaned_code.is_none() {
                    Tasks::cancel(&mut self.tasks.notices);
                }
            }
        }
        self.transition(PairingState::Failed {
            reason: reason.clone(),
            pending,
        });
        self.persist().await;
        self.emit(PairingEvent::Failed { reason });
        err
    }

    // --- background work ---

    fn arm_expiry(&mut self, pending: &PendingCode) {
        Tasks::cancel(&mut self.tasks.expiry);
        self.tasks.expiry = Some(tasks::spawn_expiry_timer(
            self.inbox.clone(),
            pending.code.clone(),
            tasks::until(pending.expires_at),
        ));
    }

    async fn watch_notices(&mut self) {
        if self.tasks.notices.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        match self
            .remote
            .subscribe(collections::PAIRING_NOTICES, &self.identity.user_id)
            .await
        {
            Ok(subscription) => {
                self.tasks.notices = Some(tasks::spawn_notice_forwarder(
                    self.inbox.clone(),
                    subscription,
                ));
            }
            Err(e) => tracing::warn!(error = %e, "Could not watch for pairing notices"),
        }
    }

    /// Pick up a notice written while this device was not watching.
    async fn check_notice(&mut self) {
        match read_document::<PairingNotice>(
            self.remote.as_ref(),
            collections::PAIRING_NOTICES,
            &self.identity.user_id,
        )
        .await
        {
            Ok(Some(notice)) => self.on_notice(notice).await,
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Could not read pairing notice"),
        }
    }

    async fn open_presence(&mut self, partner_id: &str) {
        Tasks::cancel(&mut self.tasks.presence);
        match self.remote.subscribe(collections::USERS, partner_id).await {
            Ok(subscription) => {
                self.tasks.presence = Some(tasks::spawn_presence_forwarder(
                    self.inbox.clone(),
                    subscription,
                ));
            }
            Err(e) => {
                tracing::warn!(partner_id, error = %e, "Could not subscribe to partner presence")
            }
        }

        match read_document::<PartnerInfo>(self.remote.as_ref(), collections::USERS, partner_id)
            .await
        {
            Ok(Some(info)) => self.on_presence(info).await,
            Ok(None) => tracing::debug!(partner_id, "Partner has not published presence yet"),
            Err(e) => tracing::warn!(partner_id, error = %e, "Could not read partner presence"),
        }
    }

    async fn publish_presence(&self, online: bool) -> Result<(), PairingError> {
        let presence = self.profile.presence(online, Utc::now());
        write_document(
            self.remote.as_ref(),
            collections::USERS,
            &self.identity.user_id,
            &presence,
        )
        .await
        .map_err(PairingError::NetworkFailure)
    }

    async fn discard_remote_code(&self, code: &PairCode) {
        if let Err(e) = self
            .remote
            .delete(collections::PAIR_CODES, code.as_str())
            .await
        {
            tracing::warn!(code = %code, error = %e, "Could not delete pairing code");
        }
    }

    async fn shutdown(&mut self) {
        self.tasks.cancel_all();
        if let Err(e) = self.publish_presence(false).await {
            tracing::warn!(error = %e, "Could not publish offline presence");
        }
        self.persist().await;
        tracing::info!(user_id = %self.identity.user_id, "Pairing coordinator stopped");
    }

    // --- bookkeeping ---

    fn transition(&mut self, to: PairingState) {
        if self.state == to {
            return;
        }
        let from = std::mem::replace(&mut self.state, to.clone());
        self.state.apply_to(&mut self.profile);
        tracing::debug!(from = from.label(), to = to.label(), "Pairing state changed");
        self.emit(PairingEvent::StateChanged { from, to });
    }

    fn emit(&self, event: PairingEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    async fn persist(&self) {
        let bytes = match serde_json::to_vec(&self.profile) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(error = %e, "Could not serialize profile");
                return;
            }
        };
        if let Err(e) = self.local.set(PROFILE_KEY, bytes).await {
            tracing::error!(error = %e, "Could not persist profile");
        }
    }
}
