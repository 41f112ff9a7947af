//! The session state machine that sits between the UI and the contract.
//!
//! `Disconnected → Connecting → Connected → Submitting → Confirming →
//! Connected`, with a hard reset to `Disconnected` from anywhere on logout,
//! cleared accounts or a chain switch. The UI only ever talks to the
//! coordinator; every operation ends in a status message and a published
//! `SessionUpdate`, and every failure comes back as a `SessionError`.

use crate::{
    contract_actions::{
        ContractActions,
        Submitted,
    },
    contract_view::ContractView,
    error::SessionError,
    remote::{
        ContractReader,
        ContractWriter,
        SigningAgent,
        WalletEvent,
    },
    types::{
        Action,
        ActionKind,
        Address,
        ContractSnapshot,
        Identity,
        PendingTransaction,
        Role,
    },
    wallet_session::{
        IdentityChange,
        WalletSession,
    },
};
use std::{
    collections::BTreeMap,
    sync::Arc,
};
use tokio::sync::mpsc;
use tracing::{
    info,
    warn,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Submitting,
    Confirming,
}

/// Everything a renderer needs, as one immutable value.
#[derive(Clone, Debug)]
pub struct SessionUpdate {
    pub state: SessionState,
    pub role: Role,
    pub identity: Option<Identity>,
    pub snapshot: Option<Arc<ContractSnapshot>>,
    pub pending: Vec<PendingTransaction>,
    pub busy: Vec<ActionKind>,
    pub status: String,
    pub last_error: Option<SessionError>,
}

#[derive(Clone, Debug)]
enum Phase {
    Submitting,
    Confirming(PendingTransaction),
}

/// A submitted write, tagged with the session it belongs to.
pub struct InFlight {
    epoch: u64,
    submitted: Submitted,
}

impl InFlight {
    pub fn pending(&self) -> &PendingTransaction {
        &self.submitted.pending
    }

    pub async fn confirm(self) -> Settled {
        let (pending, result) = self.submitted.confirm().await;
        Settled {
            epoch: self.epoch,
            pending,
            result,
        }
    }
}

/// A finalized (or failed) write waiting to be reconciled.
pub struct Settled {
    epoch: u64,
    pub pending: PendingTransaction,
    pub result: Result<(), SessionError>,
}

pub struct SessionCoordinator<A, C> {
    wallet: WalletSession<A>,
    view: ContractView<C>,
    actions: ContractActions<C>,
    connecting: bool,
    snapshot: Option<Arc<ContractSnapshot>>,
    in_flight: BTreeMap<ActionKind, Phase>,
    epoch: u64,
    status: String,
    last_error: Option<SessionError>,
    subscribers: Vec<mpsc::UnboundedSender<SessionUpdate>>,
}

impl<A, C> SessionCoordinator<A, C>
where
    A: SigningAgent,
    C: ContractReader + ContractWriter,
{
    pub fn new(agent: A, contract: Arc<C>) -> Self {
        Self {
            wallet: WalletSession::new(agent),
            view: ContractView::new(contract.clone()),
            actions: ContractActions::new(contract),
            connecting: false,
            snapshot: None,
            in_flight: BTreeMap::new(),
            epoch: 0,
            status: String::from("Disconnected"),
            last_error: None,
            subscribers: Vec::new(),
        }
    }

    pub fn agent(&self) -> &A {
        self.wallet.agent()
    }

    pub fn state(&self) -> SessionState {
        if self.wallet.identity().is_none() {
            return if self.connecting {
                SessionState::Connecting
            } else {
                SessionState::Disconnected
            };
        }
        let phases = self.in_flight.values();
        if phases.clone().any(|p| matches!(p, Phase::Submitting)) {
            SessionState::Submitting
        } else if phases.count() > 0 {
            SessionState::Confirming
        } else {
            SessionState::Connected
        }
    }

    pub fn role(&self) -> Role {
        Role::derive(self.wallet.identity(), self.snapshot.as_deref())
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.wallet.identity()
    }

    pub fn snapshot(&self) -> Option<Arc<ContractSnapshot>> {
        self.snapshot.clone()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn last_error(&self) -> Option<&SessionError> {
        self.last_error.as_ref()
    }

    pub fn pending(&self) -> Vec<PendingTransaction> {
        self.in_flight
            .values()
            .filter_map(|phase| match phase {
                Phase::Confirming(pending) => Some(pending.clone()),
                Phase::Submitting => None,
            })
            .collect()
    }

    /// Whether the control for `kind` must stay disabled.
    pub fn is_busy(&self, kind: ActionKind) -> bool {
        self.in_flight.contains_key(&kind)
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SessionUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(self.update());
        self.subscribers.push(tx);
        rx
    }

    pub async fn connect(&mut self) -> Result<Role, SessionError> {
        // a reconnect must not keep signing as the previous account
        self.wallet.disconnect();
        self.reset_session();
        self.connecting = true;
        self.set_status("Connecting wallet...");
        let connected = self.wallet.connect().await;
        self.connecting = false;
        let identity = match connected {
            Ok(identity) => identity,
            Err(err) => return Err(self.fail(err)),
        };
        self.set_status(format!("Connected {}", identity.address.short()));
        self.refresh_now().await?;
        let role = self.role();
        self.set_status(format!("Connected {} as {role}", identity.address.short()));
        Ok(role)
    }

    pub fn disconnect(&mut self) {
        self.wallet.disconnect();
        self.reset_session();
        self.set_status("Disconnected");
    }

    /// User-triggered re-read of the contract. Never called in a loop.
    pub async fn retry_refresh(&mut self) -> Result<(), SessionError> {
        self.set_status("Refreshing contract state...");
        self.refresh_now().await?;
        self.set_status("Contract state refreshed");
        Ok(())
    }

    pub async fn handle_wallet_event(
        &mut self,
        event: WalletEvent,
    ) -> Result<(), SessionError> {
        match self.wallet.apply_event(event) {
            IdentityChange::Unchanged => Ok(()),
            IdentityChange::Cleared => {
                self.reset_session();
                self.set_status("Wallet disconnected");
                Ok(())
            }
            IdentityChange::Replaced(identity) => {
                self.reset_session();
                self.set_status(format!("Switched to {}", identity.address.short()));
                self.refresh_now().await?;
                let role = self.role();
                self.set_status(format!(
                    "Switched to {} as {role}",
                    identity.address.short()
                ));
                Ok(())
            }
            IdentityChange::ChainInvalidated => {
                self.reset_session();
                self.set_status("Network changed; reconnecting...");
                self.connect().await.map(|_| ())
            }
        }
    }

    pub async fn submit(&mut self, action: Action) -> Result<InFlight, SessionError> {
        let kind = action.kind();
        let Some(identity) = self.wallet.identity().cloned() else {
            return Err(self.fail(SessionError::NotConnected));
        };
        if kind.is_owner_only() && self.role() != Role::Owner {
            return Err(self.fail(SessionError::Unauthorized(kind)));
        }
        if self.is_busy(kind) {
            return Err(self.fail(SessionError::ActionInFlight(kind)));
        }
        if let Err(err) = ContractActions::<C>::validate(&action) {
            return Err(self.fail(err));
        }

        self.in_flight.insert(kind, Phase::Submitting);
        self.set_status(format!("Waiting for wallet to sign {kind}..."));
        match self.actions.submit(&identity, &action).await {
            Ok(submitted) => {
                let pending = submitted.pending.clone();
                self.in_flight
                    .insert(kind, Phase::Confirming(pending.clone()));
                self.set_status(format!(
                    "{kind} pending ({})",
                    pending.hash_preview()
                ));
                Ok(InFlight {
                    epoch: self.epoch,
                    submitted,
                })
            }
            Err(err) => {
                self.in_flight.remove(&kind);
                Err(self.fail(err))
            }
        }
    }

    /// Reconcile a finalized write. A confirmed write only counts as settled
    /// once the follow-up refresh succeeds.
    pub async fn settle(
        &mut self,
        settled: Settled,
    ) -> Result<PendingTransaction, SessionError> {
        let Settled {
            epoch,
            pending,
            result,
        } = settled;
        if epoch != self.epoch {
            info!(
                kind = %pending.kind,
                hash = %pending.hash,
                "dropping confirmation from a previous session"
            );
            return Err(SessionError::StaleSession);
        }
        self.in_flight.remove(&pending.kind);
        if let Err(err) = result {
            return Err(self.fail(err));
        }
        self.set_status(format!("{} confirmed; refreshing...", pending.kind));
        self.refresh_now().await?;
        self.set_status(format!(
            "{} confirmed ({})",
            pending.kind,
            pending.hash_preview()
        ));
        Ok(pending)
    }

    pub async fn check_whitelist(&mut self, account: &Address) -> Result<bool, SessionError> {
        if self.wallet.identity().is_none() {
            return Err(self.fail(SessionError::NotConnected));
        }
        match self.view.is_whitelisted(account).await {
            Ok(listed) => {
                let verdict = if listed { "is" } else { "is not" };
                self.set_status(format!("{} {verdict} whitelisted", account.short()));
                Ok(listed)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Surface a failure detected outside the coordinator, such as malformed
    /// user input, through the usual status path.
    pub fn report(&mut self, err: SessionError) -> SessionError {
        self.fail(err)
    }

    async fn refresh_now(&mut self) -> Result<(), SessionError> {
        let Some(identity) = self.wallet.identity().cloned() else {
            return Err(self.fail(SessionError::NotConnected));
        };
        match self.view.refresh(&identity).await {
            Ok(snapshot) => {
                self.accept_snapshot(snapshot);
                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    fn accept_snapshot(&mut self, snapshot: ContractSnapshot) {
        if let Some(previous) = &self.snapshot
            && snapshot.total_minted() < previous.total_minted()
        {
            warn!(
                previous = previous.total_minted(),
                current = snapshot.total_minted(),
                "minted counter went backwards"
            );
        }
        self.snapshot = Some(Arc::new(snapshot));
        self.last_error = None;
        self.publish();
    }

    /// Forget everything tied to the previous identity or chain.
    fn reset_session(&mut self) {
        self.epoch += 1;
        self.snapshot = None;
        self.in_flight.clear();
        self.last_error = None;
    }

    fn fail(&mut self, err: SessionError) -> SessionError {
        warn!(error = %err, "session operation failed");
        self.status = err.to_string();
        self.last_error = Some(err.clone());
        self.publish();
        err
    }

    fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
        self.publish();
    }

    fn update(&self) -> SessionUpdate {
        SessionUpdate {
            state: self.state(),
            role: self.role(),
            identity: self.wallet.identity().cloned(),
            snapshot: self.snapshot.clone(),
            pending: self.pending(),
            busy: self.in_flight.keys().copied().collect(),
            status: self.status.clone(),
            last_error: self.last_error.clone(),
        }
    }

    fn publish(&mut self) {
        let update = self.update();
        self.subscribers.retain(|tx| tx.send(update.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use crate::test_helpers::{
        FakeWallet,
        TestContext,
    };

    #[tokio::test]
    async fn state__follows_connect_submit_settle() {
        // given
        let ctx = TestContext::new();
        ctx.contract.hold_confirmations(true);
        let mut coordinator = ctx.coordinator_for(ctx.owner());
        assert_eq!(coordinator.state(), SessionState::Disconnected);

        // when
        coordinator.connect().await.unwrap();
        let connected = coordinator.state();
        let in_flight = coordinator.submit(Action::TogglePublicMint).await.unwrap();
        let confirming = coordinator.state();
        let hash = in_flight.pending().hash.clone();
        ctx.contract.release(&hash);
        let settled = in_flight.confirm().await;
        coordinator.settle(settled).await.unwrap();

        // then
        assert_eq!(connected, SessionState::Connected);
        assert_eq!(confirming, SessionState::Confirming);
        assert_eq!(coordinator.state(), SessionState::Connected);
        assert!(coordinator.pending().is_empty());
        assert!(!coordinator.is_busy(ActionKind::TogglePublicMint));
    }

    #[tokio::test]
    async fn submit__marks_control_busy_until_settled() {
        // given
        let ctx = TestContext::new();
        ctx.contract.hold_confirmations(true);
        let mut coordinator = ctx.coordinator_for(ctx.owner());
        coordinator.connect().await.unwrap();

        // when
        let in_flight = coordinator.submit(Action::ToggleWhitelistMint).await.unwrap();

        // then
        assert!(coordinator.is_busy(ActionKind::ToggleWhitelistMint));
        assert!(!coordinator.is_busy(ActionKind::TogglePublicMint));
        assert_eq!(coordinator.pending(), vec![in_flight.pending().clone()]);
    }

    #[tokio::test]
    async fn submit__failure_returns_to_connected_with_snapshot_kept() {
        // given
        let ctx = TestContext::new();
        let mut coordinator = ctx.coordinator_for(ctx.owner());
        coordinator.connect().await.unwrap();
        let before = coordinator.snapshot();
        ctx.contract.reject_signatures(true);

        // when
        let result = coordinator.submit(Action::TogglePublicMint).await;

        // then
        assert!(matches!(result, Err(SessionError::UserRejected)));
        assert_eq!(coordinator.state(), SessionState::Connected);
        assert_eq!(coordinator.snapshot(), before);
        assert_eq!(coordinator.last_error(), Some(&SessionError::UserRejected));
        assert!(!coordinator.is_busy(ActionKind::TogglePublicMint));
    }

    #[tokio::test]
    async fn connect__failure_sets_status_and_last_error() {
        // given
        let ctx = TestContext::new();
        let mut coordinator = SessionCoordinator::new(FakeWallet::not_installed(), ctx.contract);

        // when
        let result = coordinator.connect().await;

        // then
        assert_eq!(result, Err(SessionError::NoProvider));
        assert_eq!(coordinator.state(), SessionState::Disconnected);
        assert_eq!(coordinator.role(), Role::None);
        assert_eq!(coordinator.status(), SessionError::NoProvider.to_string());
    }

    #[tokio::test]
    async fn connect__declined_reconnect_drops_previous_identity() {
        // given
        let ctx = TestContext::new();
        ctx.contract.update_state(|s| s.public_mint_open = true);
        let mut coordinator = ctx.coordinator_for(ctx.owner());
        coordinator.connect().await.unwrap();
        ctx.wallet.set_approve(false);

        // when
        let result = coordinator.connect().await;
        let mint = coordinator.submit(Action::Mint { amount: 1 }).await;

        // then
        assert_eq!(result, Err(SessionError::UserRejected));
        assert_eq!(coordinator.state(), SessionState::Disconnected);
        assert_eq!(coordinator.role(), Role::None);
        assert!(coordinator.identity().is_none());
        assert!(coordinator.snapshot().is_none());
        assert!(matches!(mint, Err(SessionError::NotConnected)));
        assert!(ctx.contract.submitted_calls().is_empty());
    }

    #[tokio::test]
    async fn settle__refresh_failure_keeps_previous_snapshot() {
        // given
        let ctx = TestContext::new();
        let mut coordinator = ctx.coordinator_for(ctx.owner());
        coordinator.connect().await.unwrap();
        let before = coordinator.snapshot();
        let in_flight = coordinator.submit(Action::TogglePublicMint).await.unwrap();
        let settled = in_flight.confirm().await;
        ctx.contract.fail_query("owner");

        // when
        let result = coordinator.settle(settled).await;

        // then
        assert!(matches!(result, Err(SessionError::RefreshFailed(_))));
        assert_eq!(coordinator.snapshot(), before);
        assert!(!coordinator.is_busy(ActionKind::TogglePublicMint));
        assert_eq!(coordinator.state(), SessionState::Connected);
        assert!(
            coordinator
                .last_error()
                .is_some_and(SessionError::is_observability_failure)
        );
        assert!(ctx.contract.state().public_mint_open);
    }

    #[tokio::test]
    async fn subscribe__sends_current_state_immediately() {
        // given
        let ctx = TestContext::new();
        let mut coordinator = ctx.coordinator_for(ctx.alice());

        // when
        let mut updates = coordinator.subscribe();

        // then
        let first = updates.try_recv().unwrap();
        assert_eq!(first.state, SessionState::Disconnected);
        assert_eq!(first.role, Role::None);
        assert!(first.snapshot.is_none());
    }

    #[tokio::test]
    async fn publish__drops_closed_subscribers() {
        // given
        let ctx = TestContext::new();
        let mut coordinator = ctx.coordinator_for(ctx.alice());
        let kept = coordinator.subscribe();
        let dropped = coordinator.subscribe();
        drop(dropped);

        // when
        coordinator.disconnect();

        // then
        assert_eq!(coordinator.subscribers.len(), 1);
        drop(kept);
    }

    #[tokio::test]
    async fn report__surfaces_local_input_errors() {
        // given
        let ctx = TestContext::new();
        let mut coordinator = ctx.coordinator_for(ctx.alice());
        let err = SessionError::InvalidAddress(String::from("0x12"));

        // when
        coordinator.report(err.clone());

        // then
        assert_eq!(coordinator.last_error(), Some(&err));
        assert_eq!(coordinator.status(), err.to_string());
    }

    #[tokio::test]
    async fn check_whitelist__requires_connection() {
        // given
        let ctx = TestContext::new();
        let mut coordinator = ctx.coordinator_for(ctx.alice());

        // when
        let result = coordinator.check_whitelist(&ctx.alice()).await;

        // then
        assert_eq!(result, Err(SessionError::NotConnected));
    }
}
