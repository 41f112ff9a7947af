use crate::{
    error::SessionError,
    remote::{
        SigningAgent,
        WalletEvent,
    },
    types::{
        Address,
        Identity,
    },
};
use tracing::{
    debug,
    info,
};

/// What the coordinator must do in response to a wallet event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IdentityChange {
    /// Accounts were cleared; the session is logged out.
    Cleared,
    /// A different account is active on the same chain.
    Replaced(Identity),
    /// The network changed; everything cached is invalid.
    ChainInvalidated,
    /// Nothing observable changed.
    Unchanged,
}

/// Owns the user's identity. Nothing else writes it.
pub struct WalletSession<A> {
    agent: A,
    identity: Option<Identity>,
}

impl<A: SigningAgent> WalletSession<A> {
    pub fn new(agent: A) -> Self {
        Self {
            agent,
            identity: None,
        }
    }

    pub fn agent(&self) -> &A {
        &self.agent
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub async fn connect(&mut self) -> Result<Identity, SessionError> {
        let accounts = self.agent.request_accounts().await?;
        let address = accounts
            .into_iter()
            .next()
            .ok_or(SessionError::UserRejected)?;
        let chain_id = self.agent.chain_id().await?;
        let identity = Identity { address, chain_id };
        info!(address = %identity.address, chain_id = %identity.chain_id, "wallet connected");
        self.identity = Some(identity.clone());
        Ok(identity)
    }

    /// Local logout. The agent keeps whatever grant it gave us.
    pub fn disconnect(&mut self) {
        if let Some(identity) = self.identity.take() {
            info!(address = %identity.address, "wallet disconnected");
        }
    }

    pub fn apply_event(&mut self, event: WalletEvent) -> IdentityChange {
        match event {
            WalletEvent::ChainChanged(chain_id) => {
                if self.identity.take().is_none() {
                    debug!(%chain_id, "chain change ignored while disconnected");
                    return IdentityChange::Unchanged;
                }
                info!(%chain_id, "chain changed; invalidating session");
                IdentityChange::ChainInvalidated
            }
            WalletEvent::AccountsChanged(accounts) => {
                let Some(address) = accounts.into_iter().next() else {
                    self.disconnect();
                    return IdentityChange::Cleared;
                };
                self.replace_address(address)
            }
        }
    }

    fn replace_address(&mut self, address: Address) -> IdentityChange {
        let Some(current) = self.identity.as_ref() else {
            debug!(%address, "account change ignored while disconnected");
            return IdentityChange::Unchanged;
        };
        if current.address == address {
            return IdentityChange::Unchanged;
        }
        let identity = Identity {
            address,
            chain_id: current.chain_id,
        };
        info!(address = %identity.address, "active account changed");
        self.identity = Some(identity.clone());
        IdentityChange::Replaced(identity)
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use crate::{
        test_helpers::{
            FakeWallet,
            address,
        },
        types::ChainId,
    };

    async fn connected(accounts: Vec<Address>) -> WalletSession<FakeWallet> {
        let mut session = WalletSession::new(FakeWallet::new(accounts, ChainId(9)));
        session.connect().await.unwrap();
        session
    }

    #[tokio::test]
    async fn connect__uses_first_account_and_agent_chain() {
        // given
        let mut session =
            WalletSession::new(FakeWallet::new(vec![address(3), address(4)], ChainId(9)));

        // when
        let identity = session.connect().await.unwrap();

        // then
        assert_eq!(identity.address, address(3));
        assert_eq!(identity.chain_id, ChainId(9));
        assert_eq!(session.identity(), Some(&identity));
    }

    #[tokio::test]
    async fn connect__missing_agent_is_no_provider() {
        // given
        let mut session = WalletSession::new(FakeWallet::not_installed());

        // when
        let result = session.connect().await;

        // then
        assert_eq!(result, Err(SessionError::NoProvider));
        assert!(session.identity().is_none());
    }

    #[tokio::test]
    async fn connect__declined_request_is_user_rejected() {
        // given
        let wallet = FakeWallet::new(vec![address(3)], ChainId(9));
        wallet.set_approve(false);
        let mut session = WalletSession::new(wallet);

        // when
        let result = session.connect().await;

        // then
        assert_eq!(result, Err(SessionError::UserRejected));
    }

    #[tokio::test]
    async fn connect__empty_grant_is_user_rejected() {
        // given
        let mut session = WalletSession::new(FakeWallet::new(Vec::new(), ChainId(9)));

        // when
        let result = session.connect().await;

        // then
        assert_eq!(result, Err(SessionError::UserRejected));
    }

    #[tokio::test]
    async fn apply_event__new_account_replaces_identity_on_same_chain() {
        // given
        let mut session = connected(vec![address(3)]).await;

        // when
        let change = session.apply_event(WalletEvent::AccountsChanged(vec![address(4)]));

        // then
        let expected = Identity {
            address: address(4),
            chain_id: ChainId(9),
        };
        assert_eq!(change, IdentityChange::Replaced(expected.clone()));
        assert_eq!(session.identity(), Some(&expected));
    }

    #[tokio::test]
    async fn apply_event__same_account_is_unchanged() {
        // given
        let mut session = connected(vec![address(3)]).await;

        // when
        let change = session.apply_event(WalletEvent::AccountsChanged(vec![address(3)]));

        // then
        assert_eq!(change, IdentityChange::Unchanged);
    }

    #[tokio::test]
    async fn apply_event__empty_accounts_clears_identity() {
        // given
        let mut session = connected(vec![address(3)]).await;

        // when
        let change = session.apply_event(WalletEvent::AccountsChanged(Vec::new()));

        // then
        assert_eq!(change, IdentityChange::Cleared);
        assert!(session.identity().is_none());
    }

    #[tokio::test]
    async fn apply_event__chain_change_invalidates_identity() {
        // given
        let mut session = connected(vec![address(3)]).await;

        // when
        let change = session.apply_event(WalletEvent::ChainChanged(ChainId(10)));

        // then
        assert_eq!(change, IdentityChange::ChainInvalidated);
        assert!(session.identity().is_none());
    }

    #[test]
    fn apply_event__ignored_while_disconnected() {
        // given
        let mut session = WalletSession::new(FakeWallet::new(vec![address(3)], ChainId(9)));

        // when
        let accounts = session.apply_event(WalletEvent::AccountsChanged(vec![address(4)]));
        let chain = session.apply_event(WalletEvent::ChainChanged(ChainId(10)));

        // then
        assert_eq!(accounts, IdentityChange::Unchanged);
        assert_eq!(chain, IdentityChange::Unchanged);
        assert!(session.identity().is_none());
    }
}
