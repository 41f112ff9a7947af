use crate::{
    error::SessionError,
    remote::ContractReader,
    types::{
        Address,
        ContractSnapshot,
        Identity,
    },
};
use std::sync::Arc;
use tracing::{
    debug,
    warn,
};

/// Read-only window onto the contract.
pub struct ContractView<C> {
    contract: Arc<C>,
}

impl<C: ContractReader> ContractView<C> {
    pub fn new(contract: Arc<C>) -> Self {
        Self { contract }
    }

    /// Read every field of the snapshot. Any single failed read fails the
    /// whole refresh; no partially populated snapshot is ever produced.
    pub async fn refresh(
        &self,
        identity: &Identity,
    ) -> Result<ContractSnapshot, SessionError> {
        let c = &self.contract;
        let reads = futures::try_join!(
            c.owner(),
            c.total_supply(),
            c.max_supply(),
            c.public_mint_open(),
            c.whitelist_mint_open(),
        );
        let (owner, total_minted, max_supply, public_mint_open, whitelist_mint_open) =
            reads.map_err(|err| {
                warn!(address = %identity.address, error = %err, "contract refresh failed");
                SessionError::RefreshFailed(err.to_string())
            })?;
        let snapshot = ContractSnapshot::new(
            owner,
            total_minted,
            max_supply,
            public_mint_open,
            whitelist_mint_open,
        )
        .map_err(|err| SessionError::RefreshFailed(err.to_string()))?;
        debug!(
            total_minted,
            max_supply, public_mint_open, whitelist_mint_open, "contract snapshot refreshed"
        );
        Ok(snapshot)
    }

    pub async fn mint_price(&self) -> Result<u64, SessionError> {
        self.contract
            .mint_price()
            .await
            .map_err(|err| SessionError::RefreshFailed(err.to_string()))
    }

    pub async fn is_whitelisted(&self, account: &Address) -> Result<bool, SessionError> {
        self.contract
            .is_whitelisted(account)
            .await
            .map_err(|err| SessionError::RefreshFailed(err.to_string()))
    }
}
