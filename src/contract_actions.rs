use crate::{
    contract_view::ContractView,
    error::SessionError,
    remote::{
        ContractCall,
        ContractReader,
        ContractWriter,
    },
    types::{
        Action,
        Identity,
        PendingTransaction,
        TxStatus,
        total_payment,
    },
};
use futures::future::LocalBoxFuture;
use std::sync::Arc;
use tracing::{
    info,
    warn,
};

/// A write the remote service has accepted but not yet finalized.
pub struct Submitted {
    pub pending: PendingTransaction,
    pub confirmation: LocalBoxFuture<'static, Result<(), SessionError>>,
}

impl Submitted {
    /// Wait for finalization. The returned transaction is `Confirmed` or
    /// `Failed`; the error, if any, is handed back alongside it.
    pub async fn confirm(self) -> (PendingTransaction, Result<(), SessionError>) {
        let Submitted {
            mut pending,
            confirmation,
        } = self;
        let result = confirmation.await;
        pending.status = match &result {
            Ok(()) => TxStatus::Confirmed,
            Err(_) => TxStatus::Failed,
        };
        match &result {
            Ok(()) => info!(kind = %pending.kind, hash = %pending.hash, "transaction confirmed"),
            Err(err) => warn!(kind = %pending.kind, hash = %pending.hash, error = %err, "transaction failed"),
        }
        (pending, result)
    }
}

/// Write side of the contract: turns an `Action` into a signed call.
pub struct ContractActions<C> {
    contract: Arc<C>,
    view: ContractView<C>,
}

impl<C: ContractReader + ContractWriter> ContractActions<C> {
    pub fn new(contract: Arc<C>) -> Self {
        Self {
            view: ContractView::new(contract.clone()),
            contract,
        }
    }

    /// Check the parameters that can be checked without the network.
    pub fn validate(action: &Action) -> Result<(), SessionError> {
        match action {
            Action::Mint { amount } if *amount < 1 => {
                Err(SessionError::InvalidAmount(*amount))
            }
            _ => Ok(()),
        }
    }

    pub async fn submit(
        &self,
        signer: &Identity,
        action: &Action,
    ) -> Result<Submitted, SessionError> {
        Self::validate(action)?;
        let call = self.prepare(action).await?;
        let submission = self.contract.submit(signer, call).await?;
        let pending = PendingTransaction::new(action.kind(), submission.hash);
        info!(kind = %pending.kind, hash = %pending.hash, "transaction submitted");
        Ok(Submitted {
            pending,
            confirmation: submission.confirmation,
        })
    }

    async fn prepare(&self, action: &Action) -> Result<ContractCall, SessionError> {
        let call = match action {
            Action::Mint { amount } => {
                let unit_price = self.view.mint_price().await?;
                let payment = total_payment(unit_price, *amount)?;
                ContractCall::Mint {
                    amount: *amount,
                    payment,
                }
            }
            Action::TogglePublicMint => ContractCall::TogglePublicMint,
            Action::ToggleWhitelistMint => ContractCall::ToggleWhitelistMint,
            Action::AddToWhitelist(account) => ContractCall::AddToWhitelist(account.clone()),
            Action::RemoveFromWhitelist(account) => {
                ContractCall::RemoveFromWhitelist(account.clone())
            }
        };
        Ok(call)
    }
}
