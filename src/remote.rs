//! The external collaborators the session layer talks to: the user's signing
//! agent and the deployed contract's fixed read/write interface.

use crate::{
    error::SessionError,
    types::{
        Address,
        ChainId,
        Identity,
    },
};
use color_eyre::eyre::Result;
use futures::future::LocalBoxFuture;
use tokio::sync::mpsc;

/// Pushed by the signing agent when the user changes accounts or networks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WalletEvent {
    AccountsChanged(Vec<Address>),
    ChainChanged(ChainId),
}

pub trait SigningAgent {
    /// Ask the agent for account access. Fails with `NoProvider` when no
    /// compatible wallet exists and `UserRejected` when access is declined.
    async fn request_accounts(&self) -> Result<Vec<Address>, SessionError>;

    async fn chain_id(&self) -> Result<ChainId, SessionError>;

    /// Register for account/chain events. Dropping the receiver unregisters.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<WalletEvent>;
}

pub trait ContractReader {
    async fn owner(&self) -> Result<Address>;
    async fn total_supply(&self) -> Result<u64>;
    async fn max_supply(&self) -> Result<u64>;
    async fn mint_price(&self) -> Result<u64>;
    async fn public_mint_open(&self) -> Result<bool>;
    async fn whitelist_mint_open(&self) -> Result<bool>;
    async fn is_whitelisted(&self, account: &Address) -> Result<bool>;
}

/// A fully parameterised write, ready to be signed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContractCall {
    Mint { amount: u64, payment: u64 },
    TogglePublicMint,
    ToggleWhitelistMint,
    AddToWhitelist(Address),
    RemoveFromWhitelist(Address),
}

/// A call the remote service has accepted into its pending pool.
pub struct Submission {
    pub hash: String,
    /// Resolves once the call is finalized, or with the reason it was not.
    pub confirmation: LocalBoxFuture<'static, Result<(), SessionError>>,
}

pub trait ContractWriter {
    async fn submit(
        &self,
        signer: &Identity,
        call: ContractCall,
    ) -> Result<Submission, SessionError>;
}
