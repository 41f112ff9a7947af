use crate::types::ActionKind;
use thiserror::Error;

/// Every failure the session layer reports to its caller.
///
/// The first block mirrors the failure modes of the wallet and the remote
/// contract; the second block holds guards evaluated locally before anything
/// leaves the process.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("No compatible wallet found")]
    NoProvider,

    #[error("Request rejected in wallet")]
    UserRejected,

    #[error("Only the contract owner can {0}")]
    Unauthorized(ActionKind),

    #[error("Insufficient funds to pay for the transaction")]
    InsufficientFunds,

    #[error("Contract rejected the call: {0}")]
    RemoteRevert(String),

    #[error("Could not read contract state: {0}")]
    RefreshFailed(String),

    #[error("Confirmation could not be observed: {0}")]
    Timeout(String),

    #[error("Wallet is not connected")]
    NotConnected,

    #[error("Mint amount must be at least 1 (got {0})")]
    InvalidAmount(u64),

    #[error("Payment for {amount} token(s) at {unit_price} overflows")]
    PaymentOverflow { unit_price: u64, amount: u64 },

    #[error("Already waiting on a '{0}' transaction")]
    ActionInFlight(ActionKind),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Inconsistent supply counters: minted {total_minted} of {max_supply}")]
    InvalidSnapshot { total_minted: u64, max_supply: u64 },

    #[error("Session changed before the transaction settled")]
    StaleSession,
}

impl SessionError {
    /// True when the true chain state is unknown and a manual refresh may
    /// reveal the outcome.
    pub fn is_observability_failure(&self) -> bool {
        matches!(self, Self::RefreshFailed(_) | Self::Timeout(_))
    }
}
