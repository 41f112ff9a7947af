pub mod config;
pub mod contract_actions;
pub mod contract_view;
pub mod coordinator;
pub mod deployment;
pub mod error;
pub mod fuel_backend;
pub mod remote;
pub mod test_helpers;
pub mod types;
pub mod wallet_session;
pub mod wallets;

pub mod nft_mint_types {
    use fuels::macros::abigen;

    abigen!(Contract(name = "NftMint", abi = "abi/nft-mint-abi.json"));
}

/// ABI the client was generated against; its digest is checked against the
/// deployment record before any call is made.
pub const NFT_MINT_ABI: &str = include_str!("../abi/nft-mint-abi.json");

pub use coordinator::{
    SessionCoordinator,
    SessionState,
    SessionUpdate,
};
pub use error::SessionError;
pub use types::{
    Action,
    ActionKind,
    Address,
    ChainId,
    ContractSnapshot,
    Identity,
    PendingTransaction,
    Role,
    TxStatus,
};
