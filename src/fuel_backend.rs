//! `ContractReader`/`ContractWriter` over the deployed NFT contract on a Fuel
//! node, plus the mapping from SDK errors to `SessionError`.

use crate::{
    error::SessionError,
    nft_mint_types::NftMint,
    remote::{
        ContractCall,
        ContractReader,
        ContractWriter,
        Submission,
    },
    types::{
        Address,
        Identity,
    },
    wallets::KeystoreAgent,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use fuels::{
    prelude::{
        AssetId,
        CallParameters,
        ContractId,
        Execution,
        Provider,
        TxPolicies,
        Wallet,
    },
    types::{
        Bits256,
        errors::{
            Error as FuelError,
            transaction::Reason,
        },
    },
};
use futures::FutureExt;
use std::str::FromStr;
use tracing::info;

const DEFAULT_SAFE_SCRIPT_GAS_LIMIT: u64 = 29_000_000;

pub fn parse_contract_id(raw: &str) -> Result<ContractId> {
    let trimmed = raw.trim().trim_start_matches("fuel");
    ContractId::from_str(trimmed)
        .map_err(|e| eyre!("Invalid contract id {trimmed:?}: {e:?}"))
}

pub struct FuelContract {
    agent: KeystoreAgent,
    contract_id: ContractId,
    base_asset_id: AssetId,
    safe_script_gas_limit: u64,
}

impl FuelContract {
    pub async fn new(
        agent: KeystoreAgent,
        provider: &Provider,
        contract_id: ContractId,
    ) -> Result<Self> {
        let consensus_parameters = provider
            .consensus_parameters()
            .await
            .wrap_err("Failed to read consensus parameters")?;
        let base_asset_id = *consensus_parameters.base_asset_id();
        let max_gas_per_tx = consensus_parameters.tx_params().max_gas_per_tx();
        let safe_script_gas_limit = max_gas_per_tx
            .saturating_sub(1)
            .clamp(1, DEFAULT_SAFE_SCRIPT_GAS_LIMIT);
        info!(
            %contract_id,
            safe_script_gas_limit, max_gas_per_tx, "bound nft contract"
        );
        Ok(Self {
            agent,
            contract_id,
            base_asset_id,
            safe_script_gas_limit,
        })
    }

    fn instance(&self, wallet: Wallet) -> NftMint<Wallet> {
        NftMint::new(self.contract_id, wallet)
    }

    fn reader(&self) -> Result<NftMint<Wallet>> {
        let wallet = self
            .agent
            .any_wallet()
            .ok_or_else(|| eyre!("No unlocked wallet available for queries"))?;
        Ok(self.instance(wallet))
    }

    fn script_policies(&self) -> TxPolicies {
        TxPolicies::default().with_script_gas_limit(self.safe_script_gas_limit)
    }
}

macro_rules! simulate {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        $self
            .reader()?
            .methods()
            .$method($($arg),*)
            .with_tx_policies($self.script_policies())
            .simulate(Execution::realistic())
            .await
            .wrap_err(concat!(stringify!($method), " query failed"))?
            .value
    };
}

impl ContractReader for FuelContract {
    async fn owner(&self) -> Result<Address> {
        let owner = simulate!(self, owner);
        Ok(Address::from_bytes(owner.0))
    }

    async fn total_supply(&self) -> Result<u64> {
        Ok(simulate!(self, total_supply))
    }

    async fn max_supply(&self) -> Result<u64> {
        Ok(simulate!(self, max_supply))
    }

    async fn mint_price(&self) -> Result<u64> {
        Ok(simulate!(self, mint_price))
    }

    async fn public_mint_open(&self) -> Result<bool> {
        Ok(simulate!(self, public_mint_open))
    }

    async fn whitelist_mint_open(&self) -> Result<bool> {
        Ok(simulate!(self, whitelist_mint_open))
    }

    async fn is_whitelisted(&self, account: &Address) -> Result<bool> {
        Ok(simulate!(self, is_whitelisted, Bits256(account.to_bytes())))
    }
}

/// Send the call and hand back its hash together with a future that waits
/// for the node to finalize it.
macro_rules! dispatch {
    ($handler:expr) => {{
        let response = $handler.submit().await.map_err(classify_submit_error)?;
        let hash = format!("0x{}", hex::encode(*response.tx_id()));
        let confirmation = async move {
            response
                .response()
                .await
                .map(|_| ())
                .map_err(classify_confirm_error)
        }
        .boxed_local();
        Submission { hash, confirmation }
    }};
}

impl ContractWriter for FuelContract {
    async fn submit(
        &self,
        signer: &Identity,
        call: ContractCall,
    ) -> Result<Submission, SessionError> {
        let wallet = self
            .agent
            .wallet_for(&signer.address)
            .ok_or(SessionError::NotConnected)?;
        let methods = self.instance(wallet).methods();
        let policies = self.script_policies();
        let submission = match call {
            ContractCall::Mint { amount, payment } => {
                let params = CallParameters::new(
                    payment,
                    self.base_asset_id,
                    self.safe_script_gas_limit,
                );
                let handler = methods
                    .mint(amount)
                    .call_params(params)
                    .map_err(classify_submit_error)?
                    .with_tx_policies(policies);
                dispatch!(handler)
            }
            ContractCall::TogglePublicMint => {
                dispatch!(methods.toggle_public_mint().with_tx_policies(policies))
            }
            ContractCall::ToggleWhitelistMint => {
                dispatch!(methods.toggle_whitelist_mint().with_tx_policies(policies))
            }
            ContractCall::AddToWhitelist(account) => dispatch!(
                methods
                    .add_to_whitelist(Bits256(account.to_bytes()))
                    .with_tx_policies(policies)
            ),
            ContractCall::RemoveFromWhitelist(account) => dispatch!(
                methods
                    .remove_from_whitelist(Bits256(account.to_bytes()))
                    .with_tx_policies(policies)
            ),
        };
        Ok(submission)
    }
}

fn is_insufficient_funds(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("not enough coins")
        || lower.contains("not enough resources")
        || lower.contains("insufficient")
}

/// A failure before the node accepted the call.
///
/// Local build or validation errors mean nothing was sent and are reported
/// verbatim. Node RPC failures surface as `Provider`/`IO` errors, which do
/// not tell a dropped request from a lost reply, so the outcome is unknown.
pub fn classify_submit_error(err: FuelError) -> SessionError {
    let message = err.to_string();
    if is_insufficient_funds(&message) {
        return SessionError::InsufficientFunds;
    }
    match err {
        FuelError::Transaction(Reason::Failure { reason, .. }) => {
            SessionError::RemoteRevert(reason)
        }
        FuelError::IO(_)
        | FuelError::Provider(_)
        | FuelError::Transaction(Reason::SqueezedOut(_)) => SessionError::Timeout(message),
        FuelError::Transaction(_) | FuelError::Codec(_) | FuelError::Other(_) => {
            SessionError::RemoteRevert(message)
        }
    }
}

/// A failure while waiting for finalization. Only an executed-and-reverted
/// transaction is a definite outcome.
pub fn classify_confirm_error(err: FuelError) -> SessionError {
    let message = err.to_string();
    if is_insufficient_funds(&message) {
        return SessionError::InsufficientFunds;
    }
    match err {
        FuelError::Transaction(Reason::Failure { reason, .. }) => {
            SessionError::RemoteRevert(reason)
        }
        _ => SessionError::Timeout(message),
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;

    fn reverted(reason: &str) -> FuelError {
        FuelError::Transaction(Reason::Failure {
            reason: reason.to_string(),
            revert_id: None,
            receipts: Vec::new(),
        })
    }

    #[test]
    fn classify_submit_error__not_enough_coins_is_insufficient_funds() {
        // given
        let err = FuelError::Provider(String::from(
            "io error: Response errors; not enough coins to fit the target: 5000000000000000",
        ));

        // when
        let classified = classify_submit_error(err);

        // then
        assert_eq!(classified, SessionError::InsufficientFunds);
    }

    #[test]
    fn classify_submit_error__passes_revert_reason_through_verbatim() {
        // when
        let classified = classify_submit_error(reverted("Mint is closed"));

        // then
        assert_eq!(
            classified,
            SessionError::RemoteRevert(String::from("Mint is closed"))
        );
    }

    #[test]
    fn classify_submit_error__lost_connection_is_unknown_outcome() {
        // given
        let err = FuelError::Provider(String::from("io error: failed to connect to node"));

        // when
        let classified = classify_submit_error(err);

        // then
        assert!(matches!(classified, SessionError::Timeout(_)));
    }

    #[test]
    fn classify_confirm_error__revert_is_remote_revert() {
        // when
        let classified = classify_confirm_error(reverted("Max supply reached"));

        // then
        assert_eq!(
            classified,
            SessionError::RemoteRevert(String::from("Max supply reached"))
        );
    }

    #[test]
    fn classify_confirm_error__transport_failure_is_timeout() {
        // given
        let provider = FuelError::Provider(String::from(
            "io error: failed to connect to node",
        ));
        let io = FuelError::IO(String::from("connection closed before message completed"));

        // when
        let from_provider = classify_confirm_error(provider);
        let from_io = classify_confirm_error(io);

        // then
        assert!(matches!(from_provider, SessionError::Timeout(_)));
        assert!(matches!(from_io, SessionError::Timeout(_)));
    }

    #[test]
    fn parse_contract_id__accepts_prefixed_and_bare_hex() {
        // given
        let hex = format!("0x{}", "ab".repeat(32));

        // when
        let prefixed = parse_contract_id(&hex).unwrap();
        let bare = parse_contract_id(&"ab".repeat(32)).unwrap();

        // then
        assert_eq!(prefixed, bare);
    }

    #[test]
    fn parse_contract_id__rejects_garbage() {
        assert!(parse_contract_id("0x1234").is_err());
    }
}
