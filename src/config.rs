use crate::{
    deployment::DeploymentEnv,
    wallets,
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use std::{
    path::PathBuf,
    time::Duration,
};

pub const DEFAULT_TESTNET_RPC_URL: &str = "https://testnet.fuel.network";
pub const DEFAULT_DEVNET_RPC_URL: &str = "https://devnet.fuel.network";
pub const DEFAULT_LOCAL_RPC_URL: &str = "http://localhost:4000/";
pub const DEFAULT_CHAIN_POLL_SECS: u64 = 5;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetworkTarget {
    Testnet { url: String },
    Devnet { url: String },
    LocalNode { url: String },
}

impl NetworkTarget {
    pub fn url(&self) -> &str {
        match self {
            NetworkTarget::Testnet { url }
            | NetworkTarget::Devnet { url }
            | NetworkTarget::LocalNode { url } => url,
        }
    }

    pub fn deployment_env(&self) -> DeploymentEnv {
        match self {
            NetworkTarget::Testnet { .. } => DeploymentEnv::Test,
            NetworkTarget::Devnet { .. } => DeploymentEnv::Dev,
            NetworkTarget::LocalNode { .. } => DeploymentEnv::Local,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub network: NetworkTarget,
    /// Overrides the deployment record when set.
    pub contract_id: Option<String>,
    /// forc-wallet profiles to unlock; empty means every profile in `wallet_dir`.
    pub wallets: Vec<String>,
    pub wallet_dir: PathBuf,
    pub chain_poll_interval: Duration,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Run(AppConfig),
    Help,
}

pub fn usage() -> String {
    format!(
        "Usage: nft-mint [--devnet | --testnet | --local] [--rpc-url <url>]\n\
         [--contract-id <id>] [--wallet <name>]... [--wallet-dir <path>]\n\
         [--chain-poll-secs <n>]\n\
         \n\
         Flags:\n\
           --devnet              Connect to Fuel devnet (default RPC {})\n\
           --testnet             Connect to Fuel testnet (default RPC {})\n\
           --local               Connect to a local Fuel node (default RPC {})\n\
           --rpc-url <url>       Override the RPC URL for the selected network\n\
           --contract-id <id>    Use this contract instead of the deployment record\n\
           --wallet <name>       forc-wallet profile to unlock (repeatable; default all)\n\
           --wallet-dir <path>   Override forc-wallet directory (defaults to ~/.fuel/wallets)\n\
           --chain-poll-secs <n> How often to check the node's chain id (default {})",
        DEFAULT_DEVNET_RPC_URL,
        DEFAULT_TESTNET_RPC_URL,
        DEFAULT_LOCAL_RPC_URL,
        DEFAULT_CHAIN_POLL_SECS,
    )
}

pub fn parse_cli_args(args: impl IntoIterator<Item = String>) -> Result<Command> {
    #[derive(Clone, Copy)]
    enum NetworkFlag {
        Devnet,
        Testnet,
        Local,
    }

    let mut args = args.into_iter();
    let mut network_flag: Option<NetworkFlag> = None;
    let mut custom_url: Option<String> = None;
    let mut contract_id: Option<String> = None;
    let mut wallet_dir: Option<String> = None;
    let mut wallet_names: Vec<String> = Vec::new();
    let mut chain_poll_secs: Option<u64> = None;

    let mut set_network = |flag: NetworkFlag| {
        if network_flag.is_some() {
            return Err(eyre!(
                "Multiple network flags provided; choose one of --devnet/--testnet/--local"
            ));
        }
        network_flag = Some(flag);
        Ok(())
    };

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--devnet" => set_network(NetworkFlag::Devnet)?,
            "--testnet" => set_network(NetworkFlag::Testnet)?,
            "--local" => set_network(NetworkFlag::Local)?,
            "--rpc-url" => {
                let url = args
                    .next()
                    .ok_or_else(|| eyre!("--rpc-url requires a URL argument"))?;
                if custom_url.is_some() {
                    return Err(eyre!("--rpc-url may only be specified once"));
                }
                custom_url = Some(url);
            }
            "--contract-id" => {
                let id = args
                    .next()
                    .ok_or_else(|| eyre!("--contract-id requires an id argument"))?;
                if contract_id.is_some() {
                    return Err(eyre!("--contract-id may only be specified once"));
                }
                contract_id = Some(id);
            }
            "--wallet-dir" => {
                let dir = args
                    .next()
                    .ok_or_else(|| eyre!("--wallet-dir requires a path argument"))?;
                if wallet_dir.is_some() {
                    return Err(eyre!("--wallet-dir may only be specified once"));
                }
                wallet_dir = Some(dir);
            }
            "--wallet" => {
                let name = args
                    .next()
                    .ok_or_else(|| eyre!("--wallet requires a wallet name"))?;
                if !wallet_names.contains(&name) {
                    wallet_names.push(name);
                }
            }
            "--chain-poll-secs" => {
                let raw = args
                    .next()
                    .ok_or_else(|| eyre!("--chain-poll-secs requires a number"))?;
                let secs = raw
                    .parse::<u64>()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .ok_or_else(|| eyre!("--chain-poll-secs must be a positive integer, got {raw:?}"))?;
                chain_poll_secs = Some(secs);
            }
            "--help" | "-h" => return Ok(Command::Help),
            other => return Err(eyre!("Unknown argument: {other}")),
        }
    }

    let network = match network_flag {
        None => {
            return Err(eyre!(
                "Select a network with --devnet, --testnet, or --local"
            ));
        }
        Some(NetworkFlag::Devnet) => NetworkTarget::Devnet {
            url: custom_url.unwrap_or_else(|| DEFAULT_DEVNET_RPC_URL.to_string()),
        },
        Some(NetworkFlag::Testnet) => NetworkTarget::Testnet {
            url: custom_url.unwrap_or_else(|| DEFAULT_TESTNET_RPC_URL.to_string()),
        },
        Some(NetworkFlag::Local) => NetworkTarget::LocalNode {
            url: custom_url.unwrap_or_else(|| DEFAULT_LOCAL_RPC_URL.to_string()),
        },
    };

    Ok(Command::Run(AppConfig {
        network,
        contract_id,
        wallets: wallet_names,
        wallet_dir: wallets::resolve_wallet_dir(wallet_dir.as_deref())?,
        chain_poll_interval: Duration::from_secs(
            chain_poll_secs.unwrap_or(DEFAULT_CHAIN_POLL_SECS),
        ),
    }))
}
