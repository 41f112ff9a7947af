use crate::ui::{
    self,
    Header,
    UserEvent,
    WhitelistOp,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use fuels::prelude::Provider;
use futures::{
    FutureExt,
    StreamExt,
    future::LocalBoxFuture,
    stream::FuturesUnordered,
};
use nft_mint_session::{
    Action,
    Address,
    NFT_MINT_ABI,
    SessionCoordinator,
    SessionError,
    config::AppConfig,
    coordinator::Settled,
    deployment::{
        self,
        DeploymentStore,
    },
    fuel_backend::{
        self,
        FuelContract,
    },
    remote::SigningAgent,
    wallets::KeystoreAgent,
};
use std::sync::Arc;
use tokio::time;
use tracing::{
    debug,
    info,
    warn,
};

type Coordinator = SessionCoordinator<KeystoreAgent, FuelContract>;

/// Resolve the contract, unlock wallets and run the terminal UI until quit.
pub async fn run_app(config: AppConfig) -> Result<()> {
    let url = config.network.url().to_string();
    let provider = Provider::connect(&url)
        .await
        .wrap_err_with(|| format!("Failed to connect to provider at {url}"))?;

    let raw_contract_id = match &config.contract_id {
        Some(id) => id.clone(),
        None => {
            let abi_hash = deployment::compute_abi_hash(NFT_MINT_ABI);
            let store = DeploymentStore::new(config.network.deployment_env());
            match store.latest_compatible(&abi_hash)? {
                Some(record) => {
                    info!(
                        contract_id = %record.contract_id,
                        deployed_at = %record.deployed_at,
                        "using recorded deployment"
                    );
                    record.contract_id
                }
                None => return Err(eyre!(store.summary(&abi_hash)?)),
            }
        }
    };
    let contract_id = fuel_backend::parse_contract_id(&raw_contract_id)?;

    let agent = KeystoreAgent::unlock(&provider, &config.wallet_dir, &config.wallets)?;
    let contract = FuelContract::new(agent.clone(), &provider, contract_id).await?;
    let coordinator = SessionCoordinator::new(agent, Arc::new(contract));

    let mut ui_state = ui::UiState::default();
    let mut input_events = ui::input_event_stream();
    ui::terminal_enter(&mut ui_state)?;
    info!("UI ready");
    let res = run_loop(
        coordinator,
        &config,
        &raw_contract_id,
        &mut ui_state,
        &mut input_events,
    )
    .await;
    ui::terminal_exit()?;
    res
}

async fn run_loop(
    mut coordinator: Coordinator,
    config: &AppConfig,
    contract_id: &str,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventReceiver,
) -> Result<()> {
    let header = Header {
        network: config.network.url(),
        contract_id,
        accounts: coordinator.agent().account_count(),
    };
    let mut wallet_events = coordinator.agent().subscribe();
    let mut updates = coordinator.subscribe();
    let mut confirmations: FuturesUnordered<LocalBoxFuture<'static, Settled>> =
        FuturesUnordered::new();
    let mut chain_ticker = time::interval(config.chain_poll_interval);

    let mut latest = updates
        .recv()
        .await
        .ok_or_else(|| eyre!("session update channel closed"))?;
    latest.status = String::from("Press c to connect your wallet");
    ui::draw(ui_state, &header, &latest)?;

    loop {
        tokio::select! {
            Some(update) = updates.recv() => {
                latest = update;
                ui::draw(ui_state, &header, &latest)
                    .wrap_err("draw after session update failed")?;
            }
            Some(settled) = confirmations.next(), if !confirmations.is_empty() => {
                if let Err(err) = coordinator.settle(settled).await {
                    debug!(error = %err, "settle finished with error");
                }
            }
            Some(event) = wallet_events.recv() => {
                info!(?event, "wallet event");
                if let Err(err) = coordinator.handle_wallet_event(event).await {
                    debug!(error = %err, "wallet event handling finished with error");
                }
            }
            _ = chain_ticker.tick() => {
                if let Err(err) = coordinator.agent().poll_chain().await {
                    warn!(?err, "chain id poll failed");
                }
            }
            raw_ev = ui::next_raw_event(input_events) => {
                let Some(ev) = ui::interpret_event(ui_state, raw_ev?) else {
                    continue;
                };
                match ev {
                    UserEvent::Quit => break,
                    UserEvent::Redraw => {
                        ui::draw(ui_state, &header, &latest).wrap_err("redraw failed")?;
                    }
                    other => {
                        if let Some(in_flight) = handle_user_event(&mut coordinator, other).await {
                            confirmations.push(in_flight);
                        }
                    }
                }
            }
        }
    }
    if !confirmations.is_empty() {
        warn!(
            in_flight = confirmations.len(),
            "quitting with unconfirmed transactions"
        );
    }
    Ok(())
}

/// Apply one user command. Failures are already reflected in the session's
/// status, so they are only logged here.
async fn handle_user_event(
    coordinator: &mut Coordinator,
    event: UserEvent,
) -> Option<LocalBoxFuture<'static, Settled>> {
    let action = match event {
        UserEvent::Connect => {
            if let Err(err) = coordinator.connect().await {
                debug!(error = %err, "connect failed");
            }
            return None;
        }
        UserEvent::Disconnect => {
            coordinator.disconnect();
            return None;
        }
        UserEvent::SwitchAccount => {
            if coordinator.agent().cycle_account().is_none() {
                coordinator.report(SessionError::UserRejected);
            }
            return None;
        }
        UserEvent::LockWallet => {
            coordinator.agent().lock_session();
            return None;
        }
        UserEvent::Refresh => {
            if let Err(err) = coordinator.retry_refresh().await {
                debug!(error = %err, "refresh failed");
            }
            return None;
        }
        UserEvent::Mint(amount) => Action::Mint { amount },
        UserEvent::TogglePublicMint => Action::TogglePublicMint,
        UserEvent::ToggleWhitelistMint => Action::ToggleWhitelistMint,
        UserEvent::Whitelist(op, raw) => {
            let account = match Address::parse(&raw) {
                Ok(account) => account,
                Err(err) => {
                    coordinator.report(err);
                    return None;
                }
            };
            match op {
                WhitelistOp::Add => Action::AddToWhitelist(account),
                WhitelistOp::Remove => Action::RemoveFromWhitelist(account),
                WhitelistOp::Check => {
                    if let Err(err) = coordinator.check_whitelist(&account).await {
                        debug!(error = %err, "whitelist check failed");
                    }
                    return None;
                }
            }
        }
        UserEvent::Quit | UserEvent::Redraw => return None,
    };
    match coordinator.submit(action).await {
        Ok(in_flight) => Some(in_flight.confirm().boxed_local()),
        Err(err) => {
            debug!(error = %err, "submit rejected");
            None
        }
    }
}

