//! forc-wallet keystore discovery and the signing agent built on it.
//!
//! Keystores are unlocked with a password prompt before the terminal UI takes
//! over stdout. Each unlocked profile becomes an account the user can switch
//! to; the first one is active.

use crate::{
    error::SessionError,
    remote::{
        SigningAgent,
        WalletEvent,
    },
    types::{
        Address,
        ChainId,
    },
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use eth_keystore::decrypt_key;
use fuels::{
    accounts::ViewOnlyAccount,
    crypto::SecretKey,
    prelude::{
        Provider,
        Wallet,
        derivation::DEFAULT_DERIVATION_PATH,
        private_key::PrivateKeySigner,
    },
};
use rpassword::prompt_password;
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
    sync::{
        Arc,
        Mutex,
        MutexGuard,
    },
};
use tokio::sync::mpsc;
use tracing::{
    info,
    warn,
};

#[derive(Clone, Debug)]
pub struct WalletDescriptor {
    pub name: String,
    pub path: PathBuf,
}

impl WalletDescriptor {
    pub fn new(name: impl Into<String>, path: PathBuf) -> Self {
        Self {
            name: name.into(),
            path,
        }
    }
}

pub fn default_wallet_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").wrap_err("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".fuel").join("wallets"))
}

pub fn resolve_wallet_dir(dir: Option<&str>) -> Result<PathBuf> {
    match dir {
        Some(raw) => {
            let expanded = shellexpand::tilde(raw);
            Ok(PathBuf::from(expanded.into_owned()))
        }
        None => default_wallet_dir(),
    }
}

/// All `*.wallet` keystores in `dir`, sorted by profile name.
pub fn list_wallets(dir: &Path) -> Result<Vec<WalletDescriptor>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut wallets = Vec::new();
    for entry in fs::read_dir(dir).wrap_err("Failed to read wallet directory")? {
        let path = entry.wrap_err("Failed to read wallet entry")?.path();
        if !path.is_file() || path.extension().and_then(|ext| ext.to_str()) != Some("wallet")
        {
            continue;
        }
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| eyre!("Invalid wallet filename {:?}", path))?
            .to_owned();
        wallets.push(WalletDescriptor::new(name, path));
    }
    wallets.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(wallets)
}

/// Pick the requested profiles, or every profile when none were named.
/// Unknown names are skipped with a warning.
pub fn select_wallets(dir: &Path, names: &[String]) -> Result<Vec<WalletDescriptor>> {
    let available = list_wallets(dir)?;
    if names.is_empty() {
        return Ok(available);
    }
    let mut selected = Vec::new();
    for name in names {
        match available.iter().find(|w| &w.name == name) {
            Some(found) => selected.push(found.clone()),
            None => warn!(wallet = %name, dir = %dir.display(), "wallet profile not found"),
        }
    }
    Ok(selected)
}

/// Prompt for the keystore password and build a wallet from it. An empty
/// password declines the profile and yields `None`.
pub fn unlock_wallet(
    descriptor: &WalletDescriptor,
    provider: &Provider,
) -> Result<Option<Wallet>> {
    let prompt = format!(
        "Password for wallet '{}' (empty to skip): ",
        descriptor.name
    );
    let password = prompt_password(prompt).wrap_err("Failed to read wallet password")?;
    if password.is_empty() {
        return Ok(None);
    }

    let secret = decrypt_key(&descriptor.path, password.as_bytes())
        .map_err(|_| eyre!("Invalid password for wallet '{}'", descriptor.name))?;

    if let Ok(secret_key) = SecretKey::try_from(secret.as_slice()) {
        let signer = PrivateKeySigner::new(secret_key);
        return Ok(Some(Wallet::new(signer, provider.clone())));
    }

    if let Ok(mnemonic) = std::str::from_utf8(&secret)
        && mnemonic.split_whitespace().count() >= 12
    {
        let private_key =
            SecretKey::new_from_mnemonic_phrase_with_path(mnemonic, DEFAULT_DERIVATION_PATH)?;
        return Ok(Some(Wallet::new(
            PrivateKeySigner::new(private_key),
            provider.clone(),
        )));
    }

    Err(eyre!(
        "Wallet '{}' contained unsupported key material",
        descriptor.name
    ))
}

pub struct UnlockedAccount {
    pub name: String,
    pub address: Address,
    pub wallet: Wallet,
}

impl UnlockedAccount {
    pub fn new(name: impl Into<String>, wallet: Wallet) -> Self {
        let raw: fuels::types::Address = (*wallet.address()).into();
        Self {
            name: name.into(),
            address: Address::from_bytes(*raw),
            wallet,
        }
    }
}

/// Account rotation state. `active` indexes into `accounts`.
#[derive(Debug, Default)]
struct AccountRing {
    active: usize,
    locked: bool,
    known_chain: Option<ChainId>,
    subscribers: Vec<mpsc::UnboundedSender<WalletEvent>>,
}

impl AccountRing {
    /// Active account first, the rest in profile order.
    fn ordered(&self, len: usize) -> Vec<usize> {
        if self.locked || len == 0 {
            return Vec::new();
        }
        (0..len).map(|i| (self.active + i) % len).collect()
    }

    fn emit(&mut self, event: WalletEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// `SigningAgent` over unlocked forc-wallet keystores.
#[derive(Clone)]
pub struct KeystoreAgent {
    provider: Provider,
    profiles_found: usize,
    accounts: Arc<Vec<UnlockedAccount>>,
    ring: Arc<Mutex<AccountRing>>,
}

impl KeystoreAgent {
    pub fn new(provider: Provider, profiles_found: usize, accounts: Vec<UnlockedAccount>) -> Self {
        Self {
            provider,
            profiles_found,
            accounts: Arc::new(accounts),
            ring: Arc::new(Mutex::new(AccountRing::default())),
        }
    }

    /// Discover and unlock keystores interactively. Must run before the
    /// terminal enters raw mode.
    pub fn unlock(provider: &Provider, dir: &Path, names: &[String]) -> Result<Self> {
        let descriptors = select_wallets(dir, names)?;
        let mut accounts = Vec::new();
        for descriptor in &descriptors {
            match unlock_wallet(descriptor, provider)? {
                Some(wallet) => {
                    let account = UnlockedAccount::new(descriptor.name.clone(), wallet);
                    info!(wallet = %account.name, address = %account.address, "wallet unlocked");
                    accounts.push(account);
                }
                None => info!(wallet = %descriptor.name, "wallet skipped"),
            }
        }
        Ok(Self::new(provider.clone(), descriptors.len(), accounts))
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn active_account(&self) -> Option<&UnlockedAccount> {
        let ring = self.ring();
        let index = *ring.ordered(self.accounts.len()).first()?;
        self.accounts.get(index)
    }

    /// The wallet that signs for `address`, if it is unlocked.
    pub fn wallet_for(&self, address: &Address) -> Option<Wallet> {
        self.accounts
            .iter()
            .find(|account| &account.address == address)
            .map(|account| account.wallet.clone())
    }

    /// Any unlocked wallet, used for read-only simulation.
    pub fn any_wallet(&self) -> Option<Wallet> {
        self.active_account()
            .or_else(|| self.accounts.first())
            .map(|account| account.wallet.clone())
    }

    /// Make the next unlocked profile active and announce the new order.
    pub fn cycle_account(&self) -> Option<Address> {
        let len = self.accounts.len();
        let mut ring = self.ring();
        if len == 0 || ring.locked {
            return None;
        }
        ring.active = (ring.active + 1) % len;
        let ordered = self.addresses(&ring);
        ring.emit(WalletEvent::AccountsChanged(ordered.clone()));
        ordered.first().cloned()
    }

    /// Revoke access to every account until `unlock_session` is called.
    pub fn lock_session(&self) {
        let mut ring = self.ring();
        ring.locked = true;
        ring.emit(WalletEvent::AccountsChanged(Vec::new()));
    }

    pub fn unlock_session(&self) {
        self.ring().locked = false;
    }

    /// Re-read the chain id and announce a change. The first reading only
    /// records the baseline.
    pub async fn poll_chain(&self) -> Result<Option<ChainId>> {
        let current = self.fetch_chain_id().await?;
        let mut ring = self.ring();
        let previous = ring.known_chain.replace(current);
        match previous {
            Some(previous) if previous != current => {
                warn!(%previous, %current, "chain id changed");
                ring.emit(WalletEvent::ChainChanged(current));
                Ok(Some(current))
            }
            _ => Ok(None),
        }
    }

    async fn fetch_chain_id(&self) -> Result<ChainId> {
        let params = self
            .provider
            .consensus_parameters()
            .await
            .wrap_err("Failed to read consensus parameters")?;
        Ok(ChainId(u64::from(params.chain_id())))
    }

    fn addresses(&self, ring: &AccountRing) -> Vec<Address> {
        ring.ordered(self.accounts.len())
            .into_iter()
            .map(|i| self.accounts[i].address.clone())
            .collect()
    }

    fn ring(&self) -> MutexGuard<'_, AccountRing> {
        self.ring.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SigningAgent for KeystoreAgent {
    async fn request_accounts(&self) -> Result<Vec<Address>, SessionError> {
        if self.profiles_found == 0 {
            return Err(SessionError::NoProvider);
        }
        let mut ring = self.ring();
        ring.locked = false;
        let addresses = self.addresses(&ring);
        if addresses.is_empty() {
            return Err(SessionError::UserRejected);
        }
        Ok(addresses)
    }

    async fn chain_id(&self) -> Result<ChainId, SessionError> {
        let chain = self
            .fetch_chain_id()
            .await
            .map_err(|err| SessionError::RefreshFailed(format!("{err:#}")))?;
        self.ring().known_chain = Some(chain);
        Ok(chain)
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<WalletEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.ring().subscribers.push(tx);
        rx
    }
}
