//! In-memory stand-ins for the wallet and the deployed contract, used by the
//! unit and integration tests to drive the session layer deterministically.

use crate::{
    coordinator::SessionCoordinator,
    error::SessionError,
    remote::{
        ContractCall,
        ContractReader,
        ContractWriter,
        SigningAgent,
        Submission,
        WalletEvent,
    },
    types::{
        Address,
        ChainId,
        Identity,
    },
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use futures::FutureExt;
use std::{
    collections::{
        HashMap,
        HashSet,
    },
    sync::{
        Arc,
        Mutex,
        atomic::{
            AtomicU64,
            Ordering,
        },
    },
};
use tokio::sync::{
    mpsc,
    oneshot,
};

pub const MINT_PRICE: u64 = 1_000_000_000_000_000;

pub fn address(n: u8) -> Address {
    Address::from_bytes([n; 32])
}

struct FakeWalletState {
    installed: bool,
    approve: bool,
    accounts: Vec<Address>,
    chain_id: ChainId,
    subscribers: Vec<mpsc::UnboundedSender<WalletEvent>>,
}

/// A wallet that grants or refuses access on command and lets tests push
/// account and chain changes.
#[derive(Clone)]
pub struct FakeWallet {
    inner: Arc<Mutex<FakeWalletState>>,
}

impl FakeWallet {
    pub fn new(accounts: Vec<Address>, chain_id: ChainId) -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeWalletState {
                installed: true,
                approve: true,
                accounts,
                chain_id,
                subscribers: Vec::new(),
            })),
        }
    }

    pub fn not_installed() -> Self {
        let wallet = Self::new(Vec::new(), ChainId(0));
        wallet.inner.lock().unwrap().installed = false;
        wallet
    }

    pub fn set_approve(&self, approve: bool) {
        self.inner.lock().unwrap().approve = approve;
    }

    pub fn switch_accounts(&self, accounts: Vec<Address>) {
        let mut state = self.inner.lock().unwrap();
        state.accounts = accounts.clone();
        Self::emit(&mut state, WalletEvent::AccountsChanged(accounts));
    }

    pub fn switch_chain(&self, chain_id: ChainId) {
        let mut state = self.inner.lock().unwrap();
        state.chain_id = chain_id;
        Self::emit(&mut state, WalletEvent::ChainChanged(chain_id));
    }

    fn emit(state: &mut FakeWalletState, event: WalletEvent) {
        state
            .subscribers
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl SigningAgent for FakeWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, SessionError> {
        let state = self.inner.lock().unwrap();
        if !state.installed {
            return Err(SessionError::NoProvider);
        }
        if !state.approve {
            return Err(SessionError::UserRejected);
        }
        Ok(state.accounts.clone())
    }

    async fn chain_id(&self) -> Result<ChainId, SessionError> {
        Ok(self.inner.lock().unwrap().chain_id)
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<WalletEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().unwrap().subscribers.push(tx);
        rx
    }
}

/// State of the fake contract. Mirrors the storage of the deployed NFT
/// contract, including its own access control.
#[derive(Clone, Debug)]
pub struct ContractState {
    pub owner: Address,
    pub total_supply: u64,
    pub max_supply: u64,
    pub mint_price: u64,
    pub public_mint_open: bool,
    pub whitelist_mint_open: bool,
    pub whitelist: Vec<Address>,
    /// Spendable balance per caller; callers not listed have unlimited funds.
    pub balances: HashMap<String, u64>,
}

impl ContractState {
    pub fn new(owner: Address, max_supply: u64) -> Self {
        Self {
            owner,
            total_supply: 0,
            max_supply,
            mint_price: MINT_PRICE,
            public_mint_open: false,
            whitelist_mint_open: false,
            whitelist: Vec::new(),
            balances: HashMap::new(),
        }
    }

    fn apply(&mut self, caller: &Address, call: &ContractCall) -> Result<(), SessionError> {
        let revert = |reason: &str| Err(SessionError::RemoteRevert(reason.to_string()));
        match call {
            ContractCall::Mint { amount, payment } => {
                let whitelisted = self.whitelist.contains(caller);
                if !self.public_mint_open && !(self.whitelist_mint_open && whitelisted) {
                    return revert("Mint is closed");
                }
                if self.total_supply + amount > self.max_supply {
                    return revert("Max supply reached");
                }
                if *payment != self.mint_price * amount {
                    return revert("Incorrect payment");
                }
                if let Some(balance) = self.balances.get_mut(caller.as_str()) {
                    if *balance < *payment {
                        return Err(SessionError::InsufficientFunds);
                    }
                    *balance -= payment;
                }
                self.total_supply += amount;
                Ok(())
            }
            _ if *caller != self.owner => revert("Ownable: caller is not the owner"),
            ContractCall::TogglePublicMint => {
                self.public_mint_open = !self.public_mint_open;
                Ok(())
            }
            ContractCall::ToggleWhitelistMint => {
                self.whitelist_mint_open = !self.whitelist_mint_open;
                Ok(())
            }
            ContractCall::AddToWhitelist(account) => {
                if !self.whitelist.contains(account) {
                    self.whitelist.push(account.clone());
                }
                Ok(())
            }
            ContractCall::RemoveFromWhitelist(account) => {
                self.whitelist.retain(|a| a != account);
                Ok(())
            }
        }
    }
}

/// Contract double. Calls are checked when submitted and applied when
/// confirmed; in hold mode confirmations wait until the test releases them.
pub struct FakeNftContract {
    state: Arc<Mutex<ContractState>>,
    failing_queries: Mutex<HashSet<&'static str>>,
    reject_signatures: Mutex<bool>,
    hold_confirmations: Mutex<bool>,
    held: Mutex<Vec<(String, oneshot::Sender<()>)>>,
    submitted: Mutex<Vec<ContractCall>>,
    next_hash: AtomicU64,
}

impl FakeNftContract {
    pub fn new(state: ContractState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            failing_queries: Mutex::new(HashSet::new()),
            reject_signatures: Mutex::new(false),
            hold_confirmations: Mutex::new(false),
            held: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
            next_hash: AtomicU64::new(1),
        }
    }

    pub fn state(&self) -> ContractState {
        self.state.lock().unwrap().clone()
    }

    pub fn update_state(&self, f: impl FnOnce(&mut ContractState)) {
        f(&mut self.state.lock().unwrap());
    }

    /// Every call that reached the contract, in submission order.
    pub fn submitted_calls(&self) -> Vec<ContractCall> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn fail_query(&self, name: &'static str) {
        self.failing_queries.lock().unwrap().insert(name);
    }

    pub fn heal_queries(&self) {
        self.failing_queries.lock().unwrap().clear();
    }

    pub fn reject_signatures(&self, reject: bool) {
        *self.reject_signatures.lock().unwrap() = reject;
    }

    pub fn hold_confirmations(&self, hold: bool) {
        *self.hold_confirmations.lock().unwrap() = hold;
    }

    pub fn held_hashes(&self) -> Vec<String> {
        self.held
            .lock()
            .unwrap()
            .iter()
            .map(|(hash, _)| hash.clone())
            .collect()
    }

    /// Let the held transaction finalize. Returns false if it is unknown.
    pub fn release(&self, hash: &str) -> bool {
        let mut held = self.held.lock().unwrap();
        let Some(index) = held.iter().position(|(h, _)| h == hash) else {
            return false;
        };
        let (_, gate) = held.remove(index);
        gate.send(()).is_ok()
    }

    /// Drop the held transaction so its confirmation can never be observed.
    pub fn abandon(&self, hash: &str) {
        self.held.lock().unwrap().retain(|(h, _)| h != hash);
    }

    fn query(&self, name: &'static str) -> Result<std::sync::MutexGuard<'_, ContractState>> {
        if self.failing_queries.lock().unwrap().contains(name) {
            return Err(eyre!("{name}: connection reset by peer"));
        }
        Ok(self.state.lock().unwrap())
    }
}

impl ContractReader for FakeNftContract {
    async fn owner(&self) -> Result<Address> {
        Ok(self.query("owner")?.owner.clone())
    }

    async fn total_supply(&self) -> Result<u64> {
        Ok(self.query("total_supply")?.total_supply)
    }

    async fn max_supply(&self) -> Result<u64> {
        Ok(self.query("max_supply")?.max_supply)
    }

    async fn mint_price(&self) -> Result<u64> {
        Ok(self.query("mint_price")?.mint_price)
    }

    async fn public_mint_open(&self) -> Result<bool> {
        Ok(self.query("public_mint_open")?.public_mint_open)
    }

    async fn whitelist_mint_open(&self) -> Result<bool> {
        Ok(self.query("whitelist_mint_open")?.whitelist_mint_open)
    }

    async fn is_whitelisted(&self, account: &Address) -> Result<bool> {
        Ok(self.query("is_whitelisted")?.whitelist.contains(account))
    }
}

impl ContractWriter for FakeNftContract {
    async fn submit(
        &self,
        signer: &Identity,
        call: ContractCall,
    ) -> Result<Submission, SessionError> {
        if *self.reject_signatures.lock().unwrap() {
            return Err(SessionError::UserRejected);
        }
        // dry run against current state, as the node does before accepting
        let mut preview = self.state.lock().unwrap().clone();
        preview.apply(&signer.address, &call)?;

        self.submitted.lock().unwrap().push(call.clone());
        let hash = format!("0x{:064x}", self.next_hash.fetch_add(1, Ordering::SeqCst));
        let gate = if *self.hold_confirmations.lock().unwrap() {
            let (tx, rx) = oneshot::channel();
            self.held.lock().unwrap().push((hash.clone(), tx));
            Some(rx)
        } else {
            None
        };

        let state = self.state.clone();
        let caller = signer.address.clone();
        let confirmation = async move {
            if let Some(gate) = gate {
                gate.await.map_err(|_| {
                    SessionError::Timeout(String::from("transaction dropped from pool"))
                })?;
            }
            state.lock().unwrap().apply(&caller, &call)
        }
        .boxed_local();

        Ok(Submission { hash, confirmation })
    }
}

/// A fresh collection of ten tokens owned by `owner()`, with a participant
/// `alice()` and a wallet on chain 0.
pub struct TestContext {
    pub wallet: FakeWallet,
    pub contract: Arc<FakeNftContract>,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    pub fn new() -> Self {
        let contract = FakeNftContract::new(ContractState::new(address(1), 10));
        Self {
            wallet: FakeWallet::new(vec![address(1)], ChainId(0)),
            contract: Arc::new(contract),
        }
    }

    pub fn owner(&self) -> Address {
        address(1)
    }

    pub fn alice(&self) -> Address {
        address(2)
    }

    pub fn wallet_events(&self) -> mpsc::UnboundedReceiver<WalletEvent> {
        self.wallet.subscribe()
    }

    /// A coordinator whose wallet exposes `account` first.
    pub fn coordinator_for(
        &self,
        account: Address,
    ) -> SessionCoordinator<FakeWallet, FakeNftContract> {
        self.wallet.inner.lock().unwrap().accounts = vec![account];
        SessionCoordinator::new(self.wallet.clone(), self.contract.clone())
    }
}
