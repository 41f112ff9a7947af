use crate::error::SessionError;
use chrono::{
    DateTime,
    Utc,
};
use std::fmt;

const ADDRESS_HEX_LEN: usize = 64;

/// A 32-byte account address in `0x`-prefixed hex form.
///
/// Wallets and the contract may render the same address with different
/// letter case, so equality ignores ASCII case.
#[derive(Clone, Debug)]
pub struct Address(String);

impl Address {
    pub fn parse(raw: &str) -> Result<Self, SessionError> {
        let trimmed = raw.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.len() != ADDRESS_HEX_LEN
            || !digits.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(SessionError::InvalidAddress(raw.to_string()));
        }
        Ok(Self(format!("0x{digits}")))
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(format!("0x{}", hex::encode(bytes)))
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        // `parse` and `from_bytes` only ever produce 64 hex digits
        if let Ok(decoded) = hex::decode(&self.0[2..]) {
            out.copy_from_slice(&decoded);
        }
        out
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `0x1234…abcd`, for status lines.
    pub fn short(&self) -> String {
        let s = &self.0;
        format!("{}…{}", &s[..6], &s[s.len() - 4..])
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for Address {}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChainId(pub u64);

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who is connected, and on which chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub address: Address,
    pub chain_id: ChainId,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Role {
    #[default]
    None,
    Participant,
    Owner,
}

impl Role {
    /// Role is never stored; it is recomputed from the current identity and
    /// snapshot each time it is asked for.
    pub fn derive(identity: Option<&Identity>, snapshot: Option<&ContractSnapshot>) -> Self {
        match (identity, snapshot) {
            (Some(identity), Some(snapshot)) if identity.address == snapshot.owner => {
                Role::Owner
            }
            (Some(_), Some(_)) => Role::Participant,
            _ => Role::None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::None => "unauthenticated",
            Role::Participant => "participant",
            Role::Owner => "owner",
        };
        f.write_str(name)
    }
}

/// One consistent reading of the contract. Replaced wholesale on every
/// refresh.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractSnapshot {
    owner: Address,
    total_minted: u64,
    max_supply: u64,
    public_mint_open: bool,
    whitelist_mint_open: bool,
}

impl ContractSnapshot {
    pub fn new(
        owner: Address,
        total_minted: u64,
        max_supply: u64,
        public_mint_open: bool,
        whitelist_mint_open: bool,
    ) -> Result<Self, SessionError> {
        if total_minted > max_supply {
            return Err(SessionError::InvalidSnapshot {
                total_minted,
                max_supply,
            });
        }
        Ok(Self {
            owner,
            total_minted,
            max_supply,
            public_mint_open,
            whitelist_mint_open,
        })
    }

    pub fn owner(&self) -> &Address {
        &self.owner
    }

    pub fn total_minted(&self) -> u64 {
        self.total_minted
    }

    pub fn max_supply(&self) -> u64 {
        self.max_supply
    }

    pub fn remaining(&self) -> u64 {
        self.max_supply - self.total_minted
    }

    pub fn public_mint_open(&self) -> bool {
        self.public_mint_open
    }

    pub fn whitelist_mint_open(&self) -> bool {
        self.whitelist_mint_open
    }
}

/// The kind of a write. Each kind is also one UI control, and at most one
/// transaction per control may be in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionKind {
    Mint,
    TogglePublicMint,
    ToggleWhitelistMint,
    AddToWhitelist,
    RemoveFromWhitelist,
}

impl ActionKind {
    pub fn is_owner_only(self) -> bool {
        !matches!(self, ActionKind::Mint)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Mint => "mint",
            ActionKind::TogglePublicMint => "toggle public mint",
            ActionKind::ToggleWhitelistMint => "toggle whitelist mint",
            ActionKind::AddToWhitelist => "add to whitelist",
            ActionKind::RemoveFromWhitelist => "remove from whitelist",
        };
        f.write_str(name)
    }
}

/// A user-initiated write together with its parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Mint { amount: u64 },
    TogglePublicMint,
    ToggleWhitelistMint,
    AddToWhitelist(Address),
    RemoveFromWhitelist(Address),
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Mint { .. } => ActionKind::Mint,
            Action::TogglePublicMint => ActionKind::TogglePublicMint,
            Action::ToggleWhitelistMint => ActionKind::ToggleWhitelistMint,
            Action::AddToWhitelist(_) => ActionKind::AddToWhitelist,
            Action::RemoveFromWhitelist(_) => ActionKind::RemoveFromWhitelist,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed,
}

/// Transient marker for one in-flight write. Dropped once it settles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingTransaction {
    pub kind: ActionKind,
    pub submitted_at: DateTime<Utc>,
    pub status: TxStatus,
    pub hash: String,
}

impl PendingTransaction {
    pub fn new(kind: ActionKind, hash: impl Into<String>) -> Self {
        Self {
            kind,
            submitted_at: Utc::now(),
            status: TxStatus::Pending,
            hash: hash.into(),
        }
    }

    pub fn hash_preview(&self) -> String {
        let preview_len = self.hash.len().min(10);
        let mut preview = self.hash[..preview_len].to_string();
        if self.hash.len() > preview_len {
            preview.push_str("...");
        }
        preview
    }
}

/// Total payment for `amount` tokens, in the asset's smallest unit.
pub fn total_payment(unit_price: u64, amount: u64) -> Result<u64, SessionError> {
    if amount < 1 {
        return Err(SessionError::InvalidAmount(amount));
    }
    unit_price
        .checked_mul(amount)
        .ok_or(SessionError::PaymentOverflow { unit_price, amount })
}
