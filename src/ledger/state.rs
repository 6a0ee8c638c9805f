//! Versioned ledger states
//!
//! Every state is an immutable snapshot. A logical entity (identified by its
//! [`UniqueIdentifier`]) evolves by consuming one version and producing the
//! next; the version is addressed by the [`StateRef`] of the transaction
//! output that created it.

use super::identity::Party;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// SHA-256 digest
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SecureHash([u8; 32]);

impl SecureHash {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Random hash, used for synthetic issuance transactions
    pub fn random() -> Self {
        Self(rand::random())
    }
}

impl fmt::Display for SecureHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for SecureHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecureHash({})", hex::encode(&self.0[..8]))
    }
}

/// Pointer to one output of one transaction, i.e. one version of a state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateRef {
    pub txhash: SecureHash,
    pub index: u32,
}

impl StateRef {
    pub fn new(txhash: SecureHash, index: u32) -> Self {
        Self { txhash, index }
    }
}

impl fmt::Display for StateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.txhash, self.index)
    }
}

/// Stable identity of an entity across all of its versions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UniqueIdentifier {
    pub external_id: Option<String>,
    pub id: Uuid,
}

impl UniqueIdentifier {
    pub fn new() -> Self {
        Self {
            external_id: None,
            id: Uuid::new_v4(),
        }
    }

    pub fn with_external_id(external_id: impl Into<String>) -> Self {
        Self {
            external_id: Some(external_id.into()),
            id: Uuid::new_v4(),
        }
    }
}

impl Default for UniqueIdentifier {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UniqueIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.external_id {
            Some(ext) => write!(f, "{}_{}", ext, self.id),
            None => write!(f, "{}", self.id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BillingStateStatus {
    Active,
    Returned,
}

/// Billing entitlement shared between its issuer and its owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingState {
    pub issuer: Party,
    pub owner: Party,
    /// Credit limit, `0` means unlimited
    pub amount: i64,
    pub spent: i64,
    pub status: BillingStateStatus,
    pub linear_id: UniqueIdentifier,
}

impl BillingState {
    pub fn new(issuer: Party, owner: Party, amount: i64, linear_id: UniqueIdentifier) -> Self {
        Self {
            issuer,
            owner,
            amount,
            spent: 0,
            status: BillingStateStatus::Active,
            linear_id,
        }
    }

    pub fn participants(&self) -> Vec<Party> {
        vec![self.issuer.clone(), self.owner.clone()]
    }

    pub fn is_active(&self) -> bool {
        self.status == BillingStateStatus::Active
    }

    /// Same state with a different status
    pub fn with_status(&self, status: BillingStateStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }
}

/// Usage consumed against a billing state, folded back before return
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingChipState {
    pub owner: Party,
    pub issuer: Party,
    pub amount: i64,
    pub billing_state_linear_id: UniqueIdentifier,
    pub linear_id: UniqueIdentifier,
}

impl BillingChipState {
    pub fn participants(&self) -> Vec<Party> {
        vec![self.owner.clone()]
    }
}

/// Every kind of state the ledger can hold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerState {
    Billing(BillingState),
    Chip(BillingChipState),
}

impl LedgerState {
    pub fn linear_id(&self) -> &UniqueIdentifier {
        match self {
            Self::Billing(s) => &s.linear_id,
            Self::Chip(s) => &s.linear_id,
        }
    }

    pub fn participants(&self) -> Vec<Party> {
        match self {
            Self::Billing(s) => s.participants(),
            Self::Chip(s) => s.participants(),
        }
    }

    pub fn as_billing(&self) -> Option<&BillingState> {
        match self {
            Self::Billing(s) => Some(s),
            Self::Chip(_) => None,
        }
    }

    pub fn as_chip(&self) -> Option<&BillingChipState> {
        match self {
            Self::Chip(s) => Some(s),
            Self::Billing(_) => None,
        }
    }
}

impl From<BillingState> for LedgerState {
    fn from(state: BillingState) -> Self {
        Self::Billing(state)
    }
}

impl From<BillingChipState> for LedgerState {
    fn from(state: BillingChipState) -> Self {
        Self::Chip(state)
    }
}

/// A state together with the version pointer that produced it
///
/// Holding a `StateAndRef` is holding one specific version. Once a
/// transaction consuming `state_ref` commits, the handle is stale forever
/// and a fresh lookup by linear id is required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateAndRef<T> {
    pub state: T,
    pub state_ref: StateRef,
}

impl<T> StateAndRef<T> {
    pub fn new(state: T, state_ref: StateRef) -> Self {
        Self { state, state_ref }
    }
}

impl<T: Clone + Into<LedgerState>> StateAndRef<T> {
    pub fn to_ledger(&self) -> StateAndRef<LedgerState> {
        StateAndRef::new(self.state.clone().into(), self.state_ref)
    }
}

impl StateAndRef<LedgerState> {
    pub fn as_billing(&self) -> Option<StateAndRef<BillingState>> {
        self.state
            .as_billing()
            .map(|s| StateAndRef::new(s.clone(), self.state_ref))
    }

    pub fn as_chip(&self) -> Option<StateAndRef<BillingChipState>> {
        self.state
            .as_chip()
            .map(|s| StateAndRef::new(s.clone(), self.state_ref))
    }
}

/// Common capability of every versioned record handle
pub trait VersionedRecord {
    fn linear_id(&self) -> &UniqueIdentifier;
    fn state_ref(&self) -> StateRef;
}

impl VersionedRecord for StateAndRef<BillingState> {
    fn linear_id(&self) -> &UniqueIdentifier {
        &self.state.linear_id
    }

    fn state_ref(&self) -> StateRef {
        self.state_ref
    }
}

impl VersionedRecord for StateAndRef<BillingChipState> {
    fn linear_id(&self) -> &UniqueIdentifier {
        &self.state.linear_id
    }

    fn state_ref(&self) -> StateRef {
        self.state_ref
    }
}

impl VersionedRecord for StateAndRef<LedgerState> {
    fn linear_id(&self) -> &UniqueIdentifier {
        self.state.linear_id()
    }

    fn state_ref(&self) -> StateRef {
        self.state_ref
    }
}
