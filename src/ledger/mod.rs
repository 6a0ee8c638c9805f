//! Ledger data model
//!
//! - **identity**: parties and Ed25519 keys
//! - **state**: versioned billing and chip states, version pointers
//! - **transaction**: commands, wire transactions, endorsements
//! - **contract**: validation rules for billing transactions

pub mod contract;
pub mod identity;
pub mod state;
pub mod transaction;

pub use contract::{BillingContract, ValidationRules};
pub use identity::{KeyPair, Party, PublicKey};
pub use state::{
    BillingChipState, BillingState, BillingStateStatus, LedgerState, SecureHash, StateAndRef,
    StateRef, UniqueIdentifier, VersionedRecord,
};
pub use transaction::{
    Command, CommandKind, SignatureError, SignedTransaction, TransactionBuilder,
    TransactionSignature, WireTransaction,
};
