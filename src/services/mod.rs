//! Node services consumed by flows
//!
//! - **vault**: record registry of unspent versions
//! - **notary**: ordering/uniqueness service
//! - **network**: counter-party sessions
//!
//! [`ServiceHub`] bundles what a node's flows need. The notary is handed in
//! explicitly at construction; flows never look it up globally.

pub mod network;
pub mod notary;
pub mod vault;

pub use network::{
    ChannelSession, FlowSession, InMemoryNetwork, SessionHandler, SessionMessage,
    SessionTransport,
};
pub use notary::{InMemoryNotary, OrderingService};
pub use vault::{InMemoryVault, RecordRegistry};

use crate::errors::{FlowError, FlowResult};
use crate::ledger::{KeyPair, Party, SignedTransaction, TransactionSignature, ValidationRules, WireTransaction};
use std::sync::Arc;

#[derive(Clone)]
pub struct ServiceHub {
    identity: Party,
    keys: Arc<KeyPair>,
    pub registry: Arc<dyn RecordRegistry>,
    pub contract: Arc<dyn ValidationRules>,
    pub notary: Arc<dyn OrderingService>,
}

impl ServiceHub {
    pub fn new(
        name: impl Into<String>,
        keys: KeyPair,
        registry: Arc<dyn RecordRegistry>,
        contract: Arc<dyn ValidationRules>,
        notary: Arc<dyn OrderingService>,
    ) -> Self {
        Self {
            identity: Party::new(name, keys.public_key()),
            keys: Arc::new(keys),
            registry,
            contract,
            notary,
        }
    }

    pub fn my_identity(&self) -> &Party {
        &self.identity
    }

    pub fn notary_identity(&self) -> &Party {
        self.notary.identity()
    }

    /// Endorse a freshly built transaction with this node's key
    pub fn sign_initial_transaction(&self, tx: WireTransaction) -> FlowResult<SignedTransaction> {
        SignedTransaction::sign_initial(tx, &self.keys)
            .map_err(|e| FlowError::invalid(format!("cannot sign transaction: {}", e)))
    }

    /// This node's signature over `stx`
    pub fn create_signature(&self, stx: &SignedTransaction) -> TransactionSignature {
        TransactionSignature::create(&self.keys, &stx.id())
    }
}

impl std::fmt::Debug for ServiceHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceHub")
            .field("identity", &self.identity)
            .field("notary", self.notary.identity())
            .finish_non_exhaustive()
    }
}
