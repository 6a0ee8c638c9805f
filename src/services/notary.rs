//! Ordering service ("notary")
//!
//! The notary is the only arbiter of conflicting consumption: of two
//! transactions spending the same version, whichever it sees first commits
//! and the other is rejected. Flows never serialise locally.

use crate::errors::{FlowError, FlowResult};
use crate::ledger::{KeyPair, Party, SecureHash, SignedTransaction, StateRef, TransactionSignature};
use crate::metrics::metrics;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

#[async_trait]
pub trait OrderingService: Send + Sync {
    fn identity(&self) -> &Party;

    /// Sequence `stx` and return the notary's signature over its id
    ///
    /// Fails with [`FlowError::ConsensusRejected`] if any input was already
    /// consumed by a different transaction.
    async fn notarise(&self, stx: &SignedTransaction) -> FlowResult<TransactionSignature>;
}

/// Single-node uniqueness service
pub struct InMemoryNotary {
    identity: Party,
    keys: KeyPair,
    consumed: Mutex<HashMap<StateRef, SecureHash>>,
    submissions: AtomicUsize,
}

impl InMemoryNotary {
    pub fn new(name: impl Into<String>, keys: KeyPair) -> Self {
        Self {
            identity: Party::new(name, keys.public_key()),
            keys,
            consumed: Mutex::new(HashMap::new()),
            submissions: AtomicUsize::new(0),
        }
    }

    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    pub fn consumed_by(&self, state_ref: &StateRef) -> Option<SecureHash> {
        self.consumed.lock().get(state_ref).copied()
    }

    /// Check-and-mark every input in one critical section
    fn commit_inputs(&self, id: SecureHash, inputs: &[StateRef]) -> Result<(), Vec<StateRef>> {
        let mut consumed = self.consumed.lock();
        let conflicts: Vec<StateRef> = inputs
            .iter()
            .filter(|r| matches!(consumed.get(*r), Some(by) if *by != id))
            .copied()
            .collect();
        if !conflicts.is_empty() {
            return Err(conflicts);
        }
        for input in inputs {
            consumed.insert(*input, id);
        }
        Ok(())
    }
}

#[async_trait]
impl OrderingService for InMemoryNotary {
    fn identity(&self) -> &Party {
        &self.identity
    }

    async fn notarise(&self, stx: &SignedTransaction) -> FlowResult<TransactionSignature> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        metrics().notary_submissions.inc();

        if stx.tx.notary != self.identity {
            return Err(FlowError::invalid(format!(
                "transaction names notary {} but was submitted to {}",
                stx.tx.notary, self.identity
            )));
        }
        stx.verify_required_signatures_except(&[])
            .map_err(|e| FlowError::invalid(format!("notary signature check failed: {}", e)))?;

        // Competing submissions interleave here, the lock below decides
        tokio::task::yield_now().await;

        let id = stx.id();
        if let Err(conflicts) = self.commit_inputs(id, &stx.tx.input_refs()) {
            metrics().notary_conflicts.inc();
            warn!(tx_id = %id, conflicts = conflicts.len(), "Double spend rejected");
            return Err(FlowError::ConsensusRejected { conflicts });
        }

        debug!(tx_id = %id, "Transaction notarised");
        Ok(TransactionSignature::create(&self.keys, &id))
    }
}
