//! Record registry: unspent versions by linear id
//!
//! [`InMemoryVault`] keeps one node's view of the ledger. Recording a
//! finalized transaction retires its inputs and makes its outputs the
//! current versions.

use crate::errors::FlowResult;
use crate::ledger::{
    BillingChipState, BillingState, LedgerState, SecureHash, SignedTransaction, StateAndRef,
    StateRef, UniqueIdentifier,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[async_trait]
pub trait RecordRegistry: Send + Sync {
    /// The single unspent version of a billing state, if any
    async fn find_unspent_billing_by_id(
        &self,
        linear_id: &UniqueIdentifier,
    ) -> FlowResult<Option<StateAndRef<BillingState>>>;

    /// Unspent chips referencing the billing state `billing_id`
    async fn unspent_chips_for(
        &self,
        billing_id: &UniqueIdentifier,
    ) -> FlowResult<Vec<StateAndRef<BillingChipState>>>;

    /// Apply a finalized transaction
    async fn record_transaction(&self, stx: &SignedTransaction) -> FlowResult<()>;
}

#[derive(Default)]
struct VaultInner {
    unspent: HashMap<StateRef, StateAndRef<LedgerState>>,
    consumed: HashSet<StateRef>,
    transactions: HashMap<SecureHash, SignedTransaction>,
}

#[derive(Default)]
pub struct InMemoryVault {
    inner: RwLock<VaultInner>,
}

impl InMemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a freshly issued state on the ledger under a synthetic issuance id
    pub fn issue(&self, state: impl Into<LedgerState>) -> StateAndRef<LedgerState> {
        let sar = StateAndRef::new(state.into(), StateRef::new(SecureHash::random(), 0));
        self.record_issued(sar.clone());
        sar
    }

    /// Record a state issued elsewhere (shared with the counter-party's vault)
    pub fn record_issued(&self, sar: StateAndRef<LedgerState>) {
        self.inner.write().unspent.insert(sar.state_ref, sar);
    }

    pub fn is_unspent(&self, state_ref: &StateRef) -> bool {
        self.inner.read().unspent.contains_key(state_ref)
    }

    pub fn is_consumed(&self, state_ref: &StateRef) -> bool {
        self.inner.read().consumed.contains(state_ref)
    }

    pub fn transaction(&self, id: &SecureHash) -> Option<SignedTransaction> {
        self.inner.read().transactions.get(id).cloned()
    }

    pub fn transaction_count(&self) -> usize {
        self.inner.read().transactions.len()
    }

    fn apply(&self, stx: &SignedTransaction) {
        let id = stx.id();
        let mut inner = self.inner.write();
        if inner.transactions.contains_key(&id) {
            debug!(tx_id = %id, "Transaction already recorded");
            return;
        }
        for input in stx.tx.input_refs() {
            inner.unspent.remove(&input);
            inner.consumed.insert(input);
        }
        for (index, output) in stx.tx.outputs.iter().enumerate() {
            let state_ref = StateRef::new(id, index as u32);
            if !inner.consumed.contains(&state_ref) {
                inner
                    .unspent
                    .insert(state_ref, StateAndRef::new(output.clone(), state_ref));
            }
        }
        inner.transactions.insert(id, stx.clone());
        debug!(tx_id = %id, outputs = stx.tx.outputs.len(), "Transaction recorded");
    }
}

#[async_trait]
impl RecordRegistry for InMemoryVault {
    async fn find_unspent_billing_by_id(
        &self,
        linear_id: &UniqueIdentifier,
    ) -> FlowResult<Option<StateAndRef<BillingState>>> {
        let inner = self.inner.read();
        Ok(inner
            .unspent
            .values()
            .filter_map(|s| s.as_billing())
            .find(|s| &s.state.linear_id == linear_id))
    }

    async fn unspent_chips_for(
        &self,
        billing_id: &UniqueIdentifier,
    ) -> FlowResult<Vec<StateAndRef<BillingChipState>>> {
        let inner = self.inner.read();
        let mut chips: Vec<_> = inner
            .unspent
            .values()
            .filter_map(|s| s.as_chip())
            .filter(|c| &c.state.billing_state_linear_id == billing_id)
            .collect();
        // Deterministic input order
        chips.sort_by_key(|c| c.state_ref);
        Ok(chips)
    }

    async fn record_transaction(&self, stx: &SignedTransaction) -> FlowResult<()> {
        self.apply(stx);
        Ok(())
    }
}
