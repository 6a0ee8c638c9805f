//! Process-local billing network
//!
//! Two nodes (holder and issuer) with their own vaults, one notary and a
//! shared in-memory network. Used by the `billing-node` binary and by the
//! scenario tests.

use crate::config::Config;
use crate::flows::{AcceptancePolicy, IssuerResponder, ReturnBillingStateFlow};
use crate::ledger::{
    BillingChipState, BillingContract, BillingState, BillingStateStatus, KeyPair, Party,
    SecureHash, StateAndRef, StateRef, UniqueIdentifier,
};
use crate::services::{
    InMemoryNetwork, InMemoryNotary, InMemoryVault, OrderingService, ServiceHub, SessionTransport,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// One node: its services, its vault and its view of the network
#[derive(Clone)]
pub struct SimulatedNode {
    pub hub: ServiceHub,
    pub vault: Arc<InMemoryVault>,
    pub transport: Arc<dyn SessionTransport>,
}

impl SimulatedNode {
    fn new(
        name: &str,
        network: &Arc<InMemoryNetwork>,
        notary: Arc<dyn OrderingService>,
    ) -> Self {
        let keys = KeyPair::from_seed_phrase(name);
        let vault = Arc::new(InMemoryVault::new());
        let hub = ServiceHub::new(name, keys, vault.clone(), Arc::new(BillingContract), notary);
        let transport = network.transport_for(hub.my_identity().clone());
        Self {
            hub,
            vault,
            transport,
        }
    }

    pub fn identity(&self) -> &Party {
        self.hub.my_identity()
    }

    pub fn return_flow(&self) -> ReturnBillingStateFlow {
        ReturnBillingStateFlow::new(self.hub.clone(), Arc::clone(&self.transport))
    }
}

pub struct SimulatedNetwork {
    pub network: Arc<InMemoryNetwork>,
    pub notary: Arc<InMemoryNotary>,
    pub holder: SimulatedNode,
    pub issuer: SimulatedNode,
}

impl SimulatedNetwork {
    pub fn new(holder_name: &str, issuer_name: &str, notary_name: &str, timeout: Duration) -> Self {
        let network = InMemoryNetwork::new(timeout);
        let notary = Arc::new(InMemoryNotary::new(
            notary_name,
            KeyPair::from_seed_phrase(notary_name),
        ));
        let holder = SimulatedNode::new(holder_name, &network, notary.clone());
        let issuer = SimulatedNode::new(issuer_name, &network, notary.clone());

        network.register(
            issuer.identity(),
            Arc::new(IssuerResponder::new(issuer.hub.clone())),
        );
        info!(
            holder = %holder.identity(),
            issuer = %issuer.identity(),
            notary = %notary.identity(),
            "Simulated network ready"
        );

        Self {
            network,
            notary,
            holder,
            issuer,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.node.name,
            &config.node.issuer_name,
            &config.notary.name,
            config.session_timeout(),
        )
    }

    /// Make the issuer apply `policy` to every proposal it is sent
    pub fn with_issuer_policy(self, policy: AcceptancePolicy) -> Self {
        self.network.register(
            self.issuer.identity(),
            Arc::new(IssuerResponder::new(self.issuer.hub.clone()).with_policy(policy)),
        );
        self
    }

    /// Issue an active billing state owned by the holder, known to both nodes
    pub fn issue_billing_state(&self, external_id: &str, amount: i64) -> StateAndRef<BillingState> {
        self.issue_billing_state_with_status(external_id, amount, BillingStateStatus::Active)
    }

    pub fn issue_billing_state_with_status(
        &self,
        external_id: &str,
        amount: i64,
        status: BillingStateStatus,
    ) -> StateAndRef<BillingState> {
        let state = BillingState::new(
            self.issuer.identity().clone(),
            self.holder.identity().clone(),
            amount,
            UniqueIdentifier::with_external_id(external_id),
        )
        .with_status(status);
        let issued = StateAndRef::new(state, StateRef::new(SecureHash::random(), 0));
        self.holder.vault.record_issued(issued.to_ledger());
        self.issuer.vault.record_issued(issued.to_ledger());
        issued
    }

    /// Issue a chip against `billing`; only the holder sees it
    pub fn issue_chip(
        &self,
        billing: &StateAndRef<BillingState>,
        amount: i64,
    ) -> StateAndRef<BillingChipState> {
        let chip = BillingChipState {
            owner: billing.state.owner.clone(),
            issuer: billing.state.issuer.clone(),
            amount,
            billing_state_linear_id: billing.state.linear_id.clone(),
            linear_id: UniqueIdentifier::new(),
        };
        let issued = StateAndRef::new(chip, StateRef::new(SecureHash::random(), 0));
        self.holder.vault.record_issued(issued.to_ledger());
        issued
    }
}
