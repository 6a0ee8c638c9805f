//! Billing state return flows
//!
//! A billing state is a versioned entitlement shared by an issuer and an
//! owner. This crate implements the owner-initiated return of such a state:
//! pending chips are folded in first, then the state moves to `Returned` in
//! a transaction endorsed by the issuer and ordered by a notary.

pub mod config;
pub mod errors;
pub mod flows;
pub mod ledger;
pub mod metrics;
pub mod observability;
pub mod services;
pub mod simulation;
pub mod structured_logging;

pub use errors::{FlowError, FlowResult};
pub use flows::{AttachOutcome, IssuerResponder, ReturnBillingStateFlow};
pub use simulation::SimulatedNetwork;

#[cfg(test)]
mod tests {
    mod attach_tests;
    mod builder_tests;
    mod collect_tests;
    mod finality_tests;
    mod responder_tests;
    mod return_flow_tests;
    mod test_helpers;
}
