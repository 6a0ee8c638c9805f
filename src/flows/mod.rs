//! Billing flows
//!
//! The return of a billing state is composed from small protocols, run in
//! this order by [`ReturnBillingStateFlow`]:
//!
//! - **attach**: fold unspent chips into the billing state (own transaction)
//! - **builder**: build and locally validate the return transition
//! - **collect**: gather the issuer's endorsement over a session
//! - **finality**: notarise, record and distribute
//!
//! [`IssuerResponder`] is the counter-party half, run by the issuer for
//! every session opened to it.

mod attach;
mod builder;
mod collect;
mod finality;
mod responder;
mod return_flow;

pub use attach::{AttachOutcome, ChipAttachmentOrchestrator};
pub use builder::StateTransitionBuilder;
pub use collect::SignatureCollectionProtocol;
pub use finality::FinalityProtocol;
pub use responder::{AcceptancePolicy, IssuerResponder};
pub use return_flow::{ReturnBillingStateFlow, ReturnOutcome};
