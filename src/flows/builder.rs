//! Candidate transition construction
//!
//! Everything here is local: a rejected transition never reaches a session
//! or the notary.

use crate::errors::{FlowError, FlowResult};
use crate::ledger::{
    BillingChipState, BillingState, BillingStateStatus, CommandKind, Party, PublicKey,
    StateAndRef, TransactionBuilder, ValidationRules, WireTransaction,
};
use crate::services::ServiceHub;

pub struct StateTransitionBuilder<'a> {
    contract: &'a dyn ValidationRules,
    notary: &'a Party,
}

impl<'a> StateTransitionBuilder<'a> {
    pub fn new(contract: &'a dyn ValidationRules, notary: &'a Party) -> Self {
        Self { contract, notary }
    }

    pub fn from_hub(hub: &'a ServiceHub) -> Self {
        Self::new(hub.contract.as_ref(), hub.notary_identity())
    }

    /// Consume `input` and produce the same state with status `Returned`
    ///
    /// The command is addressed to every participant of the input.
    pub fn build_return_transition(
        &self,
        input: &StateAndRef<BillingState>,
    ) -> FlowResult<WireTransaction> {
        if !input.state.is_active() {
            return Err(FlowError::invalid(format!(
                "billing state {} has already been returned",
                input.state.linear_id
            )));
        }
        let output = input.state.with_status(BillingStateStatus::Returned);
        let signers: Vec<PublicKey> = input
            .state
            .participants()
            .iter()
            .map(|p| p.owning_key)
            .collect();

        let tx = TransactionBuilder::new(self.notary.clone())
            .add_input_state(input.to_ledger())
            .add_output_state(output)
            .add_command(CommandKind::Return, signers)
            .to_wire_transaction()
            .ok_or_else(|| FlowError::internal("return transaction has no command"))?;

        self.verify(tx)
    }

    /// Consume `billing` and `chips`, adding the chip amounts to `spent`
    pub fn build_attach_transition(
        &self,
        billing: &StateAndRef<BillingState>,
        chips: &[StateAndRef<BillingChipState>],
    ) -> FlowResult<WireTransaction> {
        let chips_total = chips
            .iter()
            .try_fold(0i64, |acc, c| acc.checked_add(c.state.amount))
            .ok_or_else(|| FlowError::invalid("chip amounts overflow"))?;
        let spent = billing
            .state
            .spent
            .checked_add(chips_total)
            .ok_or_else(|| FlowError::invalid("spent amount overflows"))?;
        let output = BillingState {
            spent,
            ..billing.state.clone()
        };

        let builder = chips.iter().fold(
            TransactionBuilder::new(self.notary.clone()).add_input_state(billing.to_ledger()),
            |b, chip| b.add_input_state(chip.to_ledger()),
        );
        let tx = builder
            .add_output_state(output)
            .add_command(CommandKind::AttachChips, vec![billing.state.owner.owning_key])
            .to_wire_transaction()
            .ok_or_else(|| FlowError::internal("attach transaction has no command"))?;

        self.verify(tx)
    }

    fn verify(&self, tx: WireTransaction) -> FlowResult<WireTransaction> {
        self.contract.validate(&tx).map_err(FlowError::InvalidTransition)?;
        Ok(tx)
    }
}
