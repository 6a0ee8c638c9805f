//! Validation rules applied to every billing transaction
//!
//! Both the proposing holder and the endorsing issuer run the same rules
//! locally; the holder before anything leaves the process, the issuer before
//! it signs.

use super::identity::PublicKey;
use super::state::{BillingChipState, BillingState, BillingStateStatus};
use super::transaction::{CommandKind, WireTransaction};
use std::collections::BTreeSet;

/// Transaction verification, supplied from outside the flows
pub trait ValidationRules: Send + Sync {
    /// `Err(reason)` if the transaction must not be signed
    fn validate(&self, tx: &WireTransaction) -> Result<(), String>;
}

/// Rules for billing and chip states
#[derive(Debug, Clone, Copy, Default)]
pub struct BillingContract;

impl BillingContract {
    fn split_inputs(tx: &WireTransaction) -> (Vec<&BillingState>, Vec<&BillingChipState>) {
        let billing = tx.inputs.iter().filter_map(|i| i.state.as_billing()).collect();
        let chips = tx.inputs.iter().filter_map(|i| i.state.as_chip()).collect();
        (billing, chips)
    }

    fn split_outputs(tx: &WireTransaction) -> (Vec<&BillingState>, Vec<&BillingChipState>) {
        let billing = tx.outputs.iter().filter_map(|o| o.as_billing()).collect();
        let chips = tx.outputs.iter().filter_map(|o| o.as_chip()).collect();
        (billing, chips)
    }

    fn verify_return(tx: &WireTransaction) -> Result<(), String> {
        let (billing_in, chips_in) = Self::split_inputs(tx);
        let (billing_out, chips_out) = Self::split_outputs(tx);

        require(billing_in.len() == 1, "There should be one billing state input")?;
        require(billing_out.len() == 1, "There should be one billing state output")?;
        require(
            chips_in.is_empty() && chips_out.is_empty(),
            "There should be no chip states",
        )?;

        let input = billing_in[0];
        let output = billing_out[0];
        require(
            input.status == BillingStateStatus::Active,
            "Input billing state should be active",
        )?;
        require(
            output.status == BillingStateStatus::Returned,
            "Output billing state should be returned",
        )?;
        require(
            *output == input.with_status(BillingStateStatus::Returned),
            "Only the status of the billing state may change",
        )?;

        let participants: Vec<PublicKey> =
            input.participants().iter().map(|p| p.owning_key).collect();
        verify_signers(tx, &participants)
    }

    fn verify_attach_chips(tx: &WireTransaction) -> Result<(), String> {
        let (billing_in, chips_in) = Self::split_inputs(tx);
        let (billing_out, chips_out) = Self::split_outputs(tx);

        require(billing_in.len() == 1, "There should be one billing state input")?;
        require(billing_out.len() == 1, "There should be one billing state output")?;
        require(!chips_in.is_empty(), "There should be at least one chip input")?;
        require(chips_out.is_empty(), "Chips must not be produced while attaching")?;

        let input = billing_in[0];
        let output = billing_out[0];
        require(
            input.status == BillingStateStatus::Active,
            "Input billing state should be active",
        )?;
        for chip in &chips_in {
            require(
                chip.billing_state_linear_id == input.linear_id,
                "Every chip should belong to the billing state",
            )?;
            require(
                chip.owner == input.owner,
                "Every chip should be owned by the billing state owner",
            )?;
            require(chip.amount >= 0, "Chip amounts should not be negative")?;
        }

        let chips_total = chips_in
            .iter()
            .try_fold(0i64, |acc, c| acc.checked_add(c.amount))
            .ok_or_else(|| "Chip amounts overflow".to_string())?;
        let expected_spent = input
            .spent
            .checked_add(chips_total)
            .ok_or_else(|| "Spent amount overflows".to_string())?;
        require(
            *output
                == BillingState {
                    spent: expected_spent,
                    ..input.clone()
                },
            "Output should only add the chip amounts to the spent amount",
        )?;
        require(
            output.amount == 0 || output.spent <= output.amount,
            "Spent amount should not exceed the billing state amount",
        )?;

        verify_signers(tx, &[input.owner.owning_key])
    }
}

impl ValidationRules for BillingContract {
    fn validate(&self, tx: &WireTransaction) -> Result<(), String> {
        match tx.command.kind {
            CommandKind::Return => Self::verify_return(tx),
            CommandKind::AttachChips => Self::verify_attach_chips(tx),
        }
    }
}

fn require(condition: bool, message: &str) -> Result<(), String> {
    if condition {
        Ok(())
    } else {
        Err(message.to_string())
    }
}

/// Signers must be exactly `expected`, with no duplicates
fn verify_signers(tx: &WireTransaction, expected: &[PublicKey]) -> Result<(), String> {
    let signers = tx.required_signers();
    require(!signers.is_empty(), "Command should have signers")?;
    let unique: BTreeSet<&PublicKey> = signers.iter().collect();
    require(unique.len() == signers.len(), "Command signers should be unique")?;
    let expected_set: BTreeSet<&PublicKey> = expected.iter().collect();
    require(
        expected_set.len() == expected.len(),
        "Participants should be distinct parties",
    )?;
    require(
        unique == expected_set,
        "Command signers should be the participants",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::identity::{KeyPair, Party};
    use crate::ledger::state::{LedgerState, SecureHash, StateAndRef, StateRef, UniqueIdentifier};
    use crate::ledger::transaction::TransactionBuilder;

    fn party(name: &str) -> Party {
        Party::new(name, KeyPair::from_seed_phrase(name).public_key())
    }

    fn active() -> BillingState {
        BillingState::new(party("Issuer"), party("Holder"), 100, UniqueIdentifier::new())
    }

    fn sar(state: impl Into<LedgerState>) -> StateAndRef<LedgerState> {
        StateAndRef::new(state.into(), StateRef::new(SecureHash::random(), 0))
    }

    fn chip(billing: &BillingState, amount: i64) -> BillingChipState {
        BillingChipState {
            owner: billing.owner.clone(),
            issuer: billing.issuer.clone(),
            amount,
            billing_state_linear_id: billing.linear_id.clone(),
            linear_id: UniqueIdentifier::new(),
        }
    }

    fn return_tx(input: &BillingState, output: BillingState, signers: Vec<PublicKey>) -> WireTransaction {
        TransactionBuilder::new(party("Notary"))
            .add_input_state(sar(input.clone()))
            .add_output_state(output)
            .add_command(CommandKind::Return, signers)
            .to_wire_transaction()
            .unwrap()
    }

    fn keys(state: &BillingState) -> Vec<PublicKey> {
        state.participants().iter().map(|p| p.owning_key).collect()
    }

    #[test]
    fn test_valid_return() {
        let input = active();
        let tx = return_tx(&input, input.with_status(BillingStateStatus::Returned), keys(&input));
        assert_eq!(BillingContract.validate(&tx), Ok(()));
    }

    #[test]
    fn test_return_of_returned_state_rejected() {
        let input = active().with_status(BillingStateStatus::Returned);
        let tx = return_tx(&input, input.clone(), keys(&input));
        assert_eq!(
            BillingContract.validate(&tx),
            Err("Input billing state should be active".to_string())
        );
    }

    #[test]
    fn test_return_may_only_change_status() {
        let input = active();
        let mut output = input.with_status(BillingStateStatus::Returned);
        output.amount = 5;
        let tx = return_tx(&input, output, keys(&input));
        assert!(BillingContract.validate(&tx).is_err());
    }

    #[test]
    fn test_return_signer_set_must_match_participants() {
        let input = active();
        let output = input.with_status(BillingStateStatus::Returned);

        let only_owner = return_tx(&input, output.clone(), vec![input.owner.owning_key]);
        assert!(BillingContract.validate(&only_owner).is_err());

        let dup = vec![input.owner.owning_key, input.owner.owning_key, input.issuer.owning_key];
        assert!(BillingContract.validate(&return_tx(&input, output.clone(), dup)).is_err());

        assert!(BillingContract.validate(&return_tx(&input, output, vec![])).is_err());
    }

    #[test]
    fn test_self_issued_state_cannot_be_returned() {
        let holder = party("Holder");
        let input = BillingState::new(holder.clone(), holder, 10, UniqueIdentifier::new());
        let tx = return_tx(&input, input.with_status(BillingStateStatus::Returned), keys(&input));
        assert!(BillingContract.validate(&tx).is_err());
    }

    #[test]
    fn test_attach_chips_adds_amounts() {
        let input = active();
        let c1 = chip(&input, 10);
        let c2 = chip(&input, 15);
        let output = BillingState {
            spent: 25,
            ..input.clone()
        };
        let tx = TransactionBuilder::new(party("Notary"))
            .add_input_state(sar(input.clone()))
            .add_input_state(sar(c1))
            .add_input_state(sar(c2))
            .add_output_state(output)
            .add_command(CommandKind::AttachChips, vec![input.owner.owning_key])
            .to_wire_transaction()
            .unwrap();
        assert_eq!(BillingContract.validate(&tx), Ok(()));
    }

    #[test]
    fn test_attach_chips_rejects_wrong_total_and_foreign_chip() {
        let input = active();
        let other = active();
        let tx = TransactionBuilder::new(party("Notary"))
            .add_input_state(sar(input.clone()))
            .add_input_state(sar(chip(&input, 10)))
            .add_output_state(BillingState {
                spent: 11,
                ..input.clone()
            })
            .add_command(CommandKind::AttachChips, vec![input.owner.owning_key])
            .to_wire_transaction()
            .unwrap();
        assert!(BillingContract.validate(&tx).is_err());

        let tx = TransactionBuilder::new(party("Notary"))
            .add_input_state(sar(input.clone()))
            .add_input_state(sar(chip(&other, 10)))
            .add_output_state(BillingState {
                spent: 10,
                ..input.clone()
            })
            .add_command(CommandKind::AttachChips, vec![input.owner.owning_key])
            .to_wire_transaction()
            .unwrap();
        assert_eq!(
            BillingContract.validate(&tx),
            Err("Every chip should belong to the billing state".to_string())
        );
    }

    #[test]
    fn test_attach_chips_respects_limit() {
        let input = active();
        let tx = TransactionBuilder::new(party("Notary"))
            .add_input_state(sar(input.clone()))
            .add_input_state(sar(chip(&input, 150)))
            .add_output_state(BillingState {
                spent: 150,
                ..input.clone()
            })
            .add_command(CommandKind::AttachChips, vec![input.owner.owning_key])
            .to_wire_transaction()
            .unwrap();
        assert_eq!(
            BillingContract.validate(&tx),
            Err("Spent amount should not exceed the billing state amount".to_string())
        );
    }
}
