//! Transactions: proposed swaps of consumed versions for produced ones
//!
//! A [`WireTransaction`] is immutable once built; its id is the SHA-256 of its
//! bincode encoding. Endorsements accumulate on a [`SignedTransaction`] as
//! the transaction travels between parties, and the notary's signature is the
//! last one added.

use super::identity::{KeyPair, Party, PublicKey};
use super::state::{LedgerState, SecureHash, StateAndRef, StateRef};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    /// Hand the billing state back to its issuer
    Return,
    /// Fold unspent chips into their billing state
    AttachChips,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Return => write!(f, "Return"),
            Self::AttachChips => write!(f, "AttachChips"),
        }
    }
}

/// Authorization intent plus the keys that must endorse it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub kind: CommandKind,
    pub signers: Vec<PublicKey>,
}

impl Command {
    pub fn new(kind: CommandKind, signers: Vec<PublicKey>) -> Self {
        Self { kind, signers }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireTransaction {
    pub inputs: Vec<StateAndRef<LedgerState>>,
    pub outputs: Vec<LedgerState>,
    pub command: Command,
    pub notary: Party,
    pub privacy_salt: [u8; 32],
}

impl WireTransaction {
    pub fn id(&self) -> SecureHash {
        // Encoding plain owned data into a Vec cannot fail
        let encoded = bincode::serialize(self).unwrap_or_default();
        SecureHash::from_bytes(Sha256::digest(&encoded).into())
    }

    pub fn input_refs(&self) -> Vec<StateRef> {
        self.inputs.iter().map(|i| i.state_ref).collect()
    }

    /// Output `index` addressed as the version this transaction creates
    pub fn out_ref(&self, index: usize) -> Option<StateAndRef<LedgerState>> {
        self.outputs
            .get(index)
            .map(|s| StateAndRef::new(s.clone(), StateRef::new(self.id(), index as u32)))
    }

    pub fn required_signers(&self) -> &[PublicKey] {
        &self.command.signers
    }
}

/// Accumulates inputs, outputs and a command before freezing them
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    notary: Party,
    inputs: Vec<StateAndRef<LedgerState>>,
    outputs: Vec<LedgerState>,
    command: Option<Command>,
}

impl TransactionBuilder {
    pub fn new(notary: Party) -> Self {
        Self {
            notary,
            inputs: Vec::new(),
            outputs: Vec::new(),
            command: None,
        }
    }

    pub fn add_input_state(mut self, input: StateAndRef<LedgerState>) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn add_output_state(mut self, output: impl Into<LedgerState>) -> Self {
        self.outputs.push(output.into());
        self
    }

    pub fn add_command(mut self, kind: CommandKind, signers: Vec<PublicKey>) -> Self {
        self.command = Some(Command::new(kind, signers));
        self
    }

    /// Freeze into a wire transaction; `None` if no command was added
    pub fn to_wire_transaction(self) -> Option<WireTransaction> {
        let command = self.command?;
        Some(WireTransaction {
            inputs: self.inputs,
            outputs: self.outputs,
            command,
            notary: self.notary,
            privacy_salt: rand::random(),
        })
    }
}

/// One party's endorsement of a transaction id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSignature {
    pub by: PublicKey,
    pub bytes: Vec<u8>,
}

impl TransactionSignature {
    pub fn create(keys: &KeyPair, tx_id: &SecureHash) -> Self {
        Self {
            by: keys.public_key(),
            bytes: keys.sign(tx_id.as_bytes()),
        }
    }

    pub fn is_valid_for(&self, tx_id: &SecureHash) -> bool {
        self.by.verify(tx_id.as_bytes(), &self.bytes)
    }
}

/// Problems with the signature set of a transaction
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing signatures from {0:?}")]
    Missing(Vec<PublicKey>),

    #[error("duplicate signature from {0}")]
    Duplicate(PublicKey),

    #[error("invalid signature from {0}")]
    Invalid(PublicKey),

    #[error("signature from {0} which is not a required signer")]
    Unexpected(PublicKey),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub tx: WireTransaction,
    pub sigs: Vec<TransactionSignature>,
}

impl SignedTransaction {
    /// Sign `tx` with the initiator's key
    pub fn sign_initial(tx: WireTransaction, keys: &KeyPair) -> Result<Self, SignatureError> {
        let sig = TransactionSignature::create(keys, &tx.id());
        Self {
            tx,
            sigs: Vec::new(),
        }
        .with_signature(sig)
    }

    pub fn id(&self) -> SecureHash {
        self.tx.id()
    }

    /// Append an endorsement
    ///
    /// The signer must be a required signer or the notary, may sign only
    /// once, and the signature must verify against the transaction id.
    pub fn with_signature(mut self, sig: TransactionSignature) -> Result<Self, SignatureError> {
        let required = self.tx.required_signers().contains(&sig.by);
        if !required && sig.by != self.tx.notary.owning_key {
            return Err(SignatureError::Unexpected(sig.by));
        }
        if self.sigs.iter().any(|s| s.by == sig.by) {
            return Err(SignatureError::Duplicate(sig.by));
        }
        if !sig.is_valid_for(&self.id()) {
            return Err(SignatureError::Invalid(sig.by));
        }
        self.sigs.push(sig);
        Ok(self)
    }

    pub fn is_signed_by(&self, key: &PublicKey) -> bool {
        self.sigs.iter().any(|s| &s.by == key)
    }

    /// Verify every signature present and that all required signers, apart
    /// from `allowed_missing`, have signed
    pub fn verify_required_signatures_except(
        &self,
        allowed_missing: &[PublicKey],
    ) -> Result<(), SignatureError> {
        let id = self.id();
        let mut seen = BTreeSet::new();
        for sig in &self.sigs {
            if !seen.insert(sig.by) {
                return Err(SignatureError::Duplicate(sig.by));
            }
            if !sig.is_valid_for(&id) {
                return Err(SignatureError::Invalid(sig.by));
            }
        }
        let missing: Vec<PublicKey> = self
            .tx
            .required_signers()
            .iter()
            .filter(|k| !seen.contains(*k) && !allowed_missing.contains(*k))
            .copied()
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SignatureError::Missing(missing))
        }
    }

    /// Every required signer and the notary have signed
    pub fn verify_finalized(&self) -> Result<(), SignatureError> {
        self.verify_required_signatures_except(&[])?;
        if self.is_signed_by(&self.tx.notary.owning_key) {
            Ok(())
        } else {
            Err(SignatureError::Missing(vec![self.tx.notary.owning_key]))
        }
    }
}
