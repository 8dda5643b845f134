//! # Transaction Metadata
//!
//! Per-command circuit configuration: which circuit proves the command, how
//! many input and reference slots it has, which components stay visible and
//! which state pads unused slots.
//!
//! A transaction may carry several commands. Its [`TransactionMetadata`]
//! aggregates them in command-name order: slot counts are the maximum over
//! commands, visibility and filler come from the first command.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use zkl_core::{DigestAlgorithm, SecureHash, StateRef};
use zkl_crypto::PrivacySalt;
use zkl_zkp::CircuitDescriptor;

use crate::error::LedgerError;
use crate::public_input::{pad_slots, PaddedSlot};
use crate::transaction::{
    Command, TimeWindow, TransactionComponents, TransactionState, WireTransaction,
};
use crate::visibility::VisibilityPolicy;

/// Circuit configuration for one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandMetadata {
    pub command_name: String,
    pub circuit: CircuitDescriptor,
    /// Input slots in the circuit.
    pub num_inputs: usize,
    /// Reference slots in the circuit.
    pub num_references: usize,
    #[serde(default)]
    pub visibility: VisibilityPolicy,
    /// State hashed into unused slots. Required whenever a transaction
    /// leaves a slot empty.
    #[serde(default)]
    pub filler_output: Option<TransactionState>,
}

impl CommandMetadata {
    pub fn new(
        command_name: impl Into<String>,
        circuit: CircuitDescriptor,
        num_inputs: usize,
        num_references: usize,
    ) -> Self {
        Self {
            command_name: command_name.into(),
            circuit,
            num_inputs,
            num_references,
            visibility: VisibilityPolicy::default(),
            filler_output: None,
        }
    }

    pub fn with_visibility(mut self, visibility: VisibilityPolicy) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_filler(mut self, filler: TransactionState) -> Self {
        self.filler_output = Some(filler);
        self
    }
}

/// The metadata of all commands of one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionMetadata {
    commands: Vec<CommandMetadata>,
}

impl TransactionMetadata {
    /// Aggregate `commands`. Order does not matter; they are sorted by name.
    pub fn new(mut commands: Vec<CommandMetadata>) -> Result<Self, LedgerError> {
        if commands.is_empty() {
            return Err(LedgerError::Structural(
                "transaction metadata needs at least one command".into(),
            ));
        }
        commands.sort_by(|a, b| a.command_name.cmp(&b.command_name));
        commands.dedup_by(|a, b| a.command_name == b.command_name);
        Ok(Self { commands })
    }

    /// Per-command metadata, sorted by command name.
    pub fn commands(&self) -> &[CommandMetadata] {
        &self.commands
    }

    fn primary(&self) -> &CommandMetadata {
        &self.commands[0]
    }

    pub fn num_inputs(&self) -> usize {
        self.commands.iter().map(|c| c.num_inputs).max().unwrap_or(0)
    }

    pub fn num_references(&self) -> usize {
        self.commands.iter().map(|c| c.num_references).max().unwrap_or(0)
    }

    pub fn visibility(&self) -> &VisibilityPolicy {
        &self.primary().visibility
    }

    pub fn filler_output(&self) -> Option<&TransactionState> {
        self.primary().filler_output.as_ref()
    }

    /// Serialized filler state, if one is configured.
    pub fn filler_bytes(&self) -> Result<Option<Vec<u8>>, LedgerError> {
        self.filler_output().map(TransactionState::to_bytes).transpose()
    }

    pub fn input_slots(&self, inputs: &[StateRef]) -> Result<Vec<PaddedSlot>, LedgerError> {
        pad_slots(inputs, self.num_inputs(), "inputs")
    }

    pub fn reference_slots(&self, references: &[StateRef]) -> Result<Vec<PaddedSlot>, LedgerError> {
        pad_slots(references, self.num_references(), "references")
    }
}

/// Command metadata keyed by command name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataRegistry {
    commands: BTreeMap<String, CommandMetadata>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `metadata`, replacing any earlier entry for the same command.
    pub fn register(&mut self, metadata: CommandMetadata) -> &mut Self {
        self.commands
            .insert(metadata.command_name.clone(), metadata);
        self
    }

    pub fn get(&self, command_name: &str) -> Option<&CommandMetadata> {
        self.commands.get(command_name)
    }

    pub fn command_names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Look up a command, failing with a structural error if it is unknown.
    pub fn require(&self, command_name: &str) -> Result<&CommandMetadata, LedgerError> {
        self.get(command_name).ok_or_else(|| {
            LedgerError::Structural(format!("no metadata registered for command {command_name}"))
        })
    }

    /// Aggregate the metadata of `names`.
    pub fn for_commands<I, S>(&self, names: I) -> Result<TransactionMetadata, LedgerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let commands = names
            .into_iter()
            .map(|n| self.require(n.as_ref()).cloned())
            .collect::<Result<Vec<_>, _>>()?;
        TransactionMetadata::new(commands)
    }

    /// Aggregate the metadata of every command in `tx`.
    pub fn for_transaction(&self, tx: &WireTransaction) -> Result<TransactionMetadata, LedgerError> {
        self.for_commands(tx.command_names()?)
    }
}

/// Builds transactions that fit their circuits.
///
/// Wraps a [`TransactionComponents`] and forwards to it; [`Self::build`]
/// additionally checks the result against the registered metadata.
#[derive(Debug, Clone)]
pub struct ZkTransactionBuilder<'r> {
    registry: &'r MetadataRegistry,
    components: TransactionComponents,
}

impl<'r> ZkTransactionBuilder<'r> {
    pub fn new(registry: &'r MetadataRegistry, algorithm: DigestAlgorithm) -> Self {
        Self {
            registry,
            components: TransactionComponents::new(algorithm),
        }
    }

    /// The wrapped plain builder, read-only.
    pub fn components(&self) -> &TransactionComponents {
        &self.components
    }

    pub fn add_input(&mut self, state_ref: StateRef) -> &mut Self {
        self.components.add_input(state_ref);
        self
    }

    pub fn add_reference(&mut self, state_ref: StateRef) -> &mut Self {
        self.components.add_reference(state_ref);
        self
    }

    pub fn add_output(&mut self, state: TransactionState) -> &mut Self {
        self.components.add_output(state);
        self
    }

    pub fn add_command(&mut self, command: Command) -> &mut Self {
        self.components.add_command(command);
        self
    }

    pub fn add_attachment(&mut self, attachment: SecureHash) -> &mut Self {
        self.components.add_attachment(attachment);
        self
    }

    pub fn set_notary(&mut self, notary: impl Into<String>) -> &mut Self {
        self.components.set_notary(notary);
        self
    }

    pub fn set_time_window(&mut self, window: TimeWindow) -> &mut Self {
        self.components.set_time_window(window);
        self
    }

    pub fn set_parameters(&mut self, parameters: SecureHash) -> &mut Self {
        self.components.set_parameters(parameters);
        self
    }

    /// Metadata of the commands added so far.
    pub fn metadata(&self) -> Result<TransactionMetadata, LedgerError> {
        self.registry
            .for_commands(self.components.commands().iter().map(|c| c.name.as_str()))
    }

    /// Build the transaction.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Structural`] if a command is unregistered, the inputs
    /// or references exceed the circuit's slots, the visibility policy hides
    /// an input or reference, or slots need padding and no filler is set.
    pub fn build(&self, salt: PrivacySalt) -> Result<WireTransaction, LedgerError> {
        let metadata = self.metadata()?;
        let inputs = self.components.inputs();
        let references = self.components.references();
        let pads = metadata.input_slots(inputs)?.contains(&PaddedSlot::Filler)
            || metadata
                .reference_slots(references)?
                .contains(&PaddedSlot::Filler);
        if pads && metadata.filler_output().is_none() {
            return Err(LedgerError::Structural(format!(
                "command {} pads unused slots but has no filler state",
                metadata.commands()[0].command_name
            )));
        }
        metadata
            .visibility()
            .check_chain_visible(inputs.len(), references.len())?;
        self.components.build(salt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CommitmentError;
    use zkl_core::ComponentGroupEnum;

    fn circuit(name: &str) -> CircuitDescriptor {
        CircuitDescriptor::new(name, format!("/circuits/{name}"))
    }

    fn registry() -> MetadataRegistry {
        let mut r = MetadataRegistry::new();
        r.register(
            CommandMetadata::new("Move", circuit("move"), 2, 1)
                .with_filler(TransactionState::new("Cash", vec![0; 4])),
        )
        .register(
            CommandMetadata::new("Issue", circuit("issue"), 0, 0)
                .with_visibility(VisibilityPolicy::all_public()),
        );
        r
    }

    fn salt() -> PrivacySalt {
        PrivacySalt::from_bytes([8u8; 32]).unwrap()
    }

    #[test]
    fn aggregation_sorts_and_takes_max() {
        let m = registry().for_commands(["Move", "Issue"]).unwrap();
        let names: Vec<_> = m.commands().iter().map(|c| c.command_name.as_str()).collect();
        assert_eq!(names, ["Issue", "Move"]);
        assert_eq!(m.num_inputs(), 2);
        assert_eq!(m.num_references(), 1);
        // "Issue" sorts first, so its policy and (absent) filler apply.
        assert_eq!(m.visibility(), &VisibilityPolicy::all_public());
        assert!(m.filler_output().is_none());
    }

    #[test]
    fn duplicate_commands_collapse() {
        let m = registry().for_commands(["Move", "Move"]).unwrap();
        assert_eq!(m.commands().len(), 1);
    }

    #[test]
    fn unknown_or_missing_commands_are_structural() {
        let r = registry();
        assert!(matches!(
            r.for_commands(["Burn"]).unwrap_err(),
            LedgerError::Structural(_)
        ));
        assert!(matches!(
            r.for_commands(Vec::<String>::new()).unwrap_err(),
            LedgerError::Structural(_)
        ));
    }

    #[test]
    fn builder_enforces_capacity() {
        let r = registry();
        let alg = DigestAlgorithm::Sha256;
        let mut b = ZkTransactionBuilder::new(&r, alg);
        b.add_command(Command::new("Move", vec![]));
        for i in 0..3 {
            b.add_input(StateRef::new(alg.digest(b"prev"), i));
        }
        assert!(matches!(b.build(salt()).unwrap_err(), LedgerError::Structural(_)));
    }

    #[test]
    fn builder_requires_filler_for_padding() {
        let mut r = MetadataRegistry::new();
        r.register(CommandMetadata::new("Move", circuit("move"), 1, 0));
        let mut b = ZkTransactionBuilder::new(&r, DigestAlgorithm::Sha256);
        b.add_command(Command::new("Move", vec![]));
        let err = b.build(salt()).unwrap_err();
        assert!(err.to_string().contains("filler"));
    }

    #[test]
    fn builder_rejects_policy_hiding_inputs() {
        let mut r = MetadataRegistry::new();
        r.register(
            CommandMetadata::new("Move", circuit("move"), 1, 0).with_visibility(
                VisibilityPolicy::default().with_group(ComponentGroupEnum::Inputs, false),
            ),
        );
        let alg = DigestAlgorithm::Sha256;
        let mut b = ZkTransactionBuilder::new(&r, alg);
        b.add_command(Command::new("Move", vec![]))
            .add_input(StateRef::new(alg.digest(b"prev"), 0));
        assert!(matches!(
            b.build(salt()).unwrap_err(),
            LedgerError::Commitment(CommitmentError::HiddenChainComponent { .. })
        ));
    }

    #[test]
    fn builder_produces_plain_transaction() {
        let r = registry();
        let alg = DigestAlgorithm::Sha256;
        let mut b = ZkTransactionBuilder::new(&r, alg);
        b.add_command(Command::new("Move", vec![]))
            .add_input(StateRef::new(alg.digest(b"prev"), 0))
            .add_output(TransactionState::new("Cash", vec![1, 2, 3, 4]));
        let tx = b.build(salt()).unwrap();
        assert_eq!(tx.id(), b.components().build(salt()).unwrap().id());
        assert_eq!(r.for_transaction(&tx).unwrap().num_inputs(), 2);
    }

    #[test]
    fn registry_serializes_as_map() {
        let r = registry();
        let json = serde_json::to_value(&r).unwrap();
        assert!(json.get("Move").is_some());
        let back: MetadataRegistry = serde_json::from_value(json).unwrap();
        assert_eq!(back, r);
    }
}
