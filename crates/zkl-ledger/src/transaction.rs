//! # Plain Transactions
//!
//! A [`WireTransaction`] is the plaintext form: component groups of opaque
//! serialized components, a privacy salt and the digest algorithm. Its id is
//! the root of a two-level Merkle tree:
//!
//! ```text
//! nonce(g, i)   = H(salt || be32(g) || be32(i))
//! leaf(g, i)    = H(nonce(g, i) || component(g, i))
//! group_root(g) = merkle(leaf(g, 0..n))          all-ones if g is absent or empty
//! id            = merkle(group_root(0..=max_g))
//! ```
//!
//! [`TransactionComponents`] is the typed builder. It fixes the byte encoding
//! of each group: state references as 36-byte [`StateRef`] encodings,
//! outputs as header-prefixed [`TransactionState`]s, everything else as
//! [`CanonicalBytes`].

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use zkl_core::{CanonicalBytes, ComponentGroupEnum, CoreError, DigestAlgorithm, SecureHash, StateRef};
use zkl_crypto::{component_hash, compute_nonce, merkle::merkle_root, Ed25519PublicKey, PrivacySalt};

use crate::error::{CommitmentError, LedgerError};

/// The serialized components of one group, in component order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentGroup {
    pub group_index: u32,
    #[serde(with = "crate::encoding::hex_bytes_vec")]
    pub components: Vec<Vec<u8>>,
}

impl ComponentGroup {
    pub fn new(group: ComponentGroupEnum, components: Vec<Vec<u8>>) -> Self {
        Self {
            group_index: group.ordinal(),
            components,
        }
    }
}

/// An output state: the state class name followed by the state's own bytes.
///
/// Wire form: `be16(len(class_name)) || class_name (UTF-8) || data`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionState {
    pub class_name: String,
    #[serde(with = "crate::encoding::hex_bytes")]
    pub data: Vec<u8>,
}

impl TransactionState {
    pub fn new(class_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            class_name: class_name.into(),
            data,
        }
    }

    /// Encode with the class-name header.
    pub fn to_bytes(&self) -> Result<Vec<u8>, LedgerError> {
        let name = self.class_name.as_bytes();
        let len = u16::try_from(name.len()).map_err(|_| {
            LedgerError::Structural(format!(
                "state class name is {} bytes, at most {} allowed",
                name.len(),
                u16::MAX
            ))
        })?;
        let mut out = Vec::with_capacity(2 + name.len() + self.data.len());
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(name);
        out.extend_from_slice(&self.data);
        Ok(out)
    }

    /// Decode a header-prefixed state.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        let header: [u8; 2] = bytes
            .get(..2)
            .and_then(|h| h.try_into().ok())
            .ok_or_else(|| CoreError::InvalidEncoding("missing state header".into()))?;
        let len = u16::from_be_bytes(header) as usize;
        let name = bytes
            .get(2..2 + len)
            .ok_or_else(|| CoreError::InvalidEncoding("truncated state class name".into()))?;
        let class_name = std::str::from_utf8(name).map_err(|e| {
            CoreError::InvalidEncoding(format!("state class name is not UTF-8: {e}"))
        })?;
        Ok(Self {
            class_name: class_name.to_string(),
            data: bytes[2 + len..].to_vec(),
        })
    }
}

/// A command: a named action plus its signers. The data travels in the
/// commands group, the signers in the signers group at the same index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub name: String,
    pub data: serde_json::Value,
    pub signers: Vec<Ed25519PublicKey>,
}

impl Command {
    pub fn new(name: impl Into<String>, signers: Vec<Ed25519PublicKey>) -> Self {
        Self {
            name: name.into(),
            data: serde_json::Value::Null,
            signers,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

#[derive(Serialize, Deserialize)]
struct CommandComponent {
    name: String,
    data: serde_json::Value,
}

/// Validity interval in epoch seconds; either bound may be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub from: Option<u64>,
    pub until: Option<u64>,
}

/// The plaintext transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireRecord", into = "WireRecord")]
pub struct WireTransaction {
    groups: Vec<ComponentGroup>,
    privacy_salt: PrivacySalt,
    algorithm: DigestAlgorithm,
    id: SecureHash,
}

#[derive(Serialize, Deserialize)]
struct WireRecord {
    algorithm: DigestAlgorithm,
    privacy_salt: PrivacySalt,
    groups: Vec<ComponentGroup>,
}

impl TryFrom<WireRecord> for WireTransaction {
    type Error = LedgerError;

    fn try_from(r: WireRecord) -> Result<Self, Self::Error> {
        Self::new(r.groups, r.privacy_salt, r.algorithm)
    }
}

impl From<WireTransaction> for WireRecord {
    fn from(tx: WireTransaction) -> Self {
        Self {
            algorithm: tx.algorithm,
            privacy_salt: tx.privacy_salt,
            groups: tx.groups,
        }
    }
}

impl WireTransaction {
    /// Assemble a transaction. Groups are sorted by index; empty groups are
    /// dropped since they commit exactly like absent ones.
    pub fn new(
        mut groups: Vec<ComponentGroup>,
        privacy_salt: PrivacySalt,
        algorithm: DigestAlgorithm,
    ) -> Result<Self, LedgerError> {
        groups.retain(|g| !g.components.is_empty());
        groups.sort_by_key(|g| g.group_index);
        let mut seen = BTreeSet::new();
        for g in &groups {
            if !seen.insert(g.group_index) {
                return Err(CommitmentError::DuplicateGroup(g.group_index).into());
            }
        }
        let id = compute_id(&groups, &privacy_salt, algorithm)?;
        Ok(Self {
            groups,
            privacy_salt,
            algorithm,
            id,
        })
    }

    /// The transaction id: the top-level Merkle root.
    pub fn id(&self) -> SecureHash {
        self.id
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    pub fn privacy_salt(&self) -> &PrivacySalt {
        &self.privacy_salt
    }

    /// Non-empty groups, ordered by index.
    pub fn groups(&self) -> &[ComponentGroup] {
        &self.groups
    }

    pub fn group_by_index(&self, group_index: u32) -> Option<&ComponentGroup> {
        self.groups.iter().find(|g| g.group_index == group_index)
    }

    /// Components of `group`; empty when the group is absent.
    pub fn components(&self, group: ComponentGroupEnum) -> &[Vec<u8>] {
        self.group_by_index(group.ordinal())
            .map_or(&[][..], |g| g.components.as_slice())
    }

    /// The nonce of component `index` in group `group_index`.
    pub fn nonce(&self, group_index: u32, index: u32) -> SecureHash {
        compute_nonce(self.algorithm, &self.privacy_salt, group_index, index)
    }

    /// Leaf hashes of one group in component order.
    pub fn component_hashes(&self, group_index: u32) -> Vec<SecureHash> {
        self.group_by_index(group_index)
            .map(|g| leaf_hashes(g, &self.privacy_salt, self.algorithm))
            .unwrap_or_default()
    }

    pub fn inputs(&self) -> Result<Vec<StateRef>, LedgerError> {
        decode_state_refs(self.components(ComponentGroupEnum::Inputs), self.algorithm)
    }

    pub fn references(&self) -> Result<Vec<StateRef>, LedgerError> {
        decode_state_refs(self.components(ComponentGroupEnum::References), self.algorithm)
    }

    pub fn outputs(&self) -> Result<Vec<TransactionState>, LedgerError> {
        self.components(ComponentGroupEnum::Outputs)
            .iter()
            .map(|b| TransactionState::from_bytes(b).map_err(LedgerError::from))
            .collect()
    }

    /// Serialized bytes of output `index`.
    pub fn output_bytes(&self, index: u32) -> Option<&[u8]> {
        self.components(ComponentGroupEnum::Outputs)
            .get(index as usize)
            .map(Vec::as_slice)
    }

    /// Command names in command order.
    pub fn command_names(&self) -> Result<Vec<String>, LedgerError> {
        self.components(ComponentGroupEnum::Commands)
            .iter()
            .map(|b| {
                serde_json::from_slice::<CommandComponent>(b)
                    .map(|c| c.name)
                    .map_err(LedgerError::from)
            })
            .collect()
    }

    /// Public keys that must sign, across all commands, deduplicated.
    pub fn required_signers(&self) -> Result<Vec<Ed25519PublicKey>, LedgerError> {
        let mut keys = BTreeSet::new();
        for b in self.components(ComponentGroupEnum::Signers) {
            let signers: Vec<Ed25519PublicKey> = serde_json::from_slice(b)?;
            keys.extend(signers);
        }
        Ok(keys.into_iter().collect())
    }
}

fn leaf_hashes(
    group: &ComponentGroup,
    salt: &PrivacySalt,
    algorithm: DigestAlgorithm,
) -> Vec<SecureHash> {
    group
        .components
        .iter()
        .enumerate()
        .map(|(i, bytes)| {
            let nonce = compute_nonce(algorithm, salt, group.group_index, i as u32);
            component_hash(&nonce, bytes)
        })
        .collect()
}

fn compute_id(
    groups: &[ComponentGroup],
    salt: &PrivacySalt,
    algorithm: DigestAlgorithm,
) -> Result<SecureHash, LedgerError> {
    let Some(max) = groups.iter().map(|g| g.group_index).max() else {
        return Ok(merkle_root(algorithm, &[])?);
    };
    let mut roots = Vec::with_capacity(max as usize + 1);
    for index in 0..=max {
        let root = match groups.iter().find(|g| g.group_index == index) {
            Some(g) if !g.components.is_empty() => {
                merkle_root(algorithm, &leaf_hashes(g, salt, algorithm))?
            }
            _ => algorithm.all_ones_hash(),
        };
        roots.push(root);
    }
    Ok(merkle_root(algorithm, &roots)?)
}

fn decode_state_refs(
    components: &[Vec<u8>],
    algorithm: DigestAlgorithm,
) -> Result<Vec<StateRef>, LedgerError> {
    components
        .iter()
        .map(|b| StateRef::from_bytes(algorithm, b).map_err(LedgerError::from))
        .collect()
}

/// Typed builder for a [`WireTransaction`].
#[derive(Debug, Clone, Default)]
pub struct TransactionComponents {
    algorithm: DigestAlgorithm,
    inputs: Vec<StateRef>,
    references: Vec<StateRef>,
    outputs: Vec<TransactionState>,
    commands: Vec<Command>,
    attachments: Vec<SecureHash>,
    notary: Option<String>,
    time_window: Option<TimeWindow>,
    parameters: Option<SecureHash>,
}

impl TransactionComponents {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        Self {
            algorithm,
            ..Self::default()
        }
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    pub fn add_input(&mut self, state_ref: StateRef) -> &mut Self {
        self.inputs.push(state_ref);
        self
    }

    pub fn add_reference(&mut self, state_ref: StateRef) -> &mut Self {
        self.references.push(state_ref);
        self
    }

    pub fn add_output(&mut self, state: TransactionState) -> &mut Self {
        self.outputs.push(state);
        self
    }

    pub fn add_command(&mut self, command: Command) -> &mut Self {
        self.commands.push(command);
        self
    }

    pub fn add_attachment(&mut self, attachment: SecureHash) -> &mut Self {
        self.attachments.push(attachment);
        self
    }

    pub fn set_notary(&mut self, notary: impl Into<String>) -> &mut Self {
        self.notary = Some(notary.into());
        self
    }

    pub fn set_time_window(&mut self, window: TimeWindow) -> &mut Self {
        self.time_window = Some(window);
        self
    }

    pub fn set_parameters(&mut self, parameters: SecureHash) -> &mut Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn inputs(&self) -> &[StateRef] {
        &self.inputs
    }

    pub fn references(&self) -> &[StateRef] {
        &self.references
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Serialize every group and compute the id.
    pub fn build(&self, salt: PrivacySalt) -> Result<WireTransaction, LedgerError> {
        use ComponentGroupEnum as G;

        let mut commands = Vec::with_capacity(self.commands.len());
        let mut signers = Vec::with_capacity(self.commands.len());
        for c in &self.commands {
            commands.push(canonical(&CommandComponent {
                name: c.name.clone(),
                data: c.data.clone(),
            })?);
            signers.push(canonical(&c.signers)?);
        }

        let groups = vec![
            ComponentGroup::new(G::Inputs, self.inputs.iter().map(StateRef::to_bytes).collect()),
            ComponentGroup::new(
                G::Outputs,
                self.outputs
                    .iter()
                    .map(TransactionState::to_bytes)
                    .collect::<Result<_, _>>()?,
            ),
            ComponentGroup::new(G::Commands, commands),
            ComponentGroup::new(
                G::Attachments,
                self.attachments.iter().map(|h| h.as_bytes().to_vec()).collect(),
            ),
            ComponentGroup::new(
                G::Notary,
                self.notary.iter().map(canonical).collect::<Result<_, _>>()?,
            ),
            ComponentGroup::new(
                G::TimeWindow,
                self.time_window.iter().map(canonical).collect::<Result<_, _>>()?,
            ),
            ComponentGroup::new(G::Signers, signers),
            ComponentGroup::new(
                G::References,
                self.references.iter().map(StateRef::to_bytes).collect(),
            ),
            ComponentGroup::new(
                G::Parameters,
                self.parameters.iter().map(|h| h.as_bytes().to_vec()).collect(),
            ),
        ];
        WireTransaction::new(groups, salt, self.algorithm)
    }
}

fn canonical<T: Serialize>(value: &T) -> Result<Vec<u8>, LedgerError> {
    Ok(CanonicalBytes::new(value)?.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use zkl_crypto::Ed25519KeyPair;

    fn salt() -> PrivacySalt {
        PrivacySalt::from_bytes([3u8; 32]).unwrap()
    }

    fn sample() -> WireTransaction {
        let key = Ed25519KeyPair::from_seed(&[1u8; 32]).public_key();
        let mut c = TransactionComponents::new(DigestAlgorithm::Sha256);
        c.add_input(StateRef::new(DigestAlgorithm::Sha256.digest(b"prev"), 0))
            .add_output(TransactionState::new("Cash", vec![1, 2, 3]))
            .add_output(TransactionState::new("Cash", vec![4, 5]))
            .add_command(Command::new("Move", vec![key]))
            .set_notary("O=Notary");
        c.build(salt()).unwrap()
    }

    #[test]
    fn state_header_roundtrip() {
        let state = TransactionState::new("com.example.Cash", vec![9, 8, 7]);
        let bytes = state.to_bytes().unwrap();
        assert_eq!(&bytes[..2], &[0, 16]);
        assert_eq!(TransactionState::from_bytes(&bytes).unwrap(), state);
    }

    #[test]
    fn truncated_state_header_is_rejected() {
        assert!(TransactionState::from_bytes(&[0]).is_err());
        assert!(TransactionState::from_bytes(&[0, 5, b'a']).is_err());
    }

    #[test]
    fn id_is_deterministic_and_salt_dependent() {
        let a = sample();
        let b = sample();
        assert_eq!(a.id(), b.id());

        let mut c = TransactionComponents::new(DigestAlgorithm::Sha256);
        c.add_output(TransactionState::new("Cash", vec![1]));
        let one = c.build(salt()).unwrap();
        let two = c.build(PrivacySalt::from_bytes([4u8; 32]).unwrap()).unwrap();
        assert_ne!(one.id(), two.id());
    }

    #[test]
    fn id_substitutes_all_ones_for_absent_groups() {
        let tx = sample();
        let alg = tx.algorithm();
        let max = tx.groups().last().unwrap().group_index;
        let roots: Vec<_> = (0..=max)
            .map(|g| {
                let hashes = tx.component_hashes(g);
                if hashes.is_empty() {
                    alg.all_ones_hash()
                } else {
                    merkle_root(alg, &hashes).unwrap()
                }
            })
            .collect();
        assert_eq!(tx.id(), merkle_root(alg, &roots).unwrap());
        assert!(tx.group_by_index(ComponentGroupEnum::Attachments.ordinal()).is_none());
    }

    #[test]
    fn decoders_read_back_typed_components() {
        let tx = sample();
        assert_eq!(tx.inputs().unwrap().len(), 1);
        assert!(tx.references().unwrap().is_empty());
        assert_eq!(tx.outputs().unwrap()[1].data, vec![4, 5]);
        assert_eq!(tx.command_names().unwrap(), vec!["Move".to_string()]);
        assert_eq!(tx.required_signers().unwrap().len(), 1);
        assert!(tx.output_bytes(2).is_none());
    }

    #[test]
    fn duplicate_groups_are_rejected() {
        let groups = vec![
            ComponentGroup::new(ComponentGroupEnum::Outputs, vec![vec![1]]),
            ComponentGroup::new(ComponentGroupEnum::Outputs, vec![vec![2]]),
        ];
        let err = WireTransaction::new(groups, salt(), DigestAlgorithm::Sha256).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Commitment(CommitmentError::DuplicateGroup(1))
        ));
    }

    #[test]
    fn empty_transaction_has_zero_hash_id() {
        let tx = WireTransaction::new(vec![], salt(), DigestAlgorithm::Sha256).unwrap();
        assert_eq!(tx.id(), DigestAlgorithm::Sha256.zero_hash());
    }

    #[test]
    fn serde_roundtrip_recomputes_id() {
        let tx = sample();
        let json = serde_json::to_string(&tx).unwrap();
        let back: WireTransaction = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id(), tx.id());
        assert_eq!(back, tx);
    }
}
