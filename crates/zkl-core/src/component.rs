//! # Component Groups
//!
//! A transaction is an ordered list of component groups. The ordinal of each
//! group is fixed: it is the leaf position of the group's root in the
//! top-level Merkle tree, so reordering this enum changes every transaction id.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// The component groups of a transaction, by ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentGroupEnum {
    /// Consumed states, encoded as [`StateRef`](crate::StateRef)s.
    Inputs,
    /// Created states.
    Outputs,
    /// Commands.
    Commands,
    /// Attachment ids.
    Attachments,
    /// The notary.
    Notary,
    /// The time window.
    TimeWindow,
    /// Required signer keys, one entry per command.
    Signers,
    /// Referenced (read, not consumed) states.
    References,
    /// Network parameters hash.
    Parameters,
}

impl ComponentGroupEnum {
    /// Every group, in ordinal order.
    pub const ALL: [ComponentGroupEnum; 9] = [
        Self::Inputs,
        Self::Outputs,
        Self::Commands,
        Self::Attachments,
        Self::Notary,
        Self::TimeWindow,
        Self::Signers,
        Self::References,
        Self::Parameters,
    ];

    /// The group's leaf position in the top-level Merkle tree.
    pub fn ordinal(&self) -> u32 {
        match self {
            Self::Inputs => 0,
            Self::Outputs => 1,
            Self::Commands => 2,
            Self::Attachments => 3,
            Self::Notary => 4,
            Self::TimeWindow => 5,
            Self::Signers => 6,
            Self::References => 7,
            Self::Parameters => 8,
        }
    }

    /// Look up a group by ordinal.
    pub fn from_ordinal(ordinal: u32) -> Result<Self, CoreError> {
        Self::ALL
            .get(ordinal as usize)
            .copied()
            .ok_or(CoreError::UnknownComponentGroup(ordinal))
    }

    /// Snake-case name, as used in serialized metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inputs => "inputs",
            Self::Outputs => "outputs",
            Self::Commands => "commands",
            Self::Attachments => "attachments",
            Self::Notary => "notary",
            Self::TimeWindow => "time_window",
            Self::Signers => "signers",
            Self::References => "references",
            Self::Parameters => "parameters",
        }
    }
}

impl fmt::Display for ComponentGroupEnum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
