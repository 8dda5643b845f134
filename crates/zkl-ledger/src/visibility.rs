//! # Visibility Policy
//!
//! Decides which components of a transaction stay readable in its verifier
//! form. Each group has a default, and single components can be overridden.
//! Inputs and references are always public: verifiers follow them to walk
//! the backward chain.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use zkl_core::ComponentGroupEnum;

use crate::error::CommitmentError;

/// Visibility override for one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentOverride {
    pub group: ComponentGroupEnum,
    pub index: u32,
    pub public: bool,
}

/// Per-group defaults plus per-component overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityPolicy {
    /// Groups not listed are public.
    #[serde(default)]
    group_defaults: BTreeMap<ComponentGroupEnum, bool>,
    /// Later entries win.
    #[serde(default)]
    overrides: Vec<ComponentOverride>,
}

impl Default for VisibilityPolicy {
    /// Outputs hidden, everything else public.
    fn default() -> Self {
        Self::all_public().with_group(ComponentGroupEnum::Outputs, false)
    }
}

impl VisibilityPolicy {
    /// Every component public.
    pub fn all_public() -> Self {
        Self {
            group_defaults: BTreeMap::new(),
            overrides: Vec::new(),
        }
    }

    /// Set the default for a whole group.
    pub fn with_group(mut self, group: ComponentGroupEnum, public: bool) -> Self {
        self.group_defaults.insert(group, public);
        self
    }

    /// Override a single component.
    pub fn with_component(mut self, group: ComponentGroupEnum, index: u32, public: bool) -> Self {
        self.overrides.push(ComponentOverride {
            group,
            index,
            public,
        });
        self
    }

    /// Whether component `index` of group `group_index` stays visible.
    /// Unknown group indices follow the all-public default.
    pub fn is_public(&self, group_index: u32, index: u32) -> bool {
        let Ok(group) = ComponentGroupEnum::from_ordinal(group_index) else {
            return true;
        };
        if let Some(o) = self
            .overrides
            .iter()
            .rev()
            .find(|o| o.group == group && o.index == index)
        {
            return o.public;
        }
        self.group_defaults.get(&group).copied().unwrap_or(true)
    }

    /// Reject policies that would hide part of the backward chain, given the
    /// number of components in each chain group.
    pub fn check_chain_visible(
        &self,
        input_count: usize,
        reference_count: usize,
    ) -> Result<(), CommitmentError> {
        for (group, count) in [
            (ComponentGroupEnum::Inputs, input_count),
            (ComponentGroupEnum::References, reference_count),
        ] {
            if let Some(index) = (0..count as u32).find(|i| !self.is_public(group.ordinal(), *i)) {
                return Err(CommitmentError::HiddenChainComponent { group, index });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUT: u32 = 1;

    #[test]
    fn default_hides_outputs_only() {
        let p = VisibilityPolicy::default();
        assert!(!p.is_public(OUT, 0));
        assert!(p.is_public(ComponentGroupEnum::Commands.ordinal(), 0));
        assert!(p.is_public(ComponentGroupEnum::Inputs.ordinal(), 3));
        assert!(p.is_public(42, 0));
    }

    #[test]
    fn component_override_beats_group_default() {
        let p = VisibilityPolicy::default()
            .with_component(ComponentGroupEnum::Outputs, 1, true)
            .with_component(ComponentGroupEnum::Notary, 0, false);
        assert!(!p.is_public(OUT, 0));
        assert!(p.is_public(OUT, 1));
        assert!(!p.is_public(ComponentGroupEnum::Notary.ordinal(), 0));
    }

    #[test]
    fn last_override_wins() {
        let p = VisibilityPolicy::all_public()
            .with_component(ComponentGroupEnum::Outputs, 0, false)
            .with_component(ComponentGroupEnum::Outputs, 0, true);
        assert!(p.is_public(OUT, 0));
    }

    #[test]
    fn hidden_inputs_are_rejected() {
        let p = VisibilityPolicy::default().with_component(ComponentGroupEnum::Inputs, 1, false);
        assert!(p.check_chain_visible(1, 0).is_ok());
        let err = p.check_chain_visible(2, 0).unwrap_err();
        assert!(matches!(
            err,
            CommitmentError::HiddenChainComponent {
                group: ComponentGroupEnum::Inputs,
                index: 1
            }
        ));
        let refs = VisibilityPolicy::default().with_group(ComponentGroupEnum::References, false);
        assert!(refs.check_chain_visible(0, 1).is_err());
    }

    #[test]
    fn policy_serde_roundtrip() {
        let p = VisibilityPolicy::default().with_component(ComponentGroupEnum::Outputs, 2, true);
        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains("\"outputs\":false"));
        let back: VisibilityPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
