//! # Mock Proof System
//!
//! Deterministic, transparent "proofs" for development and testing:
//!
//! ```text
//! proof = SHA-256("zkl-mock-proof-v1" || circuit.name || 0x00 || canonical(public_input))
//! ```
//!
//! `prove` reads the public input from the witness's `public_input` member;
//! `verify` recomputes the digest from the public input it is given. A proof
//! therefore verifies exactly when prover and verifier agree on circuit and
//! public input. There are no zero-knowledge guarantees.

use serde_json::Value;

use zkl_core::{CanonicalBytes, DigestAlgorithm};

use crate::traits::{CircuitDescriptor, Proof, ProofError, ProofSystem, VerifyError};

const DOMAIN: &[u8] = b"zkl-mock-proof-v1";

/// Witness member holding the public input.
pub const PUBLIC_INPUT_KEY: &str = "public_input";

/// A deterministic mock proof system.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockProofSystem;

impl MockProofSystem {
    pub fn new() -> Self {
        Self
    }

    fn digest(circuit: &CircuitDescriptor, public_input: &Value) -> Result<Proof, String> {
        let canonical = CanonicalBytes::new(public_input).map_err(|e| e.to_string())?;
        let hash = DigestAlgorithm::Sha256.digest_parts(&[
            DOMAIN,
            circuit.name.as_bytes(),
            &[0u8],
            canonical.as_bytes(),
        ]);
        Ok(Proof::new(hash.as_bytes().to_vec()))
    }
}

impl ProofSystem for MockProofSystem {
    fn setup(&self, circuit: &CircuitDescriptor) -> Result<(), ProofError> {
        tracing::debug!(circuit = %circuit.name, "mock setup is a no-op");
        Ok(())
    }

    fn prove(&self, circuit: &CircuitDescriptor, witness: &[u8]) -> Result<Proof, ProofError> {
        let witness: Value = serde_json::from_slice(witness)
            .map_err(|e| ProofError::InvalidWitness(e.to_string()))?;
        let public_input = witness.get(PUBLIC_INPUT_KEY).ok_or_else(|| {
            ProofError::InvalidWitness(format!("witness has no `{PUBLIC_INPUT_KEY}` member"))
        })?;
        Self::digest(circuit, public_input).map_err(ProofError::InvalidWitness)
    }

    fn verify(
        &self,
        circuit: &CircuitDescriptor,
        proof: &Proof,
        public_input: &[u8],
    ) -> Result<(), VerifyError> {
        let public_input: Value = serde_json::from_slice(public_input)
            .map_err(|e| VerifyError::MalformedPublicInput(e.to_string()))?;
        let expected =
            Self::digest(circuit, &public_input).map_err(VerifyError::MalformedPublicInput)?;
        if proof.as_bytes().len() != expected.as_bytes().len() {
            return Err(VerifyError::MalformedProof(format!(
                "expected {} bytes, got {}",
                expected.as_bytes().len(),
                proof.as_bytes().len()
            )));
        }
        if *proof != expected {
            return Err(VerifyError::Rejected {
                circuit: circuit.name.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn circuit(name: &str) -> CircuitDescriptor {
        CircuitDescriptor::new(name, "/unused")
    }

    fn witness(public_input: Value) -> Vec<u8> {
        serde_json::to_vec(&json!({ "secret": [1, 2, 3], "public_input": public_input }))
            .unwrap()
    }

    #[test]
    fn proof_verifies_against_same_public_input() {
        let sys = MockProofSystem::new();
        let pi = json!({ "transaction_id": "abc", "inputs": [] });
        let proof = sys.prove(&circuit("move"), &witness(pi.clone())).unwrap();
        sys.verify(&circuit("move"), &proof, &serde_json::to_vec(&pi).unwrap())
            .unwrap();
    }

    #[test]
    fn key_order_does_not_matter() {
        let sys = MockProofSystem::new();
        let proof = sys
            .prove(&circuit("c"), &witness(json!({ "a": 1, "b": 2 })))
            .unwrap();
        sys.verify(&circuit("c"), &proof, br#"{"b":2,"a":1}"#).unwrap();
    }

    #[test]
    fn different_public_input_is_rejected() {
        let sys = MockProofSystem::new();
        let proof = sys
            .prove(&circuit("c"), &witness(json!({ "id": "one" })))
            .unwrap();
        let err = sys
            .verify(&circuit("c"), &proof, br#"{"id":"two"}"#)
            .unwrap_err();
        assert!(matches!(err, VerifyError::Rejected { .. }));
    }

    #[test]
    fn different_circuit_is_rejected() {
        let sys = MockProofSystem::new();
        let pi = json!({ "id": "one" });
        let proof = sys.prove(&circuit("issue"), &witness(pi.clone())).unwrap();
        let err = sys
            .verify(&circuit("move"), &proof, &serde_json::to_vec(&pi).unwrap())
            .unwrap_err();
        assert!(matches!(err, VerifyError::Rejected { .. }));
    }

    #[test]
    fn witness_without_public_input_is_invalid() {
        let sys = MockProofSystem::new();
        let err = sys.prove(&circuit("c"), br#"{"secret":1}"#).unwrap_err();
        assert!(matches!(err, ProofError::InvalidWitness(_)));
        assert!(sys.prove(&circuit("c"), b"not json").is_err());
    }

    #[test]
    fn truncated_proof_is_malformed() {
        let sys = MockProofSystem::new();
        let err = sys
            .verify(&circuit("c"), &Proof::new(vec![1, 2]), b"{}")
            .unwrap_err();
        assert!(matches!(err, VerifyError::MalformedProof(_)));
    }
}
