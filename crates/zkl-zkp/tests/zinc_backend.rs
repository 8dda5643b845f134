//! # Zinc Backend Integration Tests
//!
//! Drives [`ZincProofSystem`] against small shell scripts standing in for
//! `zargo` and `zvm`. The scripts log each invocation so the tests can see
//! when the artifact cache is reused and when it forces a rebuild.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use zkl_zkp::{
    CacheStatus, CircuitDescriptor, Phase, PhaseTimeouts, Proof, ProofError, ProofSystem,
    ProcessError, SetupStatus, VerifyError, ZincConfig, ZincProofSystem,
};

/// Writing an executable while another test thread forks can make `exec`
/// fail with ETXTBSY, so these tests run one at a time.
static SERIAL: Mutex<()> = Mutex::new(());

const PROOF_HEX: &str = "cafebabe";

struct Toolchain {
    _dir: tempfile::TempDir,
    root: PathBuf,
    circuit: CircuitDescriptor,
}

impl Toolchain {
    fn new(prove_delay_secs: u32) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();

        let source = root.join("circuit");
        fs::create_dir_all(source.join("src")).unwrap();
        fs::write(source.join("Zargo.toml"), "[circuit]\nname = \"move\"\n").unwrap();
        fs::write(source.join("src/main.zn"), "fn main() {}\n").unwrap();

        let log = root.join("calls.log");
        write_script(
            &root.join("zargo"),
            &format!(
                r#"#!/bin/sh
echo build >> "{log}"
while [ $# -gt 0 ]; do
  case "$1" in
    --circuit) shift; echo compiled > "$1" ;;
  esac
  shift
done
"#,
                log = log.display()
            ),
        );
        write_script(
            &root.join("zvm"),
            &format!(
                r#"#!/bin/sh
cmd="$1"; shift
echo "$cmd" >> "{log}"
case "$cmd" in
  setup)
    while [ $# -gt 0 ]; do
      case "$1" in
        --proving-key) shift; echo pk > "$1" ;;
        --verifying-key) shift; echo vk > "$1" ;;
      esac
      shift
    done ;;
  prove)
    if [ {delay} -gt 0 ]; then exec sleep {delay}; fi
    echo {proof} ;;
  verify)
    while [ $# -gt 0 ]; do
      case "$1" in
        --proof) shift; proof="$1" ;;
      esac
      shift
    done
    if [ "$(cat "$proof")" = "{proof}" ]; then exit 0; fi
    echo "invalid proof" >&2
    exit 1 ;;
  *) exit 2 ;;
esac
"#,
                log = log.display(),
                delay = prove_delay_secs,
                proof = PROOF_HEX
            ),
        );

        Self {
            circuit: CircuitDescriptor::new("move", &source),
            root,
            _dir: dir,
        }
    }

    fn config(&self) -> ZincConfig {
        ZincConfig {
            zargo: self.root.join("zargo"),
            zvm: self.root.join("zvm"),
            work_dir: Some(self.root.join("scratch")),
            timeouts: PhaseTimeouts {
                prove_secs: 2,
                ..PhaseTimeouts::default()
            },
        }
    }

    fn calls(&self, name: &str) -> usize {
        fs::read_to_string(self.root.join("calls.log"))
            .unwrap_or_default()
            .lines()
            .filter(|l| *l == name)
            .count()
    }
}

fn write_script(path: &Path, body: &str) {
    fs::write(path, body).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

fn serial() -> std::sync::MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|e| e.into_inner())
}

// -- Setup and cache ----------------------------------------------------------

#[test]
fn test_setup_builds_once_and_writes_metadata() {
    let _guard = serial();
    let tc = Toolchain::new(0);
    let zinc = ZincProofSystem::new(tc.config());

    assert_eq!(zkl_zkp::cache::check_cache(&tc.circuit).unwrap(), CacheStatus::Missing);
    zinc.setup(&tc.circuit).unwrap();
    zinc.setup(&tc.circuit).unwrap();

    assert_eq!(tc.calls("build"), 1);
    assert_eq!(tc.calls("setup"), 1);
    assert!(tc.circuit.build_dir.join(zkl_zkp::METADATA_FILE_NAME).exists());
    assert!(zkl_zkp::cache::check_cache(&tc.circuit).unwrap().is_valid());
}

#[test]
fn test_fresh_backend_reuses_cached_artifacts() {
    let _guard = serial();
    let tc = Toolchain::new(0);
    ZincProofSystem::new(tc.config()).setup(&tc.circuit).unwrap();
    ZincProofSystem::new(tc.config()).setup(&tc.circuit).unwrap();
    assert_eq!(tc.calls("build"), 1);
}

#[test]
fn test_source_change_forces_rebuild() {
    let _guard = serial();
    let tc = Toolchain::new(0);
    ZincProofSystem::new(tc.config()).setup(&tc.circuit).unwrap();

    let main = tc.circuit.source_dir.join("src/main.zn");
    fs::write(&main, "fn main() { let x = 1; }\n").unwrap();
    fs::File::options()
        .write(true)
        .open(&main)
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(60))
        .unwrap();

    assert!(matches!(
        zkl_zkp::cache::check_cache(&tc.circuit).unwrap(),
        CacheStatus::SourceChanged { .. }
    ));
    ZincProofSystem::new(tc.config()).setup(&tc.circuit).unwrap();
    assert_eq!(tc.calls("build"), 2);
}

#[test]
fn test_deleted_artifact_forces_rebuild() {
    let _guard = serial();
    let tc = Toolchain::new(0);
    ZincProofSystem::new(tc.config()).setup(&tc.circuit).unwrap();
    fs::remove_file(tc.circuit.proving_key_path()).unwrap();

    assert_eq!(
        zkl_zkp::cache::check_cache(&tc.circuit).unwrap(),
        CacheStatus::ArtifactMissing(tc.circuit.proving_key_path())
    );
    ZincProofSystem::new(tc.config()).setup(&tc.circuit).unwrap();
    assert_eq!(tc.calls("setup"), 2);
}

// -- Prove and verify ---------------------------------------------------------

#[test]
fn test_prove_then_verify() {
    let _guard = serial();
    let tc = Toolchain::new(0);
    let zinc = ZincProofSystem::new(tc.config());

    let proof = zinc
        .prove(&tc.circuit, br#"{"public_input":{"id":"x"}}"#)
        .unwrap();
    assert_eq!(proof.to_hex(), PROOF_HEX);
    zinc.verify(&tc.circuit, &proof, br#"{"id":"x"}"#).unwrap();
    assert_eq!(tc.calls("build"), 1);
}

#[test]
fn test_rejected_proof_reports_tool_output() {
    let _guard = serial();
    let tc = Toolchain::new(0);
    let zinc = ZincProofSystem::new(tc.config());

    let err = zinc
        .verify(&tc.circuit, &Proof::new(vec![0, 1, 2]), br#"{"id":"x"}"#)
        .unwrap_err();
    match err {
        VerifyError::Process(ProcessError::NonZeroExit { phase, stderr, .. }) => {
            assert_eq!(phase, Phase::Verify);
            assert!(stderr.contains("invalid proof"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_slow_prover_times_out() {
    let _guard = serial();
    let tc = Toolchain::new(30);
    let zinc = ZincProofSystem::new(tc.config());

    let err = zinc
        .prove(&tc.circuit, br#"{"public_input":{}}"#)
        .unwrap_err();
    match err {
        ProofError::Process(e) => {
            assert!(e.is_timeout());
            assert_eq!(e.phase(), Phase::Prove);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_invalid_witness_skips_toolchain() {
    let _guard = serial();
    let tc = Toolchain::new(0);
    let zinc = ZincProofSystem::new(tc.config());
    let err = zinc.prove(&tc.circuit, b"not json").unwrap_err();
    assert!(matches!(err, ProofError::InvalidWitness(_)));
    assert_eq!(tc.calls("build"), 0);
}

#[test]
fn test_missing_toolchain_fails_setup() {
    let _guard = serial();
    let tc = Toolchain::new(0);
    let zinc = ZincProofSystem::new(ZincConfig {
        zargo: tc.root.join("no-such-zargo"),
        ..tc.config()
    });
    let err = zinc.setup(&tc.circuit).unwrap_err();
    assert!(matches!(err, ProofError::Process(ProcessError::Spawn { .. })));
    assert_eq!(zinc.setup_status(&tc.circuit), SetupStatus::NotReady);
    assert!(!zkl_zkp::cache::check_cache(&tc.circuit).unwrap().is_valid());
}
