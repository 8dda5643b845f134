//! # Circuit Artifact Cache
//!
//! Circuit compilation and key generation take minutes, so their outputs are
//! reused across runs as long as they are still fresh.
//!
//! ## Metadata file
//!
//! After a successful setup, `<build_dir>/.circuit-metadata` records:
//!
//! ```text
//! <latest modification time of any source file, epoch millis>
//! <artifact path>:<artifact modification time, epoch millis>
//! ...
//! ```
//!
//! The cache is valid while no source file is newer than the recorded time
//! and every recorded artifact still exists with its recorded time. Any
//! difference forces a rebuild.
//!
//! ## In-process coordination
//!
//! [`SetupCoordinator`] tracks a tri-state per circuit. The first caller runs
//! setup; concurrent callers for the same circuit block on a condition
//! variable until it finishes, then return without repeating the work.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

use crate::traits::CircuitDescriptor;

/// Name of the metadata file inside the build directory.
pub const METADATA_FILE_NAME: &str = ".circuit-metadata";

/// Errors reading or writing cache metadata.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed cache metadata at line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

/// Parsed contents of the metadata file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactMetadata {
    pub source_modified: u128,
    pub artifacts: Vec<(PathBuf, u128)>,
}

impl ArtifactMetadata {
    /// Render in the on-disk format.
    pub fn render(&self) -> String {
        let mut out = format!("{}\n", self.source_modified);
        for (path, modified) in &self.artifacts {
            out.push_str(&format!("{}:{}\n", path.display(), modified));
        }
        out
    }

    /// Parse the on-disk format. The modification time is split off at the
    /// last `:` so paths may contain colons.
    pub fn parse(text: &str) -> Result<Self, CacheError> {
        let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());
        let (_, first) = lines.next().ok_or(CacheError::Malformed {
            line: 1,
            reason: "empty metadata file".into(),
        })?;
        let source_modified = first.trim().parse::<u128>().map_err(|e| CacheError::Malformed {
            line: 1,
            reason: e.to_string(),
        })?;

        let mut artifacts = Vec::new();
        for (idx, line) in lines {
            let (path, modified) = line.rsplit_once(':').ok_or_else(|| CacheError::Malformed {
                line: idx + 1,
                reason: "expected `<path>:<mtime>`".into(),
            })?;
            let modified = modified.trim().parse::<u128>().map_err(|e| CacheError::Malformed {
                line: idx + 1,
                reason: e.to_string(),
            })?;
            artifacts.push((PathBuf::from(path), modified));
        }
        Ok(Self {
            source_modified,
            artifacts,
        })
    }
}

/// Outcome of a freshness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheStatus {
    /// Artifacts can be reused.
    Valid,
    /// No metadata file (never built, or a previous build did not finish).
    Missing,
    /// A source file changed after the artifacts were built.
    SourceChanged { recorded: u128, current: u128 },
    /// A recorded artifact no longer exists.
    ArtifactMissing(PathBuf),
    /// A recorded artifact was rewritten outside of setup.
    ArtifactModified {
        path: PathBuf,
        recorded: u128,
        current: u128,
    },
}

impl CacheStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid => write!(f, "valid"),
            Self::Missing => write!(f, "no cache metadata"),
            Self::SourceChanged { recorded, current } => {
                write!(f, "sources changed (recorded {recorded}, now {current})")
            }
            Self::ArtifactMissing(p) => write!(f, "artifact missing: {}", p.display()),
            Self::ArtifactModified { path, .. } => {
                write!(f, "artifact modified: {}", path.display())
            }
        }
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> CacheError + '_ {
    move |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Modification time of `path` in milliseconds since the epoch.
pub fn modified_millis(path: &Path) -> Result<u128, CacheError> {
    let modified = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(io_err(path))?;
    Ok(modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0))
}

/// Latest modification time of any file under `dir`, skipping `exclude`.
/// Zero for an empty or missing directory.
pub fn latest_modification(dir: &Path, exclude: &Path) -> Result<u128, CacheError> {
    if !dir.exists() {
        return Ok(0);
    }
    let mut latest = 0u128;
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in std::fs::read_dir(&current).map_err(io_err(&current))? {
            let path = entry.map_err(io_err(&current))?.path();
            if path.starts_with(exclude) {
                continue;
            }
            if path.is_dir() {
                stack.push(path);
            } else {
                latest = latest.max(modified_millis(&path)?);
            }
        }
    }
    Ok(latest)
}

fn metadata_path(circuit: &CircuitDescriptor) -> PathBuf {
    circuit.build_dir.join(METADATA_FILE_NAME)
}

/// Record the current source and artifact times after a successful setup.
pub fn write_metadata(circuit: &CircuitDescriptor, artifacts: &[PathBuf]) -> Result<(), CacheError> {
    let mut recorded = Vec::with_capacity(artifacts.len());
    for path in artifacts {
        recorded.push((path.clone(), modified_millis(path)?));
    }
    let metadata = ArtifactMetadata {
        source_modified: latest_modification(&circuit.source_dir, &circuit.build_dir)?,
        artifacts: recorded,
    };
    let path = metadata_path(circuit);
    std::fs::create_dir_all(&circuit.build_dir).map_err(io_err(&circuit.build_dir))?;
    std::fs::write(&path, metadata.render()).map_err(io_err(&path))?;
    tracing::debug!(circuit = %circuit.name, path = %path.display(), "wrote circuit cache metadata");
    Ok(())
}

/// Drop the metadata file so the next setup rebuilds.
pub fn invalidate(circuit: &CircuitDescriptor) -> Result<(), CacheError> {
    let path = metadata_path(circuit);
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_err(&path)(e)),
    }
}

/// Decide whether the artifacts of `circuit` can be reused.
pub fn check_cache(circuit: &CircuitDescriptor) -> Result<CacheStatus, CacheError> {
    let path = metadata_path(circuit);
    let text = match std::fs::read_to_string(&path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(CacheStatus::Missing),
        Err(e) => return Err(io_err(&path)(e)),
    };
    let metadata = ArtifactMetadata::parse(&text)?;

    let current = latest_modification(&circuit.source_dir, &circuit.build_dir)?;
    if current > metadata.source_modified {
        return Ok(CacheStatus::SourceChanged {
            recorded: metadata.source_modified,
            current,
        });
    }
    for (artifact, recorded) in metadata.artifacts {
        if !artifact.exists() {
            return Ok(CacheStatus::ArtifactMissing(artifact));
        }
        let current = modified_millis(&artifact)?;
        if current != recorded {
            return Ok(CacheStatus::ArtifactModified {
                path: artifact,
                recorded,
                current,
            });
        }
    }
    Ok(CacheStatus::Valid)
}

/// Setup state of one circuit within this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStatus {
    NotReady,
    InProgress,
    Ready,
}

/// Serializes setup per circuit name.
#[derive(Debug, Default)]
pub struct SetupCoordinator {
    statuses: Mutex<HashMap<String, SetupStatus>>,
    changed: Condvar,
}

/// Resets an interrupted setup to `NotReady` and wakes waiters, including
/// when the setup closure panics.
struct InProgressGuard<'a> {
    coordinator: &'a SetupCoordinator,
    circuit: &'a str,
    finished: Option<SetupStatus>,
}

impl Drop for InProgressGuard<'_> {
    fn drop(&mut self) {
        let status = self.finished.unwrap_or(SetupStatus::NotReady);
        self.coordinator
            .statuses
            .lock()
            .insert(self.circuit.to_string(), status);
        self.coordinator.changed.notify_all();
    }
}

impl SetupCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self, circuit: &str) -> SetupStatus {
        self.statuses
            .lock()
            .get(circuit)
            .copied()
            .unwrap_or(SetupStatus::NotReady)
    }

    /// Run `setup` for `circuit` unless it already ran successfully. If
    /// another thread is running it, wait for that attempt; if it failed,
    /// retry here.
    pub fn ensure_ready<E>(
        &self,
        circuit: &str,
        setup: impl FnOnce() -> Result<(), E>,
    ) -> Result<(), E> {
        {
            let mut statuses = self.statuses.lock();
            loop {
                match statuses.get(circuit).copied().unwrap_or(SetupStatus::NotReady) {
                    SetupStatus::Ready => return Ok(()),
                    SetupStatus::InProgress => self.changed.wait(&mut statuses),
                    SetupStatus::NotReady => break,
                }
            }
            statuses.insert(circuit.to_string(), SetupStatus::InProgress);
        }

        let mut guard = InProgressGuard {
            coordinator: self,
            circuit,
            finished: None,
        };
        let result = setup();
        guard.finished = Some(if result.is_ok() {
            SetupStatus::Ready
        } else {
            SetupStatus::NotReady
        });
        drop(guard);
        result
    }

    /// Forget that `circuit` is ready, e.g. after its artifacts were removed.
    pub fn reset(&self, circuit: &str) {
        let mut statuses = self.statuses.lock();
        if statuses.get(circuit) == Some(&SetupStatus::Ready) {
            statuses.remove(circuit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn metadata_roundtrip_with_colons_in_paths() {
        let meta = ArtifactMetadata {
            source_modified: 1_700_000_000_000,
            artifacts: vec![
                (PathBuf::from("/data/main.znb"), 1_700_000_000_500),
                (PathBuf::from("C:/keys/proving_key"), 1_700_000_000_600),
            ],
        };
        assert_eq!(ArtifactMetadata::parse(&meta.render()).unwrap(), meta);
    }

    #[test]
    fn malformed_metadata_is_rejected() {
        assert!(ArtifactMetadata::parse("").is_err());
        assert!(ArtifactMetadata::parse("not-a-number\n").is_err());
        assert!(ArtifactMetadata::parse("1\nno-separator\n").is_err());
        assert!(ArtifactMetadata::parse("1\n/p:xyz\n").is_err());
    }

    #[test]
    fn coordinator_runs_setup_once() {
        let coordinator = SetupCoordinator::new();
        let runs = AtomicUsize::new(0);
        for _ in 0..3 {
            coordinator
                .ensure_ready::<()>("c", || {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .unwrap();
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.status("c"), SetupStatus::Ready);
    }

    #[test]
    fn failed_setup_is_retried() {
        let coordinator = SetupCoordinator::new();
        assert!(coordinator.ensure_ready("c", || Err("boom")).is_err());
        assert_eq!(coordinator.status("c"), SetupStatus::NotReady);
        coordinator.ensure_ready::<&str>("c", || Ok(())).unwrap();
        assert_eq!(coordinator.status("c"), SetupStatus::Ready);
    }

    #[test]
    fn concurrent_callers_wait_for_the_first() {
        let coordinator = Arc::new(SetupCoordinator::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let coordinator = Arc::clone(&coordinator);
                let runs = Arc::clone(&runs);
                std::thread::spawn(move || {
                    coordinator.ensure_ready::<()>("shared", || {
                        runs.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(50));
                        Ok(())
                    })
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap().unwrap();
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reset_forces_another_run() {
        let coordinator = SetupCoordinator::new();
        coordinator.ensure_ready::<()>("c", || Ok(())).unwrap();
        coordinator.reset("c");
        assert_eq!(coordinator.status("c"), SetupStatus::NotReady);
    }
}
