//! Run lock: one `flowtest run` per configuration at a time.
//!
//! Two runs against the same NiFi would fight over sandbox names and the
//! platform-wide parameter-context purge. The lock file records which run
//! owns it so the losing run can say who is in the way.
//!
//! Liveness is the OS file lock itself: a run that dies releases it, and the
//! next run simply overwrites the leftover record.

use crate::error::{FlowTestError, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Lock file name, created next to the configuration file.
pub const LOCK_FILE_NAME: &str = ".flowtest.lock";

/// Who holds the lock, as written into the lock file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunClaim {
    pub pid: u32,
    /// Configuration file the run was started with.
    pub config: PathBuf,
    /// Flows selected for the run; empty means every discovered flow.
    pub flows: Vec<String>,
}

impl RunClaim {
    /// Claim for the current process.
    pub fn current(config: &Path, flows: &[String]) -> Self {
        Self {
            pid: std::process::id(),
            config: config.to_path_buf(),
            flows: flows.to_vec(),
        }
    }

    fn describe_flows(&self) -> String {
        if self.flows.is_empty() {
            "all flows".to_string()
        } else {
            self.flows.join(", ")
        }
    }
}

/// Exclusive run lock, released on drop.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
    claim: RunClaim,
}

impl RunLock {
    /// Takes the lock in `dir` for `claim`.
    ///
    /// Fails with [`FlowTestError::RunLockHeld`] naming the other run when
    /// one is in progress.
    pub fn acquire(dir: &Path, claim: RunClaim) -> Result<Self> {
        let path = dir.join(LOCK_FILE_NAME);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if file.try_lock_exclusive().is_err() {
            return Err(match read_claim(&mut file) {
                Some(owner) => FlowTestError::RunLockHeld {
                    pid: owner.pid,
                    config: owner.config.display().to_string(),
                    flows: owner.describe_flows(),
                },
                None => FlowTestError::RunLocked,
            });
        }

        if let Some(previous) = read_claim(&mut file) {
            warn!(
                pid = previous.pid,
                flows = %previous.describe_flows(),
                "Previous run did not release its lock, taking it over"
            );
        }
        write_claim(&mut file, &claim)?;

        debug!(path = %path.display(), flows = %claim.describe_flows(), "Acquired run lock");
        Ok(Self { file, path, claim })
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The claim this lock was taken with.
    pub fn claim(&self) -> &RunClaim {
        &self.claim
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        // An empty file marks a cleanly finished run
        let _ = self.file.set_len(0);
        let _ = FileExt::unlock(&self.file);
        debug!(path = %self.path.display(), "Released run lock");
    }
}

fn read_claim(file: &mut File) -> Option<RunClaim> {
    let mut content = String::new();
    file.seek(SeekFrom::Start(0)).ok()?;
    file.read_to_string(&mut content).ok()?;
    if content.trim().is_empty() {
        return None;
    }
    serde_json::from_str(&content).ok()
}

fn write_claim(file: &mut File, claim: &RunClaim) -> Result<()> {
    let body = serde_json::to_string(claim)
        .map_err(|e| FlowTestError::Deserialization(e.to_string()))?;
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(body.as_bytes())?;
    file.flush()?;
    Ok(())
}
