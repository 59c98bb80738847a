use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::warn;

use crate::atomic::write_atomic;
use crate::canonical::{sign, verify};
use crate::error::{IpcError, Result};

const READY_SENTINEL: &str = "_ready";
const CLOSE_SENTINEL: &str = "_close";

/// One conversation's three-directory IPC slot: `input/` (dispatcher to
/// agent), `output/` (agent to dispatcher), `artifacts/` (agent-authored
/// files for downstream channels) (§4.8).
pub struct Slot {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub artifacts_dir: PathBuf,
    secret: Vec<u8>,
}

impl Slot {
    pub fn open(root: impl AsRef<Path>, secret: impl Into<Vec<u8>>) -> Result<Self> {
        let root = root.as_ref();
        let slot = Self {
            input_dir: root.join("input"),
            output_dir: root.join("output"),
            artifacts_dir: root.join("artifacts"),
            secret: secret.into(),
        };
        std::fs::create_dir_all(&slot.input_dir)?;
        std::fs::create_dir_all(&slot.output_dir)?;
        std::fs::create_dir_all(&slot.artifacts_dir)?;
        Ok(slot)
    }

    /// Write a signed JSON input file. Used both for the first turn's
    /// bootstrap and for mid-turn follow-up injection (§4.8 last paragraph).
    pub fn write_input(&self, filename: &str, value: &Value) -> Result<()> {
        let signed = sign(value, &self.secret)?;
        let body = crate::canonical::canonicalize(&signed)?;
        write_atomic(&self.input_dir.join(filename), body.as_bytes())
    }

    /// Request the agent end the session cleanly after the current turn.
    pub fn request_close(&self) -> Result<()> {
        write_atomic(&self.input_dir.join(CLOSE_SENTINEL), b"")
    }

    /// Atomically consume the `_close` sentinel if present. Idempotent.
    pub fn consume_close_request(&self) -> Result<bool> {
        let path = self.input_dir.join(CLOSE_SENTINEL);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Atomically consume the `_ready` sentinel (warming -> ready, §4.8).
    pub fn consume_ready(&self) -> Result<bool> {
        let path = self.output_dir.join(READY_SENTINEL);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// List pending output files (numbered interim messages plus the final
    /// framed result file), oldest-first, excluding sentinels.
    pub fn pending_output_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.output_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name == READY_SENTINEL || name.ends_with(".tmp") {
                continue;
            }
            files.push(entry.path());
        }
        files.sort();
        Ok(files)
    }

    /// Read, verify, and delete one output file. HMAC mismatch quarantines
    /// the file (renamed with a `.quarantined` suffix, never silently
    /// dropped) rather than deleting it (§6 "mismatch -> file quarantined").
    pub fn read_and_verify(&self, path: &Path) -> Result<Value> {
        let raw = std::fs::read(path)?;
        let value: Value = serde_json::from_slice(&raw)?;

        match verify(&value, &self.secret) {
            Ok(verified) => {
                std::fs::remove_file(path)?;
                Ok(verified)
            }
            Err(e) => {
                let quarantined = path.with_extension("quarantined");
                warn!(path = %path.display(), "HMAC mismatch, quarantining file");
                let _ = std::fs::rename(path, &quarantined);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn write_input_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let slot = Slot::open(dir.path(), b"secret".to_vec()).unwrap();

        slot.write_input("001.json", &json!({"prompt": "hi"})).unwrap();
        let path = slot.input_dir.join("001.json");
        assert!(path.exists());

        let raw = std::fs::read_to_string(&path).unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        let verified = verify(&value, b"secret").unwrap();
        assert_eq!(verified["prompt"], "hi");
    }

    #[test]
    fn consume_ready_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let slot = Slot::open(dir.path(), b"secret".to_vec()).unwrap();
        std::fs::write(slot.output_dir.join(READY_SENTINEL), b"").unwrap();

        assert!(slot.consume_ready().unwrap());
        assert!(!slot.consume_ready().unwrap());
    }

    #[test]
    fn tampered_output_file_is_quarantined_not_silently_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let slot = Slot::open(dir.path(), b"secret".to_vec()).unwrap();

        let signed = sign(&json!({"status": "success"}), b"other-secret").unwrap();
        let path = slot.output_dir.join("001.json");
        std::fs::write(&path, serde_json::to_vec(&signed).unwrap()).unwrap();

        let err = slot.read_and_verify(&path).unwrap_err();
        assert!(matches!(err, IpcError::HmacMismatch(_)));
        assert!(!path.exists());
        assert!(path.with_extension("quarantined").exists());
    }

    #[test]
    fn pending_output_files_excludes_ready_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let slot = Slot::open(dir.path(), b"secret".to_vec()).unwrap();
        std::fs::write(slot.output_dir.join(READY_SENTINEL), b"").unwrap();
        std::fs::write(slot.output_dir.join("001.json"), b"{}").unwrap();

        let files = slot.pending_output_files().unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("001.json"));
    }
}
