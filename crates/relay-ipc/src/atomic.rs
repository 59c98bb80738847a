use std::path::Path;

use crate::error::Result;

/// Write `contents` to `path` by first writing to a sibling `.tmp` file and
/// then renaming it into place, so a reader never observes a partial write
/// (§4.8 convention).
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp_path = tmp_path_for(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&tmp_path, contents)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

fn tmp_path_for(path: &Path) -> std::path::PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    name.push_str(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_atomic_leaves_no_tmp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("message.json");
        write_atomic(&path, b"{}").unwrap();

        assert!(path.exists());
        assert!(!tmp_path_for(&path).exists());
        assert_eq!(std::fs::read(&path).unwrap(), b"{}");
    }
}
