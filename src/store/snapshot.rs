use crate::error::CealResult;
use crate::types::Snapshot;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Read a snapshot, choosing YAML or JSON by file extension
pub fn load_snapshot(path: &Path) -> CealResult<Snapshot> {
    let content = fs::read_to_string(path)?;
    let snapshot = if is_yaml(path) {
        serde_yaml::from_str(&content)?
    } else {
        serde_json::from_str(&content)?
    };
    Ok(snapshot)
}

fn tmp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}

/// Write a snapshot, choosing YAML or JSON by file extension.
///
/// The content goes to a sibling temp file that is then renamed over `path`,
/// so readers see either the old file or the new one.
pub fn save_snapshot(path: &Path, snapshot: &Snapshot) -> CealResult<()> {
    let content = if is_yaml(path) {
        serde_yaml::to_string(snapshot)?
    } else {
        serde_json::to_string_pretty(snapshot)?
    };

    let tmp = tmp_path(path);
    let mut file = fs::File::create(&tmp)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;
    drop(file);

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}
