use std::io::Write;
use std::path::Path;

use log::info;
use rnp_core::error::Result;
use rnp_core::manifest::SceneManifest;
use tempfile::Builder;

use crate::error::write_error;

/// Serialize `manifest` and atomically replace `path` with it.
///
/// Nothing is written when validation fails, and a reader never sees a
/// partially written file.
pub fn write_manifest(path: impl AsRef<Path>, manifest: &SceneManifest) -> Result<()> {
    let path = path.as_ref();
    let mut json = manifest.to_json()?;
    json.push('\n');

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = Builder::new()
        .prefix(".transforms")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| write_error(dir, e))?;
    let tmp_path = tmp.path().to_path_buf();
    tmp.write_all(json.as_bytes())
        .map_err(|e| write_error(&tmp_path, e))?;
    tmp.as_file().sync_all().map_err(|e| write_error(&tmp_path, e))?;
    tmp.persist(path).map_err(|e| write_error(path, e.error))?;

    info!("wrote {} frames to {}", manifest.len(), path.display());
    Ok(())
}
