use crate::Result;
use std::path::Path;

/// Check that a file exists, is a regular file and is not empty
pub fn check_file_accessible(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("File does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("Path is not a file: {}", path.display());
    }

    let metadata = std::fs::metadata(path)
        .map_err(|e| anyhow::anyhow!("Cannot access file {}: {}", path.display(), e))?;

    if metadata.len() == 0 {
        anyhow::bail!("File is empty: {}", path.display());
    }

    Ok(())
}
