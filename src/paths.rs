// ABOUTME: Data-directory resolution for persistent state.
// ABOUTME: Platform directories with an explicit override from configuration.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

/// Resolve the data directory, preferring an explicit override.
/// The directory is created if it does not exist.
pub fn data_dir(override_path: Option<&PathBuf>) -> Result<PathBuf> {
    let dir = match override_path {
        Some(path) => path.clone(),
        None => ProjectDirs::from("dev", "huddle", "huddle")
            .context("could not determine platform data directory")?
            .data_dir()
            .to_path_buf(),
    };
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create data directory {}", dir.display()))?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_is_created_and_used() {
        let tmp = std::env::temp_dir().join("huddle-paths-test");
        let dir = data_dir(Some(&tmp)).unwrap();
        assert_eq!(dir, tmp);
        assert!(dir.exists());
        let _ = std::fs::remove_dir_all(&tmp);
    }
}
