use std::fs;
use std::path::Path;

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::artifacts::is_wheel;

/// Copies every wheel found below `cache` into `output`.
///
/// Unreadable entries and failed copies are skipped. Returns how many wheels
/// were copied.
pub fn copy_wheels_from_cache(cache: &Path, output: &Path) -> usize {
    let mut copied = 0;
    for entry in WalkDir::new(cache).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!(%err, root = %cache.display(), "skipping path during cache walk");
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file() || !is_wheel(path) {
            continue;
        }
        let Some(name) = path.file_name() else {
            continue;
        };
        match fs::copy(path, output.join(name)) {
            Ok(_) => copied += 1,
            Err(err) => debug!(%err, path = %path.display(), "failed to salvage cached wheel"),
        }
    }
    info!(copied, cache = %cache.display(), "salvaged wheels from pip cache");
    copied
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    #[test]
    fn copies_nested_wheels_only() -> Result<()> {
        let cache = tempdir()?;
        let output = tempdir()?;
        let nested = cache.path().join("wheels/ab/cd");
        fs::create_dir_all(&nested)?;
        fs::write(nested.join("six-1.16.0-py2.py3-none-any.whl"), b"wheel")?;
        fs::write(cache.path().join("http-cache.bin"), b"blob")?;

        let copied = copy_wheels_from_cache(cache.path(), output.path());
        assert_eq!(copied, 1);
        assert!(output.path().join("six-1.16.0-py2.py3-none-any.whl").exists());
        assert!(!output.path().join("http-cache.bin").exists());
        Ok(())
    }

    #[test]
    fn missing_cache_copies_nothing() -> Result<()> {
        let output = tempdir()?;
        assert_eq!(copy_wheels_from_cache(&output.path().join("absent"), output.path()), 0);
        Ok(())
    }
}
