use crate::error::Result;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

/// Make `path` absolute against the current directory and drop `.` components.
pub(crate) fn absolutize(path: &Path) -> Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    Ok(joined
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect())
}

/// Expand a glob pattern to the sorted list of regular files it matches.
pub(crate) fn expand_glob(pattern: &Path) -> Result<Vec<PathBuf>> {
    let pattern = pattern.to_string_lossy();
    let mut matches = Vec::new();
    for entry in glob::glob(&pattern)? {
        match entry {
            Ok(path) if path.is_file() => matches.push(path),
            Ok(path) => log::trace!("skipping non-file glob match {}", path.display()),
            Err(e) => log::warn!("unreadable glob match for {pattern}: {e}"),
        }
    }
    matches.sort();
    Ok(matches)
}

/// Display `path` relative to `root` when it lives underneath it.
pub(crate) fn display_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Replace `path` with `contents` via a synced temp file in the same directory.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let existing = std::fs::metadata(path).ok().map(|m| m.permissions());

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;

    match existing {
        Some(permissions) => std::fs::set_permissions(tmp.path(), permissions)?,
        None => set_default_permissions(tmp.path())?,
    }

    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(unix)]
fn set_default_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_default_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_atomic_creates_parents_and_replaces() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("nested/dir/file.yaml");

        write_atomic(&target, b"a: 1\n").unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "a: 1\n");

        write_atomic(&target, b"a: 2\n").unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "a: 2\n");

        let leftovers: Vec<_> = std::fs::read_dir(target.parent().unwrap())
            .unwrap()
            .collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_expand_glob_sorts_and_skips_directories() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("data/sub.yaml")).unwrap();
        std::fs::write(tmp.path().join("data/b.yaml"), "").unwrap();
        std::fs::write(tmp.path().join("data/a.yaml"), "").unwrap();

        let matches = expand_glob(&tmp.path().join("data/*.yaml")).unwrap();
        let names: Vec<_> = matches
            .iter()
            .map(|p| display_path(tmp.path(), p))
            .collect();
        assert_eq!(names, vec!["data/a.yaml", "data/b.yaml"]);
    }
}
