//! file_write action: `mode: "write"` (create/overwrite, grounded on the donor's write
//! tool) or `mode: "edit"` (exact-match replace, grounded on the donor's edit tool).

use conclave_core::Error;
use std::path::{Path, PathBuf};
use tokio::fs;

fn resolve_path(path: &str) -> conclave_core::Result<PathBuf> {
    let p = Path::new(path);
    if !p.is_absolute() {
        return Err(Error::InvalidWorkingDir(format!("file_write requires an absolute path, got {path}")));
    }
    Ok(p.to_path_buf())
}

pub async fn write(_workspace_root: &Path, path: &str, content: &str) -> conclave_core::Result<String> {
    let full = resolve_path(path)?;
    if fs::try_exists(&full).await.unwrap_or(false) {
        return Err(Error::FileAlreadyExists(path.to_string()));
    }
    if let Some(parent) = full.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::Internal(format!("failed to create directories for {path}: {e}")))?;
    }
    fs::write(&full, content)
        .await
        .map_err(|e| Error::Internal(format!("failed to write {path}: {e}")))?;
    Ok(format!("wrote {} bytes to {path}", content.len()))
}

pub async fn edit(
    _workspace_root: &Path,
    path: &str,
    old_string: &str,
    new_string: &str,
    replace_all: bool,
) -> conclave_core::Result<String> {
    let full = resolve_path(path)?;
    let content = fs::read_to_string(&full)
        .await
        .map_err(|e| Error::Internal(format!("failed to read {path}: {e}")))?;

    if !content.contains(old_string) {
        return Err(Error::Internal(format!("old_string not found in {path}")));
    }

    let new_content = if replace_all {
        content.replace(old_string, new_string)
    } else {
        let count = content.matches(old_string).count();
        if count > 1 {
            return Err(Error::Internal(format!(
                "old_string found {count} times in {path} — must be unique or use replace_all"
            )));
        }
        content.replacen(old_string, new_string, 1)
    };

    fs::write(&full, &new_content)
        .await
        .map_err(|e| Error::Internal(format!("failed to write {path}: {e}")))?;
    Ok(format!("edited {path}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abs(dir: &tempfile::TempDir, name: &str) -> String {
        dir.path().join(name).to_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = abs(&dir, "a/b/c.txt");
        let out = write(dir.path(), &path, "hi").await.unwrap();
        assert!(out.contains("2 bytes"));
        assert_eq!(std::fs::read_to_string(dir.path().join("a/b/c.txt")).unwrap(), "hi");
    }

    #[tokio::test]
    async fn write_refuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), "original").unwrap();
        let path = abs(&dir, "f.txt");
        assert!(write(dir.path(), &path, "overwrite").await.is_err());
        assert_eq!(std::fs::read_to_string(dir.path().join("f.txt")).unwrap(), "original");
    }

    #[tokio::test]
    async fn write_rejects_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        assert!(write(dir.path(), "relative.txt", "hi").await.is_err());
    }

    #[tokio::test]
    async fn edit_replaces_unique_match() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), "hello world").unwrap();
        let path = abs(&dir, "f.txt");
        edit(dir.path(), &path, "world", "there", false).await.unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("f.txt")).unwrap(), "hello there");
    }

    #[tokio::test]
    async fn edit_rejects_ambiguous_match_without_replace_all() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), "x x x").unwrap();
        let path = abs(&dir, "f.txt");
        assert!(edit(dir.path(), &path, "x", "y", false).await.is_err());
    }

    #[tokio::test]
    async fn edit_replace_all_replaces_every_match() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), "x x x").unwrap();
        let path = abs(&dir, "f.txt");
        edit(dir.path(), &path, "x", "y", true).await.unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("f.txt")).unwrap(), "y y y");
    }
}
