//! file_read action, grounded on the donor's read tool: numbered-line reads with an
//! offset/limit window. Per spec §6's file-system surface: absolute paths only,
//! directories refused, binary content (NUL byte or invalid UTF-8) refused, default
//! 2000-line output with a 2000-character per-line cap.

use conclave_core::Error;
use std::path::Path;
use tokio::fs;

const DEFAULT_LINE_LIMIT: usize = 2000;
const LINE_CHAR_CAP: usize = 2000;

pub async fn read(_workspace_root: &Path, path: &str, offset: Option<i64>, limit: Option<i64>) -> conclave_core::Result<String> {
    let resolved = Path::new(path);
    if !resolved.is_absolute() {
        return Err(Error::InvalidWorkingDir(format!("file_read requires an absolute path, got {path}")));
    }

    let metadata = fs::metadata(resolved).await.map_err(|e| Error::Internal(format!("failed to read {path}: {e}")))?;
    if metadata.is_dir() {
        return Err(Error::InvalidWorkingDir(format!("{path} is a directory")));
    }

    let bytes = fs::read(resolved).await.map_err(|e| Error::Internal(format!("failed to read {path}: {e}")))?;
    if bytes.contains(&0) {
        return Err(Error::Internal(format!("{path} contains binary (NUL byte) content")));
    }
    let content = String::from_utf8(bytes).map_err(|_| Error::Internal(format!("{path} is not valid UTF-8")))?;

    let offset = offset.unwrap_or(1).max(1) as usize;
    let limit = limit.unwrap_or(DEFAULT_LINE_LIMIT as i64).max(0) as usize;

    let lines: Vec<&str> = content.lines().collect();
    let start = (offset - 1).min(lines.len());
    let end = (start + limit).min(lines.len());

    Ok(lines[start..end]
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{:>6}\t{}", start + i + 1, truncate_line(line)))
        .collect::<Vec<_>>()
        .join("\n"))
}

fn truncate_line(line: &str) -> std::borrow::Cow<'_, str> {
    if line.chars().count() <= LINE_CHAR_CAP {
        return std::borrow::Cow::Borrowed(line);
    }
    let truncated: String = line.chars().take(LINE_CHAR_CAP).collect();
    std::borrow::Cow::Owned(format!("{truncated}... [line truncated at {LINE_CHAR_CAP} chars]"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abs(dir: &tempfile::TempDir, name: &str) -> String {
        dir.path().join(name).to_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn reads_full_file_with_line_numbers() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), "a\nb\nc").unwrap();
        let path = abs(&dir, "f.txt");
        let out = read(dir.path(), &path, None, None).await.unwrap();
        assert!(out.contains("     1\ta"));
        assert!(out.contains("     3\tc"));
    }

    #[tokio::test]
    async fn respects_offset_and_limit() {
        let dir = tempfile::tempdir().unwrap();
        let lines: Vec<String> = (1..=20).map(|i| format!("line{i}")).collect();
        std::fs::write(dir.path().join("big.txt"), lines.join("\n")).unwrap();
        let path = abs(&dir, "big.txt");
        let out = read(dir.path(), &path, Some(5), Some(3)).await.unwrap();
        assert!(out.contains("line5"));
        assert!(out.contains("line7"));
        assert!(!out.contains("line8"));
        assert!(!out.contains("line4\n"));
    }

    #[tokio::test]
    async fn missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = abs(&dir, "nope.txt");
        assert!(read(dir.path(), &path, None, None).await.is_err());
    }

    #[tokio::test]
    async fn relative_path_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read(dir.path(), "relative.txt", None, None).await.is_err());
    }

    #[tokio::test]
    async fn directory_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_str().unwrap().to_string();
        assert!(read(dir.path(), &path, None, None).await.is_err());
    }

    #[tokio::test]
    async fn nul_byte_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bin.dat"), b"a\0b").unwrap();
        let path = abs(&dir, "bin.dat");
        assert!(read(dir.path(), &path, None, None).await.is_err());
    }

    #[tokio::test]
    async fn line_char_cap_applied() {
        let dir = tempfile::tempdir().unwrap();
        let long_line = "x".repeat(LINE_CHAR_CAP + 500);
        std::fs::write(dir.path().join("long.txt"), &long_line).unwrap();
        let path = abs(&dir, "long.txt");
        let out = read(dir.path(), &path, None, None).await.unwrap();
        assert!(out.contains("[line truncated at 2000 chars]"));
        assert!(!out.contains(&long_line));
    }
}
