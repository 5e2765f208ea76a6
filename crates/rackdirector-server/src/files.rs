//! Static boot loader files served over HTTP

use crate::error::ApiError;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Join a request path onto `root`, refusing anything that could escape it
pub fn safe_join(root: &Path, request_path: &str) -> Option<PathBuf> {
    let relative = Path::new(request_path.trim_start_matches('/'));
    let mut joined = root.to_path_buf();
    let mut depth = 0;

    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                joined.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            _ => return None,
        }
    }

    (depth > 0).then_some(joined)
}

/// Read a file below `root`
pub async fn read_static(root: &Path, request_path: &str) -> Result<Vec<u8>, ApiError> {
    let path = safe_join(root, request_path)
        .ok_or_else(|| ApiError::NotFound(request_path.to_string()))?;

    match tokio::fs::read(&path).await {
        Ok(contents) => {
            debug!(path = %path.display(), bytes = contents.len(), "Serving static file");
            Ok(contents)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ApiError::NotFound(request_path.to_string()))
        }
        // Directories and other unreadable entries look like misses to the client
        Err(e) if path.is_dir() => {
            debug!(path = %path.display(), error = %e, "Refusing directory read");
            Err(ApiError::NotFound(request_path.to_string()))
        }
        Err(source) => Err(ApiError::Io {
            path: request_path.to_string(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_join() {
        let root = Path::new("/srv/http");

        assert_eq!(
            safe_join(root, "/bios/lpxelinux.0"),
            Some(PathBuf::from("/srv/http/bios/lpxelinux.0"))
        );
        assert_eq!(
            safe_join(root, "efi64/./syslinux.efi"),
            Some(PathBuf::from("/srv/http/efi64/syslinux.efi"))
        );
        assert_eq!(safe_join(root, "/bios/../../etc/passwd"), None);
        assert_eq!(safe_join(root, ".."), None);
        assert_eq!(safe_join(root, "/"), None);
        assert_eq!(safe_join(root, ""), None);
    }

    #[tokio::test]
    async fn test_read_static() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("bios")).unwrap();
        std::fs::write(dir.path().join("bios/ldlinux.c32"), b"c32").unwrap();

        let contents = read_static(dir.path(), "/bios/ldlinux.c32").await.unwrap();
        assert_eq!(contents, b"c32");

        let err = read_static(dir.path(), "/bios/missing.c32").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err = read_static(dir.path(), "/bios").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err = read_static(dir.path(), "/bios/../../etc/passwd").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
