//! Fetch result files to local disk.
//!
//! The rendered download control keeps the server's URL verbatim; fetching
//! resolves it against the configured base URL (through the [`Transport`])
//! and writes the body atomically (temp file + rename) so an interrupted
//! download never leaves a partial file under the final name.

use crate::error::ToolflowError;
use crate::output::DownloadLink;
use crate::submit::Transport;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Download `link` into `dir`, returning the written path.
///
/// The file is named after the link's suggested filename, stripped of any
/// directory components.
pub async fn fetch_to_dir(
    transport: &dyn Transport,
    link: &DownloadLink,
    dir: impl AsRef<Path>,
) -> Result<PathBuf, ToolflowError> {
    let dir = dir.as_ref();
    let path = dir.join(safe_filename(&link.filename));

    let response = transport
        .fetch(&link.url)
        .await
        .map_err(|e| ToolflowError::DownloadFailed {
            url: link.url.clone(),
            reason: e.to_string(),
        })?;
    if !response.is_success() {
        return Err(ToolflowError::DownloadFailed {
            url: link.url.clone(),
            reason: format!("HTTP {}", response.status),
        });
    }

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| ToolflowError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;

    let tmp_path = path.with_file_name(format!(
        ".{}.part",
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    ));
    let written = match tokio::fs::write(&tmp_path, &response.body).await {
        Ok(()) => tokio::fs::rename(&tmp_path, &path).await,
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        if let Err(cleanup) = tokio::fs::remove_file(&tmp_path).await {
            debug!("Could not remove {}: {}", tmp_path.display(), cleanup);
        }
        return Err(ToolflowError::OutputWriteFailed {
            path: path.clone(),
            source: e,
        });
    }

    info!(
        "Downloaded {} ({} bytes) to {}",
        link.filename,
        response.body.len(),
        path.display()
    );
    Ok(path)
}

/// Last path component of `name`, or `download` when nothing usable is left.
pub fn safe_filename(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if base.is_empty() || base == "." || base == ".." {
        "download".to_string()
    } else {
        base.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submit::{RawResponse, SubmitRequest};
    use futures::future::BoxFuture;

    struct Fixed(RawResponse);

    impl Transport for Fixed {
        fn submit<'a>(
            &'a self,
            _request: &'a SubmitRequest,
        ) -> BoxFuture<'a, Result<RawResponse, ToolflowError>> {
            Box::pin(async move { Ok(self.0.clone()) })
        }

        fn fetch<'a>(
            &'a self,
            _path_or_url: &'a str,
        ) -> BoxFuture<'a, Result<RawResponse, ToolflowError>> {
            Box::pin(async move { Ok(self.0.clone()) })
        }
    }

    fn link(filename: &str) -> DownloadLink {
        DownloadLink {
            url: "/files/merged123.pdf".into(),
            filename: filename.into(),
        }
    }

    #[test]
    fn strips_directories() {
        assert_eq!(safe_filename("../../etc/passwd"), "passwd");
        assert_eq!(safe_filename("C:\\temp\\out.pdf"), "out.pdf");
        assert_eq!(safe_filename(".."), "download");
        assert_eq!(safe_filename(""), "download");
    }

    #[tokio::test]
    async fn writes_body_under_suggested_name() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Fixed(RawResponse {
            status: 200,
            retry_after: None,
            body: b"%PDF-1.7 merged".to_vec(),
        });
        let path = fetch_to_dir(&transport, &link("merged.pdf"), dir.path().join("out"))
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("out").join("merged.pdf"));
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.7 merged");
        assert!(!dir.path().join("out").join(".merged.pdf.part").exists());
    }

    #[tokio::test]
    async fn http_error_is_download_failure() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Fixed(RawResponse {
            status: 404,
            retry_after: None,
            body: Vec::new(),
        });
        let err = fetch_to_dir(&transport, &link("merged.pdf"), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolflowError::DownloadFailed { .. }));
        assert!(!dir.path().join("merged.pdf").exists());
    }

    #[tokio::test]
    async fn failed_rename_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // a non-empty directory under the target name makes the rename fail
        let blocker = dir.path().join("merged.pdf");
        std::fs::create_dir(&blocker).unwrap();
        std::fs::write(blocker.join("keep"), b"x").unwrap();

        let transport = Fixed(RawResponse {
            status: 200,
            retry_after: None,
            body: b"%PDF-1.7 merged".to_vec(),
        });
        let err = fetch_to_dir(&transport, &link("merged.pdf"), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolflowError::OutputWriteFailed { .. }));
        assert!(!dir.path().join(".merged.pdf.part").exists());
        assert!(blocker.join("keep").exists());
    }
}
