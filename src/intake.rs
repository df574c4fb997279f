//! File intake: validate picked or dropped files and keep the selection.
//!
//! Files arrive through two surfaces, the picker ([`SelectedFileSet::add`])
//! and drag-and-drop ([`SelectedFileSet::drop_items`]). Both run the same
//! checks against the tool's [`ToolSchema`]:
//!
//! 1. type — MIME type, else extension, else `%PDF` magic bytes;
//! 2. size — at most the tool's ceiling (or the configured override).
//!
//! A file failing either check is never added. Multi-file tools skip files
//! already present (same name and size); single-file tools replace the
//! current file.

use crate::error::ToolflowError;
use crate::schema::ToolSchema;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Where a candidate's bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    Memory(Vec<u8>),
    Path(PathBuf),
}

/// A file offered to the tool, not yet validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidate {
    pub name: String,
    /// MIME type as reported by the picker, if any.
    pub mime: Option<String>,
    pub size: u64,
    pub source: FileSource,
}

impl FileCandidate {
    /// An in-memory file.
    pub fn from_bytes(name: impl Into<String>, mime: Option<&str>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.map(str::to_string),
            size: bytes.len() as u64,
            source: FileSource::Memory(bytes),
        }
    }

    /// A file on disk. Only metadata is read here; contents are read at
    /// submission time.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ToolflowError> {
        let path = path.as_ref();
        let unreadable = |source| ToolflowError::FileUnreadable {
            path: path.to_path_buf(),
            source,
        };
        let meta = std::fs::metadata(path).map_err(unreadable)?;
        if !meta.is_file() {
            return Err(unreadable(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "not a regular file",
            )));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime = mime_from_extension(extension_of(&name).as_deref())
            .map(str::to_string)
            .or_else(|| sniff_pdf(path).then(|| "application/pdf".to_string()));

        Ok(Self {
            name,
            mime,
            size: meta.len(),
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    /// Lowercase extension without the dot.
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.name)
    }

    /// Description of the detected type, for error messages.
    pub fn detected_type(&self) -> String {
        self.mime
            .clone()
            .or_else(|| self.extension().map(|e| format!(".{}", e)))
            .unwrap_or_else(|| "unknown type".to_string())
    }

    /// Load the file contents.
    pub async fn read_bytes(&self) -> Result<Vec<u8>, ToolflowError> {
        match &self.source {
            FileSource::Memory(bytes) => Ok(bytes.clone()),
            FileSource::Path(path) => tokio::fs::read(path).await.map_err(|source| {
                ToolflowError::FileUnreadable {
                    path: path.clone(),
                    source,
                }
            }),
        }
    }

    fn same_file(&self, other: &FileCandidate) -> bool {
        self.name == other.name && self.size == other.size
    }
}

/// Something dropped onto the drop zone.
#[derive(Debug, Clone)]
pub enum DropItem {
    File(FileCandidate),
    /// Dragged text or a link. Ignored.
    Text(String),
}

/// Outcome of one intake call.
#[derive(Debug, Default)]
pub struct IntakeReport {
    /// Names of the files added.
    pub accepted: Vec<String>,
    /// Names of the files skipped as duplicates.
    pub duplicates: Vec<String>,
    pub rejected: Vec<ToolflowError>,
}

impl IntakeReport {
    pub fn changed(&self) -> bool {
        !self.accepted.is_empty()
    }
}

/// The ordered files chosen for the current operation.
#[derive(Debug, Clone, Default)]
pub struct SelectedFileSet {
    files: Vec<FileCandidate>,
}

impl SelectedFileSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&self) -> &[FileCandidate] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    /// Validate and add picked files.
    ///
    /// Single-file tools consider only the first candidate, which replaces
    /// the current file when valid.
    pub fn add(
        &mut self,
        schema: &ToolSchema,
        max_size: u64,
        candidates: Vec<FileCandidate>,
    ) -> IntakeReport {
        let mut report = IntakeReport::default();

        if !schema.takes_files() {
            debug!("{} takes no files; ignoring {}", schema.id, candidates.len());
            return report;
        }

        if schema.is_single_file() {
            if let Some(candidate) = candidates.into_iter().next() {
                match validate(schema, max_size, &candidate) {
                    Ok(()) => {
                        report.accepted.push(candidate.name.clone());
                        self.files = vec![candidate];
                    }
                    Err(e) => {
                        warn!("Rejected file: {}", e);
                        report.rejected.push(e);
                    }
                }
            }
            return report;
        }

        for candidate in candidates {
            if let Err(e) = validate(schema, max_size, &candidate) {
                warn!("Rejected file: {}", e);
                report.rejected.push(e);
                continue;
            }
            if self.files.iter().any(|f| f.same_file(&candidate)) {
                debug!("Skipping duplicate file {}", candidate.name);
                report.duplicates.push(candidate.name);
                continue;
            }
            if self.files.len() >= schema.max_files {
                report.rejected.push(ToolflowError::TooManyFiles {
                    max: schema.max_files,
                    selected: self.files.len() + 1,
                });
                continue;
            }
            report.accepted.push(candidate.name.clone());
            self.files.push(candidate);
        }

        report
    }

    /// Add the file items of a drop; anything that is not a file is ignored.
    pub fn drop_items(
        &mut self,
        schema: &ToolSchema,
        max_size: u64,
        items: Vec<DropItem>,
    ) -> IntakeReport {
        let files = items
            .into_iter()
            .filter_map(|item| match item {
                DropItem::File(f) => Some(f),
                DropItem::Text(_) => None,
            })
            .collect();
        self.add(schema, max_size, files)
    }

    /// Remove the file at `index`; returns it if the index was valid.
    pub fn remove(&mut self, index: usize) -> Option<FileCandidate> {
        (index < self.files.len()).then(|| self.files.remove(index))
    }

    /// Reorder files. `new_order` lists current indices in the desired order
    /// and must be a permutation of `0..len`.
    pub fn reorder(&mut self, new_order: &[usize]) -> Result<(), ToolflowError> {
        let invalid = |reason: &str| ToolflowError::InvalidOptionValue {
            name: "order".to_string(),
            value: format!("{:?}", new_order),
            reason: reason.to_string(),
        };
        if new_order.len() != self.files.len() {
            return Err(invalid("wrong number of indices"));
        }
        let mut seen = vec![false; self.files.len()];
        for &idx in new_order {
            if idx >= self.files.len() {
                return Err(invalid("index out of bounds"));
            }
            if seen[idx] {
                return Err(invalid("duplicate index"));
            }
            seen[idx] = true;
        }
        self.files = new_order.iter().map(|&i| self.files[i].clone()).collect();
        Ok(())
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }
}

/// Check one candidate against the tool's allow-list and size ceiling.
pub fn validate(
    schema: &ToolSchema,
    max_size: u64,
    candidate: &FileCandidate,
) -> Result<(), ToolflowError> {
    if !schema.accepts(candidate.mime.as_deref(), candidate.extension().as_deref()) {
        return Err(ToolflowError::UnsupportedFileType {
            name: candidate.name.clone(),
            detected: candidate.detected_type(),
        });
    }
    if candidate.size > max_size {
        return Err(ToolflowError::FileTooLarge {
            name: candidate.name.clone(),
            size: candidate.size,
            max: max_size,
        });
    }
    Ok(())
}

/// Human-readable size: `0 Bytes`, `512 Bytes`, `1.5 KB`, `2 MB`.
///
/// Base 1024, at most two decimals, trailing zeros dropped, capped at GB.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}

fn extension_of(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    (!stem.is_empty() && !ext.is_empty()).then(|| ext.to_ascii_lowercase())
}

fn mime_from_extension(ext: Option<&str>) -> Option<&'static str> {
    Some(match ext? {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "tif" | "tiff" => "image/tiff",
        "svg" => "image/svg+xml",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "txt" => "text/plain",
        _ => return None,
    })
}

fn sniff_pdf(path: &Path) -> bool {
    let mut magic = [0u8; 4];
    std::fs::File::open(path)
        .and_then(|mut f| f.read_exact(&mut magic))
        .map(|_| &magic == b"%PDF")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools;

    const MB: u64 = 1024 * 1024;

    fn pdf(name: &str, size: u64) -> FileCandidate {
        FileCandidate {
            name: name.to_string(),
            mime: Some("application/pdf".to_string()),
            size,
            source: FileSource::Memory(Vec::new()),
        }
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(2 * MB), "2 MB");
        assert_eq!(format_file_size(1_500_000), "1.43 MB");
        assert_eq!(format_file_size(5 * 1024 * 1024 * 1024 * 1024), "5120 GB");
    }

    #[test]
    fn rejects_disallowed_type_and_keeps_set_unchanged() {
        let schema = tools::pdf_merger();
        let mut set = SelectedFileSet::new();
        set.add(&schema, schema.max_file_size, vec![pdf("a.pdf", MB)]);

        let png = FileCandidate::from_bytes("photo.png", Some("image/png"), vec![0; 10]);
        let report = set.add(&schema, schema.max_file_size, vec![png]);

        assert!(!report.changed());
        assert!(matches!(
            report.rejected[0],
            ToolflowError::UnsupportedFileType { .. }
        ));
        assert_eq!(set.len(), 1);
        assert_eq!(set.files()[0].name, "a.pdf");
    }

    #[test]
    fn rejects_oversized_file() {
        let schema = tools::pdf_compressor();
        let mut set = SelectedFileSet::new();
        let report = set.add(&schema, schema.max_file_size, vec![pdf("huge.pdf", 60 * MB)]);
        assert!(set.is_empty());
        assert!(report.rejected[0].user_message().contains("too large"));
    }

    #[test]
    fn size_ceiling_is_inclusive() {
        let schema = tools::pdf_compressor();
        let mut set = SelectedFileSet::new();
        set.add(&schema, 50 * MB, vec![pdf("edge.pdf", 50 * MB)]);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn deduplicates_by_name_and_size() {
        let schema = tools::pdf_merger();
        let mut set = SelectedFileSet::new();
        set.add(&schema, schema.max_file_size, vec![pdf("a.pdf", MB), pdf("b.pdf", MB)]);
        let report = set.add(
            &schema,
            schema.max_file_size,
            vec![pdf("a.pdf", MB), pdf("a.pdf", 2 * MB)],
        );
        assert_eq!(report.duplicates, vec!["a.pdf".to_string()]);
        assert_eq!(report.accepted, vec!["a.pdf".to_string()]);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn single_file_tool_replaces_selection() {
        let schema = tools::pdf_compressor();
        let mut set = SelectedFileSet::new();
        set.add(&schema, schema.max_file_size, vec![pdf("first.pdf", MB)]);
        set.add(&schema, schema.max_file_size, vec![pdf("second.pdf", MB)]);
        assert_eq!(set.len(), 1);
        assert_eq!(set.files()[0].name, "second.pdf");
    }

    #[test]
    fn dropped_text_is_ignored() {
        let schema = tools::pdf_merger();
        let mut set = SelectedFileSet::new();
        let report = set.drop_items(
            &schema,
            schema.max_file_size,
            vec![
                DropItem::Text("https://example.com".into()),
                DropItem::File(pdf("a.pdf", MB)),
            ],
        );
        assert_eq!(report.accepted, vec!["a.pdf".to_string()]);
        assert!(report.rejected.is_empty());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn extension_fallback_when_mime_missing() {
        let schema = tools::pdf_compressor();
        let candidate = FileCandidate::from_bytes("report.PDF", None, b"%PDF-1.7".to_vec());
        assert!(validate(&schema, schema.max_file_size, &candidate).is_ok());
        let unknown = FileCandidate::from_bytes("notes", None, b"hello".to_vec());
        assert!(validate(&schema, schema.max_file_size, &unknown).is_err());
    }

    #[test]
    fn reorder_and_remove() {
        let schema = tools::pdf_merger();
        let mut set = SelectedFileSet::new();
        set.add(
            &schema,
            schema.max_file_size,
            vec![pdf("a.pdf", 1), pdf("b.pdf", 2), pdf("c.pdf", 3)],
        );
        set.reorder(&[2, 0, 1]).unwrap();
        let names: Vec<&str> = set.files().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["c.pdf", "a.pdf", "b.pdf"]);
        assert!(set.reorder(&[0, 0, 1]).is_err());
        assert!(set.reorder(&[0, 1]).is_err());

        assert_eq!(set.remove(1).map(|f| f.name), Some("a.pdf".to_string()));
        assert!(set.remove(5).is_none());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn from_path_sniffs_extensionless_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan");
        std::fs::write(&path, b"%PDF-1.4\n%%EOF").unwrap();
        let candidate = FileCandidate::from_path(&path).unwrap();
        assert_eq!(candidate.mime.as_deref(), Some("application/pdf"));
        assert_eq!(candidate.size, 14);
        assert_eq!(candidate.name, "scan");
    }

    #[test]
    fn read_bytes_from_disk_and_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.pdf");
        std::fs::write(&path, b"%PDF-1.7").unwrap();
        let on_disk = FileCandidate::from_path(&path).unwrap();
        assert_eq!(tokio_test::block_on(on_disk.read_bytes()).unwrap(), b"%PDF-1.7");

        std::fs::remove_file(&path).unwrap();
        assert!(tokio_test::block_on(on_disk.read_bytes()).is_err());

        let in_memory = FileCandidate::from_bytes("b.pdf", None, vec![7, 8]);
        assert_eq!(tokio_test::block_on(in_memory.read_bytes()).unwrap(), vec![7, 8]);
    }

    #[test]
    fn from_path_missing_file() {
        let err = FileCandidate::from_path("/definitely/not/here.pdf").unwrap_err();
        assert!(matches!(err, ToolflowError::FileUnreadable { .. }));
    }
}
