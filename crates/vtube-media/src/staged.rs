//! Locally staged upload files.

use std::path::Path;

use tempfile::TempPath;

/// A temporary local file waiting to be uploaded.
///
/// The file is deleted when the `StagedFile` is dropped or discarded, so
/// staged uploads never outlive the request that produced them.
#[derive(Debug)]
pub struct StagedFile {
    path: TempPath,
    file_name: String,
    content_type: Option<String>,
    size: u64,
}

impl StagedFile {
    pub fn new(
        path: TempPath,
        file_name: impl Into<String>,
        content_type: Option<String>,
        size: u64,
    ) -> Self {
        Self {
            path,
            file_name: file_name.into(),
            content_type,
            size,
        }
    }

    /// Write `data` to a new temp file in `dir`, keeping the extension of
    /// `file_name`.
    #[cfg(test)]
    pub fn write_in(
        dir: &Path,
        file_name: &str,
        content_type: Option<String>,
        data: &[u8],
    ) -> std::io::Result<Self> {
        let suffix = extension_suffix(file_name);
        let mut file = tempfile::Builder::new()
            .prefix("vtube-upload-")
            .suffix(&suffix)
            .tempfile_in(dir)?;
        std::io::Write::write_all(&mut file, data)?;
        std::io::Write::flush(&mut file)?;

        Ok(Self::new(
            file.into_temp_path(),
            file_name,
            content_type,
            data.len() as u64,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Original client-side file name.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Delete the local file now, reporting any IO failure.
    pub fn discard(self) -> std::io::Result<()> {
        self.path.close()
    }
}

/// `.ext` of a client file name (empty if it has none).
pub fn extension_suffix(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}
