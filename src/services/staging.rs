use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

const TEMP_PREFIX: &str = "tubely-upload-";

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("upload exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },

    #[error("failed to create staging file: {0}")]
    Create(#[source] std::io::Error),

    #[error("failed to copy upload into staging file: {0}")]
    Copy(#[source] std::io::Error),
}

/// An upload copied to local scratch storage.
///
/// The backing file is unlinked when this value is dropped, whichever way the
/// request ends.
#[derive(Debug)]
pub struct StagedFile {
    file: File,
    path: TempPath,
    size: u64,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Read handle, positioned at the start of the content after staging.
    pub fn file_mut(&mut self) -> &mut File {
        &mut self.file
    }

    /// Closes and unlinks the staged file now instead of on drop.
    pub fn release(self) {
        let StagedFile { file, path, .. } = self;
        drop(file);
        let shown = path.display().to_string();
        if let Err(e) = path.close() {
            tracing::warn!(path = %shown, "Failed to remove staging file: {}", e);
        }
    }
}

/// Streams inbound uploads into uniquely named temp files.
#[derive(Debug, Clone)]
pub struct TempFileStager {
    max_size: u64,
    dir: Option<PathBuf>,
}

impl TempFileStager {
    pub fn new(max_size: u64, dir: Option<PathBuf>) -> Self {
        Self { max_size, dir }
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Copies `reader` into a fresh temp file and rewinds it.
    ///
    /// A `size_hint` above the ceiling is rejected before anything touches the
    /// disk. Without a hint the copy is cut off one byte past the ceiling and
    /// the partial file is discarded.
    pub async fn stage<R>(&self, reader: R, size_hint: Option<u64>) -> Result<StagedFile, StagingError>
    where
        R: AsyncRead + Unpin,
    {
        if size_hint.is_some_and(|declared| declared > self.max_size) {
            return Err(StagingError::TooLarge {
                limit: self.max_size,
            });
        }

        let (std_file, path) = self.create_temp()?.into_parts();
        let mut file = File::from_std(std_file);

        let mut limited = reader.take(self.max_size.saturating_add(1));
        let copied = tokio::io::copy(&mut limited, &mut file)
            .await
            .map_err(StagingError::Copy)?;

        if copied > self.max_size {
            return Err(StagingError::TooLarge {
                limit: self.max_size,
            });
        }

        file.flush().await.map_err(StagingError::Copy)?;
        file.seek(SeekFrom::Start(0))
            .await
            .map_err(StagingError::Copy)?;

        tracing::debug!("Staged {} bytes at {}", copied, path.display());

        Ok(StagedFile {
            file,
            path,
            size: copied,
        })
    }

    fn create_temp(&self) -> Result<tempfile::NamedTempFile, StagingError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_PREFIX);
        match &self.dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(StagingError::Create)
    }
}
