use super::{MediaTools, ProcessingError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempPath;

/// A remuxed copy of a staged upload. Unlinked on drop.
#[derive(Debug)]
pub struct ProcessedArtifact {
    path: TempPath,
    size: u64,
}

impl ProcessedArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn release(self) {
        let shown = self.path.display().to_string();
        if let Err(e) = self.path.close() {
            tracing::warn!(path = %shown, "Failed to remove processed file: {}", e);
        }
    }
}

pub struct FastStartRemuxer {
    tools: Arc<dyn MediaTools>,
    dir: Option<PathBuf>,
}

impl FastStartRemuxer {
    pub fn new(tools: Arc<dyn MediaTools>, dir: Option<PathBuf>) -> Self {
        Self { tools, dir }
    }

    /// Writes a fast-start copy of `input` to a new scratch file.
    ///
    /// The input is left untouched. On any failure the scratch file is removed
    /// and nothing is returned.
    pub async fn remux(&self, input: &Path) -> Result<ProcessedArtifact, ProcessingError> {
        let output = self.create_output()?;

        self.tools.fast_start_remux(input, &output).await?;

        let size = tokio::fs::metadata(&output).await?.len();
        if size == 0 {
            return Err(ProcessingError::InvalidOutput(
                "remux produced an empty file".to_string(),
            ));
        }

        tracing::debug!(
            "Remuxed {} -> {} ({} bytes)",
            input.display(),
            output.display(),
            size
        );

        Ok(ProcessedArtifact { path: output, size })
    }

    fn create_output(&self) -> Result<TempPath, ProcessingError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("tubely-processed-").suffix(".mp4");
        let file = match &self.dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }?;
        Ok(file.into_temp_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    enum Behaviour {
        Copy,
        Empty,
        Fail,
    }

    struct FakeRemux(Behaviour);

    #[async_trait]
    impl MediaTools for FakeRemux {
        async fn probe_aspect_ratio(&self, _path: &Path) -> Result<String, ProcessingError> {
            unreachable!("remuxer never probes")
        }

        async fn fast_start_remux(&self, input: &Path, output: &Path) -> Result<(), ProcessingError> {
            match self.0 {
                Behaviour::Copy => {
                    tokio::fs::copy(input, output).await?;
                    Ok(())
                }
                Behaviour::Empty => Ok(()),
                Behaviour::Fail => {
                    // Leave a partial file behind like a crashed ffmpeg would.
                    tokio::fs::write(output, b"partial").await?;
                    Err(ProcessingError::Failed {
                        tool: "ffmpeg",
                        status: "exit status: 1".to_string(),
                        stderr: "Invalid data found when processing input".to_string(),
                    })
                }
            }
        }
    }

    fn scratch() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.mp4");
        std::fs::write(&input, b"ftypmoovmdat").unwrap();
        (dir, input)
    }

    fn processed_files(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with("tubely-processed-"))
            .count()
    }

    #[tokio::test]
    async fn test_remux_produces_new_file() {
        let (dir, input) = scratch();
        let remuxer = FastStartRemuxer::new(
            Arc::new(FakeRemux(Behaviour::Copy)),
            Some(dir.path().to_path_buf()),
        );

        let artifact = remuxer.remux(&input).await.unwrap();
        assert_ne!(artifact.path(), input.as_path());
        assert_eq!(artifact.size(), 12);
        assert_eq!(std::fs::read(&input).unwrap(), b"ftypmoovmdat");

        let path = artifact.path().to_path_buf();
        artifact.release();
        assert!(!path.exists());
        assert!(input.exists());
    }

    #[tokio::test]
    async fn test_failed_remux_leaves_no_output() {
        let (dir, input) = scratch();
        let remuxer = FastStartRemuxer::new(
            Arc::new(FakeRemux(Behaviour::Fail)),
            Some(dir.path().to_path_buf()),
        );

        let err = remuxer.remux(&input).await.unwrap_err();
        assert!(matches!(err, ProcessingError::Failed { tool: "ffmpeg", .. }));
        assert_eq!(processed_files(dir.path()), 0);
        assert!(input.exists());
    }

    #[tokio::test]
    async fn test_empty_output_is_rejected() {
        let (dir, input) = scratch();
        let remuxer = FastStartRemuxer::new(
            Arc::new(FakeRemux(Behaviour::Empty)),
            Some(dir.path().to_path_buf()),
        );

        let err = remuxer.remux(&input).await.unwrap_err();
        assert!(matches!(err, ProcessingError::InvalidOutput(_)));
        assert_eq!(processed_files(dir.path()), 0);
    }
}
