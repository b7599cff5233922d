use super::{MediaTools, ProcessingError};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

/// Relative tolerance when snapping probed dimensions onto a known ratio.
const RATIO_TOLERANCE: f64 = 0.01;

const KNOWN_RATIOS: &[(&str, f64)] = &[
    ("16:9", 16.0 / 9.0),
    ("9:16", 9.0 / 16.0),
    ("4:3", 4.0 / 3.0),
    ("3:4", 3.0 / 4.0),
];

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    display_aspect_ratio: Option<String>,
}

/// `ffprobe`/`ffmpeg` backed media tools.
///
/// Every child runs with `kill_on_drop`, so a request that is dropped mid-way
/// (client gone, deadline hit) takes its tool processes down with it.
pub struct FfmpegTools {
    ffprobe: String,
    ffmpeg: String,
    timeout: Duration,
}

impl FfmpegTools {
    pub fn new(ffprobe: impl Into<String>, ffmpeg: impl Into<String>, timeout: Duration) -> Self {
        Self {
            ffprobe: ffprobe.into(),
            ffmpeg: ffmpeg.into(),
            timeout,
        }
    }

    async fn run(&self, tool: &'static str, mut command: Command) -> Result<Output, ProcessingError> {
        command
            .kill_on_drop(true)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| ProcessingError::Timeout {
                tool,
                timeout: self.timeout,
            })?
            .map_err(|source| ProcessingError::Spawn { tool, source })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::error!("{} failed: {}", tool, stderr);
            return Err(ProcessingError::Failed {
                tool,
                status: output.status.to_string(),
                stderr,
            });
        }

        Ok(output)
    }
}

#[async_trait]
impl MediaTools for FfmpegTools {
    async fn probe_aspect_ratio(&self, path: &Path) -> Result<String, ProcessingError> {
        let mut command = Command::new(&self.ffprobe);
        command
            .arg("-v")
            .arg("error")
            .arg("-print_format")
            .arg("json")
            .arg("-show_streams")
            .arg(path.as_os_str());

        let output = self.run("ffprobe", command).await?;
        ratio_from_probe(&output.stdout)
    }

    async fn fast_start_remux(&self, input: &Path, output: &Path) -> Result<(), ProcessingError> {
        let mut command = Command::new(&self.ffmpeg);
        command
            .arg("-y") // Overwrite the pre-created scratch file
            .arg("-i")
            .arg(input.as_os_str())
            .arg("-c")
            .arg("copy")
            .arg("-movflags")
            .arg("faststart")
            .arg("-f")
            .arg("mp4")
            .arg(output.as_os_str());

        self.run("ffmpeg", command).await?;
        Ok(())
    }
}

/// Extracts the raw ratio string of the first video stream from ffprobe JSON.
fn ratio_from_probe(stdout: &[u8]) -> Result<String, ProcessingError> {
    let probe: ProbeOutput = serde_json::from_slice(stdout)
        .map_err(|e| ProcessingError::InvalidOutput(format!("ffprobe json: {}", e)))?;

    let stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| ProcessingError::InvalidOutput("no video stream found".to_string()))?;

    if let Some(dar) = stream
        .display_aspect_ratio
        .as_deref()
        .filter(|r| r.contains(':') && *r != "0:1" && *r != "N/A")
    {
        return Ok(dar.to_string());
    }

    match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => Ok(ratio_from_dimensions(w, h)),
        _ => Err(ProcessingError::InvalidOutput(
            "video stream has no dimensions".to_string(),
        )),
    }
}

fn ratio_from_dimensions(width: u32, height: u32) -> String {
    let actual = width as f64 / height as f64;
    if let Some((name, _)) = KNOWN_RATIOS
        .iter()
        .find(|(_, expected)| ((actual - expected) / expected).abs() < RATIO_TOLERANCE)
    {
        return (*name).to_string();
    }

    let divisor = gcd(width, height);
    format!("{}:{}", width / divisor, height / divisor)
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}
