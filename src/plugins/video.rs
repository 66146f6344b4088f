//! Video stream decoding check through an external ffmpeg binary

use anyhow::{anyhow, Context};
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::core::config::from_config;
use crate::core::interrupt::Interrupt;
use crate::core::registry::ValidatorDescriptor;
use crate::core::validator::{
    ConfigError, ValidationResult, Validator, ValidatorConfig, ValidatorError,
};

pub const TYPE_ID: &str = "Videos";
pub const EXTENSIONS: &[&str] = &[
    "3gp", "asf", "avi", "divx", "flv", "m2ts", "m4v", "mkv", "mov", "mp4", "mpeg", "mpg", "ogm",
    "ogv", "rm", "rmvb", "ts", "vob", "webm", "wmv",
];

/// How often a running ffmpeg is checked for exit, interrupt and timeout
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Deserialize)]
struct VideosConfig {
    ffmpeg: PathBuf,
    #[serde(default)]
    timeout_secs: Option<u64>,
}

/// Decodes the whole file with `ffmpeg -f null` and reports anything it prints
#[derive(Debug)]
pub struct VideoValidator {
    ffmpeg: PathBuf,
    timeout: Option<Duration>,
}

impl VideoValidator {
    /// Fails when `ffmpeg` does not point at an existing file
    pub fn new(ffmpeg: PathBuf, timeout: Option<Duration>) -> Result<Self, ConfigError> {
        if !ffmpeg.is_file() {
            return Err(ConfigError::Invalid(format!(
                "Cannot find ffmpeg executable at {}",
                ffmpeg.display()
            )));
        }
        Ok(Self { ffmpeg, timeout })
    }

    pub fn from_config(config: &ValidatorConfig) -> Result<Box<dyn Validator>, ConfigError> {
        let config: VideosConfig = from_config(config)?;
        let timeout = config.timeout_secs.map(Duration::from_secs);
        Ok(Box::new(Self::new(config.ffmpeg, timeout)?))
    }

    pub fn descriptor() -> ValidatorDescriptor {
        ValidatorDescriptor::new(TYPE_ID, EXTENSIONS, Self::from_config)
    }

    fn spawn(&self, path: &Path) -> anyhow::Result<Child> {
        let mut command = Command::new(&self.ffmpeg);
        command
            .args(["-v", "error", "-nostats", "-i"])
            .arg(path)
            .args(["-f", "null", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Keep the terminal's Ctrl-C away from ffmpeg; the interrupt flag decides
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        command
            .spawn()
            .with_context(|| format!("Failed to start {}", self.ffmpeg.display()))
    }

    /// Wait for the child, killing it on interrupt or timeout
    ///
    /// An interrupt seen after the child has exited still wins: ffmpeg may
    /// have died from the same signal, and its output says nothing about the
    /// file.
    fn wait(
        &self,
        child: &mut Child,
        interrupt: &Interrupt,
    ) -> Result<Option<ExitStatus>, ValidatorError> {
        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait().context("Failed to wait for ffmpeg")? {
                if interrupt.is_triggered() {
                    return Err(ValidatorError::Interrupted);
                }
                return Ok(Some(status));
            }
            if interrupt.is_triggered() {
                kill(child);
                return Err(ValidatorError::Interrupted);
            }
            if let Some(timeout) = self.timeout {
                if started.elapsed() >= timeout {
                    kill(child);
                    return Ok(None);
                }
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Validator for VideoValidator {
    fn validate(
        &self,
        path: &Path,
        _extension: &str,
        interrupt: &Interrupt,
    ) -> Result<ValidationResult, ValidatorError> {
        let mut child = self.spawn(path)?;
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = self.wait(&mut child, interrupt)?;

        let mut output = collect(stdout)?;
        output.push_str(&collect(stderr)?);
        if interrupt.is_triggered() {
            return Err(ValidatorError::Interrupted);
        }

        match status {
            None => Ok(ValidationResult::invalid(
                1,
                format!(
                    "ffmpeg timed out after {} seconds",
                    self.timeout.map(|t| t.as_secs()).unwrap_or_default()
                ),
            )),
            Some(status) if !status.success() => {
                tracing::error!("ffmpeg failed for '{}' ({})", path.display(), status);
                if output.is_empty() {
                    output = format!("ffmpeg exited with {}", status);
                }
                Ok(ValidationResult::invalid(1, output))
            }
            Some(_) if !output.is_empty() => Ok(ValidationResult::invalid(1, output)),
            Some(_) => Ok(ValidationResult::valid()),
        }
    }
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Read a pipe to the end on a separate thread so ffmpeg never blocks on it
fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<std::io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        pipe.read_to_end(&mut buffer)?;
        Ok(buffer)
    })
}

fn collect(handle: Option<JoinHandle<std::io::Result<Vec<u8>>>>) -> Result<String, ValidatorError> {
    let Some(handle) = handle else {
        return Ok(String::new());
    };
    let bytes = handle
        .join()
        .map_err(|_| anyhow!("ffmpeg output reader panicked"))?
        .context("Failed to read ffmpeg output")?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
