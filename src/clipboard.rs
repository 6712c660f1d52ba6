//! Clipboard write strategies.
//!
//! Writes go through a two-tier pipeline: the native clipboard first, then a
//! legacy fallback that materializes the text as a scoped surface file and
//! feeds it into the platform copy command. The native tier is unavailable or
//! permission-denied in some environments, so its failure is expected and
//! silent; only total failure surfaces.

use std::path::Path;
use std::process::Stdio;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use tokio::process::Command;

/// A single way of putting text on the system clipboard.
#[async_trait]
pub trait CopyMechanism: Send + Sync {
    async fn copy(&self, text: &str) -> Result<()>;
}

/// Native clipboard write.
pub struct NativeCopy;

#[async_trait]
impl CopyMechanism for NativeCopy {
    async fn copy(&self, text: &str) -> Result<()> {
        let mut clipboard = arboard::Clipboard::new().context("failed to access clipboard")?;
        clipboard
            .set_text(text.to_string())
            .context("failed to set clipboard text")?;
        Ok(())
    }
}

/// Legacy copy-command write, fed from a scoped surface file.
pub struct CommandCopy {
    override_cmd: Option<Vec<String>>,
}

impl CommandCopy {
    /// With an override the given command is the only candidate; otherwise
    /// the platform's usual copy utilities are probed in order.
    pub fn new(override_cmd: Option<Vec<String>>) -> Self {
        Self { override_cmd }
    }

    fn candidates(&self) -> Vec<Vec<String>> {
        match &self.override_cmd {
            Some(cmd) => vec![cmd.clone()],
            None => platform_candidates(),
        }
    }

    async fn run_candidates(&self, surface: &Surface) -> Result<()> {
        let mut last_err = None;
        for candidate in self.candidates() {
            let Some((cmd, args)) = candidate.split_first() else {
                continue;
            };
            let stdin = std::fs::File::open(surface.path())
                .context("failed to reopen copy surface")?;
            let status = match Command::new(cmd)
                .args(args)
                .stdin(Stdio::from(stdin))
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
            {
                Ok(status) => status,
                Err(err) => {
                    // Not installed here; try the next candidate.
                    last_err = Some(anyhow!("failed to run {}: {}", cmd, err));
                    continue;
                }
            };
            if status.success() {
                return Ok(());
            }
            bail!("{} exited with {}", cmd, status);
        }
        Err(last_err.unwrap_or_else(|| anyhow!("no copy command available")))
    }
}

#[async_trait]
impl CopyMechanism for CommandCopy {
    async fn copy(&self, text: &str) -> Result<()> {
        let surface = Surface::materialize(text)?;
        // The surface is removed when the guard drops, whatever the command
        // reported.
        self.run_candidates(&surface).await
    }
}

fn platform_candidates() -> Vec<Vec<String>> {
    if cfg!(target_os = "macos") {
        return vec![vec!["pbcopy".to_string()]];
    }
    if cfg!(target_os = "windows") {
        return vec![vec!["clip".to_string()]];
    }
    vec![
        vec!["wl-copy".to_string()],
        vec![
            "xclip".to_string(),
            "-selection".to_string(),
            "clipboard".to_string(),
        ],
        vec![
            "xsel".to_string(),
            "--clipboard".to_string(),
            "--input".to_string(),
        ],
    ]
}

// Holds the text for the legacy command. Deleting the file is tied to drop so
// no path through the fallback can leak it.
struct Surface {
    file: tempfile::NamedTempFile,
}

impl Surface {
    fn materialize(text: &str) -> Result<Self> {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().context("failed to create copy surface")?;
        file.write_all(text.as_bytes())
            .context("failed to populate copy surface")?;
        file.flush().context("failed to flush copy surface")?;
        Ok(Self { file })
    }

    fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Primary-then-fallback copy strategy.
pub struct CopyPipeline {
    primary: Box<dyn CopyMechanism>,
    fallback: Box<dyn CopyMechanism>,
}

impl CopyPipeline {
    /// Builds the production pipeline: native write, then the copy command.
    pub fn new(copy_cmd: Option<Vec<String>>) -> Self {
        Self::with_mechanisms(Box::new(NativeCopy), Box::new(CommandCopy::new(copy_cmd)))
    }

    /// Builds a pipeline from explicit mechanisms.
    pub fn with_mechanisms(
        primary: Box<dyn CopyMechanism>,
        fallback: Box<dyn CopyMechanism>,
    ) -> Self {
        Self { primary, fallback }
    }

    /// Writes `text` to the clipboard, falling through to the legacy
    /// mechanism when the native one fails. Only the fallback's failure is
    /// reported.
    pub async fn write_text(&self, text: &str) -> Result<()> {
        match self.primary.copy(text).await {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::debug!("native clipboard write failed: {err:#}");
                self.fallback
                    .copy(text)
                    .await
                    .context("legacy copy command failed")
            }
        }
    }
}
