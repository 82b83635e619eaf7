//! Key/value results handed to the surrounding CI pipeline.
//!
//! GitHub Actions reads `key=value` lines and `key<<DELIM ... DELIM` blocks
//! from the file named by `GITHUB_OUTPUT`.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use crate::error::{AppError, Result};

#[derive(Debug, Clone)]
pub enum OutputChannel {
    File(PathBuf),
    /// Dry-run: values are logged instead of written.
    Log,
}

impl OutputChannel {
    /// Pick the destination up front so a missing channel fails before any work.
    pub fn resolve(path: Option<PathBuf>, dry_run: bool) -> Result<Self> {
        if dry_run {
            return Ok(OutputChannel::Log);
        }
        match path {
            Some(path) if !path.as_os_str().is_empty() => Ok(OutputChannel::File(path)),
            _ => Err(AppError::OutputChannel(
                "GITHUB_OUTPUT is not set; outputs cannot be written".to_string(),
            )),
        }
    }

    pub fn write_value(&self, key: &str, value: &str) -> Result<()> {
        self.emit(key, &format!("{key}={value}\n"), value)
    }

    pub fn write_lines(&self, key: &str, lines: &[String]) -> Result<()> {
        let delimiter = heredoc_delimiter(lines);
        let mut block = format!("{key}<<{delimiter}\n");
        for line in lines {
            block.push_str(line);
            block.push('\n');
        }
        block.push_str(&delimiter);
        block.push('\n');
        self.emit(key, &block, &lines.join("\n"))
    }

    fn emit(&self, key: &str, block: &str, value: &str) -> Result<()> {
        match self {
            OutputChannel::Log => {
                tracing::info!(dry_run = true, key, value, "Would write output");
                Ok(())
            }
            OutputChannel::File(path) => {
                let mut file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| {
                        AppError::OutputChannel(format!("Failed to open {}: {e}", path.display()))
                    })?;
                file.write_all(block.as_bytes()).map_err(|e| {
                    AppError::OutputChannel(format!("Failed to write {}: {e}", path.display()))
                })?;
                tracing::info!(key, path = %path.display(), "Wrote output");
                Ok(())
            }
        }
    }
}

fn heredoc_delimiter(lines: &[String]) -> String {
    let mut delimiter = "EOF".to_string();
    let mut n = 0;
    while lines.iter().any(|l| *l == delimiter) {
        n += 1;
        delimiter = format!("EOF_{n}");
    }
    delimiter
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_channel_is_fatal() {
        let err = OutputChannel::resolve(None, false).unwrap_err();
        assert!(matches!(err, AppError::OutputChannel(_)));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_dry_run_needs_no_channel() {
        assert!(matches!(
            OutputChannel::resolve(None, true).unwrap(),
            OutputChannel::Log
        ));
    }

    #[test]
    fn test_appends_values_and_heredoc() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output");
        std::fs::write(&path, "existing=1\n").unwrap();

        let channel = OutputChannel::resolve(Some(path.clone()), false).unwrap();
        channel.write_value("add", "project: a,project: b").unwrap();
        channel
            .write_lines("subtrees", &["rocBLAS".to_string(), "rocSPARSE".to_string()])
            .unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            written,
            "existing=1\nadd=project: a,project: b\nsubtrees<<EOF\nrocBLAS\nrocSPARSE\nEOF\n"
        );
    }

    #[test]
    fn test_delimiter_avoids_collisions() {
        let lines = vec!["EOF".to_string(), "EOF_1".to_string()];
        assert_eq!(heredoc_delimiter(&lines), "EOF_2");
    }
}
