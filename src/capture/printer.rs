//! Printer output
//!
//! Printer failures are reported as [`Error::Printer`] and never stop the
//! appliance.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use image::{GrayImage, ImageFormat};

use crate::{Error, Result};

/// Raster printer
pub trait Printer {
    /// Print one image
    ///
    /// # Errors
    ///
    /// Returns a printer error if the job can't be submitted
    fn print_image(&mut self, image: &GrayImage) -> Result<()>;

    /// Advance the paper by `lines` blank lines
    ///
    /// # Errors
    ///
    /// Returns a printer error if the feed can't be submitted
    fn feed(&mut self, lines: u32) -> Result<()>;
}

/// Printer reached through a spooler command (`lp` by default)
#[derive(Debug, Clone)]
pub struct CommandPrinter {
    program: String,
    args: Vec<String>,
}

impl CommandPrinter {
    /// Submit jobs with `program args.. <file>`
    #[must_use]
    pub const fn new(program: String, args: Vec<String>) -> Self {
        Self { program, args }
    }

    fn run(&self, extra: &[&str], file: Option<&std::path::Path>, stdin: Option<&[u8]>) -> Result<()> {
        let mut command = Command::new(&self.program);
        command.args(&self.args).args(extra);
        if let Some(file) = file {
            command.arg(file);
        }

        let mut child = command
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Printer(format!("failed to run {}: {e}", self.program)))?;

        if let (Some(data), Some(mut pipe)) = (stdin, child.stdin.take()) {
            if let Err(e) = pipe.write_all(data) {
                drop(pipe);
                // Reap the spooler before reporting
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::Printer(format!(
                    "failed to write to {}: {e}",
                    self.program
                )));
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| Error::Printer(format!("{} did not finish: {e}", self.program)))?;
        if !output.status.success() {
            return Err(Error::Printer(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(())
    }
}

impl Printer for CommandPrinter {
    fn print_image(&mut self, image: &GrayImage) -> Result<()> {
        let file = tempfile::Builder::new()
            .prefix("sketchbooth-print-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| Error::Printer(e.to_string()))?;
        image
            .save_with_format(file.path(), ImageFormat::Png)
            .map_err(|e| Error::Printer(e.to_string()))?;

        self.run(&[], Some(file.path()), None)?;
        tracing::info!(width = image.width(), height = image.height(), "print job submitted");
        Ok(())
    }

    fn feed(&mut self, lines: u32) -> Result<()> {
        if lines == 0 {
            return Ok(());
        }
        let blank = "\n".repeat(lines as usize);
        self.run(&["-o", "raw"], None, Some(blank.as_bytes()))
    }
}

/// Printer that writes numbered PNG files to a directory
#[derive(Debug, Clone)]
pub struct SpoolPrinter {
    dir: PathBuf,
    printed: u32,
}

impl SpoolPrinter {
    /// Spool into `dir`, creating it if needed
    ///
    /// # Errors
    ///
    /// Returns a printer error if the directory can't be created
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            Error::Printer(format!("failed to create spool dir {}: {e}", dir.display()))
        })?;
        Ok(Self { dir, printed: 0 })
    }

    /// Images written so far
    #[must_use]
    pub const fn printed(&self) -> u32 {
        self.printed
    }
}

impl Printer for SpoolPrinter {
    fn print_image(&mut self, image: &GrayImage) -> Result<()> {
        let path = self.dir.join(format!("print-{:04}.png", self.printed + 1));
        image
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|e| Error::Printer(format!("failed to write {}: {e}", path.display())))?;

        self.printed += 1;
        tracing::info!(path = %path.display(), "print spooled");
        Ok(())
    }

    fn feed(&mut self, lines: u32) -> Result<()> {
        tracing::debug!(lines, "paper feed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spool_numbers_prints() {
        let dir = tempfile::tempdir().unwrap();
        let mut printer = SpoolPrinter::new(dir.path().join("out")).unwrap();

        printer.print_image(&GrayImage::new(4, 4)).unwrap();
        printer.feed(3).unwrap();
        printer.print_image(&GrayImage::new(4, 4)).unwrap();

        assert_eq!(printer.printed(), 2);
        assert!(dir.path().join("out/print-0001.png").is_file());
        assert!(dir.path().join("out/print-0002.png").is_file());
    }

    #[test]
    fn test_missing_spooler_is_printer_error() {
        let mut printer = CommandPrinter::new("sketchbooth-no-such-lp".to_string(), Vec::new());

        assert!(matches!(printer.print_image(&GrayImage::new(2, 2)), Err(Error::Printer(_))));
        assert!(matches!(printer.feed(2), Err(Error::Printer(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_spooler_is_printer_error() {
        let mut printer = CommandPrinter::new("false".to_string(), Vec::new());

        assert!(matches!(printer.print_image(&GrayImage::new(2, 2)), Err(Error::Printer(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_spooler_closing_stdin_is_printer_error() {
        // `true` exits without reading, so a feed larger than a pipe buffer
        // can't be written
        let mut printer = CommandPrinter::new("true".to_string(), Vec::new());

        let err = printer.feed(1 << 20).unwrap_err();
        assert!(matches!(&err, Error::Printer(message) if message.starts_with("failed to write")));
    }

    #[cfg(unix)]
    #[test]
    fn test_successful_job() {
        let mut printer = CommandPrinter::new("true".to_string(), Vec::new());

        printer.print_image(&GrayImage::new(2, 2)).unwrap();
        printer.feed(0).unwrap();
    }
}
