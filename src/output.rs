use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use itertools::Itertools;
use tracing::{debug, warn};

use crate::error::BodyError;

/// Quantity selected by an output channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputQuantity {
    /// Pose component (position, then roll/pitch/yaw)
    Position,
    /// Velocity component (linear, then angular)
    Velocity,
    /// Net force component (force, then moment)
    Force,
}

/// One scalar of a body's state selected for recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputChannel {
    quantity: OutputQuantity,
    /// Component index, 0..6
    index: usize,
}

impl OutputChannel {
    pub fn new(quantity: OutputQuantity, index: usize) -> Result<Self, BodyError> {
        if index >= 6 {
            return Err(BodyError::invalid_input(format!(
                "output channel index {index} out of range"
            )));
        }
        Ok(Self { quantity, index })
    }

    /// Parses a channel name of the form `Body<id><suffix>` where the suffix
    /// is one of `PX PY PZ RX RY RZ VX VY VZ RVX RVY RVZ FX FY FZ MX MY MZ`
    /// (case-insensitive). Returns the body id and the channel.
    pub fn parse(name: &str) -> Result<(usize, Self), BodyError> {
        let upper = name.trim().to_ascii_uppercase();
        let rest = upper
            .strip_prefix("BODY")
            .ok_or_else(|| BodyError::invalid_input(format!("'{name}' is not a body channel")))?;
        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).collect::<String>();
        let id = digits
            .parse::<usize>()
            .map_err(|_| BodyError::invalid_input(format!("'{name}' has no body number")))?;

        let (quantity, offset, axis) = match &rest[digits.len()..] {
            s if s.starts_with("RV") => (OutputQuantity::Velocity, 3, &s[2..]),
            s if s.starts_with('P') => (OutputQuantity::Position, 0, &s[1..]),
            s if s.starts_with('R') => (OutputQuantity::Position, 3, &s[1..]),
            s if s.starts_with('V') => (OutputQuantity::Velocity, 0, &s[1..]),
            s if s.starts_with('F') => (OutputQuantity::Force, 0, &s[1..]),
            s if s.starts_with('M') => (OutputQuantity::Force, 3, &s[1..]),
            _ => {
                return Err(BodyError::invalid_input(format!(
                    "unknown body output quantity in '{name}'"
                )))
            }
        };
        let index = match axis {
            "X" => 0,
            "Y" => 1,
            "Z" => 2,
            _ => {
                return Err(BodyError::invalid_input(format!(
                    "unknown axis in output channel '{name}'"
                )))
            }
        };
        Ok((id, Self::new(quantity, offset + index)?))
    }

    pub fn quantity(&self) -> OutputQuantity {
        self.quantity
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

const COLUMNS: [&str; 19] = [
    "Time", "X", "Y", "Z", "Roll", "Pitch", "Yaw", "VX", "VY", "VZ", "RVX", "RVY", "RVZ", "FX",
    "FY", "FZ", "MX", "MY", "MZ",
];

/// Per-body output file.
///
/// Buffered; flushed and closed on drop, including when a simulation is
/// aborted with an error.
pub struct BodyOutput {
    writer: BufWriter<File>,
    body: usize,
}

impl BodyOutput {
    /// Creates the file and writes the header line
    pub fn create(path: impl AsRef<Path>, body: usize) -> Result<Self, BodyError> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{}", COLUMNS.iter().join("\t"))?;
        debug!(body, path = %path.as_ref().display(), "opened body output");
        Ok(Self { writer, body })
    }

    pub fn write(
        &mut self,
        time: f64,
        r6: &[f64; 6],
        v6: &[f64; 6],
        f6: &[f64; 6],
    ) -> Result<(), BodyError> {
        let row = std::iter::once(time)
            .chain(r6.iter().copied())
            .chain(v6.iter().copied())
            .chain(f6.iter().copied())
            .map(|v| format!("{v:.6e}"))
            .join("\t");
        writeln!(self.writer, "{row}")?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), BodyError> {
        self.writer.flush()?;
        Ok(())
    }
}

impl Drop for BodyOutput {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            warn!(body = self.body, error = %e, "failed to flush body output");
        }
    }
}
