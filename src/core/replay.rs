//! Frame traces: JSON-lines recordings of detector + landmark output
//!
//! One `FrameInput` object per line. Blank lines and `#` comments are skipped.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use crate::error::{DoseError, Result};
use crate::types::FrameInput;

/// Iterator over the frames of a trace, validated at the boundary
pub struct FrameTrace<R> {
    lines: io::Lines<R>,
    line: usize,
}

impl<R: BufRead> FrameTrace<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
        }
    }
}

impl FrameTrace<Box<dyn BufRead>> {
    /// Open a trace file, or stdin for `-`
    pub fn open(path: &Path) -> Result<Self> {
        let reader: Box<dyn BufRead> = if path.as_os_str() == "-" {
            Box::new(BufReader::new(io::stdin()))
        } else {
            Box::new(BufReader::new(File::open(path)?))
        };
        Ok(Self::new(reader))
    }
}

impl<R: BufRead> Iterator for FrameTrace<R> {
    type Item = Result<FrameInput>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let raw = match self.lines.next()? {
                Ok(raw) => raw,
                Err(e) => return Some(Err(e.into())),
            };
            self.line += 1;
            match parse_frame_line(&raw) {
                Ok(Some(frame)) => return Some(Ok(frame)),
                Ok(None) => continue,
                Err(DoseError::FrameJson(source)) => {
                    return Some(Err(DoseError::TraceParse {
                        line: self.line,
                        source,
                    }))
                }
                Err(e) => {
                    return Some(Err(DoseError::TraceFrame {
                        line: self.line,
                        source: Box::new(e),
                    }))
                }
            }
        }
    }
}

/// Parse and validate one line; `None` for blank lines and comments
pub fn parse_frame_line(raw: &str) -> Result<Option<FrameInput>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let frame: FrameInput = serde_json::from_str(trimmed).map_err(DoseError::FrameJson)?;
    frame.validate()?;
    Ok(Some(frame))
}
