//! Narrowing the chapter list to a range.
//!
//! Bounds are 1-based list positions, both inclusive. They never refer to
//! chapter ids, which stay as assigned by the main-page loader.

use std::io::Write;
use std::process::{Command, Stdio};

use tracing::{debug, warn};

use crate::error::TrimError;
use crate::models::Chapter;

/// Closed interval of 1-based positions; `None` is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrimBounds {
    pub from: Option<usize>,
    pub to: Option<usize>,
}

impl TrimBounds {
    pub fn new(from: Option<usize>, to: Option<usize>) -> Self {
        Self { from, to }
    }
}

/// Keep positions `max(from, 1) ..= min(to, len)` in order.
pub fn trim(chapters: Vec<Chapter>, bounds: TrimBounds) -> Vec<Chapter> {
    let len = chapters.len();
    let start = bounds.from.unwrap_or(1).max(1);
    let end = bounds.to.unwrap_or(len).min(len);
    if start > end {
        debug!("Empty trim range {}..={} over {} chapters", start, end, len);
        return Vec::new();
    }
    chapters
        .into_iter()
        .skip(start - 1)
        .take(end + 1 - start)
        .collect()
}

/// Lets the user choose one line out of many.
pub trait Picker {
    fn pick(&self, prompt: &str, items: &[String]) -> Result<String, TrimError>;
}

/// Runs `fzf` found on `PATH`.
#[derive(Debug, Default)]
pub struct FzfPicker;

impl Picker for FzfPicker {
    fn pick(&self, prompt: &str, items: &[String]) -> Result<String, TrimError> {
        let fzf = which::which("fzf")?;
        let mut child = Command::new(fzf)
            .arg("--prompt")
            .arg(format!("{} ", prompt))
            .arg("--no-sort")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(items.join("\n").as_bytes())?;
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(TrimError::Cancelled);
        }
        let selection = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
        if selection.is_empty() {
            return Err(TrimError::Cancelled);
        }
        Ok(selection)
    }
}

/// Ask for a first and a last chapter by base name.
pub fn interactive_bounds(
    chapters: &[Chapter],
    picker: &dyn Picker,
) -> Result<TrimBounds, TrimError> {
    let names: Vec<String> = chapters.iter().map(Chapter::base_name).collect();
    let position = |selection: String| {
        names
            .iter()
            .position(|name| *name == selection)
            .map(|idx| idx + 1)
            .ok_or(TrimError::UnknownSelection(selection))
    };

    let from = position(picker.pick("From chapter...", &names)?)?;
    let to = position(picker.pick("To chapter...", &names)?)?;
    if from > to {
        warn!(
            "First chapter ({}) comes after the last one ({}); nothing to download",
            from, to
        );
    }
    Ok(TrimBounds::new(Some(from), Some(to)))
}
