//! Append-only per-target log files and bounded tail reads.
//!
//! Files are never rotated or truncated here. Each start or build appends a
//! timestamped section header, then the child's stdout and stderr are
//! redirected into the same file.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use chrono::Local;

use crate::{AppError, Result};

/// Upper bound on bytes read from the end of a log for a tail.
const TAIL_WINDOW_BYTES: u64 = 512 * 1024;

/// Open `path` for appending and write a section header.
///
/// The header is `--- <label> <local time> ---` followed by one line per
/// entry in `details`. The returned handle is positioned at the end and
/// can be cloned into a child's stdio.
///
/// # Errors
///
/// Returns `AppError::Io` if the file cannot be opened or written.
pub fn open_section(path: &Path, label: &str, details: &[String]) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| {
            AppError::Io(format!(
                "failed to create log directory {}: {err}",
                parent.display()
            ))
        })?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| AppError::Io(format!("failed to open log {}: {err}", path.display())))?;

    let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    let mut header = format!("\n--- {label} {stamp} ---\n");
    for line in details {
        header.push_str(line);
        header.push('\n');
    }
    file.write_all(header.as_bytes())
        .and_then(|()| file.flush())
        .map_err(|err| AppError::Io(format!("failed to write log {}: {err}", path.display())))?;
    Ok(file)
}

/// Append one line to an open log handle, ignoring write failures.
pub fn note(file: &mut File, line: &str) {
    let _ = writeln!(file, "{line}").and_then(|()| file.flush());
}

/// Last `max_lines` lines of `path`, decoded lossily.
///
/// Missing or unreadable files yield an empty string. Only the final
/// window of the file is read, so very long logs stay cheap.
#[must_use]
pub fn tail(path: &Path, max_lines: usize) -> String {
    read_window(path)
        .map(|raw| last_lines(&String::from_utf8_lossy(&raw), max_lines))
        .unwrap_or_default()
}

fn read_window(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    if len > TAIL_WINDOW_BYTES {
        file.seek(SeekFrom::Start(len - TAIL_WINDOW_BYTES))?;
    }
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    if len > TAIL_WINDOW_BYTES {
        // Drop the partial first line cut by the seek.
        let cut = buf.iter().position(|&b| b == b'\n').map_or(0, |i| i + 1);
        buf.drain(..cut);
    }
    Ok(buf)
}

fn last_lines(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}
