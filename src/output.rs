use std::io::{self, Write};

use crate::app::{ProgressEvent, ProgressSink};

/// Prints phase messages to stdout and download progress to stderr.
pub struct ConsoleOutput;

impl ProgressSink for ConsoleOutput {
    fn event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Phase(message) => println!("{message}"),
            ProgressEvent::Download { bytes, total } => {
                let mut stderr = io::stderr();
                let _ = write!(stderr, "{}\r", format_progress(bytes, total));
                let _ = stderr.flush();
            }
            ProgressEvent::DownloadFinished => eprintln!(),
        }
    }
}

/// Discards all progress.
pub struct QuietOutput;

impl ProgressSink for QuietOutput {
    fn event(&self, _event: ProgressEvent) {}
}

pub fn format_progress(bytes: u64, total: Option<u64>) -> String {
    match total {
        Some(total) if total > 0 => {
            let percent = bytes as f64 / total as f64 * 100.0;
            format!("Downloaded {bytes} of {total} bytes ({percent:.2}%)")
        }
        _ => format!("Downloaded {bytes} bytes"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_text() {
        assert_eq!(
            format_progress(512, Some(2048)),
            "Downloaded 512 of 2048 bytes (25.00%)"
        );
        assert_eq!(format_progress(512, None), "Downloaded 512 bytes");
    }
}
