//! Append-only CSV log shared by concurrent measurement rounds.

use crate::error::Result;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Records buffered before the writer is flushed.
pub const FLUSH_EVERY: usize = 50;

struct RecorderState {
    writer: csv::Writer<File>,
    pending: usize,
}

/// Mutex-guarded CSV writer. Flushes every [`FLUSH_EVERY`] records and
/// once more on [`Recorder::finish`] or drop.
pub struct Recorder {
    path: PathBuf,
    state: Mutex<Option<RecorderState>>,
}

impl Recorder {
    /// Creates (or truncates) the log file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&path)?;
        tracing::info!(path = %path.display(), "Recording measurements");
        Ok(Self {
            path,
            state: Mutex::new(Some(RecorderState { writer, pending: 0 })),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the log, where companion files are written.
    pub fn output_dir(&self) -> PathBuf {
        self.path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Appends one row. Rows recorded after `finish` are dropped.
    pub fn record<S: AsRef<str>>(&self, fields: &[S]) -> Result<()> {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let Some(state) = guard.as_mut() else {
            return Ok(());
        };
        state
            .writer
            .write_record(fields.iter().map(|f| f.as_ref().as_bytes()))?;
        state.pending += 1;
        if state.pending >= FLUSH_EVERY {
            state.writer.flush()?;
            state.pending = 0;
        }
        Ok(())
    }

    /// Flushes and closes the log.
    pub fn finish(&self) -> Result<()> {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(mut state) = guard.take() {
            state.writer.flush()?;
            tracing::debug!(path = %self.path.display(), "Recording stopped");
        }
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.state
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            tracing::warn!(error = %e, path = %self.path.display(), "Failed to flush recorder");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_rows_written_on_finish() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.csv");
        let recorder = Recorder::create(&path).unwrap();
        recorder.record(&["1", "2", "3"]).unwrap();
        recorder.record(&["4".to_string()]).unwrap();
        recorder.finish().unwrap();
        assert!(!recorder.is_active());
        recorder.record(&["late"]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "1,2,3\n4\n");
        assert_eq!(recorder.output_dir(), dir.path());
    }

    #[test]
    fn test_drop_flushes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("drop.csv");
        {
            let recorder = Recorder::create(&path).unwrap();
            recorder.record(&["a", "b"]).unwrap();
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a,b\n");
    }

    #[test]
    fn test_concurrent_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("parallel.csv");
        let recorder = Arc::new(Recorder::create(&path).unwrap());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let recorder = Arc::clone(&recorder);
                std::thread::spawn(move || {
                    for i in 0..30 {
                        recorder.record(&[t.to_string(), i.to_string()]).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        recorder.finish().unwrap();
        let lines = std::fs::read_to_string(&path).unwrap().lines().count();
        assert_eq!(lines, 120);
    }
}
