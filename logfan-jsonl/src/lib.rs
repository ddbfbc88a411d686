//! JSON-lines [`LogStore`] for `logfan`. Appends one record per line.
//! Always appends; bring your own path.

use chrono::{SecondsFormat, Utc};
use logfan::{LogStore, StorageError};
use serde_json::json;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug)]
pub struct JsonlLogStore {
    path: PathBuf,
    // one writer at a time so concurrent records never interleave
    lock: Mutex<()>,
}

impl JsonlLogStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogStore for JsonlLogStore {
    fn append(&self, level: &str, source: &str, message: &str) -> Result<(), StorageError> {
        let line = record_line(level, source, message);
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path).map_err(|err| {
            tracing::debug!(path = %self.path.display(), error = %err, "jsonl store unavailable");
            err
        })?;
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}

fn record_line(level: &str, source: &str, message: &str) -> String {
    let value = json!({
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "level": level,
        "source": source,
        "message": message,
    });
    value.to_string() + "\n"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_line_is_one_json_object() {
        let line = record_line("ERROR", "radiometer.measure(40)", "first\nsecond");
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1, "embedded newlines are escaped");
        let value: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["level"], "ERROR");
        assert_eq!(value["source"], "radiometer.measure(40)");
        assert_eq!(value["message"], "first\nsecond");
        assert!(value["timestamp"].as_str().unwrap().ends_with('Z'));
    }
}
