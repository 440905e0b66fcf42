use super::{Sink, SinkError};
use crate::domain::{Level, LogEvent};
use crate::format::SharedFormatter;
use chrono::Utc;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Expands `{pid}`, `{hostname}` and `{date}` (UTC, `YYYY-MM-DD`) in a
/// log file path. Called once when the sink is built.
pub fn resolve_log_path(template: &Path, pid: u32, hostname: &str) -> PathBuf {
    let raw = template.to_string_lossy();
    if !raw.contains('{') {
        return template.to_path_buf();
    }
    let resolved = raw
        .replace("{pid}", &pid.to_string())
        .replace("{hostname}", hostname)
        .replace("{date}", &Utc::now().format("%Y-%m-%d").to_string());
    PathBuf::from(resolved)
}

/// Size-based rotating file.
///
/// When the next line would bring the file to `max_bytes`, `path.N-1` moves
/// to `path.N` down to `path` moving to `path.1`, keeping at most
/// `backup_count` backups. With `backup_count` 0 the file is truncated in
/// place instead. Every line is flushed as it is written.
pub struct RotatingFileSink {
    path: PathBuf,
    file: Option<File>,
    written: u64,
    max_bytes: u64,
    backup_count: usize,
    formatter: SharedFormatter,
    min_level: Level,
}

impl RotatingFileSink {
    /// Opens `path` for appending, creating parent directories. A file that
    /// is already over `max_bytes` is truncated.
    pub fn open(
        path: impl Into<PathBuf>,
        max_bytes: u64,
        backup_count: usize,
        formatter: SharedFormatter,
        min_level: Level,
    ) -> Result<Self, SinkError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut written = file.metadata()?.len();
        if max_bytes > 0 && written > max_bytes {
            file.set_len(0)?;
            written = 0;
        }

        Ok(Self {
            path,
            file: Some(file),
            written,
            max_bytes,
            backup_count,
            formatter,
            min_level,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(format!(".{index}"));
        PathBuf::from(name)
    }

    fn should_rollover(&self, incoming: u64) -> bool {
        self.max_bytes > 0 && self.written > 0 && self.written + incoming >= self.max_bytes
    }

    fn rollover(&mut self) -> Result<(), SinkError> {
        // Close before renaming
        self.file = None;

        if self.backup_count > 0 {
            for index in (1..self.backup_count).rev() {
                let source = self.backup_path(index);
                if source.exists() {
                    let target = self.backup_path(index + 1);
                    if target.exists() {
                        fs::remove_file(&target)?;
                    }
                    fs::rename(&source, &target)?;
                }
            }
            let first = self.backup_path(1);
            if first.exists() {
                fs::remove_file(&first)?;
            }
            fs::rename(&self.path, &first)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        self.file = Some(file);
        self.written = 0;
        Ok(())
    }
}

impl std::fmt::Debug for RotatingFileSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotatingFileSink")
            .field("path", &self.path)
            .field("written", &self.written)
            .field("max_bytes", &self.max_bytes)
            .field("backup_count", &self.backup_count)
            .finish_non_exhaustive()
    }
}

impl Sink for RotatingFileSink {
    fn name(&self) -> &str {
        "file"
    }

    fn min_level(&self) -> Level {
        self.min_level
    }

    fn emit(&mut self, event: &LogEvent) -> Result<(), SinkError> {
        let mut line = self.formatter.format(event);
        line.push('\n');
        let incoming = line.len() as u64;

        if self.should_rollover(incoming) {
            self.rollover()?;
        }

        let file = self.file.as_mut().ok_or(SinkError::Closed)?;
        file.write_all(line.as_bytes())?;
        file.flush()?;
        self.written += incoming;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
            file.sync_all()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::test_support::sample_event;
    use crate::format::TextFormatter;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn sink(path: &Path, max_bytes: u64, backups: usize) -> RotatingFileSink {
        RotatingFileSink::open(path, max_bytes, backups, Arc::new(TextFormatter), Level::DEBUG)
            .unwrap()
    }

    #[test]
    fn test_resolve_placeholders() {
        let resolved = resolve_log_path(Path::new("logs/app.{pid}.{hostname}.log"), 77, "web-1");
        assert_eq!(resolved, PathBuf::from("logs/app.77.web-1.log"));

        let dated = resolve_log_path(Path::new("app-{date}.log"), 1, "h");
        let expected = format!("app-{}.log", Utc::now().format("%Y-%m-%d"));
        assert_eq!(dated, PathBuf::from(expected));
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/app.log");
        let mut sink = sink(&path, 1024, 2);
        sink.emit(&sample_event(Level::INFO, "hello")).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_rotation_keeps_backup_count() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        // Two text lines exceed 100 bytes, so every line after the first rotates.
        let mut sink = sink(&path, 100, 2);
        for i in 0..5 {
            sink.emit(&sample_event(Level::INFO, &format!("line {i}"))).unwrap();
        }
        sink.close().unwrap();

        let current = fs::read_to_string(&path).unwrap();
        assert!(current.contains("line 4"));
        assert!(fs::read_to_string(dir.path().join("app.log.1")).unwrap().contains("line 3"));
        assert!(fs::read_to_string(dir.path().join("app.log.2")).unwrap().contains("line 2"));
        assert!(!dir.path().join("app.log.3").exists());
    }

    #[test]
    fn test_zero_backups_truncates_in_place() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let mut sink = sink(&path, 100, 0);
        sink.emit(&sample_event(Level::INFO, "old")).unwrap();
        sink.emit(&sample_event(Level::INFO, "new")).unwrap();
        sink.close().unwrap();

        let current = fs::read_to_string(&path).unwrap();
        assert!(current.contains("new"));
        assert!(!current.contains("old"));
        assert!(!dir.path().join("app.log.1").exists());
    }

    #[test]
    fn test_oversized_file_truncated_at_startup() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, vec![b'x'; 500]).unwrap();

        let mut sink = sink(&path, 100, 3);
        sink.emit(&sample_event(Level::INFO, "fresh")).unwrap();
        sink.close().unwrap();

        let current = fs::read_to_string(&path).unwrap();
        assert!(!current.contains('x'));
        assert!(current.contains("fresh"));
    }

    #[test]
    fn test_file_exactly_at_limit_kept_at_startup() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, vec![b'x'; 100]).unwrap();

        let mut sink = sink(&path, 100, 3);
        assert_eq!(fs::metadata(&path).unwrap().len(), 100);

        sink.emit(&sample_event(Level::INFO, "next")).unwrap();
        sink.close().unwrap();
        let backup = fs::read_to_string(dir.path().join("app.log.1")).unwrap();
        assert_eq!(backup, "x".repeat(100));
    }

    #[test]
    fn test_small_existing_file_is_appended() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "previous run\n").unwrap();

        let mut sink = sink(&path, 10_000, 3);
        sink.emit(&sample_event(Level::INFO, "this run")).unwrap();
        sink.close().unwrap();

        let current = fs::read_to_string(&path).unwrap();
        assert!(current.starts_with("previous run\n"));
        assert!(current.contains("this run"));
    }
}
