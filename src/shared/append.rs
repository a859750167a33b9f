use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only, line-oriented text file.
///
/// Each [`append_line`](Self::append_line) opens the file in append mode and
/// writes the whole line with a single `write_all`, so a line is never split
/// across writes.
#[derive(Debug)]
pub struct AppendFile {
    path: PathBuf,
    lines_written: usize,
}

impl AppendFile {
    /// Start a fresh file, truncating anything already at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
        Ok(Self {
            path,
            lines_written: 0,
        })
    }

    /// Append to `path` without truncating; the file is created on first write.
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lines_written: 0,
        }
    }

    pub fn append_line(&mut self, line: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open {} for append", self.path.display()))?;

        let mut record = String::with_capacity(line.len() + 1);
        record.push_str(line.trim_end_matches('\n'));
        record.push('\n');
        file.write_all(record.as_bytes())
            .with_context(|| format!("Failed to append to {}", self.path.display()))?;
        file.flush()?;

        self.lines_written += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lines written through this handle (not the file's total).
    pub fn lines_written(&self) -> usize {
        self.lines_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_truncates_and_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out/medias.txt");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "stale\n").unwrap();

        let mut file = AppendFile::create(&path).unwrap();
        file.append_line("7.50 Alumno1").unwrap();
        file.append_line("6.25 Alumno2\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "7.50 Alumno1\n6.25 Alumno2\n");
        assert_eq!(file.lines_written(), 2);
    }

    #[test]
    fn test_open_keeps_existing_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.txt");
        fs::write(&path, "first\n").unwrap();

        let mut file = AppendFile::open(&path);
        file.append_line("second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }
}
