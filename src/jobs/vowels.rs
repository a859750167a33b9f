use anyhow::{Context, Result, bail};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::fanout::{FanIn, FanOut};
use crate::report::{EntryStatus, RunReport};
use crate::worker::{ErrorMarker, Payload};

/// Paragraph written to the input file when it does not exist yet.
pub const SAMPLE_TEXT: &str = "This is a sample input file. It holds plenty of vowels: \
aaaa eeee iiii oooo uuuu. Some words are upper case too: AEIOU.\n\
Worker threads let independent counts run side by side and finish sooner.\n";

/// Count `letter` in the file at `path`, ignoring case, one line at a time.
///
/// A missing file yields the error payload (`-1`); it never creates the file.
pub fn count_letter(letter: char, path: &Path) -> Payload<u64> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            tracing::warn!(%letter, path = %path.display(), "input not found");
            return Payload::Error(ErrorMarker::missing_resource(path.display()));
        }
        Err(err) => return Payload::error(format!("cannot open {}: {err}", path.display())),
    };

    let needle: String = letter.to_lowercase().collect();
    let mut count = 0u64;
    for line in BufReader::new(file).lines() {
        match line {
            Ok(line) => count += line.to_lowercase().matches(needle.as_str()).count() as u64,
            Err(err) => return Payload::error(format!("cannot read {}: {err}", path.display())),
        }
    }
    Payload::Value(count)
}

/// Write [`SAMPLE_TEXT`] `repetitions` times to `path`.
pub fn write_sample(path: &Path, repetitions: usize) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    fs::write(path, SAMPLE_TEXT.repeat(repetitions))
        .with_context(|| format!("Failed to write sample input {}", path.display()))
}

/// Lower-cased, de-duplicated letters in sorted order.
pub fn parse_letters(letters: &str) -> Result<Vec<char>> {
    let set: BTreeSet<char> = letters
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .flat_map(char::to_lowercase)
        .collect();
    if set.is_empty() {
        bail!("No letters to count in '{letters}'");
    }
    Ok(set.into_iter().collect())
}

/// One worker per letter over the same input.
pub fn run(input: &Path, letters: &[char], fan_out: &FanOut) -> Result<FanIn<char, u64>> {
    let input: Arc<PathBuf> = Arc::new(input.to_path_buf());
    tracing::info!(path = %input.display(), letters = letters.len(), "counting letters");
    fan_out.run(letters.iter().copied(), move |letter| count_letter(*letter, &input))
}

pub fn report(fan_in: &FanIn<char, u64>) -> RunReport {
    let mut report = RunReport::from_fan_in("Letter counts", fan_in);
    for entry in &mut report.entries {
        if entry.status == EntryStatus::Error {
            let reason = entry.detail.take().unwrap_or_default();
            entry.detail = Some(format!("error reading input ({reason})"));
        }
    }
    let total: u64 = fan_in
        .entries
        .values()
        .filter_map(|e| e.result().and_then(|r| r.payload.value().copied()))
        .sum();
    report.push_summary("letters counted", total);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_count_is_case_insensitive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("texto.txt");
        fs::write(&path, "Banana\nAPPLE and avocado\n").unwrap();

        assert_eq!(count_letter('a', &path), Payload::Value(7));
        assert_eq!(count_letter('A', &path), Payload::Value(7));
        assert_eq!(count_letter('u', &path), Payload::Value(0));
    }

    #[test]
    fn test_missing_file_is_error_not_zero() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.txt");
        let payload = count_letter('e', &path);
        assert!(payload.is_error());
        assert!(!path.exists());
    }

    #[test]
    fn test_sample_has_every_vowel() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/texto.txt");
        write_sample(&path, 3).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.len(), SAMPLE_TEXT.len() * 3);
        for vowel in "aeiou".chars() {
            assert!(matches!(count_letter(vowel, &path), Payload::Value(n) if n > 0));
        }
    }

    #[test]
    fn test_parse_letters() {
        assert_eq!(parse_letters("uoiea").unwrap(), vec!['a', 'e', 'i', 'o', 'u']);
        assert_eq!(parse_letters("A, a, b").unwrap(), vec!['a', 'b']);
        assert!(parse_letters(" ").is_err());
    }

    #[test]
    fn test_run_reports_each_letter_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("texto.txt");
        fs::write(&path, "aeiou AEIOU\n").unwrap();

        let fan_in = run(&path, &['u', 'a'], &FanOut::new(Duration::from_millis(500))).unwrap();
        let report = report(&fan_in);
        let keys: Vec<_> = report.entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "u"]);
        assert_eq!(report.entries[0].value, Some(serde_json::json!(2)));
        assert_eq!(report.summary, vec![("letters counted".to_string(), "4".to_string())]);
    }

    #[test]
    fn test_run_on_missing_input_still_completes() {
        let dir = TempDir::new().unwrap();
        let fan_in = run(
            &dir.path().join("missing.txt"),
            &['a', 'e'],
            &FanOut::new(Duration::from_millis(500)),
        )
        .unwrap();
        assert_eq!(fan_in.entries.len(), 2);
        assert!(fan_in.entries.values().all(|e| e.result().unwrap().payload.is_error()));

        let report = report(&fan_in);
        assert_eq!(report.problem_count(), 2);
        assert!(report.entries[0].detail.as_deref().unwrap().starts_with("error reading input"));
        assert_eq!(report.entries[0].value, Some(serde_json::json!(-1)));
    }
}
