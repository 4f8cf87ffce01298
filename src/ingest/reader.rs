//! File discovery and newline-delimited JSON parsing

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use super::error::IngestError;
use super::record::JsonRecord;

/// Expand a glob pattern into the sorted list of matching regular files
pub fn discover_files(pattern: &str) -> Result<Vec<PathBuf>, IngestError> {
    let entries = glob::glob(pattern)
        .map_err(|e| IngestError::InvalidPattern(format!("{}: {}", pattern, e)))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| IngestError::SourceNotAccessible {
            path: e.path().to_path_buf(),
            reason: e.error().to_string(),
        })?;
        if path.is_file() {
            files.push(path);
        }
    }

    if files.is_empty() {
        return Err(IngestError::NoFilesMatched(pattern.to_string()));
    }

    // Sort by path for consistent ordering
    files.sort();
    tracing::debug!(pattern = %pattern, files = files.len(), "Discovered input files");

    Ok(files)
}

/// Parse one line into a record; `line` is 1-based
fn parse_line(path: &Path, line: usize, text: &str) -> Result<JsonRecord, IngestError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| IngestError::JsonParse {
            path: path.to_path_buf(),
            line,
            error: e.to_string(),
        })?;

    JsonRecord::from_value(value).ok_or_else(|| IngestError::NotAnObject {
        path: path.to_path_buf(),
        line,
    })
}

/// Read every record of a single JSON-lines file
pub fn read_file(path: &Path) -> Result<Vec<JsonRecord>, IngestError> {
    let file = File::open(path).map_err(|e| IngestError::read(path, e))?;
    let reader = BufReader::new(file);
    let mut records = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| IngestError::read(path, e))?;
        let trimmed = line.trim();

        // Skip empty lines
        if trimmed.is_empty() {
            continue;
        }

        records.push(parse_line(path, index + 1, trimmed)?);
    }

    Ok(records)
}

/// Parse files on a dedicated pool of `workers` threads.
///
/// Records come back in file order, then line order. The first failing
/// file aborts the whole read.
pub fn read_files_parallel(
    files: &[PathBuf],
    workers: usize,
) -> Result<Vec<JsonRecord>, IngestError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
        .map_err(|e| IngestError::Pool(e.to_string()))?;

    let per_file: Vec<Vec<JsonRecord>> = pool.install(|| {
        files
            .par_iter()
            .map(|path| read_file(path))
            .collect::<Result<Vec<_>, _>>()
    })?;

    Ok(per_file.into_iter().flatten().collect())
}

/// Lazy record stream over a list of files.
///
/// Opens one file at a time and yields one record per non-blank line.
/// After the first error the iterator is exhausted.
pub struct JsonLinesReader {
    files: std::vec::IntoIter<PathBuf>,
    current: Option<OpenFile>,
    failed: bool,
}

struct OpenFile {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line: usize,
}

impl JsonLinesReader {
    /// Create a reader over an explicit list of files
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self {
            files: files.into_iter(),
            current: None,
            failed: false,
        }
    }

    fn fail(&mut self, error: IngestError) -> Option<Result<JsonRecord, IngestError>> {
        self.failed = true;
        self.current = None;
        Some(Err(error))
    }
}

impl Iterator for JsonLinesReader {
    type Item = Result<JsonRecord, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            if self.current.is_none() {
                let path = self.files.next()?;
                match File::open(&path) {
                    Ok(file) => {
                        self.current = Some(OpenFile {
                            lines: BufReader::new(file).lines(),
                            path,
                            line: 0,
                        })
                    }
                    Err(e) => return self.fail(IngestError::read(path, e)),
                }
            }

            let open = self.current.as_mut()?;
            match open.lines.next() {
                None => {
                    self.current = None;
                }
                Some(Err(e)) => {
                    let path = open.path.clone();
                    return self.fail(IngestError::read(path, e));
                }
                Some(Ok(text)) => {
                    open.line += 1;
                    let trimmed = text.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    let parsed = parse_line(&open.path, open.line, trimmed);
                    return match parsed {
                        Ok(record) => Some(Ok(record)),
                        Err(e) => self.fail(e),
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_lines(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        let mut file = File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        path
    }

    #[test]
    fn test_discover_files_sorted() {
        let dir = TempDir::new().unwrap();
        write_lines(dir.path(), "b/2.json", &[r#"{"n": 2}"#]);
        write_lines(dir.path(), "a/1.json", &[r#"{"n": 1}"#]);
        write_lines(dir.path(), "a/ignored.txt", &["x"]);

        let pattern = format!("{}/*/*.json", dir.path().display());
        let files = discover_files(&pattern).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("a/1.json"));
        assert!(files[1].ends_with("b/2.json"));
    }

    #[test]
    fn test_discover_files_no_match_is_error() {
        let dir = TempDir::new().unwrap();
        let pattern = format!("{}/*/*.json", dir.path().display());
        let err = discover_files(&pattern).unwrap_err();
        assert!(matches!(err, IngestError::NoFilesMatched(_)));
    }

    #[test]
    fn test_discover_files_invalid_pattern() {
        let err = discover_files("data/[.json").unwrap_err();
        assert!(matches!(err, IngestError::InvalidPattern(_)));
    }

    #[test]
    fn test_read_file_skips_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = write_lines(
            dir.path(),
            "events.json",
            &[r#"{"page": "NextSong"}"#, "", r#"{"page": "Home"}"#],
        );

        let records = read_file(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get_str("page"), Some("Home".to_string()));
    }

    #[test]
    fn test_read_file_malformed_line_reports_position() {
        let dir = TempDir::new().unwrap();
        let path = write_lines(dir.path(), "bad.json", &[r#"{"ok": 1}"#, r#"{"broken": "#]);

        match read_file(&path).unwrap_err() {
            IngestError::JsonParse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_read_file_rejects_non_object() {
        let dir = TempDir::new().unwrap();
        let path = write_lines(dir.path(), "array.json", &["[1, 2, 3]"]);
        assert!(matches!(
            read_file(&path).unwrap_err(),
            IngestError::NotAnObject { line: 1, .. }
        ));
    }

    #[test]
    fn test_parallel_read_preserves_order() {
        let dir = TempDir::new().unwrap();
        let mut files = Vec::new();
        for i in 0..8 {
            let a = format!(r#"{{"file": {}, "row": 0}}"#, i);
            let b = format!(r#"{{"file": {}, "row": 1}}"#, i);
            files.push(write_lines(dir.path(), &format!("f{i}.json"), &[&a, &b]));
        }

        let records = read_files_parallel(&files, 4).unwrap();
        assert_eq!(records.len(), 16);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.get_i64("file"), Some((i / 2) as i64));
            assert_eq!(record.get_i64("row"), Some((i % 2) as i64));
        }
    }

    #[test]
    fn test_lazy_reader_streams_across_files() {
        let dir = TempDir::new().unwrap();
        let first = write_lines(dir.path(), "1.json", &[r#"{"n": 1}"#, r#"{"n": 2}"#]);
        let second = write_lines(dir.path(), "2.json", &[r#"{"n": 3}"#]);

        let values: Vec<i64> = JsonLinesReader::new(vec![first, second])
            .map(|r| r.unwrap().get_i64("n").unwrap())
            .collect();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn test_lazy_reader_stops_after_error() {
        let dir = TempDir::new().unwrap();
        let path = write_lines(
            dir.path(),
            "mixed.json",
            &[r#"{"n": 1}"#, "not json", r#"{"n": 3}"#],
        );

        let mut reader = JsonLinesReader::new(vec![path]);
        assert!(reader.next().unwrap().is_ok());
        assert!(reader.next().unwrap().is_err());
        assert!(reader.next().is_none());
    }
}
