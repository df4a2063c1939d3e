//! Index of archived documents.
//!
//! Archived artifacts are stored flat in one directory as
//! `<YYYY-MM-DD>_<filename>.pdf`. The index lists the entries for one
//! logical filename and picks the most recent one.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use std::cmp::Ordering;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

lazy_static! {
    static ref ARTIFACT_NAME: Regex =
        Regex::new(r"^(\d{4}-\d{2}-\d{2})_(.+)\.pdf$").expect("artifact name pattern is valid");
}

/// One dated document in the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedArtifact {
    pub date: NaiveDate,
    /// Logical filename without date prefix and extension
    pub filename: String,
    pub path: PathBuf,
}

impl ArchivedArtifact {
    /// Parse an archive file name; `None` for anything that is not an artifact.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let captures = ARTIFACT_NAME.captures(name)?;
        let date = NaiveDate::parse_from_str(&captures[1], DATE_FORMAT).ok()?;

        Some(Self {
            date,
            filename: captures[2].to_string(),
            path: path.to_path_buf(),
        })
    }
}

/// Recency order: later date first, ties broken by path so the order is total.
pub fn compare_recency(a: &ArchivedArtifact, b: &ArchivedArtifact) -> Ordering {
    b.date.cmp(&a.date).then_with(|| b.path.cmp(&a.path))
}

pub fn select_latest(entries: &[ArchivedArtifact]) -> Option<&ArchivedArtifact> {
    entries.iter().min_by(|a, b| compare_recency(a, b))
}

pub fn artifact_name(date: NaiveDate, filename: &str) -> String {
    format!("{}_{}.pdf", date.format(DATE_FORMAT), filename)
}

#[derive(Debug, Clone)]
pub struct ArchiveIndex {
    dir: PathBuf,
}

impl ArchiveIndex {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the archive directory if it does not exist yet.
    pub fn ensure_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.dir)
    }

    pub fn artifact_path(&self, date: NaiveDate, filename: &str) -> PathBuf {
        self.dir.join(artifact_name(date, filename))
    }

    /// All artifacts for `filename`, most recent first.
    ///
    /// A missing archive directory is an empty archive.
    pub fn entries_for(&self, filename: &str) -> io::Result<Vec<ArchivedArtifact>> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(artifact) = ArchivedArtifact::from_path(&entry.path()) {
                if artifact.filename == filename {
                    entries.push(artifact);
                }
            }
        }

        entries.sort_by(compare_recency);
        Ok(entries)
    }

    pub fn latest(&self, filename: &str) -> io::Result<Option<ArchivedArtifact>> {
        let entries = self.entries_for(filename)?;
        Ok(select_latest(&entries).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    #[test]
    fn test_parse_artifact_name() {
        let artifact = ArchivedArtifact::from_path(Path::new("/a/2024-03-15_invoice_INV-7.pdf")).unwrap();
        assert_eq!(artifact.date, date("2024-03-15"));
        assert_eq!(artifact.filename, "invoice_INV-7");

        assert!(ArchivedArtifact::from_path(Path::new("invoice.pdf")).is_none());
        assert!(ArchivedArtifact::from_path(Path::new("2024-13-45_x.pdf")).is_none());
        assert!(ArchivedArtifact::from_path(Path::new("2024-03-15_x.txt")).is_none());
    }

    #[test]
    fn test_latest_of_two_dates() {
        let dir = tempdir().unwrap();
        let index = ArchiveIndex::new(dir.path());
        for d in ["2024-01-01", "2024-03-15"] {
            fs::write(index.artifact_path(date(d), "invoice_42"), b"%PDF").unwrap();
        }

        let latest = index.latest("invoice_42").unwrap().unwrap();
        assert_eq!(latest.date, date("2024-03-15"));
        assert_eq!(index.entries_for("invoice_42").unwrap().len(), 2);
    }

    #[test]
    fn test_exact_filename_match() {
        let dir = tempdir().unwrap();
        let index = ArchiveIndex::new(dir.path());
        fs::write(index.artifact_path(date("2024-05-01"), "invoice_42_copy"), b"%PDF").unwrap();
        fs::write(index.artifact_path(date("2024-02-01"), "invoice_42"), b"%PDF").unwrap();

        let entries = index.entries_for("invoice_42").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].date, date("2024-02-01"));
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let dir = tempdir().unwrap();
        let index = ArchiveIndex::new(dir.path().join("missing"));
        assert!(index.entries_for("x").unwrap().is_empty());
        assert!(index.latest("x").unwrap().is_none());

        index.ensure_dir().unwrap();
        index.ensure_dir().unwrap();
        assert!(index.dir().is_dir());
    }

    #[test]
    fn test_select_latest() {
        let a = ArchivedArtifact {
            date: date("2023-12-31"),
            filename: "x".to_string(),
            path: PathBuf::from("2023-12-31_x.pdf"),
        };
        let b = ArchivedArtifact {
            date: date("2024-01-01"),
            ..a.clone()
        };
        let entries = vec![a, b.clone()];
        assert_eq!(select_latest(&entries), Some(&b));
        assert_eq!(select_latest(&[]), None);
    }
}
