//! # Brat Annotation Loader
//!
//! Reads the `<id>.txt` / `<id>.ann` pairs of a brat-style corpus (as used by
//! the ScienceIE task) and filters text-bound annotations by entity type.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;

/// Entity types annotated in the ScienceIE corpus.
pub const SCIENCE_IE_ENTITY_TYPES: &[&str] = &["Task", "Process", "Material"];

/// One manually labeled text span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// Brat identifier, e.g. `T3`.
    pub id: String,
    /// Tag name as written in the file.
    pub tag: String,
    /// Entity type this annotation was requested for.
    pub entity_type: String,
    /// Start character offset.
    pub start: usize,
    /// End character offset (exclusive).
    pub end: usize,
    /// Surface text of the span.
    pub words: String,
}

impl Annotation {
    /// Parse one `.ann` line, keeping it only when its tag matches `entity_type`.
    ///
    /// Returns `Err(reason)` when the line looks like a text-bound annotation
    /// but cannot be read, and `Ok(None)` when it is simply not relevant.
    pub fn parse_line(line: &str, entity_type: &str) -> std::result::Result<Option<Self>, String> {
        let line = line.trim_end_matches(['\n', '\r']);
        if !line.trim_start().starts_with('T') {
            return Ok(None);
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 3 {
            return Err(format!(
                "expected 3 tab-separated fields, found {}",
                fields.len()
            ));
        }

        let parts: Vec<&str> = fields[1].split_whitespace().collect();
        if parts.len() != 3 {
            return Err(format!("expected `tag start end`, found {:?}", fields[1]));
        }

        let start = parts[1]
            .parse::<usize>()
            .map_err(|e| format!("bad start offset {:?}: {e}", parts[1]))?;
        let end = parts[2]
            .parse::<usize>()
            .map_err(|e| format!("bad end offset {:?}: {e}", parts[2]))?;
        if end < start {
            return Err(format!("end offset {end} precedes start offset {start}"));
        }

        if !parts[0].eq_ignore_ascii_case(entity_type) {
            return Ok(None);
        }

        Ok(Some(Self {
            id: fields[0].trim().to_string(),
            tag: parts[0].to_string(),
            entity_type: entity_type.to_string(),
            start,
            end,
            words: fields[2].to_string(),
        }))
    }

    /// Render back into brat's `T<n>\t<tag> <start> <end>\t<words>` form.
    pub fn to_ann_line(&self) -> String {
        format!(
            "{}\t{} {} {}\t{}",
            self.id, self.tag, self.start, self.end, self.words
        )
    }
}

/// Loader over a folder of brat documents.
#[derive(Debug, Clone)]
pub struct AnnotationLoader {
    folder: PathBuf,
}

impl AnnotationLoader {
    pub fn new<P: Into<PathBuf>>(folder: P) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Distinct document ids (file stems) found in the folder, sorted.
    pub fn file_ids(&self) -> Result<Vec<String>> {
        let mut ids = BTreeSet::new();
        for entry in std::fs::read_dir(&self.folder)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.insert(stem.to_string());
            }
        }
        Ok(ids.into_iter().collect())
    }

    /// The document text: the first line of `<file_id>.txt`, trimmed.
    pub fn text(&self, file_id: &str) -> Result<String> {
        let file = File::open(self.folder.join(format!("{file_id}.txt")))?;
        let mut line = String::new();
        BufReader::new(file).read_line(&mut line)?;
        Ok(line.trim().to_string())
    }

    /// All annotations of `entity_type` in `<file_id>.ann`.
    ///
    /// Malformed lines are skipped with a warning; a document without any
    /// matching annotation yields an empty list and a warning.
    pub fn annotations(&self, file_id: &str, entity_type: &str) -> Result<Vec<Annotation>> {
        let file = File::open(self.folder.join(format!("{file_id}.ann")))?;
        let reader = BufReader::new(file);

        let mut annotations = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            match Annotation::parse_line(&line, entity_type) {
                Ok(Some(annotation)) => annotations.push(annotation),
                Ok(None) => {}
                Err(reason) => warn!(
                    file_id,
                    entity_type,
                    line = line_no + 1,
                    "skipping annotation line: {reason}"
                ),
            }
        }

        if annotations.is_empty() {
            warn!(file_id, entity_type, "document has 0 annotations for entity type");
        }

        Ok(annotations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempdir::TempDir;

    #[test]
    fn test_parse_line() {
        let ann = Annotation::parse_line("T1\tTask 0 2\tAI", "task")
            .unwrap()
            .unwrap();
        assert_eq!(ann.id, "T1");
        assert_eq!(ann.tag, "Task");
        assert_eq!(ann.entity_type, "task");
        assert_eq!((ann.start, ann.end), (0, 2));
        assert_eq!(ann.words, "AI");
    }

    #[test]
    fn test_parse_line_other_entity_or_relation() {
        assert_eq!(
            Annotation::parse_line("T1\tMaterial 0 2\tAI", "Task").unwrap(),
            None
        );
        assert_eq!(
            Annotation::parse_line("R1\tHyponym-of Arg1:T1 Arg2:T2\t", "Task").unwrap(),
            None
        );
        assert_eq!(
            Annotation::parse_line("#1\tAnnotatorNotes T1\tnote", "Task").unwrap(),
            None
        );
    }

    #[test]
    fn test_parse_line_wrong_field_count() {
        assert!(Annotation::parse_line("T1 Task 0 2 AI", "Task").is_err());
        assert!(Annotation::parse_line("T1\tTask 0 2", "Task").is_err());
        assert!(Annotation::parse_line("T1\tTask 0 2\tAI\textra", "Task").is_err());
    }

    #[test]
    fn test_parse_line_malformed() {
        assert!(Annotation::parse_line("T1\tTask 0 5;6 9\tfoo bar", "Task").is_err());
        assert!(Annotation::parse_line("T1\tTask zero 2\tAI", "Task").is_err());
        assert!(Annotation::parse_line("T1\tTask 5 2\tAI", "Task").is_err());
    }

    #[test]
    fn test_to_ann_line() {
        let line = "T4\tProcess 10 25\tneural networks";
        let ann = Annotation::parse_line(line, "Process").unwrap().unwrap();
        assert_eq!(ann.to_ann_line(), line);
    }

    #[test]
    fn test_loader_skips_bad_lines() {
        let dir = TempDir::new("scitag-ann").unwrap();
        fs::write(dir.path().join("doc1.txt"), "  AI is useful.\nsecond line\n").unwrap();
        fs::write(
            dir.path().join("doc1.ann"),
            "T1\tTask 0 2\tAI\nT2\tTask 3 x\tis\nT3\tProcess 6 12\tuseful\nT4\ttask 6 12\tuseful\n",
        )
        .unwrap();

        let loader = AnnotationLoader::new(dir.path());
        assert_eq!(loader.file_ids().unwrap(), ["doc1"]);
        assert_eq!(loader.text("doc1").unwrap(), "AI is useful.");

        let tasks = loader.annotations("doc1", "Task").unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].id, "T1");
        assert_eq!(tasks[1].id, "T4");

        assert!(loader.annotations("doc1", "Material").unwrap().is_empty());
    }

    #[test]
    fn test_loader_skips_truncated_lines() {
        let dir = TempDir::new("scitag-ann").unwrap();
        fs::write(dir.path().join("doc2.txt"), "AI is useful.\n").unwrap();
        fs::write(
            dir.path().join("doc2.ann"),
            "T1\tTask 0 2\nT2\tTask 6 12\tuseful\nR1\tUsed-for Arg1:T1 Arg2:T2\n",
        )
        .unwrap();

        let tasks = AnnotationLoader::new(dir.path())
            .annotations("doc2", "Task")
            .unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, "T2");
    }

    #[test]
    fn test_loader_missing_file() {
        let dir = TempDir::new("scitag-ann").unwrap();
        let loader = AnnotationLoader::new(dir.path());
        assert!(loader.annotations("nope", "Task").is_err());
    }
}
