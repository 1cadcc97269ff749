//! # CoNLL Files
//!
//! Writing BILOU-tagged brat documents as space-separated CoNLL columns,
//! merging the per-entity files into one `word task process material` file,
//! reading tag columns back, and turning predicted columns into brat lines.
//!
//! A per-entity row repeats the tag three times (`token tag tag tag`) so that
//! every file has the same four-column shape. Blocks (sentences or whole
//! documents) are separated by one blank line.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::annotation::{Annotation, AnnotationLoader, SCIENCE_IE_ENTITY_TYPES};
use crate::error::{Result, ScitagError};
use crate::tagging::{offsets_from_bilou, BilouConverter, BilouTag, TaggedToken};
use crate::tokenizer::{Token, WordTokenizer};

/// Column separator of every CoNLL file written here.
pub const COLUMN_SEP: &str = " ";

/// One block of a CoNLL file: tokens and the chosen tag column.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConllSequence {
    pub tokens: Vec<String>,
    pub tags: Vec<String>,
}

impl ConllSequence {
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// `<stem>_<entity>_conll.txt`, entity lowercased.
pub fn entity_file_name(stem: &str, entity_type: &str) -> String {
    format!("{stem}_{}_conll.txt", entity_type.to_lowercase())
}

/// A per-entity row: the token followed by its tag three times.
pub fn format_row(token: &str, tag: &BilouTag) -> String {
    format!("{token}{COLUMN_SEP}{tag}{COLUMN_SEP}{tag}{COLUMN_SEP}{tag}")
}

/// Writes brat documents as per-entity CoNLL files.
#[derive(Debug, Clone)]
pub struct ConllWriter {
    tokenizer: WordTokenizer,
    sentence_wise: bool,
}

impl ConllWriter {
    pub fn new(tokenizer: WordTokenizer) -> Self {
        Self {
            tokenizer,
            sentence_wise: true,
        }
    }

    /// Write one block per sentence (default) or one block per document.
    pub fn with_sentence_wise(mut self, sentence_wise: bool) -> Self {
        self.sentence_wise = sentence_wise;
        self
    }

    /// Tagged blocks of one document for one entity type.
    pub fn document_blocks(
        &self,
        loader: &AnnotationLoader,
        file_id: &str,
        entity_type: &str,
    ) -> Result<Vec<Vec<TaggedToken>>> {
        let text = loader.text(file_id)?;
        let annotations = loader.annotations(file_id, entity_type)?;
        let tokens = self.tokenizer.tokenize(&text);
        let converter = BilouConverter::new(entity_type);

        if self.sentence_wise {
            Ok(converter.sentences(&tokens, &annotations))
        } else {
            let lines = converter.lines(&tokens, &annotations);
            Ok(if lines.is_empty() { Vec::new() } else { vec![lines] })
        }
    }

    /// Write every document of `loader` for `entity_type`. Returns the
    /// number of blocks written.
    pub fn write_entity<W: Write>(
        &self,
        loader: &AnnotationLoader,
        entity_type: &str,
        mut out: W,
    ) -> Result<usize> {
        let mut blocks = 0;
        for file_id in loader.file_ids()? {
            for block in self.document_blocks(loader, &file_id, entity_type)? {
                for row in &block {
                    writeln!(out, "{}", format_row(&row.text, &row.tag))?;
                }
                writeln!(out)?;
                blocks += 1;
            }
        }
        out.flush()?;
        Ok(blocks)
    }

    pub fn write_entity_file<P: AsRef<Path>>(
        &self,
        loader: &AnnotationLoader,
        entity_type: &str,
        path: P,
    ) -> Result<usize> {
        let path = path.as_ref();
        let blocks = self.write_entity(loader, entity_type, BufWriter::new(File::create(path)?))?;
        info!(path = %path.display(), entity_type, blocks, "wrote CoNLL file");
        Ok(blocks)
    }

    /// Write one file per ScienceIE entity type into `out_dir`, named with
    /// [`entity_file_name`]. Returns the paths in Task, Process, Material
    /// order.
    pub fn write_all<P: AsRef<Path>>(
        &self,
        loader: &AnnotationLoader,
        out_dir: P,
        stem: &str,
    ) -> Result<Vec<PathBuf>> {
        SCIENCE_IE_ENTITY_TYPES
            .iter()
            .map(|entity_type| -> Result<PathBuf> {
                let path = out_dir.as_ref().join(entity_file_name(stem, entity_type));
                self.write_entity_file(loader, entity_type, &path)?;
                Ok(path)
            })
            .collect()
    }
}

/// Combine the Task, Process and Material files into
/// `word task_tag process_tag material_tag` rows. Returns the number of
/// token rows written.
pub fn merge_files<P, Q, R, S>(task: P, process: Q, material: R, out: S) -> Result<usize>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    R: AsRef<Path>,
    S: AsRef<Path>,
{
    let open = |path: &Path| -> Result<_> { Ok(BufReader::new(File::open(path)?).lines()) };
    let mut inputs = [
        open(task.as_ref())?,
        open(process.as_ref())?,
        open(material.as_ref())?,
    ];
    let mut writer = BufWriter::new(File::create(out.as_ref())?);
    let mut rows = 0;

    for line_no in 1.. {
        let [task_line, process_line, material_line] =
            [0, 1, 2].map(|i| inputs[i].next().transpose());
        let lines = match (task_line?, process_line?, material_line?) {
            (None, None, None) => break,
            (Some(t), Some(p), Some(m)) => [t, p, m],
            _ => {
                return Err(ScitagError::Conll {
                    line: line_no,
                    reason: "entity files have different lengths".into(),
                });
            }
        };

        if lines[0].trim().is_empty() {
            writeln!(writer)?;
            continue;
        }

        let mut word = "";
        let mut tags = Vec::with_capacity(3);
        for line in &lines {
            let columns: Vec<&str> = line.trim().split(COLUMN_SEP).collect();
            if columns.len() != 4 {
                return Err(ScitagError::Conll {
                    line: line_no,
                    reason: format!("expected 4 columns, found {}", columns.len()),
                });
            }
            word = columns[0];
            tags.push(columns[3]);
        }

        writeln!(writer, "{word}{COLUMN_SEP}{}", tags.join(COLUMN_SEP))?;
        rows += 1;
    }

    writer.flush()?;
    debug!(rows, out = %out.as_ref().display(), "merged entity files");
    Ok(rows)
}

/// Read `(tokens, tags)` blocks taking tag column `column` (1 is the first
/// column after the token).
pub fn read_sequences<P: AsRef<Path>>(path: P, column: usize) -> Result<Vec<ConllSequence>> {
    parse_sequences(BufReader::new(File::open(path)?), column)
}

pub fn parse_sequences<R: BufRead>(reader: R, column: usize) -> Result<Vec<ConllSequence>> {
    if column == 0 {
        return Err(ScitagError::Config("tag column 0 is the token column".into()));
    }

    let mut sequences = Vec::new();
    let mut current = ConllSequence::default();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();

        if line.is_empty() {
            if !current.is_empty() {
                sequences.push(std::mem::take(&mut current));
            }
            continue;
        }

        if line.starts_with("-DOCSTART-") {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(tag) = parts.get(column) else {
            return Err(ScitagError::Conll {
                line: idx + 1,
                reason: format!("no column {column} in {line:?}"),
            });
        };
        current.tokens.push(parts[0].to_string());
        current.tags.push(tag.to_string());
    }

    if !current.is_empty() {
        sequences.push(current);
    }

    Ok(sequences)
}

fn char_slice(text: &str, start: usize, end: usize) -> String {
    text.chars().skip(start).take(end.saturating_sub(start)).collect()
}

/// Rebuild brat lines for `text` from tag columns aligned with its
/// non-space tokens. Ids run `T0, T1, ...` across the columns in order; each
/// line is labeled with its column's entity name.
pub fn ann_lines_from_tags(
    tokenizer: &WordTokenizer,
    text: &str,
    columns: &[(&str, Vec<BilouTag>)],
) -> Result<Vec<String>> {
    let tokens: Vec<Token> = tokenizer
        .tokenize(text)
        .into_iter()
        .filter(|t| !t.is_space)
        .collect();

    let mut lines = Vec::new();
    for (entity_name, tags) in columns {
        for (start, end, _) in offsets_from_bilou(&tokens, tags)? {
            let annotation = Annotation {
                id: format!("T{}", lines.len()),
                tag: entity_name.to_string(),
                entity_type: entity_name.to_string(),
                start,
                end,
                words: char_slice(text, start, end),
            };
            lines.push(annotation.to_ann_line());
        }
    }

    Ok(lines)
}

/// Read a merged file for one document and write the brat `.ann` file for
/// `text`. Returns the number of annotations written.
pub fn write_ann_file<P: AsRef<Path>, Q: AsRef<Path>>(
    conll_path: P,
    ann_path: Q,
    tokenizer: &WordTokenizer,
    text: &str,
) -> Result<usize> {
    let mut columns = Vec::with_capacity(SCIENCE_IE_ENTITY_TYPES.len());
    for (idx, entity_name) in SCIENCE_IE_ENTITY_TYPES.iter().enumerate() {
        let tags = read_sequences(conll_path.as_ref(), idx + 1)?
            .into_iter()
            .flat_map(|seq| seq.tags)
            .map(|tag| tag.parse::<BilouTag>())
            .collect::<Result<Vec<_>>>()?;
        columns.push((*entity_name, tags));
    }

    let lines = ann_lines_from_tags(tokenizer, text, &columns)?;
    std::fs::write(ann_path.as_ref(), lines.join("\n"))?;
    Ok(lines.len())
}
