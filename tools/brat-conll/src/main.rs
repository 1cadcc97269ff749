//! Brat to CoNLL Tool
//!
//! Converts a folder of brat `.txt`/`.ann` documents into BILOU-tagged CoNLL
//! files, builds vocabularies from CoNLL corpora, splits `text###label` files
//! and turns predicted CoNLL columns back into `.ann` files.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use tracing::info;

use scitag_core::conll::{self, ConllWriter};
use scitag_core::dataset::classification::LABEL_SEP;
use scitag_core::{
    AnnotationLoader, SpecialTokens, StratifiedSplitter, Vocabulary, VocabularyConfig,
    WordTokenizer,
};

/// CLI arguments
#[derive(Parser)]
#[command(name = "brat-conll")]
#[command(about = "Convert brat annotations to CoNLL and prepare training data")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write per-entity CoNLL files and their merged file
    Convert {
        /// Folder holding <id>.txt and <id>.ann pairs
        #[arg(short, long)]
        input: PathBuf,
        /// Output directory
        #[arg(short, long)]
        output: PathBuf,
        /// File name stem, e.g. `train` gives train_task_conll.txt
        #[arg(short, long, default_value = "train")]
        stem: String,
        /// One block per document instead of per sentence
        #[arg(long)]
        document_wise: bool,
    },
    /// Build a vocabulary from one CoNLL file
    Vocab {
        /// CoNLL file
        #[arg(short, long)]
        input: PathBuf,
        /// Where to store the vocabulary JSON
        #[arg(short, long)]
        out: PathBuf,
        /// Words kept besides the reserved tokens
        #[arg(short, long, default_value_t = 3000)]
        max_num_words: usize,
    },
    /// Stratified split of a `text###label` file into train/valid/test files
    Split {
        /// Labeled lines
        #[arg(short, long)]
        input: PathBuf,
        /// Output directory
        #[arg(short, long)]
        output: PathBuf,
        /// Split seed
        #[arg(long, default_value_t = 1729)]
        seed: u64,
    },
    /// Rebuild a brat .ann file from a merged CoNLL file
    Ann {
        /// Merged `word task process material` file of one document
        #[arg(short, long)]
        input: PathBuf,
        /// The document's .txt file
        #[arg(short, long)]
        text: PathBuf,
        /// Output .ann file
        #[arg(short, long)]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let tokenizer = WordTokenizer::new().context("Failed to build word tokenizer")?;

    match cli.command {
        Commands::Convert {
            input,
            output,
            stem,
            document_wise,
        } => {
            fs::create_dir_all(&output)
                .with_context(|| format!("Failed to create {}", output.display()))?;
            let loader = AnnotationLoader::new(&input);
            let paths = ConllWriter::new(tokenizer)
                .with_sentence_wise(!document_wise)
                .write_all(&loader, &output, &stem)
                .with_context(|| format!("Failed to convert {}", input.display()))?;

            let merged = output.join(format!("{stem}_conll.txt"));
            let rows = conll::merge_files(&paths[0], &paths[1], &paths[2], &merged)
                .context("Failed to merge entity files")?;
            info!(rows, merged = %merged.display(), "conversion done");
        }
        Commands::Vocab {
            input,
            out,
            max_num_words,
        } => {
            let sequences = conll::read_sequences(&input, 1)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let words: Vec<Vec<String>> = sequences.into_iter().map(|s| s.tokens).collect();
            let config = VocabularyConfig::new(max_num_words + SpecialTokens::COUNT);
            let vocab = Vocabulary::build(&words, &config)?;
            vocab
                .save(&out)
                .with_context(|| format!("Failed to write {}", out.display()))?;
            info!(size = vocab.len(), out = %out.display(), "vocabulary stored");
        }
        Commands::Split {
            input,
            output,
            seed,
        } => {
            let raw = fs::read_to_string(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let (lines, labels): (Vec<String>, Vec<String>) = raw
                .lines()
                .filter_map(|line| line.rsplit_once(LABEL_SEP))
                .map(|(text, label)| (text.trim().to_string(), label.trim().to_string()))
                .unzip();

            let split = StratifiedSplitter::default()
                .with_seed(seed)
                .split(lines, labels)
                .context("Failed to split dataset")?;

            fs::create_dir_all(&output)?;
            for (name, part) in [
                ("train", &split.train),
                ("valid", &split.valid),
                ("test", &split.test),
            ] {
                let body: String = part
                    .iter()
                    .map(|(text, label)| format!("{text}{LABEL_SEP}{label}\n"))
                    .collect();
                let path = output.join(format!("{name}.txt"));
                fs::write(&path, body)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                info!(part = name, lines = part.len(), "wrote split");
            }
        }
        Commands::Ann { input, text, out } => {
            let raw = fs::read_to_string(&text)
                .with_context(|| format!("Failed to read {}", text.display()))?;
            let first_line = raw.lines().next().unwrap_or_default().trim();
            let written = conll::write_ann_file(&input, &out, &tokenizer, first_line)
                .with_context(|| format!("Failed to rebuild {}", out.display()))?;
            info!(annotations = written, out = %out.display(), "ann file written");
        }
    }

    Ok(())
}
