use candle_core::Device;
use scitag_core::conll::{self, ConllWriter};
use scitag_core::dataset::{batches, DatasetConfig, DatasetKind, TaggingDataset, TextDataset};
use scitag_core::embedding::{EmbeddingType, GloveFile};
use scitag_core::tagging::TagSet;
use scitag_core::vocab::SpecialTokens;
use scitag_core::{AnnotationLoader, WordTokenizer};
use tempdir::TempDir;

const DOCS: &[(&str, &str, &str)] = &[
    (
        "S0001",
        "Carbon nanotubes improve solar cells. We test them.",
        "T1\tMaterial 0 16\tCarbon nanotubes\n\
         T2\tProcess 17 24\timprove\n\
         T3\tMaterial 25 36\tsolar cells\n\
         R1\tHyponym-of Arg1:T1 Arg2:T3\n",
    ),
    (
        "S0002",
        "Entity extraction helps parsing. It is fast.",
        "T1\tTask 0 17\tEntity extraction\n\
         T2\tTask 24 31\tparsing\n\
         T3\tTask broken offsets\tparsing\n",
    ),
];

fn write_corpus(dir: &TempDir) {
    for (id, text, ann) in DOCS {
        std::fs::write(dir.path().join(format!("{id}.txt")), text).unwrap();
        std::fs::write(dir.path().join(format!("{id}.ann")), ann).unwrap();
    }
}

#[test]
fn brat_to_tensors() {
    let corpus = TempDir::new("scitag-corpus").unwrap();
    let work = TempDir::new("scitag-work").unwrap();
    write_corpus(&corpus);

    let loader = AnnotationLoader::new(corpus.path());
    assert_eq!(loader.file_ids().unwrap(), ["S0001", "S0002"]);

    let paths = ConllWriter::new(WordTokenizer::new().unwrap())
        .write_all(&loader, work.path(), "train")
        .unwrap();
    let merged = work.path().join("train_conll.txt");
    let rows = conll::merge_files(&paths[0], &paths[1], &paths[2], &merged).unwrap();
    assert_eq!(rows, 10 + 9);

    let tags = TagSet::bilou(&["Task"]).unwrap();
    let config = DatasetConfig::new(&merged, DatasetKind::Train, work.path().join("vocab.json"))
        .with_max_length(8)
        .with_embedding_type(EmbeddingType::Glove6B(50));
    let dataset = TaggingDataset::from_file(config, tags, 1).unwrap();
    assert_eq!(dataset.len(), 4);
    assert_eq!(
        dataset.lines_labels().1[2],
        "B-Task L-Task O-Task U-Task O-Task"
    );

    let batches = batches(&dataset, 3).unwrap();
    assert_eq!(batches.len(), 2);
    let tensors = batches[0].to_tensors(&Device::Cpu).unwrap();
    assert_eq!(tensors.tokens.dims(), [3, 8]);
    assert_eq!(tensors.labels.dims(), [3, 8]);
    let lengths = tensors.lengths.to_vec1::<u32>().unwrap();
    assert_eq!(lengths, [6, 4, 5]);

    let first = &batches[0].tokens[1];
    assert_eq!(&first[4..], [SpecialTokens::PAD_ID; 4]);
    assert_eq!(batches[0].labels[1][4..], [dataset.pad_label(); 4]);
}

#[test]
fn embedding_matrix_follows_vocabulary() {
    let corpus = TempDir::new("scitag-corpus").unwrap();
    let work = TempDir::new("scitag-work").unwrap();
    write_corpus(&corpus);

    let loader = AnnotationLoader::new(corpus.path());
    let task = work.path().join("train_task_conll.txt");
    ConllWriter::new(WordTokenizer::new().unwrap())
        .write_entity_file(&loader, "Task", &task)
        .unwrap();

    let glove_dir = work.path().join("embeddings");
    std::fs::create_dir_all(&glove_dir).unwrap();
    let vector = vec!["0.5"; 50].join(" ");
    std::fs::write(
        glove_dir.join("glove.6B.50d.txt"),
        format!("carbon {vector}\nparsing {vector}\n"),
    )
    .unwrap();

    let config = DatasetConfig::new(&task, DatasetKind::Train, work.path().join("vocab.json"))
        .with_embedding_type(EmbeddingType::Glove6B(50));
    let dataset =
        TaggingDataset::from_file(config, TagSet::bilou(&["Task"]).unwrap(), 1).unwrap();

    let matrix = dataset.preloaded_word_embedding(&glove_dir).unwrap();
    let vocab = dataset.vocabulary();
    assert_eq!(matrix.rows(), vocab.len());
    assert_eq!(matrix.dimension(), 50);
    assert!(matrix.row(SpecialTokens::PAD_ID).unwrap().iter().all(|&v| v == 0.0));
    assert!(matrix.row(vocab.lookup("Carbon")).unwrap().iter().all(|&v| v == 0.5));
    assert!(matrix.row(vocab.lookup("parsing")).unwrap().iter().all(|&v| v == 0.5));

    let glove = GloveFile::load(glove_dir.join("glove.6B.50d.txt"), 50).unwrap();
    assert_eq!(glove.len(), 2);
}

#[test]
fn predicted_columns_back_to_ann() {
    let corpus = TempDir::new("scitag-corpus").unwrap();
    let work = TempDir::new("scitag-work").unwrap();
    std::fs::write(corpus.path().join("S0001.txt"), DOCS[0].1).unwrap();
    std::fs::write(corpus.path().join("S0001.ann"), DOCS[0].2).unwrap();

    let loader = AnnotationLoader::new(corpus.path());
    let paths = ConllWriter::new(WordTokenizer::new().unwrap())
        .write_all(&loader, work.path(), "S0001")
        .unwrap();
    let merged = work.path().join("S0001_conll.txt");
    conll::merge_files(&paths[0], &paths[1], &paths[2], &merged).unwrap();

    let ann = work.path().join("S0001.ann");
    let tokenizer = WordTokenizer::new().unwrap();
    let written = conll::write_ann_file(&merged, &ann, &tokenizer, DOCS[0].1).unwrap();
    assert_eq!(written, 3);

    let text = std::fs::read_to_string(&ann).unwrap();
    assert!(text.contains("Process 17 24\timprove"));
    assert!(text.contains("Material 0 16\tCarbon nanotubes"));
    assert!(text.contains("Material 25 36\tsolar cells"));
}

#[test]
fn stratified_split_of_labeled_lines() {
    use scitag_core::split::StratifiedSplitter;

    let labels: Vec<String> = (0..50)
        .map(|i| if i % 5 == 0 { "title" } else { "author" }.to_string())
        .collect();
    let lines: Vec<String> = (0..50).map(|i| format!("line {i}")).collect();

    let split = StratifiedSplitter::default().split(lines, labels).unwrap();
    assert_eq!(split.train.len(), 40);
    assert_eq!(split.valid.len() + split.test.len(), 10);

    let titles = split.train.iter().filter(|(_, l)| l == "title").count();
    assert_eq!(titles, 8);
}
