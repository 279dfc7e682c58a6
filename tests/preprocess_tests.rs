use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use rust_preprocess::dataset::load_instances;
use rust_preprocess::tokenizer::Vocab;
use rust_preprocess::{Args, Dataset, Error, Instance, PreprocessOptions, Target, Tokenizer};

const CORPUS: &str = "\
the quick brown fox jumps over the lazy dog
a stitch in time saves nine

all that glitters is not gold
the early bird catches the worm
actions speak louder than words

where there is smoke there is fire
better late than never
";

fn write_corpus(dir: &Path, text: &str) -> PathBuf {
    let path = dir.join("corpus.txt");
    fs::write(&path, text).unwrap();
    path
}

fn options(corpus: &Path, extra: &[&str]) -> PreprocessOptions {
    let corpus = corpus.to_string_lossy().into_owned();
    let dataset = corpus.replace("corpus.txt", "dataset.pt");
    let mut argv = vec![
        "rust_preprocess",
        "--corpus_path",
        corpus.as_str(),
        "--dataset_path",
        dataset.as_str(),
    ];
    argv.extend_from_slice(extra);
    PreprocessOptions::try_from(Args::try_parse_from(argv).unwrap()).unwrap()
}

fn leftover_shards(dir: &Path) -> Vec<String> {
    fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.contains("-tmp-"))
        .collect()
}

#[test]
fn space_lm_with_two_workers_writes_one_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = write_corpus(dir.path(), CORPUS);
    let options = options(
        &corpus,
        &["--tokenizer", "space", "--target", "lm", "--seq_length", "64", "--processes_num", "2"],
    );

    let report = rust_preprocess::run(&options).unwrap();
    assert_eq!(report.shards, 2);
    assert_eq!(report.lines, 9);
    assert!(report.dataset_path.exists());
    assert!(leftover_shards(dir.path()).is_empty());

    let instances = load_instances(&report.dataset_path).unwrap();
    // one instance per non-blank line, all short enough for a single window
    assert_eq!(instances.len(), 7);
    assert_eq!(instances.len(), report.instances);
    for instance in &instances {
        let Instance::Lm { src, seg_pos } = instance else {
            panic!("expected an lm instance, got {instance:?}");
        };
        assert_eq!(src.len(), 65);
        assert!(*seg_pos <= 64);
    }

    // the derived vocabulary is saved next to the dataset
    let vocab = Vocab::load(dir.path().join("dataset.vocab.txt")).unwrap();
    assert!(vocab.contains("quick"));
}

#[test]
fn every_target_builds_padded_instances() {
    for target in Target::ALL {
        let dir = tempfile::tempdir().unwrap();
        let text = if target == Target::Cls {
            "1\tthe quick brown fox\n0\tbetter late\tthan never\n".to_string()
        } else {
            CORPUS.to_string()
        };
        let corpus = write_corpus(dir.path(), &text);
        let options = options(
            &corpus,
            &["--tokenizer", "space", "--target", target.as_str(), "--seq_length", "16", "--processes_num", "3"],
        );

        let report = rust_preprocess::run(&options).unwrap();
        let instances = load_instances(&report.dataset_path).unwrap();
        assert!(!instances.is_empty(), "{target} produced no instances");
        assert!(leftover_shards(dir.path()).is_empty());

        for instance in &instances {
            let expected = if target == Target::Lm { 17 } else { 16 };
            assert_eq!(instance.src().len(), expected, "{target}: {instance:?}");
        }
    }
}

#[test]
fn dataset_builder_matches_the_target_option() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = write_corpus(dir.path(), CORPUS);
    for target in Target::ALL {
        let options = options(&corpus, &["--tokenizer", "space", "--target", target.as_str()]);
        let tokenizer = Tokenizer::from_options(&options).unwrap();
        let dataset = Dataset::new(&options, tokenizer.vocab(), &tokenizer);
        assert_eq!(dataset.target(), target);
    }
}

#[test]
fn span_masking_stays_inside_each_sentence() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = write_corpus(dir.path(), CORPUS);
    let options = options(
        &corpus,
        &[
            "--tokenizer", "space", "--target", "mlm", "--seq_length", "32",
            "--span_masking", "--span_max_length", "3", "--dup_factor", "2",
        ],
    );

    let report = rust_preprocess::run(&options).unwrap();
    let vocab = Vocab::load(dir.path().join("dataset.vocab.txt")).unwrap();
    let lines: Vec<&str> = CORPUS.lines().filter(|line| !line.trim().is_empty()).collect();
    let instances = load_instances(&report.dataset_path).unwrap();
    assert_eq!(instances.len(), lines.len() * 2);
    assert!(instances.iter().any(|instance| instance.tgt_mlm().is_some_and(|tgt| !tgt.is_empty())));

    for (instance, line) in instances.iter().zip(lines.iter().cycle()) {
        let mut expected = vec![vocab.get_index("[CLS]").unwrap()];
        expected.extend(line.split_whitespace().map(|word| vocab.get_index(word).unwrap()));
        expected.push(vocab.get_index("[SEP]").unwrap());
        let real_len = expected.len();

        let Instance::Mlm { src, tgt_mlm: Some(tgt_mlm), seg_pos } = instance else {
            panic!("expected a statically masked mlm instance, got {instance:?}");
        };
        assert_eq!(seg_pos, &vec![real_len]);
        let budget = ((real_len as f64 * 0.15).round() as usize).max(1);
        assert!(tgt_mlm.len() <= budget, "{line}: {tgt_mlm:?}");

        for pair in tgt_mlm.windows(2) {
            assert!(pair[0].0 < pair[1].0);
        }
        for &(position, original) in tgt_mlm {
            // never the leading [CLS], the trailing [SEP] or padding
            assert!((1..real_len - 1).contains(&position), "{line}: {position}");
            assert_eq!(original, expected[position]);
        }
        for (position, &token) in src.iter().enumerate().take(real_len) {
            if tgt_mlm.iter().all(|&(masked, _)| masked != position) {
                assert_eq!(token, expected[position]);
            }
        }
        assert!(src[real_len..].iter().all(|&token| token == 0));
    }
}

#[test]
fn dynamic_masking_omits_targets_and_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = write_corpus(dir.path(), CORPUS);
    let masked = options(&corpus, &["--tokenizer", "space", "--target", "mlm", "--seq_length", "32"]);
    let dynamic = options(
        &corpus,
        &["--tokenizer", "space", "--target", "mlm", "--seq_length", "32", "--dynamic_masking"],
    );
    assert_eq!(masked.dup_factor, 5);
    assert_eq!(dynamic.dup_factor, 1);

    let masked_instances = load_instances(rust_preprocess::run(&masked).unwrap().dataset_path).unwrap();
    assert_eq!(masked_instances.len(), 7 * 5);
    assert!(masked_instances.iter().all(|instance| instance.tgt_mlm().is_some_and(|tgt| !tgt.is_empty())));

    let dynamic_instances = load_instances(rust_preprocess::run(&dynamic).unwrap().dataset_path).unwrap();
    assert_eq!(dynamic_instances.len(), 7);
    assert!(dynamic_instances.iter().all(|instance| instance.tgt_mlm().is_none()));
}

#[test]
fn same_seed_reproduces_the_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = write_corpus(dir.path(), CORPUS);
    let options = options(&corpus, &["--tokenizer", "space", "--seq_length", "24", "--processes_num", "2"]);

    let first = fs::read(rust_preprocess::run(&options).unwrap().dataset_path).unwrap();
    let second = fs::read(rust_preprocess::run(&options).unwrap().dataset_path).unwrap();
    assert_eq!(first, second);
}

#[test]
fn failed_merge_leaves_no_shards() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = write_corpus(dir.path(), CORPUS);
    // a directory in the way of the dataset file makes the merge fail
    fs::create_dir(dir.path().join("dataset.pt")).unwrap();
    let options = options(&corpus, &["--tokenizer", "space", "--target", "lm", "--processes_num", "3"]);

    let err = rust_preprocess::run(&options).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
    assert!(leftover_shards(dir.path()).is_empty());
}

#[test]
fn default_paths_and_flags() {
    let args = Args::try_parse_from(["rust_preprocess", "--corpus_path", "corpus.txt"]).unwrap();
    let options = PreprocessOptions::try_from(args).unwrap();
    assert_eq!(options.dataset_path, PathBuf::from("dataset.pt"));
    assert_eq!(options.target, Target::Bert);
    assert_eq!(options.seq_length, 128);
}

#[test]
fn unknown_choices_fail_before_building() {
    for flag in ["--target", "--tokenizer"] {
        let result = Args::try_parse_from(["rust_preprocess", "--corpus_path", "corpus.txt", flag, "gpt"]);
        assert!(result.is_err(), "{flag} accepted an unknown value");
    }
    assert!(matches!("gpt".parse::<Target>(), Err(Error::UnknownTarget(_))));
}

#[test]
fn missing_corpus_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let vocab = dir.path().join("vocab.txt");
    fs::write(&vocab, "[PAD]\n[UNK]\n[CLS]\n[SEP]\n[MASK]\nthe\n").unwrap();
    let options = options(
        &dir.path().join("corpus.txt"),
        &["--tokenizer", "space", "--vocab_path", vocab.to_str().unwrap(), "--target", "lm"],
    );

    let err = rust_preprocess::run(&options).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
    assert!(leftover_shards(dir.path()).is_empty());
}
