use std::fs;
use std::path::Path;

use clap::Parser;
use prost::Message;
use rust_preprocess::tokenizer::sentencepiece::proto;
use rust_preprocess::tokenizer::{SpecialTokens, Tokenizer, Vocab};
use rust_preprocess::{Args, Error, PreprocessOptions, TokenizerKind};

fn options(dir: &Path, extra: &[&str]) -> PreprocessOptions {
    let corpus = dir.join("corpus.txt");
    fs::write(&corpus, "the cat sat\n\nthe dog ran\n").unwrap();
    let corpus = corpus.to_string_lossy().into_owned();
    let mut argv = vec!["rust_preprocess", "--corpus_path", corpus.as_str()];
    argv.extend_from_slice(extra);
    PreprocessOptions::try_from(Args::try_parse_from(argv).unwrap()).unwrap()
}

fn write_vocab(dir: &Path, words: &[&str]) -> String {
    let path = dir.join("vocab.txt");
    let mut lines: Vec<&str> = SpecialTokens::values().to_vec();
    lines.extend_from_slice(words);
    fs::write(&path, lines.join("\n")).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn selects_each_tokenizer_kind() {
    let dir = tempfile::tempdir().unwrap();
    let vocab = write_vocab(dir.path(), &["the", "cat", "sat", "##s"]);
    for kind in ["bert", "char", "space"] {
        let options = options(dir.path(), &["--tokenizer", kind, "--vocab_path", &vocab]);
        let tokenizer = Tokenizer::from_options(&options).unwrap();
        assert_eq!(tokenizer.kind().as_str(), kind);
        assert_eq!(tokenizer.vocab().len(), 9);
    }
}

#[test]
fn tokenizers_split_differently() {
    let dir = tempfile::tempdir().unwrap();
    let vocab = write_vocab(dir.path(), &["the", "cat", "##s", "t", "h", "e"]);
    let build = |kind: &str| {
        Tokenizer::from_options(&options(dir.path(), &["--tokenizer", kind, "--vocab_path", &vocab])).unwrap()
    };

    assert_eq!(build("bert").tokenize("The cats!"), vec!["the", "cat", "##s", "[UNK]"]);
    assert_eq!(build("space").tokenize("the cats"), vec!["the", "[UNK]"]);
    assert_eq!(build("char").tokenize("th e"), vec!["t", "h", "e"]);
    assert_eq!(build("space").encode("the cat"), vec![5, 6]);
}

#[test]
fn space_vocab_is_derived_from_corpus() {
    let dir = tempfile::tempdir().unwrap();
    let tokenizer = Tokenizer::from_options(&options(dir.path(), &["--tokenizer", "space"])).unwrap();
    let vocab = tokenizer.vocab();

    assert_eq!(vocab.get_token(0), Some("[PAD]"));
    // "the" is the most frequent word, so it takes the first free id
    assert_eq!(vocab.get_index("the"), Some(5));
    assert_eq!(vocab.len(), 5 + 5);
    assert_eq!(tokenizer.decode(&tokenizer.encode("the dog")), "the dog");
}

#[test]
fn char_vocab_is_derived_from_corpus() {
    let dir = tempfile::tempdir().unwrap();
    let tokenizer = Tokenizer::from_options(&options(dir.path(), &["--tokenizer", "char"])).unwrap();
    assert!(tokenizer.vocab().contains("t"));
    assert!(!tokenizer.vocab().contains(" "));
    assert_eq!(tokenizer.kind(), TokenizerKind::Char);
}

#[test]
fn bert_without_vocab_fails() {
    let dir = tempfile::tempdir().unwrap();
    let err = Tokenizer::from_options(&options(dir.path(), &["--tokenizer", "bert"])).unwrap_err();
    assert!(matches!(err, Error::MissingVocabulary(TokenizerKind::Bert)));
}

fn write_sentencepiece_model(dir: &Path) -> String {
    let specials = SpecialTokens::values().into_iter().map(|value| proto::Piece {
        piece: Some(value.to_string()),
        score: Some(0.0),
        kind: Some(if value == "[UNK]" { 2 } else { 3 }),
    });
    let pieces = [("▁the", -1.0), ("▁cat", -1.5), ("▁ca", -2.0), ("▁", -2.5), ("t", -3.0), ("s", -3.0)]
        .into_iter()
        .map(|(piece, score)| proto::Piece { piece: Some(piece.to_string()), score: Some(score), kind: Some(1) });
    let model = proto::ModelProto {
        pieces: specials.chain(pieces).collect(),
        trainer_spec: Some(proto::TrainerSpec { model_type: Some(1) }),
        normalizer_spec: None,
    };
    let path = dir.join("m.model");
    fs::write(&path, model.encode_to_vec()).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn sentencepiece_model_segments_for_bert() {
    let dir = tempfile::tempdir().unwrap();
    let model = write_sentencepiece_model(dir.path());
    let tokenizer = Tokenizer::from_options(&options(dir.path(), &["--spm_model_path", &model])).unwrap();

    assert_eq!(tokenizer.kind(), TokenizerKind::Bert);
    assert_eq!(tokenizer.vocab().len(), 11);
    // the model is cased, so "The" falls back to one unknown piece
    assert_eq!(tokenizer.tokenize("The cats"), vec!["▁", "The", "▁cat", "s"]);
    assert_eq!(tokenizer.tokenize("the cats"), vec!["▁the", "▁cat", "s"]);
    assert_eq!(tokenizer.encode("the cats"), vec![5, 6, 10]);
}

#[test]
fn sentencepiece_model_supplies_vocab_for_space() {
    let dir = tempfile::tempdir().unwrap();
    let model = write_sentencepiece_model(dir.path());
    let vocab = write_vocab(dir.path(), &["ignored"]);
    let options = options(
        dir.path(),
        &["--tokenizer", "space", "--spm_model_path", &model, "--vocab_path", &vocab],
    );
    let tokenizer = Tokenizer::from_options(&options).unwrap();

    assert_eq!(tokenizer.kind(), TokenizerKind::Space);
    assert!(!tokenizer.vocab().contains("ignored"));
    assert_eq!(tokenizer.tokenize("▁the dog"), vec!["▁the", "[UNK]"]);
}

#[test]
fn unreadable_sentencepiece_model_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.model");
    fs::write(&path, [0xff, 0xff]).unwrap();
    let err = Tokenizer::from_options(&options(dir.path(), &["--spm_model_path", path.to_str().unwrap()])).unwrap_err();
    assert!(matches!(err, Error::Protobuf(_)));
}

#[test]
fn vocab_without_special_tokens_is_rejected() {
    let err = Vocab::new(vec!["a".to_string(), "b".to_string()]).unwrap_err();
    assert!(matches!(err, Error::MissingSpecialToken(_)));
}
