//! Command-line surface and the validated options handed to every builder.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;

use crate::error::{invalid, Error, Result};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "rust_preprocess",
    about = "Turn a raw text corpus into pretraining instances"
)]
pub struct Args {
    /// Path of the corpus for pretraining.
    #[arg(long = "corpus_path")]
    pub corpus_path: PathBuf,

    /// Path of the vocabulary file.
    #[arg(long = "vocab_path")]
    pub vocab_path: Option<PathBuf>,

    /// Path of the sentence piece model.
    #[arg(long = "spm_model_path")]
    pub spm_model_path: Option<PathBuf>,

    /// Path of the preprocessed dataset.
    #[arg(long = "dataset_path", default_value = "dataset.pt")]
    pub dataset_path: PathBuf,

    /// Bert splits into wordpieces, char into characters, space on whitespace.
    #[arg(long = "tokenizer", value_enum, default_value_t = TokenizerKind::Bert)]
    pub tokenizer: TokenizerKind,

    /// Split the corpus into this many parts, each built by its own worker.
    #[arg(long = "processes_num", default_value_t = 1)]
    pub processes_num: usize,

    /// The training target of the pretraining model.
    #[arg(long = "target", value_enum, default_value_t = Target::Bert)]
    pub target: Target,

    /// Documents held in memory, used by targets that sample negatives.
    #[arg(long = "docs_buffer_size", default_value_t = 100_000)]
    pub docs_buffer_size: usize,

    /// Sequence length of instances.
    #[arg(long = "seq_length", default_value_t = 128)]
    pub seq_length: usize,

    /// Duplicate instances multiple times.
    #[arg(long = "dup_factor", default_value_t = 5)]
    pub dup_factor: usize,

    /// Probability of truncating a sequence to a random shorter length.
    #[arg(long = "short_seq_prob", default_value_t = 0.1)]
    pub short_seq_prob: f64,

    /// Full sentences.
    #[arg(long = "full_sentences")]
    pub full_sentences: bool,

    /// Random seed.
    #[arg(long = "seed", default_value_t = 7)]
    pub seed: u64,

    /// Dynamic masking.
    #[arg(long = "dynamic_masking")]
    pub dynamic_masking: bool,

    /// Span masking.
    #[arg(long = "span_masking")]
    pub span_masking: bool,

    /// Hyperparameter of geometric distribution for span masking.
    #[arg(long = "span_geo_prob", default_value_t = 0.2)]
    pub span_geo_prob: f64,

    /// Max length for span masking.
    #[arg(long = "span_max_length", default_value_t = 10)]
    pub span_max_length: usize,
}

#[derive(clap::ValueEnum, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TokenizerKind {
    Bert,
    Char,
    Space,
}

impl TokenizerKind {
    pub const ALL: [TokenizerKind; 3] = [TokenizerKind::Bert, TokenizerKind::Char, TokenizerKind::Space];

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenizerKind::Bert => "bert",
            TokenizerKind::Char => "char",
            TokenizerKind::Space => "space",
        }
    }
}

impl fmt::Display for TokenizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenizerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TokenizerKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::UnknownTokenizer(s.to_string()))
    }
}

#[derive(clap::ValueEnum, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Target {
    Bert,
    Lm,
    Cls,
    Mlm,
    Bilm,
    Albert,
}

impl Target {
    pub const ALL: [Target; 6] = [
        Target::Bert,
        Target::Lm,
        Target::Cls,
        Target::Mlm,
        Target::Bilm,
        Target::Albert,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Bert => "bert",
            Target::Lm => "lm",
            Target::Cls => "cls",
            Target::Mlm => "mlm",
            Target::Bilm => "bilm",
            Target::Albert => "albert",
        }
    }

    /// Sentence-pair targets reserve three positions for `[CLS] A [SEP] B [SEP]`.
    pub fn is_sentence_pair(&self) -> bool {
        matches!(self, Target::Bert | Target::Albert)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Target {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Target::ALL
            .into_iter()
            .find(|target| target.as_str() == s)
            .ok_or_else(|| Error::UnknownTarget(s.to_string()))
    }
}

/// Parsed and normalized options. Only constructed through [`TryFrom<Args>`],
/// so every instance has already passed validation.
#[derive(Debug, Clone)]
pub struct PreprocessOptions {
    pub corpus_path: PathBuf,
    pub vocab_path: Option<PathBuf>,
    pub spm_model_path: Option<PathBuf>,
    pub dataset_path: PathBuf,
    pub tokenizer: TokenizerKind,
    pub processes_num: usize,
    pub target: Target,
    pub docs_buffer_size: usize,
    pub seq_length: usize,
    pub dup_factor: usize,
    pub short_seq_prob: f64,
    pub full_sentences: bool,
    pub seed: u64,
    pub dynamic_masking: bool,
    pub span_masking: bool,
    pub span_geo_prob: f64,
    pub span_max_length: usize,
}

impl TryFrom<Args> for PreprocessOptions {
    type Error = Error;

    fn try_from(args: Args) -> Result<Self> {
        // One copy under dynamic masking
        let dup_factor = if args.dynamic_masking { 1 } else { args.dup_factor };

        let options = PreprocessOptions {
            corpus_path: args.corpus_path,
            vocab_path: args.vocab_path,
            spm_model_path: args.spm_model_path,
            dataset_path: args.dataset_path,
            tokenizer: args.tokenizer,
            processes_num: args.processes_num,
            target: args.target,
            docs_buffer_size: args.docs_buffer_size,
            seq_length: args.seq_length,
            dup_factor,
            short_seq_prob: args.short_seq_prob,
            full_sentences: args.full_sentences,
            seed: args.seed,
            dynamic_masking: args.dynamic_masking,
            span_masking: args.span_masking,
            span_geo_prob: args.span_geo_prob,
            span_max_length: args.span_max_length,
        };
        options.validate()?;
        Ok(options)
    }
}

impl PreprocessOptions {
    fn validate(&self) -> Result<()> {
        if self.processes_num == 0 {
            return Err(invalid("--processes_num must be at least 1"));
        }
        if self.docs_buffer_size == 0 {
            return Err(invalid("--docs_buffer_size must be at least 1"));
        }
        if self.dup_factor == 0 {
            return Err(invalid("--dup_factor must be at least 1"));
        }
        let min_length = if self.target.is_sentence_pair() { 5 } else { 2 };
        if self.seq_length < min_length {
            return Err(invalid(format!(
                "--seq_length must be at least {min_length} for the {} target",
                self.target
            )));
        }
        if !(0.0..=1.0).contains(&self.short_seq_prob) {
            return Err(invalid("--short_seq_prob must lie in [0, 1]"));
        }
        if !(self.span_geo_prob > 0.0 && self.span_geo_prob <= 1.0) {
            return Err(invalid("--span_geo_prob must lie in (0, 1]"));
        }
        if self.span_max_length == 0 {
            return Err(invalid("--span_max_length must be at least 1"));
        }
        Ok(())
    }
}
