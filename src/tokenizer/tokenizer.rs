use tracing::info;

use crate::config::{PreprocessOptions, TokenizerKind};
use crate::error::{Error, Result};
use crate::tokenizer::{BertTokenizer, CharTokenizer, SentencePieceModel, SpaceTokenizer, Vocab};

/// The closed set of tokenizers the preprocessor can run with.
#[derive(Debug, Clone)]
pub enum Tokenizer {
    Bert(BertTokenizer),
    Char(CharTokenizer),
    Space(SpaceTokenizer),
}

impl Tokenizer {
    pub fn new(kind: TokenizerKind, vocab: Vocab) -> Self {
        match kind {
            TokenizerKind::Bert => Tokenizer::Bert(BertTokenizer::new(vocab)),
            TokenizerKind::Char => Tokenizer::Char(CharTokenizer::new(vocab)),
            TokenizerKind::Space => Tokenizer::Space(SpaceTokenizer::new(vocab)),
        }
    }

    /// Resolve the vocabulary the options point at and build the configured tokenizer.
    ///
    /// A SentencePiece model takes precedence over `--vocab_path`: its pieces
    /// are the vocabulary, and the bert tokenizer segments with it. Without
    /// either, the char and space tokenizers derive their vocabulary from the
    /// corpus; the bert tokenizer needs wordpieces and fails.
    pub fn from_options(options: &PreprocessOptions) -> Result<Self> {
        let kind = options.tokenizer;
        if let Some(spm_model_path) = &options.spm_model_path {
            let model = SentencePieceModel::load(spm_model_path)?;
            let tokenizer = match kind {
                TokenizerKind::Bert => Tokenizer::Bert(BertTokenizer::with_sentencepiece(model)?),
                TokenizerKind::Char | TokenizerKind::Space => Self::new(kind, model.vocab()?),
            };
            info!(tokenizer = %kind, vocab_size = tokenizer.vocab().len(), "built tokenizer from sentencepiece model");
            return Ok(tokenizer);
        }

        let vocab = match (&options.vocab_path, kind) {
            (Some(path), _) => Vocab::load(path)?,
            (None, TokenizerKind::Char) => Vocab::build_from_corpus(&options.corpus_path, CharTokenizer::split)?,
            (None, TokenizerKind::Space) => Vocab::build_from_corpus(&options.corpus_path, SpaceTokenizer::split)?,
            (None, TokenizerKind::Bert) => return Err(Error::MissingVocabulary(kind)),
        };

        info!(tokenizer = %kind, vocab_size = vocab.len(), "built tokenizer");
        Ok(Self::new(kind, vocab))
    }

    pub fn kind(&self) -> TokenizerKind {
        match self {
            Tokenizer::Bert(_) => TokenizerKind::Bert,
            Tokenizer::Char(_) => TokenizerKind::Char,
            Tokenizer::Space(_) => TokenizerKind::Space,
        }
    }

    pub fn vocab(&self) -> &Vocab {
        match self {
            Tokenizer::Bert(tokenizer) => tokenizer.vocab(),
            Tokenizer::Char(tokenizer) => tokenizer.vocab(),
            Tokenizer::Space(tokenizer) => tokenizer.vocab(),
        }
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        match self {
            Tokenizer::Bert(tokenizer) => tokenizer.tokenize(text),
            Tokenizer::Char(tokenizer) => tokenizer.tokenize(text),
            Tokenizer::Space(tokenizer) => tokenizer.tokenize(text),
        }
    }

    /// Tokenize and map every token to its vocabulary id.
    pub fn encode(&self, text: &str) -> Vec<usize> {
        self.vocab().get_indices(&self.tokenize(text))
    }

    pub fn decode(&self, indices: &[usize]) -> String {
        self.vocab().get_tokens(indices).join(" ")
    }
}
