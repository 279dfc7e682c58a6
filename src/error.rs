use thiserror::Error;

use crate::config::TokenizerKind;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serde_json error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown tokenizer `{0}` (expected one of: bert, char, space)")]
    UnknownTokenizer(String),

    #[error("unknown target `{0}` (expected one of: bert, lm, cls, mlm, bilm, albert)")]
    UnknownTarget(String),

    #[error("the {0} tokenizer requires --vocab_path")]
    MissingVocabulary(TokenizerKind),

    #[error("protobuf decode error: {0}")]
    Protobuf(#[from] prost::DecodeError),

    #[error("invalid sentencepiece model: {0}")]
    SentencePiece(String),

    #[error("vocabulary is missing special token {0}")]
    MissingSpecialToken(&'static str),
}

pub(crate) fn invalid<S: Into<String>>(msg: S) -> Error {
    Error::InvalidConfig(msg.into())
}
