pub mod bert;
pub mod sentencepiece;
pub mod simple;
pub mod token_config;
pub mod tokenizer;
pub mod trie;
pub mod vocab;
pub use bert::BertTokenizer;
pub use sentencepiece::SentencePieceModel;
pub use simple::{CharTokenizer, SpaceTokenizer};
pub use token_config::{SpecialTokens, Token};
pub use tokenizer::Tokenizer;
pub use trie::TrieNode;
pub use vocab::Vocab;
