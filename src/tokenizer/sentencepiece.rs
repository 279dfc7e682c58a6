//! SentencePiece models read straight from their protobuf file, with the
//! normalizer and the four segmentation algorithms the format defines.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use prost::Message;
use tracing::info;
use unicode_normalization::UnicodeNormalization;

use crate::error::{Error, Result};
use crate::tokenizer::{TrieNode, Vocab};

/// Stands in for a space inside pieces.
pub const SPACE_SYMBOL: char = '\u{2581}';
const UNK_PENALTY: f32 = 10.0;

const PIECE_NORMAL: i32 = 1;
const PIECE_USER_DEFINED: i32 = 4;

/// The subset of `sentencepiece_model.proto` needed for encoding. Unknown
/// fields are skipped on decode.
pub mod proto {
    use prost::Message;

    #[derive(Clone, PartialEq, Message)]
    pub struct ModelProto {
        #[prost(message, repeated, tag = "1")]
        pub pieces: Vec<Piece>,
        #[prost(message, optional, tag = "2")]
        pub trainer_spec: Option<TrainerSpec>,
        #[prost(message, optional, tag = "3")]
        pub normalizer_spec: Option<NormalizerSpec>,
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct Piece {
        #[prost(string, optional, tag = "1")]
        pub piece: Option<String>,
        #[prost(float, optional, tag = "2")]
        pub score: Option<f32>,
        /// NORMAL = 1, UNKNOWN = 2, CONTROL = 3, USER_DEFINED = 4, UNUSED = 5, BYTE = 6
        #[prost(int32, optional, tag = "3")]
        pub kind: Option<i32>,
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct TrainerSpec {
        /// UNIGRAM = 1, BPE = 2, WORD = 3, CHAR = 4
        #[prost(int32, optional, tag = "3")]
        pub model_type: Option<i32>,
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct NormalizerSpec {
        #[prost(string, optional, tag = "1")]
        pub name: Option<String>,
        #[prost(bool, optional, tag = "3")]
        pub add_dummy_prefix: Option<bool>,
        #[prost(bool, optional, tag = "4")]
        pub remove_extra_whitespaces: Option<bool>,
        #[prost(bool, optional, tag = "5")]
        pub escape_whitespaces: Option<bool>,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelType {
    Unigram,
    Bpe,
    Word,
    Char,
}

impl ModelType {
    fn from_proto(value: Option<i32>) -> Result<Self> {
        match value.unwrap_or(1) {
            1 => Ok(ModelType::Unigram),
            2 => Ok(ModelType::Bpe),
            3 => Ok(ModelType::Word),
            4 => Ok(ModelType::Char),
            other => Err(Error::SentencePiece(format!("unsupported model type {other}"))),
        }
    }
}

#[derive(Debug, Clone)]
struct Normalizer {
    nfkc: bool,
    case_fold: bool,
    add_dummy_prefix: bool,
    remove_extra_whitespaces: bool,
    escape_whitespaces: bool,
}

impl Normalizer {
    fn from_proto(spec: Option<&proto::NormalizerSpec>) -> Self {
        let name = spec.and_then(|spec| spec.name.as_deref()).unwrap_or("nmt_nfkc");
        Normalizer {
            nfkc: name.contains("nfkc"),
            case_fold: name.ends_with("_cf"),
            add_dummy_prefix: spec.and_then(|spec| spec.add_dummy_prefix).unwrap_or(true),
            remove_extra_whitespaces: spec.and_then(|spec| spec.remove_extra_whitespaces).unwrap_or(true),
            escape_whitespaces: spec.and_then(|spec| spec.escape_whitespaces).unwrap_or(true),
        }
    }

    fn normalize(&self, text: &str) -> String {
        let mut text: String = if self.nfkc { text.nfkc().collect() } else { text.to_string() };
        if self.case_fold {
            text = text.to_lowercase();
        }
        if self.remove_extra_whitespaces {
            text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        }
        if text.is_empty() {
            return text;
        }
        if self.add_dummy_prefix {
            text.insert(0, ' ');
        }
        if self.escape_whitespaces {
            text = text.replace(' ', &SPACE_SYMBOL.to_string());
        }
        text
    }
}

#[derive(Debug, Clone)]
pub struct SentencePieceModel {
    pieces: Vec<String>,
    scores: Vec<f32>,
    // Only pieces that may appear in a segmentation
    ids: HashMap<String, usize>,
    trie: TrieNode,
    min_score: f32,
    model_type: ModelType,
    normalizer: Normalizer,
}

impl SentencePieceModel {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let model = Self::from_bytes(&fs::read(path)?)?;
        info!(
            path = %path.display(),
            pieces = model.len(),
            model_type = ?model.model_type,
            "loaded sentencepiece model"
        );
        Ok(model)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let model = proto::ModelProto::decode(bytes)?;
        if model.pieces.is_empty() {
            return Err(Error::SentencePiece("model has no pieces".to_string()));
        }

        let mut pieces = Vec::with_capacity(model.pieces.len());
        let mut scores = Vec::with_capacity(model.pieces.len());
        let mut ids = HashMap::new();
        let mut min_score = f32::INFINITY;
        for (id, entry) in model.pieces.iter().enumerate() {
            let piece = entry.piece.clone().unwrap_or_default();
            let score = entry.score.unwrap_or(0.0);
            let kind = entry.kind.unwrap_or(PIECE_NORMAL);
            if (kind == PIECE_NORMAL || kind == PIECE_USER_DEFINED) && !piece.is_empty() {
                if kind == PIECE_NORMAL {
                    min_score = min_score.min(score);
                }
                ids.entry(piece.clone()).or_insert(id);
            }
            pieces.push(piece);
            scores.push(score);
        }

        let trie = TrieNode::from_words(ids.keys().map(String::as_str));
        Ok(SentencePieceModel {
            pieces,
            scores,
            ids,
            trie,
            min_score: if min_score.is_finite() { min_score } else { 0.0 },
            model_type: ModelType::from_proto(model.trainer_spec.and_then(|spec| spec.model_type))?,
            normalizer: Normalizer::from_proto(model.normalizer_spec.as_ref()),
        })
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    pub fn model_type(&self) -> ModelType {
        self.model_type
    }

    /// Every piece in id order; the special tokens must be among them.
    pub fn vocab(&self) -> Result<Vocab> {
        Vocab::new(self.pieces.clone())
    }

    pub fn encode(&self, text: &str) -> Vec<String> {
        let normalized = self.normalizer.normalize(text);
        if normalized.is_empty() {
            return Vec::new();
        }
        match self.model_type {
            ModelType::Unigram => self.encode_unigram(&normalized),
            ModelType::Bpe => self.encode_bpe(&normalized),
            ModelType::Word => split_words(&normalized),
            ModelType::Char => normalized.chars().map(String::from).collect(),
        }
    }

    fn score(&self, piece: &str) -> Option<f32> {
        self.ids.get(piece).map(|&id| self.scores[id])
    }

    /// Highest-scoring segmentation. Characters outside the model cost
    /// `min_score - UNK_PENALTY`, and runs of them come out as one piece.
    fn encode_unigram(&self, text: &str) -> Vec<String> {
        // best[end] = (score, start) of the best segmentation of text[..end]
        let mut best: Vec<Option<(f32, usize)>> = vec![None; text.len() + 1];
        best[0] = Some((0.0, 0));

        for (start, c) in text.char_indices() {
            let Some((base, _)) = best[start] else {
                continue;
            };
            for length in self.trie.common_prefixes(&text[start..]) {
                let end = start + length;
                if let Some(score) = self.score(&text[start..end]) {
                    relax(&mut best, start, end, base + score);
                }
            }
            let end = start + c.len_utf8();
            if self.score(&text[start..end]).is_none() {
                relax(&mut best, start, end, base + self.min_score - UNK_PENALTY);
            }
        }

        let mut bounds = Vec::new();
        let mut end = text.len();
        while end > 0 {
            let Some((_, start)) = best[end] else {
                break;
            };
            bounds.push((start, end));
            end = start;
        }
        bounds.reverse();

        let mut pieces: Vec<String> = Vec::with_capacity(bounds.len());
        let mut previous_unknown = false;
        for (start, end) in bounds {
            let piece = &text[start..end];
            let unknown = !self.ids.contains_key(piece);
            match pieces.last_mut() {
                Some(last) if unknown && previous_unknown => last.push_str(piece),
                _ => pieces.push(piece.to_string()),
            }
            previous_unknown = unknown;
        }
        pieces
    }

    /// Start from characters and keep merging the adjacent pair whose union
    /// is the highest-scoring piece; ties go to the leftmost pair.
    fn encode_bpe(&self, text: &str) -> Vec<String> {
        let mut symbols: Vec<String> = text.chars().map(String::from).collect();
        loop {
            let mut best: Option<(usize, f32)> = None;
            for i in 0..symbols.len().saturating_sub(1) {
                let merged = format!("{}{}", symbols[i], symbols[i + 1]);
                if let Some(score) = self.score(&merged) {
                    if best.map_or(true, |(_, best_score)| score > best_score) {
                        best = Some((i, score));
                    }
                }
            }
            let Some((i, _)) = best else {
                break;
            };
            let right = symbols.remove(i + 1);
            symbols[i].push_str(&right);
        }
        symbols
    }
}

fn relax(best: &mut [Option<(f32, usize)>], start: usize, end: usize, score: f32) {
    if best[end].map_or(true, |(current, _)| score > current) {
        best[end] = Some((score, start));
    }
}

fn split_words(text: &str) -> Vec<String> {
    let mut words: Vec<String> = Vec::new();
    for c in text.chars() {
        match words.last_mut() {
            Some(word) if c != SPACE_SYMBOL => word.push(c),
            _ => words.push(c.to_string()),
        }
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::SpecialTokens;

    fn model_bytes(model_type: i32, pieces: &[(&str, f32)]) -> Vec<u8> {
        let control = SpecialTokens::values().into_iter().map(|value| proto::Piece {
            piece: Some(value.to_string()),
            score: Some(0.0),
            kind: Some(if value == "[UNK]" { 2 } else { 3 }),
        });
        let normal = pieces.iter().map(|&(piece, score)| proto::Piece {
            piece: Some(piece.to_string()),
            score: Some(score),
            kind: None,
        });
        proto::ModelProto {
            pieces: control.chain(normal).collect(),
            trainer_spec: Some(proto::TrainerSpec { model_type: Some(model_type) }),
            normalizer_spec: None,
        }
        .encode_to_vec()
    }

    fn unigram() -> SentencePieceModel {
        SentencePieceModel::from_bytes(&model_bytes(
            1,
            &[("▁the", -1.0), ("▁cat", -1.5), ("▁ca", -2.0), ("▁", -2.5), ("t", -3.0), ("s", -3.0)],
        ))
        .unwrap()
    }

    #[test]
    fn unigram_picks_the_best_scoring_path() {
        let model = unigram();
        assert_eq!(model.model_type(), ModelType::Unigram);
        assert_eq!(model.encode("the cats"), vec!["▁the", "▁cat", "s"]);
        assert!(model.encode("   ").is_empty());
    }

    #[test]
    fn normalizer_applies_nfkc_and_collapses_spaces() {
        assert_eq!(unigram().encode("ｔｈｅ   cats"), vec!["▁the", "▁cat", "s"]);
    }

    #[test]
    fn unknown_characters_are_grouped() {
        assert_eq!(unigram().encode("the zz"), vec!["▁the", "▁", "zz"]);
    }

    #[test]
    fn bpe_merges_highest_scores_first() {
        let model =
            SentencePieceModel::from_bytes(&model_bytes(2, &[("▁a", -1.0), ("ab", -0.5), ("▁ab", -2.0)])).unwrap();
        assert_eq!(model.encode("ab"), vec!["▁ab"]);
        assert_eq!(model.encode("ab a"), vec!["▁ab", "▁a"]);
    }

    #[test]
    fn word_and_char_models_split_on_the_space_symbol() {
        let word = SentencePieceModel::from_bytes(&model_bytes(3, &[("▁the", 0.0)])).unwrap();
        assert_eq!(word.encode("the cat"), vec!["▁the", "▁cat"]);
        let chars = SentencePieceModel::from_bytes(&model_bytes(4, &[("a", 0.0)])).unwrap();
        assert_eq!(chars.encode("ab"), vec!["▁", "a", "b"]);
    }

    #[test]
    fn vocab_keeps_model_ids() {
        let vocab = unigram().vocab().unwrap();
        assert_eq!(vocab.len(), 11);
        assert_eq!(vocab.get_index("[CLS]"), Some(2));
        assert_eq!(vocab.get_index("▁cat"), Some(6));
    }

    #[test]
    fn rejects_malformed_models() {
        assert!(SentencePieceModel::from_bytes(&[0xff, 0xff]).is_err());
        assert!(matches!(
            SentencePieceModel::from_bytes(&[]),
            Err(Error::SentencePiece(_))
        ));
    }
}
