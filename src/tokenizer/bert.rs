use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::error::Result;
use crate::tokenizer::token_config::UNK_TOKEN;
use crate::tokenizer::{SentencePieceModel, TrieNode, Vocab};

const CONTINUATION_PREFIX: &str = "##";
const MAX_INPUT_CHARS_PER_WORD: usize = 200;

#[derive(Debug, Clone)]
enum Segmenter {
    WordPiece {
        word_starts: TrieNode,
        continuations: TrieNode,
    },
    SentencePiece(SentencePieceModel),
}

/// Basic tokenization (cleanup, CJK isolation, lowercasing, punctuation
/// splitting) followed by greedy longest-match WordPiece. With a
/// SentencePiece model the raw text is segmented by the model instead.
#[derive(Debug, Clone)]
pub struct BertTokenizer {
    vocab: Vocab,
    segmenter: Segmenter,
}

impl BertTokenizer {
    pub fn new(vocab: Vocab) -> Self {
        let word_starts = TrieNode::from_words(
            vocab.tokens().filter(|token| !token.starts_with(CONTINUATION_PREFIX)),
        );
        let continuations = TrieNode::from_words(
            vocab.tokens().filter_map(|token| token.strip_prefix(CONTINUATION_PREFIX)),
        );
        BertTokenizer {
            vocab,
            segmenter: Segmenter::WordPiece { word_starts, continuations },
        }
    }

    /// Vocabulary and segmentation both come from the model.
    pub fn with_sentencepiece(model: SentencePieceModel) -> Result<Self> {
        Ok(BertTokenizer {
            vocab: model.vocab()?,
            segmenter: Segmenter::SentencePiece(model),
        })
    }

    pub fn vocab(&self) -> &Vocab {
        &self.vocab
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        match &self.segmenter {
            Segmenter::WordPiece { word_starts, continuations } => Self::basic_tokenize(text)
                .iter()
                .flat_map(|word| wordpiece(word, word_starts, continuations))
                .collect(),
            Segmenter::SentencePiece(model) => model.encode(text),
        }
    }

    /// Split raw text into lowercased words and single punctuation marks.
    pub fn basic_tokenize(text: &str) -> Vec<String> {
        let cleaned = Self::clean_text(text);
        let spaced = Self::isolate_cjk(&cleaned);

        let mut words = Vec::new();
        for token in spaced.split_whitespace() {
            let lowered = strip_accents(&token.to_lowercase());
            words.extend(split_on_punctuation(&lowered));
        }
        words
    }

    pub fn clean_text(text: &str) -> String {
        text.chars()
            .filter(|&c| c != '\0' && c != '\u{fffd}' && !is_control(c))
            .map(|c| if c.is_whitespace() { ' ' } else { c })
            .collect()
    }

    fn isolate_cjk(text: &str) -> String {
        let mut output = String::with_capacity(text.len());
        for c in text.chars() {
            if is_cjk(c) {
                output.push(' ');
                output.push(c);
                output.push(' ');
            } else {
                output.push(c);
            }
        }
        output
    }
}

fn wordpiece(word: &str, word_starts: &TrieNode, continuations: &TrieNode) -> Vec<String> {
    if word.chars().count() > MAX_INPUT_CHARS_PER_WORD {
        return vec![UNK_TOKEN.to_string()];
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    while start < word.len() {
        let trie = if start == 0 { word_starts } else { continuations };
        match trie.find_longest_prefix(&word[start..]) {
            Some((length, piece)) => {
                if start == 0 {
                    pieces.push(piece.to_string());
                } else {
                    pieces.push(format!("{CONTINUATION_PREFIX}{piece}"));
                }
                start += length;
            }
            // A word that cannot be fully covered is unknown as a whole
            None => return vec![UNK_TOKEN.to_string()],
        }
    }
    pieces
}

// Cc plus the format (Cf) and private-use (Co) categories; tab and newlines
// count as whitespace.
fn is_control(c: char) -> bool {
    if c == '\t' || c == '\n' || c == '\r' {
        return false;
    }
    c.is_control() || is_format(c) || is_private_use(c)
}

fn is_format(c: char) -> bool {
    matches!(c as u32,
        0x00AD
        | 0x0600..=0x0605
        | 0x061C
        | 0x06DD
        | 0x070F
        | 0x0890..=0x0891
        | 0x08E2
        | 0x180E
        | 0x200B..=0x200F
        | 0x202A..=0x202E
        | 0x2060..=0x2064
        | 0x2066..=0x206F
        | 0xFEFF
        | 0xFFF9..=0xFFFB
        | 0x110BD
        | 0x110CD
        | 0x13430..=0x1343F
        | 0x1BCA0..=0x1BCA3
        | 0x1D173..=0x1D17A
        | 0xE0001
        | 0xE0020..=0xE007F)
}

fn is_private_use(c: char) -> bool {
    matches!(c as u32, 0xE000..=0xF8FF | 0xF0000..=0xFFFFD | 0x100000..=0x10FFFD)
}

fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x4E00..=0x9FFF
        | 0x3400..=0x4DBF
        | 0x20000..=0x2A6DF
        | 0x2A700..=0x2B73F
        | 0x2B740..=0x2B81F
        | 0x2B820..=0x2CEAF
        | 0xF900..=0xFAFF
        | 0x2F800..=0x2FA1F)
}

fn is_punctuation(c: char) -> bool {
    if c.is_ascii_punctuation() {
        return true;
    }
    matches!(c as u32,
        0x2000..=0x206F   // general punctuation
        | 0x3000..=0x303F // CJK symbols and punctuation
        | 0xFE30..=0xFE4F // CJK compatibility forms
        | 0xFF01..=0xFF0F
        | 0xFF1A..=0xFF20
        | 0xFF3B..=0xFF40
        | 0xFF5B..=0xFF65
        | 0x00A1 | 0x00A7 | 0x00AB | 0x00B6 | 0x00B7 | 0x00BB | 0x00BF)
}

// Canonical decomposition, then every combining mark is dropped.
fn strip_accents(text: &str) -> String {
    text.nfd().filter(|&c| !is_combining_mark(c)).collect()
}

fn split_on_punctuation(text: &str) -> Vec<String> {
    let mut output = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        if is_punctuation(c) {
            if !current.is_empty() {
                output.push(std::mem::take(&mut current));
            }
            output.push(c.to_string());
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        output.push(current);
    }
    output
}
