use crate::tokenizer::token_config::UNK_TOKEN;
use crate::tokenizer::Vocab;

/// One token per non-whitespace character.
#[derive(Debug, Clone)]
pub struct CharTokenizer {
    vocab: Vocab,
}

impl CharTokenizer {
    pub fn new(vocab: Vocab) -> Self {
        CharTokenizer { vocab }
    }

    pub fn vocab(&self) -> &Vocab {
        &self.vocab
    }

    pub fn split(text: &str) -> Vec<&str> {
        text.char_indices()
            .filter(|(_, c)| !c.is_whitespace())
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect()
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        known_or_unk(&self.vocab, Self::split(text))
    }
}

/// One token per whitespace-separated word.
#[derive(Debug, Clone)]
pub struct SpaceTokenizer {
    vocab: Vocab,
}

impl SpaceTokenizer {
    pub fn new(vocab: Vocab) -> Self {
        SpaceTokenizer { vocab }
    }

    pub fn vocab(&self) -> &Vocab {
        &self.vocab
    }

    pub fn split(text: &str) -> Vec<&str> {
        text.split_whitespace().collect()
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        known_or_unk(&self.vocab, Self::split(text))
    }
}

fn known_or_unk(vocab: &Vocab, pieces: Vec<&str>) -> Vec<String> {
    pieces
        .into_iter()
        .map(|piece| {
            if vocab.contains(piece) {
                piece.to_string()
            } else {
                UNK_TOKEN.to_string()
            }
        })
        .collect()
}
