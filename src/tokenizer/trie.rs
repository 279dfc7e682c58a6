use std::collections::HashMap;

/// Character trie over vocabulary pieces, used for greedy longest-match lookups.
#[derive(Default, Debug, Clone)]
pub struct TrieNode {
    children: HashMap<char, TrieNode>,
    is_word: bool,
}

impl TrieNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_words<'a, I>(words: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut root = Self::new();
        for word in words {
            root.insert(word);
        }
        root
    }

    pub fn insert(&mut self, word: &str) {
        if word.is_empty() {
            return;
        }
        let mut current = self;
        for c in word.chars() {
            current = current.children.entry(c).or_default();
        }
        current.is_word = true;
    }

    // Longest prefix of `text` that is a stored word, as (byte length, prefix)
    pub fn find_longest_prefix<'a>(&self, text: &'a str) -> Option<(usize, &'a str)> {
        let mut current = self;
        let mut last_valid = None;

        for (offset, c) in text.char_indices() {
            match current.children.get(&c) {
                Some(next_node) => {
                    current = next_node;
                    if current.is_word {
                        let end = offset + c.len_utf8();
                        last_valid = Some((end, &text[..end]));
                    }
                }
                None => break,
            }
        }
        last_valid
    }

    /// Byte lengths of every stored word that prefixes `text`, shortest first.
    pub fn common_prefixes(&self, text: &str) -> Vec<usize> {
        let mut current = self;
        let mut ends = Vec::new();
        for (offset, c) in text.char_indices() {
            let Some(next_node) = current.children.get(&c) else {
                break;
            };
            current = next_node;
            if current.is_word {
                ends.push(offset + c.len_utf8());
            }
        }
        ends
    }
}
