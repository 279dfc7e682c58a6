use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::tokenizer::SpecialTokens;

/// Token/id mapping. A token's id is its position in the list.
#[derive(Debug, Clone)]
pub struct Vocab {
    index_to_token: Vec<String>,
    token_to_index: HashMap<String, usize>,
    special: SpecialTokens,
}

impl Vocab {
    pub fn new(tokens: Vec<String>) -> Result<Self> {
        let mut token_to_index = HashMap::with_capacity(tokens.len());
        let mut duplicates = 0usize;
        for (index, token) in tokens.iter().enumerate() {
            if token_to_index.contains_key(token) {
                duplicates += 1;
                continue;
            }
            token_to_index.insert(token.clone(), index);
        }
        if duplicates > 0 {
            warn!(duplicates, "vocabulary contains repeated tokens, keeping first ids");
        }

        let special = SpecialTokens::resolve(|token| token_to_index.get(token).copied())?;
        Ok(Vocab {
            index_to_token: tokens,
            token_to_index,
            special,
        })
    }

    /// Load a vocabulary file with one token per line; extra fields (counts) are ignored.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let mut tokens = Vec::new();
        for line in reader.lines() {
            let line = line?;
            let first = line.split_whitespace().next().map(str::to_string);
            tokens.push(first.unwrap_or(line));
        }
        info!(path = %path.display(), size = tokens.len(), "loaded vocabulary");
        Self::new(tokens)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        for token in &self.index_to_token {
            writeln!(writer, "{}", token)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Build a vocabulary from every token `split` yields over the corpus lines.
    /// Tokens are ranked by frequency; ties keep the order they were first seen in.
    pub fn build_from_corpus<P, F>(corpus_path: P, split: F) -> Result<Self>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Vec<&str> + Sync,
    {
        let corpus_path = corpus_path.as_ref();
        let reader = BufReader::new(File::open(corpus_path)?);
        let lines = reader.lines().collect::<std::io::Result<Vec<String>>>()?;

        let frequencies: IndexMap<String, usize> = lines
            .par_iter()
            .fold(IndexMap::new, |mut acc: IndexMap<String, usize>, line| {
                for token in split(line.as_str()) {
                    *acc.entry(token.to_string()).or_insert(0) += 1;
                }
                acc
            })
            .reduce(IndexMap::new, |mut acc, partial| {
                for (token, count) in partial {
                    *acc.entry(token).or_insert(0) += count;
                }
                acc
            });

        let mut ranked: Vec<(String, usize)> = frequencies
            .into_iter()
            .filter(|(token, _)| !SpecialTokens::values().contains(&token.as_str()))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));

        let mut tokens: Vec<String> = SpecialTokens::values().iter().map(|t| t.to_string()).collect();
        tokens.extend(ranked.into_iter().map(|(token, _)| token));
        debug!(lines = lines.len(), size = tokens.len(), "built vocabulary from corpus");
        info!(path = %corpus_path.display(), size = tokens.len(), "derived vocabulary from corpus");
        Self::new(tokens)
    }

    pub fn len(&self) -> usize {
        self.index_to_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index_to_token.is_empty()
    }

    pub fn special(&self) -> &SpecialTokens {
        &self.special
    }

    pub fn contains(&self, token: &str) -> bool {
        self.token_to_index.contains_key(token)
    }

    pub fn get_index(&self, token: &str) -> Option<usize> {
        self.token_to_index.get(token).copied()
    }

    /// Id of `token`, or the `[UNK]` id when it is not in the vocabulary.
    pub fn get(&self, token: &str) -> usize {
        self.get_index(token).unwrap_or(self.special.unk.index)
    }

    pub fn get_token(&self, index: usize) -> Option<&str> {
        self.index_to_token.get(index).map(String::as_str)
    }

    pub fn get_indices<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<usize> {
        tokens.iter().map(|token| self.get(token.as_ref())).collect()
    }

    pub fn get_tokens(&self, indices: &[usize]) -> Vec<&str> {
        indices
            .iter()
            .map(|&idx| self.get_token(idx).unwrap_or(self.special.unk.value.as_str()))
            .collect()
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.index_to_token.iter().map(String::as_str)
    }
}
