use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const PAD_TOKEN: &str = "[PAD]";
pub const UNK_TOKEN: &str = "[UNK]";
pub const CLS_TOKEN: &str = "[CLS]";
pub const SEP_TOKEN: &str = "[SEP]";
pub const MASK_TOKEN: &str = "[MASK]";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub value: String,
    pub index: usize,
}

/// Special tokens and the ids they occupy in a particular vocabulary.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SpecialTokens {
    pub pad: Token,
    pub unk: Token,
    pub cls: Token,
    pub sep: Token,
    pub mask: Token,
}

impl SpecialTokens {
    /// Token values in the order a freshly built vocabulary lists them.
    pub fn values() -> [&'static str; 5] {
        [PAD_TOKEN, UNK_TOKEN, CLS_TOKEN, SEP_TOKEN, MASK_TOKEN]
    }

    /// Resolve every special token through `lookup`, failing on the first one absent.
    pub fn resolve<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<usize>,
    {
        let token = |value: &'static str| {
            lookup(value)
                .map(|index| Token { value: value.to_string(), index })
                .ok_or(Error::MissingSpecialToken(value))
        };
        Ok(SpecialTokens {
            pad: token(PAD_TOKEN)?,
            unk: token(UNK_TOKEN)?,
            cls: token(CLS_TOKEN)?,
            sep: token(SEP_TOKEN)?,
            mask: token(MASK_TOKEN)?,
        })
    }

    pub fn get_indices(&self) -> [usize; 5] {
        [self.pad.index, self.unk.index, self.cls.index, self.sep.index, self.mask.index]
    }

    pub fn is_special_token(&self, token: &str) -> bool {
        Self::values().contains(&token)
    }

    pub fn is_special_index(&self, index: usize) -> bool {
        self.get_indices().contains(&index)
    }

    /// Positions that never take part in masking.
    pub fn is_structural(&self, index: usize) -> bool {
        index == self.cls.index || index == self.sep.index || index == self.pad.index
    }
}
