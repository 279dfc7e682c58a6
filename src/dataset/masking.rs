//! Static masked-LM masking, token-wise or span-wise.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::dataset::instance::MlmTarget;
use crate::tokenizer::SpecialTokens;

const MASK_RATE: f64 = 0.15;
const RANDOM_TOKEN_ATTEMPTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskingConfig {
    pub span_masking: bool,
    pub span_geo_prob: f64,
    pub span_max_length: usize,
}

/// Draw a span length from a geometric distribution with parameter `p`,
/// truncated to `[1, max_len]`.
pub fn sample_span_length<R: Rng + ?Sized>(max_len: usize, p: f64, rng: &mut R) -> usize {
    let mut cumulative = Vec::with_capacity(max_len + 1);
    cumulative.push(0.0);
    let mut prob = 1.0;
    for length in 1..=max_len {
        prob *= if length == 1 { p } else { 1.0 - p };
        cumulative.push(cumulative[length - 1] + prob);
    }

    let draw = cumulative[max_len] * rng.gen::<f64>();
    cumulative
        .windows(2)
        .position(|bounds| draw >= bounds[0] && draw < bounds[1])
        .map_or(max_len, |i| i + 1)
}

/// Candidate `(start, length)` units over `src`, skipping `[CLS]`, `[SEP]` and `[PAD]`.
fn candidate_units<R: Rng + ?Sized>(
    src: &[usize],
    specials: &SpecialTokens,
    config: &MaskingConfig,
    rng: &mut R,
) -> Vec<(usize, usize)> {
    let mut units = Vec::new();
    let mut span_end = 0usize;
    for (i, &token) in src.iter().enumerate() {
        if specials.is_structural(token) {
            continue;
        }
        if !config.span_masking {
            units.push((i, 1));
            continue;
        }
        if i < span_end {
            continue;
        }
        let wanted = sample_span_length(config.span_max_length, config.span_geo_prob, rng);
        // Spans stop at the sequence end and never cover a structural token
        let length = src[i..]
            .iter()
            .take(wanted)
            .take_while(|&&token| !specials.is_structural(token))
            .count();
        span_end = i + length;
        units.push((i, length));
    }
    units
}

fn random_token<R: Rng + ?Sized>(
    original: usize,
    vocab_size: usize,
    specials: &SpecialTokens,
    rng: &mut R,
) -> usize {
    if vocab_size < 2 {
        return original;
    }
    for _ in 0..RANDOM_TOKEN_ATTEMPTS {
        let candidate = rng.gen_range(1..vocab_size);
        if !specials.is_special_index(candidate) {
            return candidate;
        }
    }
    original
}

/// Mask roughly 15% of the non-padding prefix of `src` in place and return the
/// original ids of the masked positions.
///
/// Each selected unit becomes `[MASK]` with probability 0.8, a random token
/// with probability 0.1, and stays unchanged otherwise.
pub fn mask_seq<R: Rng + ?Sized>(
    src: &mut [usize],
    specials: &SpecialTokens,
    vocab_size: usize,
    config: &MaskingConfig,
    rng: &mut R,
) -> MlmTarget {
    let length = src
        .iter()
        .rposition(|&token| token != specials.pad.index)
        .map_or(0, |last| last + 1);

    let mut units = candidate_units(&src[..length], specials, config, rng);
    units.shuffle(rng);

    let num_to_predict = ((length as f64 * MASK_RATE).round() as usize).max(1);
    let mut tgt_mlm = MlmTarget::new();
    for (start, span) in units {
        if tgt_mlm.len() >= num_to_predict {
            break;
        }
        if tgt_mlm.len() + span > num_to_predict {
            continue;
        }
        for position in start..start + span {
            tgt_mlm.push((position, src[position]));
        }

        let prob: f64 = rng.gen();
        if prob < 0.8 {
            for token in &mut src[start..start + span] {
                *token = specials.mask.index;
            }
        } else if prob < 0.9 {
            for token in &mut src[start..start + span] {
                *token = random_token(*token, vocab_size, specials, rng);
            }
        }
    }

    tgt_mlm.sort_by_key(|&(position, _)| position);
    tgt_mlm
}
