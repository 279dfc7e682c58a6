//! Document buffering and sentence-pair packing shared by the bert and albert targets.

use std::mem;

use rand::rngs::StdRng;
use rand::Rng;

use crate::dataset::shard::{read_shard_lines, Shard};
use crate::dataset::{pad_to, BuildContext};
use crate::error::Result;

pub type Sentence = Vec<usize>;
pub type Document = Vec<Sentence>;

/// Read the shard as documents separated by blank lines and hand them to
/// `flush` in buffers of at most `docs_buffer_size` documents. The last
/// document of the shard is kept even without a trailing blank line.
pub fn for_each_document_buffer<F>(ctx: &BuildContext<'_>, shard: &Shard, mut flush: F) -> Result<()>
where
    F: FnMut(&[Document]) -> Result<()>,
{
    let buffer_size = ctx.options.docs_buffer_size;
    let mut buffer: Vec<Document> = Vec::new();
    let mut document: Document = Vec::new();

    for line in read_shard_lines(&ctx.options.corpus_path, shard)? {
        let line = line?;
        if line.trim().is_empty() {
            if !document.is_empty() {
                buffer.push(mem::take(&mut document));
            }
            if buffer.len() >= buffer_size {
                flush(&buffer)?;
                buffer.clear();
            }
            continue;
        }
        let sentence = ctx.encode(&line);
        if !sentence.is_empty() {
            document.push(sentence);
        }
    }

    if !document.is_empty() {
        buffer.push(document);
    }
    if !buffer.is_empty() {
        flush(&buffer)?;
    }
    Ok(())
}

/// Usually `max_num_tokens`; with probability `short_seq_prob` a uniform
/// length in `[2, max_num_tokens]`.
pub fn target_seq_length(max_num_tokens: usize, short_seq_prob: f64, rng: &mut StdRng) -> usize {
    if max_num_tokens > 2 && rng.gen::<f64>() < short_seq_prob {
        rng.gen_range(2..=max_num_tokens)
    } else {
        max_num_tokens
    }
}

/// Number of chunk sentences that go to segment A.
pub fn split_point(chunk_len: usize, rng: &mut StdRng) -> usize {
    if chunk_len >= 2 {
        rng.gen_range(1..chunk_len)
    } else {
        1
    }
}

pub fn concat(sentences: &[&Sentence]) -> Vec<usize> {
    sentences.iter().flat_map(|sentence| sentence.iter().copied()).collect()
}

/// Drop tokens from the front or back of the longer side until the pair fits.
pub fn truncate_seq_pair(
    tokens_a: &mut Vec<usize>,
    tokens_b: &mut Vec<usize>,
    max_num_tokens: usize,
    rng: &mut StdRng,
) {
    while tokens_a.len() + tokens_b.len() > max_num_tokens {
        let trunc = if tokens_a.len() > tokens_b.len() { &mut *tokens_a } else { &mut *tokens_b };
        if trunc.is_empty() {
            break;
        }
        if rng.gen::<f64>() < 0.5 {
            trunc.remove(0);
        } else {
            trunc.pop();
        }
    }
}

/// `[CLS] A [SEP] B [SEP]` padded to `seq_length`, with the end offsets of both segments.
pub fn pack_pair(ctx: &BuildContext<'_>, tokens_a: &[usize], tokens_b: &[usize]) -> (Vec<usize>, Vec<usize>) {
    let mut src = Vec::with_capacity(ctx.options.seq_length);
    src.push(ctx.cls());
    src.extend_from_slice(tokens_a);
    src.push(ctx.sep());
    let mut seg_pos = vec![src.len()];
    src.extend_from_slice(tokens_b);
    src.push(ctx.sep());
    seg_pos.push(src.len());
    (pad_to(src, ctx.options.seq_length, ctx.pad()), seg_pos)
}
