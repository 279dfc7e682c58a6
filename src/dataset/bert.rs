use rand::rngs::StdRng;
use rand::Rng;

use crate::dataset::pair::{self, Document};
use crate::dataset::{BuildContext, Instance, InstanceWriter, Shard, ShardWorker};
use crate::error::Result;

const RANDOM_DOCUMENT_ATTEMPTS: usize = 10;

/// Next-sentence prediction plus masked LM. Segment B is the true
/// continuation half of the time and a span from another document otherwise.
pub struct BertDataset<'a> {
    ctx: BuildContext<'a>,
}

impl<'a> BertDataset<'a> {
    pub fn new(ctx: BuildContext<'a>) -> Self {
        BertDataset { ctx }
    }

    fn random_document(&self, documents: &[Document], current: usize, rng: &mut StdRng) -> usize {
        let mut index = rng.gen_range(0..documents.len());
        for _ in 1..RANDOM_DOCUMENT_ATTEMPTS {
            if index != current {
                break;
            }
            index = rng.gen_range(0..documents.len());
        }
        index
    }

    fn instances_from_document(
        &self,
        documents: &[Document],
        doc_index: usize,
        rng: &mut StdRng,
        sink: &mut InstanceWriter,
    ) -> Result<()> {
        let options = self.ctx.options;
        let document = &documents[doc_index];
        let max_num_tokens = options.seq_length - 3;
        let target_length = pair::target_seq_length(max_num_tokens, options.short_seq_prob, rng);

        let mut chunk = Vec::new();
        let mut chunk_tokens = 0usize;
        let mut i = 0usize;
        while i < document.len() {
            chunk.push(&document[i]);
            chunk_tokens += document[i].len();

            if i == document.len() - 1 || chunk_tokens >= target_length {
                let a_end = pair::split_point(chunk.len(), rng);
                let mut tokens_a = pair::concat(&chunk[..a_end]);

                let is_random_next = chunk.len() == 1 || rng.gen::<f64>() < 0.5;
                let mut tokens_b = if is_random_next {
                    let target_b_length = target_length.saturating_sub(tokens_a.len());
                    let random_doc = &documents[self.random_document(documents, doc_index, rng)];
                    let start = rng.gen_range(0..random_doc.len());
                    let mut tokens_b = Vec::new();
                    for sentence in &random_doc[start..] {
                        tokens_b.extend_from_slice(sentence);
                        if tokens_b.len() >= target_b_length {
                            break;
                        }
                    }
                    // Sentences left out of A are revisited by the next chunk
                    i -= chunk.len() - a_end;
                    tokens_b
                } else {
                    pair::concat(&chunk[a_end..])
                };

                pair::truncate_seq_pair(&mut tokens_a, &mut tokens_b, max_num_tokens, rng);
                let (mut src, seg_pos) = pair::pack_pair(&self.ctx, &tokens_a, &tokens_b);
                let tgt_mlm = self.ctx.mask(&mut src, rng);
                sink.write(&Instance::Bert {
                    src,
                    tgt_mlm,
                    is_random_next,
                    seg_pos,
                })?;

                chunk.clear();
                chunk_tokens = 0;
            }
            i += 1;
        }
        Ok(())
    }
}

impl ShardWorker for BertDataset<'_> {
    fn context(&self) -> &BuildContext<'_> {
        &self.ctx
    }

    fn build_shard(&self, shard: &Shard, rng: &mut StdRng, sink: &mut InstanceWriter) -> Result<()> {
        pair::for_each_document_buffer(&self.ctx, shard, |documents| {
            for _ in 0..self.ctx.options.dup_factor {
                for doc_index in 0..documents.len() {
                    self.instances_from_document(documents, doc_index, rng, sink)?;
                }
            }
            Ok(())
        })
    }
}
