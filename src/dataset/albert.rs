use std::mem;

use rand::rngs::StdRng;
use rand::Rng;

use crate::dataset::pair::{self, Document};
use crate::dataset::{BuildContext, Instance, InstanceWriter, Shard, ShardWorker};
use crate::error::Result;

/// Sentence-order prediction plus masked LM. Both segments come from the
/// same document; half of the pairs are swapped.
pub struct AlbertDataset<'a> {
    ctx: BuildContext<'a>,
}

impl<'a> AlbertDataset<'a> {
    pub fn new(ctx: BuildContext<'a>) -> Self {
        AlbertDataset { ctx }
    }

    fn instances_from_document(
        &self,
        document: &Document,
        rng: &mut StdRng,
        sink: &mut InstanceWriter,
    ) -> Result<()> {
        let options = self.ctx.options;
        let max_num_tokens = options.seq_length - 3;
        let target_length = pair::target_seq_length(max_num_tokens, options.short_seq_prob, rng);

        let mut chunk = Vec::new();
        let mut chunk_tokens = 0usize;
        for (i, sentence) in document.iter().enumerate() {
            chunk.push(sentence);
            chunk_tokens += sentence.len();
            if i + 1 < document.len() && chunk_tokens < target_length {
                continue;
            }

            let a_end = pair::split_point(chunk.len(), rng);
            let mut tokens_a = pair::concat(&chunk[..a_end]);
            let mut tokens_b = pair::concat(&chunk[a_end..]);

            let is_wrong_order = rng.gen::<f64>() < 0.5;
            if is_wrong_order {
                mem::swap(&mut tokens_a, &mut tokens_b);
            }

            pair::truncate_seq_pair(&mut tokens_a, &mut tokens_b, max_num_tokens, rng);
            let (mut src, seg_pos) = pair::pack_pair(&self.ctx, &tokens_a, &tokens_b);
            let tgt_mlm = self.ctx.mask(&mut src, rng);
            sink.write(&Instance::Albert {
                src,
                tgt_mlm,
                is_wrong_order,
                seg_pos,
            })?;

            chunk.clear();
            chunk_tokens = 0;
        }
        Ok(())
    }
}

impl ShardWorker for AlbertDataset<'_> {
    fn context(&self) -> &BuildContext<'_> {
        &self.ctx
    }

    fn build_shard(&self, shard: &Shard, rng: &mut StdRng, sink: &mut InstanceWriter) -> Result<()> {
        pair::for_each_document_buffer(&self.ctx, shard, |documents| {
            for _ in 0..self.ctx.options.dup_factor {
                for document in documents {
                    self.instances_from_document(document, rng, sink)?;
                }
            }
            Ok(())
        })
    }
}
