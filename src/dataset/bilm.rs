use rand::rngs::StdRng;

use crate::dataset::shard::read_shard_lines;
use crate::dataset::{pad_to, BuildContext, Instance, InstanceWriter, Shard, ShardWorker};
use crate::error::Result;

/// Forward and backward language modeling over the same window.
pub struct BilmDataset<'a> {
    ctx: BuildContext<'a>,
}

impl<'a> BilmDataset<'a> {
    pub fn new(ctx: BuildContext<'a>) -> Self {
        BilmDataset { ctx }
    }

    fn instance(&self, window: &[usize]) -> Instance {
        let seq_length = self.ctx.options.seq_length;
        let pad = self.ctx.pad();

        let mut tgt_forward = window[1..].to_vec();
        tgt_forward.push(self.ctx.sep());
        let mut tgt_backward = vec![self.ctx.cls()];
        tgt_backward.extend_from_slice(&window[..window.len() - 1]);

        Instance::Bilm {
            src: pad_to(window.to_vec(), seq_length, pad),
            tgt_forward: pad_to(tgt_forward, seq_length, pad),
            tgt_backward: pad_to(tgt_backward, seq_length, pad),
            seg: pad_to(vec![1; window.len()], seq_length, 0),
        }
    }
}

impl ShardWorker for BilmDataset<'_> {
    fn context(&self) -> &BuildContext<'_> {
        &self.ctx
    }

    fn build_shard(&self, shard: &Shard, _rng: &mut StdRng, sink: &mut InstanceWriter) -> Result<()> {
        let seq_length = self.ctx.options.seq_length;
        for line in read_shard_lines(&self.ctx.options.corpus_path, shard)? {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let document = self.ctx.encode(&line);
            for window in document.chunks(seq_length) {
                sink.write(&self.instance(window))?;
            }
        }
        Ok(())
    }
}
