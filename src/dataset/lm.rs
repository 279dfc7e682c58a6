use rand::rngs::StdRng;

use crate::dataset::shard::read_shard_lines;
use crate::dataset::{pad_to, BuildContext, Instance, InstanceWriter, Shard, ShardWorker};
use crate::error::Result;

/// Next-token prediction. Each line is cut into windows of `seq_length + 1`
/// so inputs and shifted targets come from the same window.
pub struct LmDataset<'a> {
    ctx: BuildContext<'a>,
}

impl<'a> LmDataset<'a> {
    pub fn new(ctx: BuildContext<'a>) -> Self {
        LmDataset { ctx }
    }
}

impl ShardWorker for LmDataset<'_> {
    fn context(&self) -> &BuildContext<'_> {
        &self.ctx
    }

    fn build_shard(&self, shard: &Shard, _rng: &mut StdRng, sink: &mut InstanceWriter) -> Result<()> {
        let seq_length = self.ctx.options.seq_length;
        let window = seq_length + 1;
        for line in read_shard_lines(&self.ctx.options.corpus_path, shard)? {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let document = self.ctx.encode_line(&line);
            for chunk in document.chunks(window) {
                sink.write(&Instance::Lm {
                    src: pad_to(chunk.to_vec(), window, self.ctx.pad()),
                    seg_pos: chunk.len().min(seq_length),
                })?;
            }
        }
        Ok(())
    }
}
