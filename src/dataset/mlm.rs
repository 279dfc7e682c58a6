use std::mem;

use rand::rngs::StdRng;

use crate::dataset::shard::read_shard_lines;
use crate::dataset::{pad_to, BuildContext, Instance, InstanceWriter, Shard, ShardWorker};
use crate::error::Result;

/// Masked LM over `[CLS] tokens [SEP]` line documents, optionally packed
/// across line boundaries with `full_sentences`.
pub struct MlmDataset<'a> {
    ctx: BuildContext<'a>,
}

impl<'a> MlmDataset<'a> {
    pub fn new(ctx: BuildContext<'a>) -> Self {
        MlmDataset { ctx }
    }

    fn write_windows(&self, document: &[usize], rng: &mut StdRng, sink: &mut InstanceWriter) -> Result<()> {
        let seq_length = self.ctx.options.seq_length;
        for window in document.chunks(seq_length) {
            let mut src = pad_to(window.to_vec(), seq_length, self.ctx.pad());
            let tgt_mlm = self.ctx.mask(&mut src, rng);
            sink.write(&Instance::Mlm {
                src,
                tgt_mlm,
                seg_pos: vec![window.len()],
            })?;
        }
        Ok(())
    }

    fn build_pass(&self, shard: &Shard, rng: &mut StdRng, sink: &mut InstanceWriter) -> Result<()> {
        let options = self.ctx.options;
        let mut buffer: Vec<usize> = Vec::new();
        let mut buffered_docs = 0usize;

        for line in read_shard_lines(&options.corpus_path, shard)? {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let document = self.ctx.encode_line(&line);
            if !options.full_sentences {
                self.write_windows(&document, rng, sink)?;
                continue;
            }

            buffer.extend(document);
            buffered_docs += 1;
            if buffered_docs >= options.docs_buffer_size {
                self.write_windows(&mem::take(&mut buffer), rng, sink)?;
                buffered_docs = 0;
            }
        }

        if !buffer.is_empty() {
            self.write_windows(&buffer, rng, sink)?;
        }
        Ok(())
    }
}

impl ShardWorker for MlmDataset<'_> {
    fn context(&self) -> &BuildContext<'_> {
        &self.ctx
    }

    fn build_shard(&self, shard: &Shard, rng: &mut StdRng, sink: &mut InstanceWriter) -> Result<()> {
        for _ in 0..self.ctx.options.dup_factor {
            self.build_pass(shard, rng, sink)?;
        }
        Ok(())
    }
}
