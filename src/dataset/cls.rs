use rand::rngs::StdRng;
use tracing::warn;

use crate::dataset::shard::read_shard_lines;
use crate::dataset::{pad_to, BuildContext, Instance, InstanceWriter, Shard, ShardWorker};
use crate::error::Result;

/// Labelled classification examples: `label\ttext` or `label\ttext_a\ttext_b`.
pub struct ClsDataset<'a> {
    ctx: BuildContext<'a>,
}

impl<'a> ClsDataset<'a> {
    pub fn new(ctx: BuildContext<'a>) -> Self {
        ClsDataset { ctx }
    }

    fn single(&self, text: &str) -> (Vec<usize>, Vec<usize>) {
        let seq_length = self.ctx.options.seq_length;
        let mut src = vec![self.ctx.cls()];
        src.extend(self.ctx.encode(text));
        src.truncate(seq_length);
        let seg_pos = vec![src.len()];
        (pad_to(src, seq_length, self.ctx.pad()), seg_pos)
    }

    /// Segment A is kept whole when possible; B takes whatever room is left.
    /// When A fills the sequence, `seg_pos` carries only A's length.
    fn pair(&self, text_a: &str, text_b: &str) -> (Vec<usize>, Vec<usize>) {
        let seq_length = self.ctx.options.seq_length;
        let mut src = self.ctx.encode_line(text_a);
        src.truncate(seq_length);
        let len_a = src.len();

        let mut part_b = self.ctx.encode(text_b);
        part_b.push(self.ctx.sep());
        part_b.truncate(seq_length - len_a);
        let len_b = part_b.len();
        src.extend(part_b);

        let seg_pos = if len_b == 0 { vec![len_a] } else { vec![len_a, len_b] };
        (pad_to(src, seq_length, self.ctx.pad()), seg_pos)
    }

    fn parse_line<'l>(line: &'l str) -> Option<(i64, Vec<&'l str>)> {
        let fields: Vec<&str> = line.split('\t').collect();
        if !(2..=3).contains(&fields.len()) {
            return None;
        }
        let label = fields[0].trim().parse().ok()?;
        Some((label, fields[1..].to_vec()))
    }
}

impl ShardWorker for ClsDataset<'_> {
    fn context(&self) -> &BuildContext<'_> {
        &self.ctx
    }

    fn build_shard(&self, shard: &Shard, _rng: &mut StdRng, sink: &mut InstanceWriter) -> Result<()> {
        for (offset, line) in read_shard_lines(&self.ctx.options.corpus_path, shard)?.enumerate() {
            let line = line?;
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let Some((tgt, texts)) = Self::parse_line(line) else {
                warn!(line = shard.start + offset + 1, "skipping malformed classification line");
                continue;
            };
            let (src, seg_pos) = match texts.as_slice() {
                [text] => self.single(text),
                [text_a, text_b] => self.pair(text_a, text_b),
                _ => continue,
            };
            sink.write(&Instance::Cls { src, tgt, seg_pos })?;
        }
        Ok(())
    }
}
