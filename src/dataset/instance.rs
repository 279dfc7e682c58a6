use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// `(position, original id)` for every masked position, sorted by position.
pub type MlmTarget = Vec<(usize, usize)>;

/// One training example, tagged by the objective that produced it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "target", rename_all = "lowercase")]
pub enum Instance {
    Bert {
        src: Vec<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tgt_mlm: Option<MlmTarget>,
        is_random_next: bool,
        seg_pos: Vec<usize>,
    },
    Albert {
        src: Vec<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tgt_mlm: Option<MlmTarget>,
        is_wrong_order: bool,
        seg_pos: Vec<usize>,
    },
    Mlm {
        src: Vec<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tgt_mlm: Option<MlmTarget>,
        seg_pos: Vec<usize>,
    },
    Lm {
        src: Vec<usize>,
        seg_pos: usize,
    },
    Bilm {
        src: Vec<usize>,
        tgt_forward: Vec<usize>,
        tgt_backward: Vec<usize>,
        seg: Vec<usize>,
    },
    Cls {
        src: Vec<usize>,
        tgt: i64,
        seg_pos: Vec<usize>,
    },
}

impl Instance {
    pub fn src(&self) -> &[usize] {
        match self {
            Instance::Bert { src, .. }
            | Instance::Albert { src, .. }
            | Instance::Mlm { src, .. }
            | Instance::Lm { src, .. }
            | Instance::Bilm { src, .. }
            | Instance::Cls { src, .. } => src.as_slice(),
        }
    }

    pub fn tgt_mlm(&self) -> Option<&MlmTarget> {
        match self {
            Instance::Bert { tgt_mlm, .. }
            | Instance::Albert { tgt_mlm, .. }
            | Instance::Mlm { tgt_mlm, .. } => tgt_mlm.as_ref(),
            _ => None,
        }
    }
}

/// Writes instances as JSON lines.
pub struct InstanceWriter {
    writer: BufWriter<File>,
    written: usize,
}

impl InstanceWriter {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(InstanceWriter {
            writer: BufWriter::new(File::create(path)?),
            written: 0,
        })
    }

    pub fn write(&mut self, instance: &Instance) -> Result<()> {
        serde_json::to_writer(&mut self.writer, instance)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Result<usize> {
        self.writer.flush()?;
        Ok(self.written)
    }
}

pub fn load_instances<P: AsRef<Path>>(path: P) -> Result<Vec<Instance>> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let mut instances = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        instances.push(serde_json::from_str(&line)?);
    }
    Ok(instances)
}
