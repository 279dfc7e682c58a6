//! Per-objective dataset builders and the shared build-and-save driver.
//!
//! Every builder reads only its own shard of corpus lines, writes instances
//! to a shard file, and the shard files are concatenated in order once all
//! workers finish.

pub mod albert;
pub mod bert;
pub mod bilm;
pub mod cls;
pub mod instance;
pub mod lm;
pub mod masking;
pub mod mlm;
pub mod pair;
pub mod shard;

use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::{debug, info};

use crate::config::{PreprocessOptions, Target};
use crate::error::{invalid, Result};
use crate::tokenizer::{SpecialTokens, Tokenizer, Vocab};

pub use albert::AlbertDataset;
pub use bert::BertDataset;
pub use bilm::BilmDataset;
pub use cls::ClsDataset;
pub use instance::{load_instances, Instance, InstanceWriter, MlmTarget};
pub use lm::LmDataset;
pub use masking::MaskingConfig;
pub use mlm::MlmDataset;
pub use shard::Shard;

/// Everything a builder borrows while it runs.
#[derive(Debug, Clone, Copy)]
pub struct BuildContext<'a> {
    pub options: &'a PreprocessOptions,
    pub vocab: &'a Vocab,
    pub tokenizer: &'a Tokenizer,
}

impl<'a> BuildContext<'a> {
    pub fn specials(&self) -> &'a SpecialTokens {
        self.vocab.special()
    }

    pub fn pad(&self) -> usize {
        self.specials().pad.index
    }

    pub fn cls(&self) -> usize {
        self.specials().cls.index
    }

    pub fn sep(&self) -> usize {
        self.specials().sep.index
    }

    pub fn encode(&self, text: &str) -> Vec<usize> {
        self.vocab.get_indices(&self.tokenizer.tokenize(text))
    }

    /// `[CLS] tokens [SEP]` for a single line.
    pub fn encode_line(&self, text: &str) -> Vec<usize> {
        let mut document = vec![self.cls()];
        document.extend(self.encode(text));
        document.push(self.sep());
        document
    }

    pub fn masking(&self) -> MaskingConfig {
        MaskingConfig {
            span_masking: self.options.span_masking,
            span_geo_prob: self.options.span_geo_prob,
            span_max_length: self.options.span_max_length,
        }
    }

    /// Static masking when enabled; `None` under dynamic masking.
    pub fn mask(&self, src: &mut [usize], rng: &mut StdRng) -> Option<MlmTarget> {
        if self.options.dynamic_masking {
            return None;
        }
        Some(masking::mask_seq(
            src,
            self.specials(),
            self.vocab.len(),
            &self.masking(),
            rng,
        ))
    }
}

/// Builds the instances of one shard.
pub trait ShardWorker: Sync {
    fn context(&self) -> &BuildContext<'_>;

    fn build_shard(&self, shard: &Shard, rng: &mut StdRng, sink: &mut InstanceWriter) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub dataset_path: PathBuf,
    pub lines: usize,
    pub shards: usize,
    pub instances: usize,
}

/// The closed set of dataset builders, one per pretraining objective.
pub enum Dataset<'a> {
    Bert(BertDataset<'a>),
    Lm(LmDataset<'a>),
    Cls(ClsDataset<'a>),
    Mlm(MlmDataset<'a>),
    Bilm(BilmDataset<'a>),
    Albert(AlbertDataset<'a>),
}

impl<'a> Dataset<'a> {
    pub fn new(options: &'a PreprocessOptions, vocab: &'a Vocab, tokenizer: &'a Tokenizer) -> Self {
        let ctx = BuildContext { options, vocab, tokenizer };
        match options.target {
            Target::Bert => Dataset::Bert(BertDataset::new(ctx)),
            Target::Lm => Dataset::Lm(LmDataset::new(ctx)),
            Target::Cls => Dataset::Cls(ClsDataset::new(ctx)),
            Target::Mlm => Dataset::Mlm(MlmDataset::new(ctx)),
            Target::Bilm => Dataset::Bilm(BilmDataset::new(ctx)),
            Target::Albert => Dataset::Albert(AlbertDataset::new(ctx)),
        }
    }

    pub fn target(&self) -> Target {
        match self {
            Dataset::Bert(_) => Target::Bert,
            Dataset::Lm(_) => Target::Lm,
            Dataset::Cls(_) => Target::Cls,
            Dataset::Mlm(_) => Target::Mlm,
            Dataset::Bilm(_) => Target::Bilm,
            Dataset::Albert(_) => Target::Albert,
        }
    }

    /// Split the corpus into `workers_num` shards, build each one on its own
    /// worker, and merge the results into the configured dataset path.
    pub fn build_and_save(&self, workers_num: usize) -> Result<BuildReport> {
        match self {
            Dataset::Bert(dataset) => run_workers(dataset, workers_num),
            Dataset::Lm(dataset) => run_workers(dataset, workers_num),
            Dataset::Cls(dataset) => run_workers(dataset, workers_num),
            Dataset::Mlm(dataset) => run_workers(dataset, workers_num),
            Dataset::Bilm(dataset) => run_workers(dataset, workers_num),
            Dataset::Albert(dataset) => run_workers(dataset, workers_num),
        }
    }
}

fn run_workers<W: ShardWorker>(worker: &W, workers_num: usize) -> Result<BuildReport> {
    if workers_num == 0 {
        return Err(invalid("at least one worker is required"));
    }
    let options = worker.context().options;
    let lines = shard::count_lines(&options.corpus_path)?;
    let shards = shard::split_lines(lines, workers_num);
    let shard_paths: Vec<PathBuf> = shards
        .iter()
        .map(|shard| shard::shard_path(&options.dataset_path, shard.index))
        .collect();

    info!(
        workers = workers_num,
        lines,
        target = %options.target,
        "starting workers for building dataset"
    );

    let pool = ThreadPoolBuilder::new().num_threads(workers_num).build()?;
    let built: Result<Vec<usize>> = pool.install(|| {
        shards
            .par_iter()
            .zip(shard_paths.par_iter())
            .map(|(shard, path)| run_worker(worker, shard, path))
            .collect()
    });

    let counts = match built {
        Ok(counts) => counts,
        Err(err) => {
            shard::remove_shards(&shard_paths);
            return Err(err);
        }
    };

    let bytes = match shard::merge_shards(&options.dataset_path, &shard_paths) {
        Ok(bytes) => bytes,
        Err(err) => {
            shard::remove_shards(&shard_paths);
            return Err(err.into());
        }
    };
    let instances: usize = counts.iter().sum();
    info!(
        path = %options.dataset_path.display(),
        instances,
        bytes,
        "dataset saved"
    );

    Ok(BuildReport {
        dataset_path: options.dataset_path.clone(),
        lines,
        shards: workers_num,
        instances,
    })
}

fn run_worker<W: ShardWorker>(worker: &W, shard: &Shard, path: &Path) -> Result<usize> {
    info!(worker = shard.index, start = shard.start, end = shard.end, "worker is building dataset");
    let seed = worker.context().options.seed;
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(shard.index as u64));
    let mut sink = InstanceWriter::create(path)?;
    worker.build_shard(shard, &mut rng, &mut sink)?;
    let written = sink.finish()?;
    debug!(worker = shard.index, instances = written, "worker finished");
    Ok(written)
}

/// Pad `src` with `pad` up to `length`.
pub(crate) fn pad_to(mut src: Vec<usize>, length: usize, pad: usize) -> Vec<usize> {
    src.resize(length.max(src.len()), pad);
    src
}
