pub mod config;
pub mod dataset;
pub mod error;
pub mod tokenizer;

use tracing::info;

pub use config::{Args, PreprocessOptions, Target, TokenizerKind};
pub use dataset::{BuildReport, Dataset, Instance};
pub use error::{Error, Result};
pub use tokenizer::{Tokenizer, Vocab};

/// Build the tokenizer, then the dataset builder for the configured target,
/// and write every instance to `options.dataset_path`.
///
/// A vocabulary derived from the corpus is saved next to the dataset as
/// `<dataset stem>.vocab.txt` so the ids in the dataset can be decoded later.
pub fn run(options: &PreprocessOptions) -> Result<BuildReport> {
    let tokenizer = Tokenizer::from_options(options)?;

    if options.vocab_path.is_none() && options.spm_model_path.is_none() {
        let stem = options
            .dataset_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dataset".to_string());
        let vocab_path = options.dataset_path.with_file_name(format!("{stem}.vocab.txt"));
        tokenizer.vocab().save(&vocab_path)?;
        info!(path = %vocab_path.display(), "saved derived vocabulary");
    }

    let dataset = Dataset::new(options, tokenizer.vocab(), &tokenizer);
    info!(target = %dataset.target(), "building dataset");
    dataset.build_and_save(options.processes_num)
}
