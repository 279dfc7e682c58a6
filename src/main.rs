use anyhow::Context;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use rust_preprocess::{Args, PreprocessOptions};

fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let args = Args::parse();
    let options = PreprocessOptions::try_from(args).context("invalid preprocessing options")?;

    let report = rust_preprocess::run(&options)
        .with_context(|| format!("failed to preprocess {}", options.corpus_path.display()))?;

    info!(
        path = %report.dataset_path.display(),
        lines = report.lines,
        shards = report.shards,
        instances = report.instances,
        "preprocessing finished"
    );
    Ok(())
}
