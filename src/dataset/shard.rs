use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// A contiguous range of corpus lines handled by one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shard {
    pub index: usize,
    pub start: usize,
    pub end: usize,
}

impl Shard {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

pub fn count_lines(path: &Path) -> io::Result<usize> {
    let reader = BufReader::new(File::open(path)?);
    let mut count = 0usize;
    for line in reader.lines() {
        line?;
        count += 1;
    }
    Ok(count)
}

/// Split `lines_num` lines into `workers` ranges; worker `i` gets
/// `[i * n / w, (i + 1) * n / w)`.
pub fn split_lines(lines_num: usize, workers: usize) -> Vec<Shard> {
    (0..workers)
        .map(|index| Shard {
            index,
            start: index * lines_num / workers,
            end: (index + 1) * lines_num / workers,
        })
        .collect()
}

/// Lines `[shard.start, shard.end)` of the corpus.
pub fn read_shard_lines(
    corpus: &Path,
    shard: &Shard,
) -> io::Result<impl Iterator<Item = io::Result<String>>> {
    let reader = BufReader::new(File::open(corpus)?);
    Ok(reader.lines().skip(shard.start).take(shard.len()))
}

/// `dataset.pt` becomes `dataset-tmp-3.pt` for shard 3, in the same directory.
pub fn shard_path(dataset_path: &Path, index: usize) -> PathBuf {
    let stem = dataset_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dataset".to_string());
    let filename = match dataset_path.extension() {
        Some(ext) => format!("{stem}-tmp-{index}.{}", ext.to_string_lossy()),
        None => format!("{stem}-tmp-{index}"),
    };
    dataset_path.with_file_name(filename)
}

/// Concatenate shard files, in order, into `destination` and remove them.
/// Returns the number of bytes written. On failure the partial destination
/// is removed; shards not yet merged are left for the caller.
pub fn merge_shards(destination: &Path, shards: &[PathBuf]) -> io::Result<u64> {
    let file = File::create(destination)?;
    append_shards(file, shards).map_err(|err| {
        if let Err(remove_err) = fs::remove_file(destination) {
            warn!(path = %destination.display(), error = %remove_err, "could not remove partial dataset");
        }
        err
    })
}

fn append_shards(file: File, shards: &[PathBuf]) -> io::Result<u64> {
    let mut writer = BufWriter::new(file);
    let mut total = 0u64;
    for path in shards {
        let mut reader = File::open(path)?;
        total += io::copy(&mut reader, &mut writer)?;
        fs::remove_file(path)?;
        debug!(shard = %path.display(), "merged shard");
    }
    writer.flush()?;
    Ok(total)
}

/// Best-effort cleanup after a failed build.
pub fn remove_shards(shards: &[PathBuf]) {
    for path in shards {
        if path.exists() {
            if let Err(err) = fs::remove_file(path) {
                warn!(shard = %path.display(), error = %err, "could not remove shard");
            }
        }
    }
}
