//! Output writers: combined CSV, per-day batch CSVs, and the stream day as CSV plus
//! a JSON array. Every file is staged and only promoted once all of them are written.
//! Outputs of an earlier run are set aside during promotion and dropped on success,
//! or put back if promotion fails, so the directory always holds exactly one run.
//!
//! Layout:
//!   <out>/_staging/<name>.inprogress       (temp, removed on success or failure)
//!   <out>/_staging/previous/               (earlier run's outputs while promoting)
//!   <out>/tweets_all.csv
//!   <out>/batch/<YYYY-MM-DD>.csv
//!   <out>/stream/tweets_stream.csv
//!   <out>/stream/tweets_stream.json

use crate::config::OutputCompression;
use crate::date::CalendarDate;
use crate::partition::PartitionedDataset;
use crate::progress::ProgressScope;
use crate::record::{AssignedRecord, OUTPUT_COLUMNS};
use crate::util::{create_with_backoff, remove_with_backoff, rename_with_backoff, replace_file_atomic_backoff};
use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use zstd::stream::write::Encoder as ZstdEncoder;

pub const COMBINED_STEM: &str = "tweets_all";
pub const STREAM_STEM: &str = "tweets_stream";
pub const BATCH_DIR: &str = "batch";
pub const STREAM_DIR: &str = "stream";
const STAGING_DIR: &str = "_staging";
const PREVIOUS_DIR: &str = "previous";

/// Final locations of everything written by [`OutputWriter::write_all`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputPaths {
    pub combined: PathBuf,
    pub batch: BTreeMap<CalendarDate, PathBuf>,
    pub stream_csv: PathBuf,
    pub stream_json: PathBuf,
}

/// Plain or zstd-compressed buffered file.
enum Sink {
    Plain(BufWriter<File>),
    Zstd(ZstdEncoder<'static, BufWriter<File>>),
}

impl Sink {
    fn create(path: &Path, compression: OutputCompression, write_buf: usize) -> io::Result<Self> {
        let f = create_with_backoff(path)?;
        let w = BufWriter::with_capacity(write_buf.max(8 * 1024), f);
        Ok(match compression {
            OutputCompression::None => Sink::Plain(w),
            OutputCompression::Zstd { level } => Sink::Zstd(ZstdEncoder::new(w, level)?),
        })
    }

    fn finish(self) -> io::Result<()> {
        match self {
            Sink::Plain(mut w) => w.flush(),
            Sink::Zstd(enc) => enc.finish()?.flush(),
        }
    }
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Plain(w) => w.write(buf),
            Sink::Zstd(w) => w.write(buf),
        }
    }
    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Plain(w) => w.flush(),
            Sink::Zstd(w) => w.flush(),
        }
    }
}

pub struct OutputWriter {
    out_dir: PathBuf,
    compression: OutputCompression,
    write_buf: usize,
    progress: bool,
}

impl OutputWriter {
    pub fn new(out_dir: &Path, compression: OutputCompression, write_buf: usize, progress: bool) -> Self {
        Self { out_dir: out_dir.to_path_buf(), compression, write_buf, progress }
    }

    fn file_name(&self, base: &str) -> String {
        match self.compression {
            OutputCompression::None => base.to_string(),
            OutputCompression::Zstd { .. } => format!("{base}.zst"),
        }
    }

    /// Where each output will land, without touching the filesystem.
    pub fn plan(&self, parts: &PartitionedDataset) -> OutputPaths {
        let batch_dir = self.out_dir.join(BATCH_DIR);
        let stream_dir = self.out_dir.join(STREAM_DIR);
        OutputPaths {
            combined: self.out_dir.join(self.file_name(&format!("{COMBINED_STEM}.csv"))),
            batch: parts
                .batch
                .keys()
                .map(|d| (*d, batch_dir.join(self.file_name(&format!("{d}.csv")))))
                .collect(),
            stream_csv: stream_dir.join(self.file_name(&format!("{STREAM_STEM}.csv"))),
            stream_json: stream_dir.join(self.file_name(&format!("{STREAM_STEM}.json"))),
        }
    }

    /// Write every output. Nothing appears under the final paths unless all files
    /// were written; the staging directory is removed either way.
    pub fn write_all(&self, records: &[AssignedRecord], parts: &PartitionedDataset) -> Result<OutputPaths> {
        let staging = self.out_dir.join(STAGING_DIR);
        if staging.exists() {
            fs::remove_dir_all(&staging).with_context(|| format!("clear {}", staging.display()))?;
        }
        fs::create_dir_all(&staging).with_context(|| format!("create {}", staging.display()))?;

        let result = self.stage_and_promote(&staging, records, parts);
        let previous = staging.join(PREVIOUS_DIR);
        let unrestored = fs::read_dir(&previous).map(|mut d| d.next().is_some()).unwrap_or(false);
        if result.is_err() && unrestored {
            tracing::warn!("keeping {}: it holds earlier outputs that could not be restored", previous.display());
            return result;
        }
        if let Err(e) = fs::remove_dir_all(&staging) {
            tracing::warn!("could not remove staging dir {}: {}", staging.display(), e);
        }
        result
    }

    fn stage_and_promote(
        &self,
        staging: &Path,
        records: &[AssignedRecord],
        parts: &PartitionedDataset,
    ) -> Result<OutputPaths> {
        let paths = self.plan(parts);
        let total = records.len() + parts.batch_len() + 2 * parts.stream.len();
        let pb = ProgressScope::count(self.progress, "Writing outputs", total as u64);

        let tmp_for = |tag: &str| staging.join(format!("{tag}.inprogress"));
        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(paths.batch.len() + 3);

        let tmp = tmp_for("combined");
        self.write_csv(&tmp, records, &pb)?;
        staged.push((tmp, paths.combined.clone()));

        for (date, bucket) in &parts.batch {
            let tmp = tmp_for(&format!("batch_{date}"));
            self.write_csv(&tmp, bucket, &pb)?;
            staged.push((tmp, paths.batch[date].clone()));
        }

        let tmp = tmp_for("stream_csv");
        self.write_csv(&tmp, &parts.stream, &pb)?;
        staged.push((tmp, paths.stream_csv.clone()));

        let tmp = tmp_for("stream_json");
        self.write_json_array(&tmp, &parts.stream, &pb)?;
        staged.push((tmp, paths.stream_json.clone()));

        self.promote(staging, &staged)?;
        pb.finish("outputs written");

        tracing::info!(
            combined = %paths.combined.display(),
            batch_files = paths.batch.len(),
            stream_records = parts.stream.len(),
            "wrote outputs to {}",
            self.out_dir.display()
        );
        Ok(paths)
    }

    /// Swap the staged files in for whatever an earlier run left behind.
    fn promote(&self, staging: &Path, staged: &[(PathBuf, PathBuf)]) -> Result<()> {
        self.check_destinations(staged)?;

        let previous = staging.join(PREVIOUS_DIR);
        fs::create_dir_all(&previous).with_context(|| format!("create {}", previous.display()))?;
        let mut set_aside = Vec::new();
        let mut promoted = Vec::new();
        if let Err(e) = self.swap_in(staged, &previous, &mut set_aside, &mut promoted) {
            rollback(&promoted, &set_aside);
            return Err(e);
        }
        if !set_aside.is_empty() {
            tracing::debug!(files = set_aside.len(), "replaced outputs of an earlier run");
        }
        Ok(())
    }

    /// Fail before anything moves if a destination cannot take a file.
    fn check_destinations(&self, staged: &[(PathBuf, PathBuf)]) -> Result<()> {
        for (_, dest) in staged {
            if dest.is_dir() {
                bail!("output path {} is a directory", dest.display());
            }
        }
        for name in [BATCH_DIR, STREAM_DIR] {
            let dir = self.out_dir.join(name);
            if dir.exists() && !dir.is_dir() {
                bail!("output path {} is not a directory", dir.display());
            }
            fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        }
        Ok(())
    }

    fn swap_in(
        &self,
        staged: &[(PathBuf, PathBuf)],
        previous: &Path,
        set_aside: &mut Vec<(PathBuf, PathBuf)>,
        promoted: &mut Vec<PathBuf>,
    ) -> Result<()> {
        for (i, old) in self.existing_outputs()?.into_iter().enumerate() {
            let kept = previous.join(format!("{i}.prev"));
            rename_with_backoff(&old, &kept)?;
            set_aside.push((old, kept));
        }
        for (tmp, dest) in staged {
            // A failed copy fallback can leave a partial file behind.
            promoted.push(dest.clone());
            replace_file_atomic_backoff(tmp, dest)?;
        }
        Ok(())
    }

    /// Files under `out_dir` that this writer produces, in either compression.
    fn existing_outputs(&self) -> Result<Vec<PathBuf>> {
        let stream_dir = self.out_dir.join(STREAM_DIR);
        let mut found: Vec<PathBuf> = [
            self.out_dir.join(format!("{COMBINED_STEM}.csv")),
            stream_dir.join(format!("{STREAM_STEM}.csv")),
            stream_dir.join(format!("{STREAM_STEM}.json")),
        ]
        .into_iter()
        .flat_map(|p| {
            let mut zst = p.clone().into_os_string();
            zst.push(".zst");
            [p, PathBuf::from(zst)]
        })
        .filter(|p| p.is_file())
        .collect();

        let batch_dir = self.out_dir.join(BATCH_DIR);
        let entries = fs::read_dir(&batch_dir).with_context(|| format!("list {}", batch_dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            let is_day_file = path.file_name().and_then(|n| n.to_str()).is_some_and(is_batch_file_name);
            if is_day_file && path.is_file() {
                found.push(path);
            }
        }
        Ok(found)
    }

    fn write_csv(&self, path: &Path, records: &[AssignedRecord], pb: &ProgressScope) -> Result<()> {
        let sink = Sink::create(path, self.compression, self.write_buf)
            .with_context(|| format!("create {}", path.display()))?;
        let mut w = csv::WriterBuilder::new().has_headers(false).from_writer(sink);
        w.write_record(OUTPUT_COLUMNS)?;
        for r in records {
            w.serialize(r.to_row())?;
            pb.inc(1);
        }
        let sink = w.into_inner().map_err(|e| e.into_error())?;
        sink.finish().with_context(|| format!("finish {}", path.display()))
    }

    /// JSON array of row objects, one element per record.
    fn write_json_array(&self, path: &Path, records: &[AssignedRecord], pb: &ProgressScope) -> Result<()> {
        let mut sink = Sink::create(path, self.compression, self.write_buf)
            .with_context(|| format!("create {}", path.display()))?;
        sink.write_all(b"[")?;
        for (i, r) in records.iter().enumerate() {
            if i > 0 {
                sink.write_all(b",")?;
            }
            serde_json::to_writer(&mut sink, &r.to_row())?;
            pb.inc(1);
        }
        sink.write_all(b"]")?;
        sink.finish().with_context(|| format!("finish {}", path.display()))
    }
}

/// `<YYYY-MM-DD>.csv`, optionally with `.zst`.
fn is_batch_file_name(name: &str) -> bool {
    let name = name.strip_suffix(".zst").unwrap_or(name);
    name.strip_suffix(".csv").is_some_and(|day| day.parse::<CalendarDate>().is_ok())
}

/// Undo a partial promotion: drop what was promoted, then restore what was set aside.
fn rollback(promoted: &[PathBuf], set_aside: &[(PathBuf, PathBuf)]) {
    for dest in promoted.iter().rev() {
        if let Err(e) = remove_with_backoff(dest) {
            tracing::warn!("rollback: {e:#}");
        }
    }
    for (orig, kept) in set_aside.iter().rev() {
        if let Err(e) = rename_with_backoff(kept, orig) {
            tracing::warn!("rollback: {e:#}");
        }
    }
    tracing::warn!(
        removed = promoted.len(),
        restored = set_aside.len(),
        "promotion failed; output directory rolled back"
    );
}
