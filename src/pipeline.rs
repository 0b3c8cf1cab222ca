use crate::config::{OutputCompression, PipelineOptions};
use crate::error::PipelineError;
use crate::export::{OutputPaths, OutputWriter};
use crate::grouping::{assign_with_layout, GroupLayout};
use crate::normalize::{load_normalized, NormalizeStats, ReadOptions};
use crate::partition::{PartitionRouter, PartitionedDataset};
use crate::record::AssignedRecord;
use crate::util::{init_tracing_once, open_with_backoff};
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Counters describing one run, stage by stage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    pub seed: u64,
    pub rows_read: usize,
    pub dropped_missing_field: usize,
    pub dropped_invalid_counter: usize,
    pub dropped_invalid_timestamp: usize,
    pub records: usize,
    pub group_size: u64,
    pub whole_groups: u64,
    pub remainder: u64,
    pub group_count: u64,
    pub stream_records: usize,
    pub batch_records: usize,
    pub batch_days: usize,
    pub dropped_out_of_range: usize,
}

impl PipelineReport {
    fn new(seed: u64, stats: &NormalizeStats, layout: &GroupLayout, parts: &PartitionedDataset) -> Self {
        Self {
            seed,
            rows_read: stats.rows_read,
            dropped_missing_field: stats.missing_field,
            dropped_invalid_counter: stats.invalid_counter,
            dropped_invalid_timestamp: stats.invalid_timestamp,
            records: stats.kept,
            group_size: layout.group_size,
            whole_groups: layout.whole_groups,
            remainder: layout.remainder,
            group_count: layout.group_count(),
            stream_records: parts.stream.len(),
            batch_records: parts.batch_len(),
            batch_days: parts.batch.len(),
            dropped_out_of_range: parts.dropped,
        }
    }
}

/// Everything the pipeline produces, held in memory before any file is written.
#[derive(Clone, Debug)]
pub struct PreparedDataset {
    pub records: Vec<AssignedRecord>,
    pub partitions: PartitionedDataset,
    pub report: PipelineReport,
}

/// A completed run: counters plus where the files landed.
#[derive(Clone, Debug)]
pub struct PipelineRun {
    pub report: PipelineReport,
    pub outputs: OutputPaths,
}

/// Normalize → group → route, then write. Configure with the builder methods.
#[derive(Clone, Debug, Default)]
pub struct TweetPrep {
    pub(crate) opts: PipelineOptions,
}

impl TweetPrep {
    pub fn new() -> Self {
        Self { opts: PipelineOptions::default() }
    }

    pub fn from_options(opts: PipelineOptions) -> Self {
        Self { opts }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.opts
    }

    // -------- Builder methods --------
    pub fn input(mut self, path: impl AsRef<Path>) -> Self { self.opts = self.opts.with_input(path); self }
    pub fn output_dir(mut self, dir: impl AsRef<Path>) -> Self { self.opts = self.opts.with_output_dir(dir); self }
    pub fn group_size(mut self, g: usize) -> Self { self.opts = self.opts.with_group_size(g); self }
    pub fn stream_dates<I, S>(mut self, dates: I) -> Self where I: IntoIterator<Item = S>, S: Into<String> { self.opts = self.opts.with_stream_dates(dates); self }
    pub fn batch_dates<I, S>(mut self, dates: I) -> Self where I: IntoIterator<Item = S>, S: Into<String> { self.opts = self.opts.with_batch_dates(dates); self }
    pub fn seed(mut self, seed: u64) -> Self { self.opts = self.opts.with_seed(seed); self }
    pub fn compression(mut self, c: OutputCompression) -> Self { self.opts = self.opts.with_compression(c); self }
    pub fn progress(mut self, yes: bool) -> Self { self.opts = self.opts.with_progress(yes); self }
    pub fn io_buffers(mut self, read_bytes: usize, write_bytes: usize) -> Self { self.opts = self.opts.with_io_buffers(read_bytes, write_bytes); self }

    /// Data-independent parameter checks; also yields the configured router.
    pub fn validate(&self) -> Result<PartitionRouter, PipelineError> {
        if self.opts.group_size == 0 {
            return Err(PipelineError::invalid("group_size must be a positive integer"));
        }
        PartitionRouter::from_strs(&self.opts.stream_dates, &self.opts.batch_dates)
    }

    /// Run every stage over the configured input file, in memory.
    pub fn prepare(&self) -> Result<PreparedDataset> {
        init_tracing_once();
        let router = self.validate()?;
        let path = &self.opts.input_path;
        let f = open_with_backoff(path).with_context(|| format!("open input {}", path.display()))?;
        let rdr = BufReader::with_capacity(self.opts.read_buffer_bytes.max(8 * 1024), f);
        self.prepare_with(rdr, &router)
            .with_context(|| format!("preparing {}", path.display()))
    }

    /// Run every stage over an already-open CSV source, in memory.
    pub fn prepare_from_reader<R: Read>(&self, reader: R) -> Result<PreparedDataset> {
        init_tracing_once();
        let router = self.validate()?;
        self.prepare_with(reader, &router)
    }

    fn prepare_with<R: Read>(&self, reader: R, router: &PartitionRouter) -> Result<PreparedDataset> {
        let seed = self.opts.seed.unwrap_or_else(fresh_seed);
        if self.opts.seed.is_none() {
            tracing::info!(seed, "no seed configured; pass this seed to reproduce the run");
        }

        let read_opts = ReadOptions { read_buffer_bytes: self.opts.read_buffer_bytes };
        let normalized = load_normalized(reader, &read_opts, seed)?;
        let layout = GroupLayout::new(normalized.records.len(), self.opts.group_size)?;
        let records = assign_with_layout(normalized.records, &layout)?;
        let partitions = router.route(&records);
        let report = PipelineReport::new(seed, &normalized.stats, &layout, &partitions);

        Ok(PreparedDataset { records, partitions, report })
    }

    /// Full run: prepare in memory, then write every output under `output_dir`.
    pub fn run(&self) -> Result<PipelineRun> {
        let prepared = self.prepare()?;
        self.write(prepared)
    }

    /// Like [`run`](Self::run) but reading from `reader` instead of `input_path`.
    pub fn run_from_reader<R: Read>(&self, reader: R) -> Result<PipelineRun> {
        let prepared = self.prepare_from_reader(reader)?;
        self.write(prepared)
    }

    fn write(&self, prepared: PreparedDataset) -> Result<PipelineRun> {
        let writer = OutputWriter::new(
            &self.opts.output_dir,
            self.opts.compression,
            self.opts.write_buffer_bytes,
            self.opts.progress,
        );
        let outputs = writer.write_all(&prepared.records, &prepared.partitions)?;
        Ok(PipelineRun { report: prepared.report, outputs })
    }
}

fn fresh_seed() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    nanos ^ u64::from(std::process::id()).rotate_left(32)
}
