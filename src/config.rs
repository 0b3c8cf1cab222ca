use crate::error::PipelineError;
use std::path::{Path, PathBuf};

/// The single simulated live day.
pub const DEFAULT_STREAM_DATES: &[&str] = &["2017-08-25"];

/// Historical days exported as per-day batch files.
pub const DEFAULT_BATCH_DATES: &[&str] = &[
    "2017-08-26", "2017-08-27", "2017-08-24", "2017-08-28", "2017-08-29", "2017-08-23",
    "2017-06-01", "2017-06-21", "2017-08-17", "2017-08-18", "2017-08-14", "2017-08-22",
    "2017-02-19", "2017-03-28", "2017-08-19", "2017-08-13", "2017-05-21", "2017-05-26",
    "2017-04-19", "2017-08-16", "2017-08-15", "2017-06-09", "2017-08-21", "2017-06-02",
    "2017-02-21", "2017-05-25", "2017-04-20", "2017-08-04", "2017-03-21", "2017-08-20",
    "2017-01-11", "2017-02-10",
];

pub const DEFAULT_GROUP_SIZE: usize = 100;

pub fn default_stream_dates() -> Vec<String> {
    DEFAULT_STREAM_DATES.iter().map(|s| s.to_string()).collect()
}

pub fn default_batch_dates() -> Vec<String> {
    DEFAULT_BATCH_DATES.iter().map(|s| s.to_string()).collect()
}

/// Compression applied to every output file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputCompression {
    None,
    /// zstd at the given level; file names get a `.zst` suffix.
    Zstd { level: i32 },
}

/// Pipeline parameters with defaults for the Harvey simulation and builder chaining.
#[derive(Clone, Debug)]
pub struct PipelineOptions {
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    pub group_size: usize,
    pub stream_dates: Vec<String>, // YYYY-MM-DD, validated when the router is built
    pub batch_dates: Vec<String>,
    pub seed: Option<u64>,         // None: derived from the clock and reported
    pub compression: OutputCompression,
    pub progress: bool,

    // IO tuning
    pub read_buffer_bytes: usize,
    pub write_buffer_bytes: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        let data = PathBuf::from("./data");
        Self {
            input_path: data.join("original").join("hurricane_harvey.csv"),
            output_dir: data.join("preprocessed"),
            group_size: DEFAULT_GROUP_SIZE,
            stream_dates: default_stream_dates(),
            batch_dates: default_batch_dates(),
            seed: None,
            compression: OutputCompression::None,
            progress: true,
            read_buffer_bytes: 256 * 1024,
            write_buffer_bytes: 256 * 1024,
        }
    }
}

impl PipelineOptions {
    pub fn with_input(mut self, path: impl AsRef<Path>) -> Self {
        self.input_path = path.as_ref().to_path_buf();
        self
    }
    pub fn with_output_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.output_dir = dir.as_ref().to_path_buf();
        self
    }
    pub fn with_group_size(mut self, group_size: usize) -> Self {
        self.group_size = group_size;
        self
    }
    pub fn with_stream_dates<I, S>(mut self, dates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stream_dates = dates.into_iter().map(Into::into).collect();
        self
    }
    pub fn with_batch_dates<I, S>(mut self, dates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.batch_dates = dates.into_iter().map(Into::into).collect();
        self
    }
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
    pub fn with_compression(mut self, compression: OutputCompression) -> Self {
        self.compression = compression;
        self
    }
    pub fn with_progress(mut self, yes: bool) -> Self {
        self.progress = yes;
        self
    }
    pub fn with_io_buffers(mut self, read_bytes: usize, write_bytes: usize) -> Self {
        self.read_buffer_bytes = read_bytes.max(8 * 1024);
        self.write_buffer_bytes = write_bytes.max(8 * 1024);
        self
    }

    /// Apply `TWEETPREP_*` overrides from the process environment.
    pub fn merge_env(self) -> Result<Self, PipelineError> {
        self.merge_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup:
    /// - TWEETPREP_INPUT, TWEETPREP_OUTPUT_DIR: paths
    /// - TWEETPREP_GROUP_SIZE, TWEETPREP_SEED: integers
    /// - TWEETPREP_STREAM_DATES, TWEETPREP_BATCH_DATES: comma/semicolon/space separated dates
    pub fn merge_env_from<F>(mut self, lookup: F) -> Result<Self, PipelineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(p) = get("TWEETPREP_INPUT") {
            self.input_path = PathBuf::from(p);
        }
        if let Some(p) = get("TWEETPREP_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(p);
        }
        if let Some(v) = get("TWEETPREP_GROUP_SIZE") {
            self.group_size = v
                .parse()
                .map_err(|_| PipelineError::invalid(format!("TWEETPREP_GROUP_SIZE is not an integer: {v}")))?;
        }
        if let Some(v) = get("TWEETPREP_SEED") {
            let seed = v
                .parse()
                .map_err(|_| PipelineError::invalid(format!("TWEETPREP_SEED is not an integer: {v}")))?;
            self.seed = Some(seed);
        }
        if let Some(v) = get("TWEETPREP_STREAM_DATES") {
            self.stream_dates = split_list(&v);
        }
        if let Some(v) = get("TWEETPREP_BATCH_DATES") {
            self.batch_dates = split_list(&v);
        }
        Ok(self)
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}
