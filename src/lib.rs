mod config;
mod date;
mod error;
mod record;

mod normalize;
mod grouping;
mod partition;

mod export;
mod ingest;
mod progress;
mod util;
mod pipeline;

pub use crate::config::{
    default_batch_dates, default_stream_dates, OutputCompression, PipelineOptions, DEFAULT_BATCH_DATES,
    DEFAULT_GROUP_SIZE, DEFAULT_STREAM_DATES,
};
pub use crate::date::{format_timestamp, parse_timestamp, CalendarDate};
pub use crate::error::PipelineError;
pub use crate::record::{AssignedRecord, NormalizedRecord, OutputRow, RawRecord, OUTPUT_COLUMNS};
pub use crate::pipeline::{PipelineReport, PipelineRun, PreparedDataset, TweetPrep};

// Individual stages, usable without the builder.
pub use crate::normalize::{
    is_missing, load_normalized, normalize_records, parse_counter, read_raw_records, shuffle_records,
    shuffle_with, NormalizeStats, Normalized, RawLoad, ReadOptions,
};
pub use crate::grouping::{assign_groups, assign_with_layout, group_sizes, GroupLayout};
pub use crate::partition::{PartitionRouter, PartitionedDataset, Route};

// Output side.
pub use crate::export::{OutputPaths, OutputWriter, BATCH_DIR, COMBINED_STEM, STREAM_DIR, STREAM_STEM};

// Ingestion adapter and its NDJSON store.
pub use crate::ingest::{persist_events, read_documents, DocumentStore, MemoryDocumentStore, NdjsonDocumentStore};

pub use crate::util::{init_tracing_once, replace_file_atomic_backoff};
