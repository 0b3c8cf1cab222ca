//! Record normalizer: read raw CSV rows, drop unusable ones, derive calendar
//! fields, and shuffle the survivors with an explicitly seeded RNG.

use crate::date::parse_timestamp;
use crate::error::PipelineError;
use crate::record::{NormalizedRecord, RawRecord};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::borrow::Cow;
use std::io::Read;

/// Tokens read as "no value", matching the default NA spellings of dataframe CSV readers.
const NA_TOKENS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

const ID_ALIASES: &[&str] = &["id"];
const BODY_ALIASES: &[&str] = &["tweet", "body", "text"];
const LIKES_ALIASES: &[&str] = &["likes"];
const REPLIES_ALIASES: &[&str] = &["replies"];
const RETWEETS_ALIASES: &[&str] = &["retweets"];
const TIME_ALIASES: &[&str] = &["time", "timestamp", "created_at"];

/// Reader tuning for the raw export.
#[derive(Clone, Debug)]
pub struct ReadOptions {
    pub read_buffer_bytes: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self { read_buffer_bytes: 256 * 1024 }
    }
}

/// Per-reason counters for rows excluded during normalization.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NormalizeStats {
    pub rows_read: usize,
    pub missing_field: usize,
    pub invalid_counter: usize,
    pub invalid_timestamp: usize,
    pub kept: usize,
}

impl NormalizeStats {
    pub fn dropped(&self) -> usize {
        self.missing_field + self.invalid_counter + self.invalid_timestamp
    }
}

/// Raw rows that passed the null and counter checks.
#[derive(Debug)]
pub struct RawLoad {
    pub records: Vec<RawRecord>,
    pub stats: NormalizeStats,
}

/// Shuffled, normalized records ready for grouping.
#[derive(Debug)]
pub struct Normalized {
    pub records: Vec<NormalizedRecord>,
    pub stats: NormalizeStats,
    pub seed: u64,
}

struct Columns {
    id: usize,
    body: usize,
    likes: usize,
    replies: usize,
    retweets: usize,
    time: usize,
}

impl Columns {
    fn locate(headers: &csv::ByteRecord) -> Result<Self, PipelineError> {
        let names: Vec<String> = headers
            .iter()
            .map(|h| decode_field(h).trim().trim_start_matches('\u{feff}').to_lowercase())
            .collect();
        let find = |aliases: &[&str], canonical: &str| {
            names
                .iter()
                .position(|n| aliases.contains(&n.as_str()))
                .ok_or_else(|| PipelineError::MissingColumn(canonical.to_string()))
        };
        Ok(Self {
            id: find(ID_ALIASES, "id")?,
            body: find(BODY_ALIASES, "tweet")?,
            likes: find(LIKES_ALIASES, "likes")?,
            replies: find(REPLIES_ALIASES, "replies")?,
            retweets: find(RETWEETS_ALIASES, "retweets")?,
            time: find(TIME_ALIASES, "time")?,
        })
    }
}

/// UTF-8 when valid, otherwise Latin-1 (every byte maps to the code point of the same value).
fn decode_field(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => Cow::Owned(bytes.iter().map(|&b| b as char).collect()),
    }
}

pub fn is_missing(value: &str) -> bool {
    let v = value.trim();
    v.is_empty() || NA_TOKENS.contains(&v)
}

/// Non-negative integer counter; integral float spellings like `12.0` are accepted.
pub fn parse_counter(value: &str) -> Option<u64> {
    let v = value.trim();
    if let Ok(n) = v.parse::<u64>() {
        return Some(n);
    }
    let f: f64 = v.parse().ok()?;
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 {
        Some(f as u64)
    } else {
        None
    }
}

/// Read the raw export, dropping rows with a missing required field or a bad counter.
/// Timestamps are validated later by [`normalize_records`].
pub fn read_raw_records<R: Read>(reader: R, opts: &ReadOptions) -> Result<RawLoad, PipelineError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .buffer_capacity(opts.read_buffer_bytes.max(8 * 1024))
        .from_reader(reader);

    let cols = Columns::locate(rdr.byte_headers()?)?;
    let mut stats = NormalizeStats::default();
    let mut records = Vec::new();

    for row in rdr.byte_records() {
        let row = row?;
        stats.rows_read += 1;
        let line = row.position().map(|p| p.line()).unwrap_or(0);
        let field = |i: usize| row.get(i).map(decode_field).filter(|v| !is_missing(v));

        let (Some(id), Some(body), Some(likes), Some(replies), Some(retweets), Some(time)) = (
            field(cols.id),
            field(cols.body),
            field(cols.likes),
            field(cols.replies),
            field(cols.retweets),
            field(cols.time),
        ) else {
            tracing::debug!(line, "dropping row with a missing field");
            stats.missing_field += 1;
            continue;
        };

        let (Some(likes), Some(replies), Some(retweets)) =
            (parse_counter(&likes), parse_counter(&replies), parse_counter(&retweets))
        else {
            tracing::debug!(line, "dropping row with a non-integer counter");
            stats.invalid_counter += 1;
            continue;
        };

        records.push(RawRecord {
            source_id: id.trim().to_string(),
            body: body.into_owned(),
            likes,
            replies,
            retweets,
            timestamp: time.trim().to_string(),
        });
    }

    Ok(RawLoad { records, stats })
}

/// Derive calendar fields; rows whose timestamp does not parse are dropped and counted.
pub fn normalize_records(raw: Vec<RawRecord>, stats: &mut NormalizeStats) -> Vec<NormalizedRecord> {
    let mut out = Vec::with_capacity(raw.len());
    for r in raw {
        match parse_timestamp(&r.timestamp) {
            Some(ts) => out.push(NormalizedRecord::new(r.body, r.likes, r.replies, r.retweets, ts)),
            None => {
                tracing::debug!(id = %r.source_id, timestamp = %r.timestamp, "dropping row with unparseable timestamp");
                stats.invalid_timestamp += 1;
            }
        }
    }
    stats.kept = out.len();
    out
}

/// Uniformly permute `records` using the caller's RNG.
pub fn shuffle_with<T, R: Rng + ?Sized>(records: &mut [T], rng: &mut R) {
    records.shuffle(rng);
}

/// Uniformly permute `records`; the same seed always yields the same order.
pub fn shuffle_records<T>(records: &mut [T], seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    shuffle_with(records, &mut rng);
}

/// Full normalizer stage: read, filter, derive calendar fields, shuffle.
/// Fails with [`PipelineError::EmptyDataset`] when nothing survives.
pub fn load_normalized<R: Read>(reader: R, opts: &ReadOptions, seed: u64) -> Result<Normalized, PipelineError> {
    let RawLoad { records: raw, mut stats } = read_raw_records(reader, opts)?;
    let mut records = normalize_records(raw, &mut stats);

    tracing::info!(
        rows_read = stats.rows_read,
        kept = stats.kept,
        missing_field = stats.missing_field,
        invalid_counter = stats.invalid_counter,
        invalid_timestamp = stats.invalid_timestamp,
        "normalized raw export"
    );

    if records.is_empty() {
        return Err(PipelineError::EmptyDataset { rows_read: stats.rows_read, dropped: stats.dropped() });
    }

    shuffle_records(&mut records, seed);
    tracing::debug!(seed, "shuffled {} records", records.len());

    Ok(Normalized { records, stats, seed })
}
