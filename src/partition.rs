use crate::date::CalendarDate;
use crate::error::PipelineError;
use crate::record::AssignedRecord;
use std::collections::{BTreeMap, BTreeSet};

/// Where a record ends up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    Stream,
    Batch,
    Dropped,
}

/// Stream set, per-day batch buckets, and the count of records in neither allowlist.
///
/// Records keep their assigned (shuffled) order inside every collection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PartitionedDataset {
    pub stream: Vec<AssignedRecord>,
    pub batch: BTreeMap<CalendarDate, Vec<AssignedRecord>>,
    pub dropped: usize,
    pub dropped_by_date: BTreeMap<CalendarDate, usize>,
}

impl PartitionedDataset {
    pub fn batch_len(&self) -> usize {
        self.batch.values().map(Vec::len).sum()
    }

    /// stream + batch + dropped; equals the routed input length.
    pub fn total(&self) -> usize {
        self.stream.len() + self.batch_len() + self.dropped
    }
}

/// Routes records by calendar date against two disjoint allowlists.
#[derive(Clone, Debug)]
pub struct PartitionRouter {
    stream_dates: BTreeSet<CalendarDate>,
    batch_dates: BTreeSet<CalendarDate>,
}

impl PartitionRouter {
    /// Fails if the allowlists share any date.
    pub fn new(stream_dates: BTreeSet<CalendarDate>, batch_dates: BTreeSet<CalendarDate>) -> Result<Self, PipelineError> {
        let overlap: Vec<String> = stream_dates.intersection(&batch_dates).map(|d| d.to_string()).collect();
        if !overlap.is_empty() {
            return Err(PipelineError::invalid(format!(
                "stream_dates and batch_dates overlap on {}",
                overlap.join(", ")
            )));
        }
        if stream_dates.is_empty() {
            tracing::warn!("stream_dates is empty; the stream dataset will be empty");
        }
        Ok(Self { stream_dates, batch_dates })
    }

    /// Build from `YYYY-MM-DD` strings; an unparseable entry is an invalid parameter.
    pub fn from_strs<I, J, S, T>(stream: I, batch: J) -> Result<Self, PipelineError>
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        Self::new(parse_date_set(stream, "stream_dates")?, parse_date_set(batch, "batch_dates")?)
    }

    pub fn stream_dates(&self) -> &BTreeSet<CalendarDate> {
        &self.stream_dates
    }

    pub fn batch_dates(&self) -> &BTreeSet<CalendarDate> {
        &self.batch_dates
    }

    /// Stream wins over batch; anything else is dropped.
    pub fn classify(&self, date: &CalendarDate) -> Route {
        if self.stream_dates.contains(date) {
            Route::Stream
        } else if self.batch_dates.contains(date) {
            Route::Batch
        } else {
            Route::Dropped
        }
    }

    /// Split records into stream and per-day batch buckets. Out-of-list records are
    /// counted and logged, never an error.
    pub fn route(&self, records: &[AssignedRecord]) -> PartitionedDataset {
        let mut out = PartitionedDataset::default();
        for r in records {
            let date = r.calendar_date();
            match self.classify(&date) {
                Route::Stream => out.stream.push(r.clone()),
                Route::Batch => out.batch.entry(date).or_default().push(r.clone()),
                Route::Dropped => {
                    out.dropped += 1;
                    *out.dropped_by_date.entry(date).or_insert(0) += 1;
                }
            }
        }

        for (date, n) in &out.dropped_by_date {
            tracing::debug!(%date, records = n, "date in neither allowlist, excluded");
        }
        if out.stream.is_empty() && !self.stream_dates.is_empty() {
            tracing::warn!(
                stream_dates = self.stream_dates.len(),
                "no record falls on a stream date; the stream dataset is empty"
            );
        }
        tracing::info!(
            stream = out.stream.len(),
            batch = out.batch_len(),
            batch_days = out.batch.len(),
            dropped = out.dropped,
            "routed records"
        );
        out
    }
}

pub(crate) fn parse_date_set<I, S>(dates: I, what: &str) -> Result<BTreeSet<CalendarDate>, PipelineError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    dates
        .into_iter()
        .map(|s| {
            s.as_ref()
                .parse::<CalendarDate>()
                .map_err(|e| PipelineError::invalid(format!("{what}: {e}")))
        })
        .collect()
}
