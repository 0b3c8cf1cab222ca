use crate::date::{format_timestamp, CalendarDate};
use serde::Serialize;
use time::PrimitiveDateTime;

/// One parsed input row with every required field present.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawRecord {
    /// Original identifier from the export; never written out.
    pub source_id: String,
    pub body: String,
    pub likes: u64,
    pub replies: u64,
    pub retweets: u64,
    pub timestamp: String,
}

/// A post with calendar fields derived from its timestamp.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedRecord {
    pub body: String,
    pub likes: u64,
    pub replies: u64,
    pub retweets: u64,
    pub timestamp: PrimitiveDateTime,
    pub year: i32,
    pub month: u8,
    pub day: u8,
    pub calendar_date: CalendarDate,
}

impl NormalizedRecord {
    pub fn new(body: String, likes: u64, replies: u64, retweets: u64, timestamp: PrimitiveDateTime) -> Self {
        let calendar_date = CalendarDate::of(&timestamp);
        Self {
            body,
            likes,
            replies,
            retweets,
            timestamp,
            year: calendar_date.year,
            month: calendar_date.month,
            day: calendar_date.day,
            calendar_date,
        }
    }
}

/// A normalized record stamped with its synthetic group and dataset-unique id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssignedRecord {
    pub group_id: u64,
    pub record_id: u64,
    pub record: NormalizedRecord,
}

impl AssignedRecord {
    pub fn calendar_date(&self) -> CalendarDate {
        self.record.calendar_date
    }

    pub fn to_row(&self) -> OutputRow<'_> {
        OutputRow {
            group_id: self.group_id,
            record_id: self.record_id,
            timestamp: format_timestamp(&self.record.timestamp),
            replies: self.record.replies,
            calendar_date: self.record.calendar_date,
            likes: self.record.likes,
            body: &self.record.body,
            retweets: self.record.retweets,
        }
    }
}

/// Serialized shape shared by every output file (CSV header and JSON keys follow field order).
#[derive(Debug, Serialize)]
pub struct OutputRow<'a> {
    pub group_id: u64,
    pub record_id: u64,
    pub timestamp: String,
    pub replies: u64,
    pub calendar_date: CalendarDate,
    pub likes: u64,
    pub body: &'a str,
    pub retweets: u64,
}

pub const OUTPUT_COLUMNS: [&str; 8] = [
    "group_id",
    "record_id",
    "timestamp",
    "replies",
    "calendar_date",
    "likes",
    "body",
    "retweets",
];
