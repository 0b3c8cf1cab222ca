//! Ingestion adapter: copy arriving event documents into a document store as-is.
//!
//! No field validation, transformation or deduplication happens here, and a
//! failed write is returned to the caller without retrying.

use crate::util::{create_with_backoff, open_with_backoff};
use anyhow::{Context, Result};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Destination for ingested documents.
pub trait DocumentStore {
    fn put(&mut self, doc: Value) -> Result<()>;
}

/// Keeps documents in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    pub docs: Vec<Value>,
}

impl DocumentStore for MemoryDocumentStore {
    fn put(&mut self, doc: Value) -> Result<()> {
        self.docs.push(doc);
        Ok(())
    }
}

/// Appends one compact JSON document per line to a file.
pub struct NdjsonDocumentStore {
    path: PathBuf,
    w: BufWriter<File>,
}

impl NdjsonDocumentStore {
    pub fn create(path: &Path) -> Result<Self> {
        let f = create_with_backoff(path).with_context(|| format!("create {}", path.display()))?;
        Ok(Self { path: path.to_path_buf(), w: BufWriter::with_capacity(64 * 1024, f) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn finish(mut self) -> Result<()> {
        self.w.flush().with_context(|| format!("flush {}", self.path.display()))
    }
}

impl DocumentStore for NdjsonDocumentStore {
    fn put(&mut self, doc: Value) -> Result<()> {
        serde_json::to_writer(&mut self.w, &doc)?;
        self.w.write_all(b"\n").with_context(|| format!("write {}", self.path.display()))
    }
}

/// Persist each event body unchanged. Returns how many documents were stored.
/// Stops at the first body that is not JSON or the first store failure.
pub fn persist_events<I, B, S>(events: I, store: &mut S) -> Result<usize>
where
    I: IntoIterator<Item = B>,
    B: AsRef<[u8]>,
    S: DocumentStore + ?Sized,
{
    let mut n = 0usize;
    for (i, body) in events.into_iter().enumerate() {
        let doc: Value = serde_json::from_slice(body.as_ref()).with_context(|| format!("event {i} is not a JSON document"))?;
        store.put(doc)?;
        n += 1;
        tracing::debug!(event = i, "event written to document store");
    }
    tracing::info!(documents = n, "persisted event batch");
    Ok(n)
}

/// Read back every document of an NDJSON store, skipping blank lines.
pub fn read_documents(path: &Path) -> Result<Vec<Value>> {
    let f = open_with_backoff(path).with_context(|| format!("open {}", path.display()))?;
    let mut docs = Vec::new();
    for (i, line) in BufReader::with_capacity(64 * 1024, f).lines().enumerate() {
        let line = line.with_context(|| format!("read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        docs.push(serde_json::from_str(&line).with_context(|| format!("parse line {} of {}", i + 1, path.display()))?);
    }
    Ok(docs)
}
