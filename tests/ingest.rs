use serde_json::json;
use tweetprep::{persist_events, read_documents, MemoryDocumentStore, NdjsonDocumentStore};

/// Documents are stored exactly as they arrive, including ones missing expected fields
/// and duplicates; nothing is validated or deduplicated.
#[test]
fn events_are_persisted_unchanged() {
    let events = vec![
        json!({"group_id": 3, "record_id": 17, "body": "water rising", "calendar_date": "2017-08-25"}).to_string(),
        json!({"unexpected": true}).to_string(),
        json!({"unexpected": true}).to_string(),
    ];
    let mut store = MemoryDocumentStore::default();
    let n = persist_events(&events, &mut store).unwrap();
    assert_eq!(n, 3);
    assert_eq!(store.docs[0]["body"], "water rising");
    assert_eq!(store.docs[1], store.docs[2]);
}

/// A body that is not JSON aborts the batch; earlier documents are already stored.
#[test]
fn unparseable_event_stops_the_batch() {
    let events: [&[u8]; 3] = [br#"{"a":1}"#, b"not json", br#"{"b":2}"#];
    let mut store = MemoryDocumentStore::default();
    let err = persist_events(events, &mut store).unwrap_err();
    assert!(format!("{err:#}").contains("event 1"), "{err:#}");
    assert_eq!(store.docs.len(), 1);
}

#[test]
fn ndjson_store_round_trips_documents() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("cosmos.ndjson");

    let mut store = NdjsonDocumentStore::create(&path).unwrap();
    let events = [
        json!({"record_id": 1, "body": "line\nbreak inside"}).to_string(),
        json!([1, 2, 3]).to_string(),
    ];
    assert_eq!(persist_events(&events, &mut store).unwrap(), 2);
    store.finish().unwrap();

    let docs = read_documents(&path).unwrap();
    assert_eq!(docs, vec![json!({"record_id": 1, "body": "line\nbreak inside"}), json!([1, 2, 3])]);
}

/// Hand-edited stores may carry CRLF endings and blank lines; both are tolerated.
#[test]
fn read_documents_skips_blank_lines_and_crlf() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("docs.ndjson");
    std::fs::write(&path, "{\"a\":1}\r\n\r\n  \n{\"b\":2}\n").unwrap();
    assert_eq!(read_documents(&path).unwrap(), vec![json!({"a": 1}), json!({"b": 2})]);

    std::fs::write(&path, "{\"a\":1}\nnot json\n").unwrap();
    let err = read_documents(&path).unwrap_err();
    assert!(format!("{err:#}").contains("line 2"), "{err:#}");
}
