#[path = "common/mod.rs"]
mod common;

use common::*;
use std::collections::BTreeSet;
use tweetprep::{OutputCompression, PipelineError, PipelineOptions, TweetPrep, OUTPUT_COLUMNS};

/// 250 records: 60 on the stream day, 150 over three batch days, 40 outside both lists.
fn scenario_csv() -> String {
    raw_csv(&[
        ("2017-08-25", 60),
        ("2017-08-26", 70),
        ("2017-08-27", 50),
        ("2017-08-24", 30),
        ("2017-01-01", 25),
        ("2017-09-15", 15),
    ])
}

fn prep(out: &std::path::Path) -> TweetPrep {
    TweetPrep::new().output_dir(out).group_size(100).seed(7).progress(false)
}

/// End to end over the default allowlists: combined file, one file per batch day,
/// and the stream day as CSV and JSON, all with the documented columns.
#[test]
fn run_writes_combined_batch_and_stream_outputs() {
    let tmp = tempfile::tempdir().unwrap();
    let input = write_file(tmp.path(), "harvey.csv", scenario_csv().as_bytes());
    let out = tmp.path().join("preprocessed");

    let run = prep(&out).input(&input).run().unwrap();
    let r = &run.report;
    assert_eq!(r.rows_read, 250);
    assert_eq!(r.records, 250);
    assert_eq!((r.whole_groups, r.remainder, r.group_count), (2, 50, 3));
    assert_eq!(r.stream_records, 60);
    assert_eq!(r.batch_records, 150);
    assert_eq!(r.batch_days, 3);
    assert_eq!(r.dropped_out_of_range, 40);
    assert_eq!(r.stream_records + r.batch_records + r.dropped_out_of_range, r.records);

    assert_eq!(
        list_files(&out),
        vec![
            "batch/2017-08-24.csv",
            "batch/2017-08-26.csv",
            "batch/2017-08-27.csv",
            "stream/tweets_stream.csv",
            "stream/tweets_stream.json",
            "tweets_all.csv",
        ],
        "staging must be gone and no extra files written"
    );

    assert_eq!(csv_header(&run.outputs.combined), OUTPUT_COLUMNS.to_vec());
    let all = read_csv_rows(&run.outputs.combined);
    assert_eq!(all.len(), 250);

    let ids: BTreeSet<u64> = all.iter().map(|row| row["record_id"].parse().unwrap()).collect();
    assert_eq!(ids, (0..250).collect::<BTreeSet<u64>>());
    for (i, row) in all.iter().enumerate() {
        assert_eq!(row["record_id"], i.to_string());
        assert_eq!(row["group_id"], (i / 100 + 1).to_string());
        assert_eq!(&row["timestamp"][..10], row["calendar_date"].as_str());
        assert!(row["body"].contains(", about the storm"));
    }

    let day = read_csv_rows(run.outputs.batch.values().next().unwrap());
    assert_eq!(day.len(), 30);
    assert!(day.iter().all(|row| row["calendar_date"] == "2017-08-24"));

    let stream_csv = read_csv_rows(&run.outputs.stream_csv);
    let stream_json = read_json_array(&run.outputs.stream_json);
    assert_eq!(stream_csv.len(), 60);
    assert_eq!(stream_json.len(), 60);
    for (row, obj) in stream_csv.iter().zip(&stream_json) {
        assert_eq!(row["calendar_date"], "2017-08-25");
        assert_eq!(obj["calendar_date"], "2017-08-25");
        assert_eq!(obj["record_id"].as_u64().unwrap().to_string(), row["record_id"]);
        assert_eq!(obj["body"].as_str().unwrap(), row["body"]);
        let keys: Vec<&str> = obj.as_object().unwrap().keys().map(String::as_str).collect();
        let mut want = OUTPUT_COLUMNS.to_vec();
        let mut got = keys.clone();
        want.sort();
        got.sort();
        assert_eq!(got, want);
    }
}

/// Same input, seed and configuration: identical ids and partitions.
#[test]
fn same_seed_reproduces_assignments_and_partitions() {
    let csv = scenario_csv();
    let tmp = tempfile::tempdir().unwrap();
    let a = prep(tmp.path()).prepare_from_reader(csv.as_bytes()).unwrap();
    let b = prep(tmp.path()).prepare_from_reader(csv.as_bytes()).unwrap();
    assert_eq!(a.records, b.records);
    assert_eq!(a.partitions, b.partitions);
    assert_eq!(a.report, b.report);

    let c = prep(tmp.path()).seed(8).prepare_from_reader(csv.as_bytes()).unwrap();
    assert_ne!(a.records, c.records, "a different seed should shuffle differently");
    assert_eq!(c.partitions.stream.len(), a.partitions.stream.len());
}

/// Without a configured seed one is chosen and reported; replaying it reproduces the run.
#[test]
fn reported_seed_replays_the_run() {
    let csv = scenario_csv();
    let tmp = tempfile::tempdir().unwrap();
    let base = TweetPrep::new().output_dir(tmp.path()).progress(false);
    let first = base.clone().prepare_from_reader(csv.as_bytes()).unwrap();
    let replay = base.seed(first.report.seed).prepare_from_reader(csv.as_bytes()).unwrap();
    assert_eq!(first.records, replay.records);
}

/// Every row has a null counter: the run fails and writes nothing.
#[test]
fn empty_dataset_writes_no_output() {
    let csv = format!("{HARVEY_HEADER}\n0,1,2017-08-25 10:00:00,a,1,,1\n1,2,2017-08-26 10:00:00,b,,2,1\n");
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("out");

    let err = prep(&out).run_from_reader(csv.as_bytes()).unwrap_err();
    assert!(
        matches!(err.downcast_ref::<PipelineError>(), Some(PipelineError::EmptyDataset { rows_read: 2, .. })),
        "got {err:#}"
    );
    assert!(list_files(&out).is_empty());
}

/// Parameter problems are caught before the input is even opened.
#[test]
fn invalid_parameters_fail_before_reading() {
    let tmp = tempfile::tempdir().unwrap();
    let missing_input = tmp.path().join("does_not_exist.csv");
    let out = tmp.path().join("out");

    let overlapping = prep(&out).input(&missing_input).stream_dates(["2017-08-25"]).batch_dates(["2017-08-25"]);
    let err = overlapping.run().unwrap_err();
    assert!(matches!(err.downcast_ref::<PipelineError>(), Some(PipelineError::InvalidParameter(_))), "{err:#}");

    let zero = prep(&out).input(&missing_input).group_size(0);
    let err = zero.run().unwrap_err();
    assert!(matches!(err.downcast_ref::<PipelineError>(), Some(PipelineError::InvalidParameter(_))), "{err:#}");

    assert!(list_files(&out).is_empty());
}

/// A group size larger than the surviving record count is rejected after loading, still with no output.
#[test]
fn group_size_larger_than_dataset_is_rejected() {
    let csv = raw_csv(&[("2017-08-25", 10)]);
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("out");
    let err = prep(&out).group_size(11).run_from_reader(csv.as_bytes()).unwrap_err();
    assert!(matches!(err.downcast_ref::<PipelineError>(), Some(PipelineError::InvalidParameter(_))), "{err:#}");
    assert!(list_files(&out).is_empty());
}

/// Injected allowlists replace the defaults.
#[test]
fn custom_allowlists_drive_routing() {
    let csv = raw_csv(&[("2017-01-01", 5), ("2017-01-02", 4), ("2017-08-25", 3)]);
    let tmp = tempfile::tempdir().unwrap();
    let prepared = prep(tmp.path())
        .group_size(4)
        .stream_dates(["2017-01-02"])
        .batch_dates(["2017-01-01"])
        .prepare_from_reader(csv.as_bytes())
        .unwrap();
    let parts = &prepared.partitions;
    assert_eq!(parts.stream.len(), 4);
    assert_eq!(parts.batch_len(), 5);
    assert_eq!(parts.dropped, 3);
    assert_eq!(prepared.report.group_count, 3);
}

/// zstd output: every file gets a `.zst` suffix and decompresses to the same CSV/JSON.
#[test]
fn zstd_outputs_decompress_to_csv_and_json() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("zst");
    let run = prep(&out)
        .compression(OutputCompression::Zstd { level: 3 })
        .run_from_reader(scenario_csv().as_bytes())
        .unwrap();

    assert!(list_files(&out).iter().all(|f| f.ends_with(".zst")));
    assert!(run.outputs.combined.ends_with("tweets_all.csv.zst"));

    let all = parse_csv_rows(&decompress_zst(&run.outputs.combined));
    assert_eq!(all.len(), 250);
    let stream: Vec<serde_json::Value> = serde_json::from_str(&decompress_zst(&run.outputs.stream_json)).unwrap();
    assert_eq!(stream.len(), 60);
}

/// An empty stream day still produces header-only CSV and an empty JSON array.
#[test]
fn empty_stream_set_writes_empty_files() {
    let csv = raw_csv(&[("2017-08-26", 5)]);
    let tmp = tempfile::tempdir().unwrap();
    let run = prep(tmp.path()).group_size(2).run_from_reader(csv.as_bytes()).unwrap();
    assert_eq!(csv_header(&run.outputs.stream_csv), OUTPUT_COLUMNS.to_vec());
    assert!(read_csv_rows(&run.outputs.stream_csv).is_empty());
    assert!(read_json_array(&run.outputs.stream_json).is_empty());
}

#[test]
fn env_overrides_apply_and_validate() {
    let env = |k: &str| match k {
        "TWEETPREP_GROUP_SIZE" => Some("25".to_string()),
        "TWEETPREP_SEED" => Some(" 99 ".to_string()),
        "TWEETPREP_STREAM_DATES" => Some("2017-08-20".to_string()),
        "TWEETPREP_BATCH_DATES" => Some("2017-08-21, 2017-08-22;2017-08-23".to_string()),
        "TWEETPREP_OUTPUT_DIR" => Some("/tmp/tweetprep-out".to_string()),
        _ => None,
    };
    let opts = PipelineOptions::default().merge_env_from(env).unwrap();
    assert_eq!(opts.group_size, 25);
    assert_eq!(opts.seed, Some(99));
    assert_eq!(opts.stream_dates, vec!["2017-08-20"]);
    assert_eq!(opts.batch_dates, vec!["2017-08-21", "2017-08-22", "2017-08-23"]);
    assert_eq!(opts.output_dir, std::path::PathBuf::from("/tmp/tweetprep-out"));
    assert_eq!(opts.input_path, PipelineOptions::default().input_path);

    let bad = PipelineOptions::default().merge_env_from(|k| (k == "TWEETPREP_GROUP_SIZE").then(|| "lots".to_string()));
    assert!(matches!(bad, Err(PipelineError::InvalidParameter(_))));
}

/// A directory sitting where the stream JSON must go: the run fails before any file
/// is promoted, quickly, and the output directory holds no files afterwards.
#[test]
fn blocked_destination_fails_without_partial_output() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("out");
    std::fs::create_dir_all(out.join("stream").join("tweets_stream.json")).unwrap();

    let started = std::time::Instant::now();
    let err = prep(&out)
        .group_size(5)
        .run_from_reader(raw_csv(&[("2017-08-25", 4), ("2017-08-26", 6)]).as_bytes())
        .unwrap_err();
    assert!(format!("{err:#}").contains("tweets_stream.json"), "{err:#}");
    assert!(started.elapsed() < std::time::Duration::from_secs(2), "took {:?}", started.elapsed());
    assert!(list_files(&out).is_empty(), "{:?}", list_files(&out));
}

/// A second run that cannot promote leaves the first run's files exactly as they were.
#[test]
fn failed_rerun_keeps_previous_outputs() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("out");
    prep(&out).run_from_reader(scenario_csv().as_bytes()).unwrap();
    let before = list_files(&out);
    let combined_before = std::fs::read(out.join("tweets_all.csv")).unwrap();

    std::fs::create_dir_all(out.join("batch").join("2017-08-28.csv")).unwrap();
    let rerun = raw_csv(&[("2017-08-25", 3), ("2017-08-28", 3)]);
    prep(&out).group_size(2).run_from_reader(rerun.as_bytes()).unwrap_err();

    assert_eq!(list_files(&out), before);
    assert_eq!(std::fs::read(out.join("tweets_all.csv")).unwrap(), combined_before);
}

/// Re-running into the same directory replaces the earlier run's per-day files
/// instead of leaving them next to the new ones; files the writer does not own stay.
#[test]
fn rerun_leaves_no_stale_batch_files() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("out");
    prep(&out).group_size(2).run_from_reader(raw_csv(&[("2017-08-26", 5)]).as_bytes()).unwrap();
    write_file(&out.join("batch"), "notes.txt", b"kept");

    let run = prep(&out).group_size(2).run_from_reader(raw_csv(&[("2017-08-27", 5)]).as_bytes()).unwrap();
    assert_eq!(run.outputs.batch.len(), 1);
    assert_eq!(
        list_files(&out),
        vec![
            "batch/2017-08-27.csv",
            "batch/notes.txt",
            "stream/tweets_stream.csv",
            "stream/tweets_stream.json",
            "tweets_all.csv",
        ]
    );

    // Switching compression also clears the uncompressed files.
    prep(&out)
        .group_size(2)
        .compression(OutputCompression::Zstd { level: 1 })
        .run_from_reader(raw_csv(&[("2017-08-27", 5)]).as_bytes())
        .unwrap();
    assert_eq!(
        list_files(&out),
        vec![
            "batch/2017-08-27.csv.zst",
            "batch/notes.txt",
            "stream/tweets_stream.csv.zst",
            "stream/tweets_stream.json.zst",
            "tweets_all.csv.zst",
        ]
    );
}
