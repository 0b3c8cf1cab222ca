#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

/// Header of the raw Harvey export: a leading unnamed index column, then ID, Time, Tweet and counters.
pub const HARVEY_HEADER: &str = ",ID,Time,Tweet,Retweets,Likes,Replies";

/// One well-formed raw row. The body contains a comma to exercise quoting.
pub fn raw_row(i: usize, time: &str) -> String {
    format!(
        "{i},{},{time},\"Tweet {i}, about the storm\",{},{},{}",
        900_000 + i,
        i % 7,
        i % 13,
        i % 3
    )
}

/// Raw CSV with `n` rows per `(date, n)` entry, timestamps spread over the day.
pub fn raw_csv(days: &[(&str, usize)]) -> String {
    let mut out = String::from(HARVEY_HEADER);
    out.push('\n');
    let mut i = 0usize;
    for (date, n) in days {
        for k in 0..*n {
            let time = format!("{date} {:02}:{:02}:{:02}", k % 24, k % 60, (k * 7) % 60);
            out.push_str(&raw_row(i, &time));
            out.push('\n');
            i += 1;
        }
    }
    out
}

/// Write `content` to `<dir>/<name>` and return the path.
pub fn write_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let p = dir.join(name);
    fs::write(&p, content).unwrap();
    p
}

/// Parse CSV text with a header into one map per row.
pub fn parse_csv_rows(text: &str) -> Vec<BTreeMap<String, String>> {
    let mut rdr = csv::Reader::from_reader(text.as_bytes());
    let headers = rdr.headers().unwrap().clone();
    rdr.records()
        .map(|r| {
            let r = r.unwrap();
            headers.iter().zip(r.iter()).map(|(h, v)| (h.to_string(), v.to_string())).collect()
        })
        .collect()
}

pub fn read_csv_rows(path: &Path) -> Vec<BTreeMap<String, String>> {
    parse_csv_rows(&fs::read_to_string(path).unwrap())
}

pub fn csv_header(path: &Path) -> Vec<String> {
    let mut rdr = csv::Reader::from_path(path).unwrap();
    rdr.headers().unwrap().iter().map(str::to_string).collect()
}

pub fn read_json_array(path: &Path) -> Vec<serde_json::Value> {
    let r = BufReader::new(File::open(path).unwrap());
    serde_json::from_reader(r).unwrap()
}

/// Decompress a `.zst` file into a string.
pub fn decompress_zst(path: &Path) -> String {
    let f = File::open(path).unwrap();
    let mut dec = zstd::stream::read::Decoder::new(f).unwrap();
    let mut s = String::new();
    dec.read_to_string(&mut s).unwrap();
    s
}

/// All regular files under `dir`, relative, sorted.
pub fn list_files(dir: &Path) -> Vec<String> {
    fn walk(base: &Path, dir: &Path, out: &mut Vec<String>) {
        let Ok(rd) = fs::read_dir(dir) else { return };
        for e in rd.flatten() {
            let p = e.path();
            if p.is_dir() {
                walk(base, &p, out);
            } else {
                out.push(p.strip_prefix(base).unwrap().to_string_lossy().replace('\\', "/"));
            }
        }
    }
    let mut out = Vec::new();
    walk(dir, dir, &mut out);
    out.sort();
    out
}
