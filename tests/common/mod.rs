// Shared helpers for the integration tests
#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

/// 2010-04-24T10:00:00Z
pub const BASE_SECS: i64 = 1_272_103_200;

pub fn logweave_binary() -> &'static str {
    env!("CARGO_BIN_EXE_logweave")
}

/// Run logweave and collect (stdout, stderr, exit code)
pub fn run_logweave(args: &[&str]) -> (String, String, i32) {
    run_logweave_in(None, args)
}

/// Run logweave with `dir` as the working directory
pub fn run_logweave_in(dir: Option<&Path>, args: &[&str]) -> (String, String, i32) {
    let mut cmd = Command::new(logweave_binary());
    cmd.args(args)
        .arg("--no-emoji")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }
    let output = cmd.output().expect("Failed to execute logweave");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}

/// A combined-format line stamped `secs` after the epoch, in UTC
pub fn combined_line(secs: i64, path: &str) -> String {
    let stamp = Utc
        .timestamp_opt(secs, 0)
        .unwrap()
        .format("%d/%b/%Y:%H:%M:%S +0000");
    format!(
        r#"10.0.0.1 - - [{}] "GET {} HTTP/1.1" 200 512 "-" "curl/7.19""#,
        stamp, path
    )
}

/// Lines for each of `offsets` (seconds after BASE_SECS), tagged with the path
pub fn combined_log(offsets: &[i64], tag: &str) -> String {
    offsets
        .iter()
        .enumerate()
        .map(|(i, offset)| format!("{}\n", combined_line(BASE_SECS + offset, &format!("/{}/{}", tag, i))))
        .collect()
}

pub fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

pub fn write_gzip(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let mut encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
    encoder.write_all(content.as_bytes()).unwrap();
    encoder.finish().unwrap();
}

/// Request paths of the combined lines in `output`, in order
pub fn request_paths(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.split('"').nth(1))
        .filter_map(|request| request.split(' ').nth(1))
        .map(str::to_string)
        .collect()
}
