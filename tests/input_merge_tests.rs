mod common;
use common::*;
use tempfile::TempDir;

fn two_logs(dir: &TempDir) -> (String, String) {
    let a = dir.path().join("a.log");
    let b = dir.path().join("b.log");
    write_file(&a, &combined_log(&[0, 20, 10, 30], "a"));
    write_file(&b, &combined_log(&[5, 15, 25], "b"));
    (a.display().to_string(), b.display().to_string())
}

#[test]
fn test_inputs_merged_to_stdout_in_time_order() {
    let dir = TempDir::new().unwrap();
    let (a, b) = two_logs(&dir);

    let (stdout, stderr, exit_code) = run_logweave(&["-i", &a, "-i", &b]);

    assert_eq!(exit_code, 0, "stderr: {}", stderr);
    assert_eq!(
        request_paths(&stdout),
        vec!["/a/0", "/b/0", "/a/2", "/b/1", "/a/1", "/b/2", "/a/3"]
    );
}

#[test]
fn test_lines_are_written_unchanged() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("only.log");
    let content = combined_log(&[3, 1, 2], "x");
    write_file(&path, &content);

    let (stdout, _stderr, exit_code) = run_logweave(&["-i", path.to_str().unwrap()]);

    assert_eq!(exit_code, 0);
    let mut expected: Vec<&str> = content.lines().collect();
    expected.sort_by_key(|line| line.split('[').nth(1).map(str::to_string));
    assert_eq!(stdout.lines().collect::<Vec<_>>(), expected);
}

#[test]
fn test_small_window_leaves_distant_disorder() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("late.log");
    // the record at offset 0 arrives three lines late
    write_file(&path, &combined_log(&[1, 2, 3, 0], "late"));

    let (stdout, _stderr, exit_code) = run_logweave(&["-i", path.to_str().unwrap(), "-w", "2"]);
    assert_eq!(exit_code, 0);
    assert_ne!(request_paths(&stdout)[0], "/late/3");

    let (stdout, _stderr, exit_code) = run_logweave(&["-i", path.to_str().unwrap(), "-w", "4"]);
    assert_eq!(exit_code, 0);
    assert_eq!(request_paths(&stdout)[0], "/late/3");
}

#[test]
fn test_malformed_lines_skipped_by_default() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mixed.log");
    let content = format!(
        "{}not an access log line\n{}",
        combined_log(&[0], "ok"),
        combined_log(&[1], "ok2")
    );
    write_file(&path, &content);

    let (stdout, _stderr, exit_code) = run_logweave(&["-i", path.to_str().unwrap()]);

    assert_eq!(exit_code, 0);
    assert_eq!(request_paths(&stdout), vec!["/ok/0", "/ok2/0"]);
}

#[test]
fn test_strict_mode_fails_on_malformed_line() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mixed.log");
    let content = format!("{}garbage\n{}", combined_log(&[0], "ok"), combined_log(&[1], "ok2"));
    write_file(&path, &content);

    let (_stdout, stderr, exit_code) = run_logweave(&["-i", path.to_str().unwrap(), "--strict"]);

    assert_eq!(exit_code, 1);
    assert!(stderr.contains("malformed record at line 2"), "stderr: {}", stderr);
}

#[test]
fn test_strict_mode_keeps_timeout_and_latin1_lines() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("odd.log");
    let stamped = combined_line(BASE_SECS + 1, "/unused");
    let stamp = stamped.split(&['[', ']'][..]).nth(1).unwrap();
    let timeout = format!(r#"10.0.0.9 - - [{}] "-" 408 0 "-" "-""#, stamp);

    let mut content = combined_log(&[0], "ok").into_bytes();
    content.extend_from_slice(timeout.as_bytes());
    content.push(b'\n');
    let latin1: Vec<u8> = combined_line(BASE_SECS + 2, "/caf@")
        .bytes()
        .map(|b| if b == b'@' { 0xE9 } else { b })
        .collect();
    content.extend_from_slice(&latin1);
    content.push(b'\n');
    std::fs::write(&path, content).unwrap();

    let (stdout, stderr, exit_code) =
        run_logweave(&["-i", path.to_str().unwrap(), "--strict", "--convert-combined"]);

    assert_eq!(exit_code, 0, "stderr: {}", stderr);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1], timeout);
    assert!(lines[2].contains("/caf\u{FFFD}"), "{}", lines[2]);
}

#[test]
fn test_date_range_filter() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("days.log");
    // 24th, 25th and 26th of April 2010
    write_file(&path, &combined_log(&[0, 86_400, 2 * 86_400], "d"));

    let (stdout, _stderr, exit_code) = run_logweave(&[
        "-i",
        path.to_str().unwrap(),
        "-s",
        "2010-04-25",
        "-e",
        "2010-04-26",
    ]);

    assert_eq!(exit_code, 0);
    assert_eq!(request_paths(&stdout), vec!["/d/1"]);
}

#[test]
fn test_dest_template_splits_by_day() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("days.log");
    write_file(&path, &combined_log(&[0, 60, 86_400], "d"));

    let (stdout, stderr, exit_code) = run_logweave_in(
        Some(dir.path()),
        &["-i", "days.log", "--dest", "out/%Y-%m-%d.log", "-q"],
    );

    assert_eq!(exit_code, 0, "stderr: {}", stderr);
    assert!(stdout.is_empty());
    let first = std::fs::read_to_string(dir.path().join("out/2010-04-24.log")).unwrap();
    let second = std::fs::read_to_string(dir.path().join("out/2010-04-25.log")).unwrap();
    assert_eq!(request_paths(&first), vec!["/d/0", "/d/1"]);
    assert_eq!(request_paths(&second), vec!["/d/2"]);
}

#[test]
fn test_convert_s3_to_combined() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bucket.log");
    write_file(
        &path,
        "79a59df900b949e55d96a1e698fbacedfd6e09d98eacf8f8d5218e7cd47ef2be mybucket [06/Feb/2019:00:00:38 +0000] 192.0.2.3 79a59df900b949e55d96a1e698fbacedfd6e09d98eacf8f8d5218e7cd47ef2be 3E57427F3EXAMPLE REST.GET.VERSIONING - \"GET /mybucket?versioning HTTP/1.1\" 200 - 113 - 7 - \"-\" \"S3Console/0.4\" -\n",
    );

    let (stdout, stderr, exit_code) = run_logweave(&[
        "-i",
        path.to_str().unwrap(),
        "-f",
        "s3",
        "--convert-combined",
    ]);

    assert_eq!(exit_code, 0, "stderr: {}", stderr);
    assert_eq!(
        stdout.trim_end(),
        r#"192.0.2.3 - - [06/Feb/2019:00:00:38 +0000] "GET /mybucket?versioning HTTP/1.1" 200 113 "-" "S3Console/0.4""#
    );
}

#[test]
fn test_stats_json() {
    let dir = TempDir::new().unwrap();
    let (a, b) = two_logs(&dir);

    let (_stdout, stderr, exit_code) =
        run_logweave(&["-i", &a, "-i", &b, "--stats", "--stats-format", "json"]);

    assert_eq!(exit_code, 0);
    let json_line = stderr
        .lines()
        .find(|line| line.starts_with('{'))
        .expect("stats JSON on stderr");
    let stats: serde_json::Value = serde_json::from_str(json_line).unwrap();
    assert_eq!(stats["lines_read"], 7);
    assert_eq!(stats["records_emitted"], 7);
    assert_eq!(stats["files_opened"], 2);
}

#[test]
fn test_stats_table() {
    let dir = TempDir::new().unwrap();
    let (a, _b) = two_logs(&dir);

    let (_stdout, stderr, exit_code) = run_logweave(&["-i", &a, "--stats"]);

    assert_eq!(exit_code, 0);
    assert!(
        stderr.contains("Lines processed: 4 total, 4 output, 0 malformed"),
        "stderr: {}",
        stderr
    );
}

#[test]
fn test_missing_input_file() {
    let (_stdout, stderr, exit_code) = run_logweave(&["-i", "/nonexistent/access.log"]);
    assert_eq!(exit_code, 1);
    assert!(stderr.contains("Input file not found"), "stderr: {}", stderr);
}

#[test]
fn test_usage_errors_exit_with_2() {
    let (_stdout, _stderr, exit_code) = run_logweave(&[]);
    assert_eq!(exit_code, 2);

    let (_stdout, _stderr, exit_code) = run_logweave(&["-i", "a.log", "-w", "0"]);
    assert_eq!(exit_code, 2);

    let (_stdout, stderr, exit_code) =
        run_logweave(&["-i", "a.log", "-s", "2010-05-01", "-e", "2010-04-01"]);
    assert_eq!(exit_code, 2);
    assert!(stderr.contains("must be before"), "stderr: {}", stderr);
}
