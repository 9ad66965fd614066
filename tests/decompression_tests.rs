mod common;
use common::*;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

#[test]
fn test_gzip_and_plain_inputs_merge() {
    let dir = TempDir::new().unwrap();
    let gz = dir.path().join("old.log.gz");
    let plain = dir.path().join("new.log");
    write_gzip(&gz, &combined_log(&[0, 2], "gz"));
    write_file(&plain, &combined_log(&[1, 3], "plain"));

    let (stdout, stderr, exit_code) =
        run_logweave(&["-i", gz.to_str().unwrap(), "-i", plain.to_str().unwrap()]);

    assert_eq!(exit_code, 0, "stderr: {}", stderr);
    assert_eq!(
        request_paths(&stdout),
        vec!["/gz/0", "/plain/0", "/gz/1", "/plain/1"]
    );
}

#[test]
fn test_zstd_input() {
    use zstd::stream::write::Encoder;

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("access.log.zst");
    let mut encoder = Encoder::new(File::create(&path).unwrap(), 0).unwrap();
    encoder
        .write_all(combined_log(&[1, 0], "z").as_bytes())
        .unwrap();
    encoder.finish().unwrap();

    let (stdout, stderr, exit_code) = run_logweave(&["-i", path.to_str().unwrap()]);

    assert_eq!(exit_code, 0, "stderr: {}", stderr);
    assert_eq!(request_paths(&stdout), vec!["/z/1", "/z/0"]);
}

#[test]
fn test_gzip_detected_without_extension() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("access.log.1");
    write_gzip(&path, &combined_log(&[0], "rotated"));

    let (stdout, _stderr, exit_code) = run_logweave(&["-i", path.to_str().unwrap()]);

    assert_eq!(exit_code, 0);
    assert_eq!(request_paths(&stdout), vec!["/rotated/0"]);
}

#[test]
fn test_zip_archive_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("logs.zip");
    std::fs::write(&path, b"PK\x03\x04rest of a zip archive").unwrap();

    let (_stdout, stderr, exit_code) = run_logweave(&["-i", path.to_str().unwrap()]);

    assert_eq!(exit_code, 1);
    assert!(stderr.contains("Cannot read log"), "stderr: {}", stderr);
}

#[test]
fn test_gzip_helper_process() {
    let helper = Path::new("/bin/gzip");
    if !helper.exists() {
        return;
    }
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("access.log.gz");
    write_gzip(&path, &combined_log(&[2, 0, 1], "h"));

    let (stdout, stderr, exit_code) = run_logweave(&[
        "-i",
        path.to_str().unwrap(),
        "--gzip-helper",
        helper.to_str().unwrap(),
    ]);

    assert_eq!(exit_code, 0, "stderr: {}", stderr);
    assert_eq!(request_paths(&stdout), vec!["/h/1", "/h/2", "/h/0"]);
}
