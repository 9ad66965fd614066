#![no_main]

use logweave::{Dialect, LogFields};
use libfuzzer_sys::fuzz_target;

const MAX_LINE_LEN: usize = 4096;
const DIALECTS: [Dialect; 3] = [Dialect::Combined, Dialect::Apache, Dialect::S3];

fuzz_target!(|data: &[u8]| {
    let Some((&selector, rest)) = data.split_first() else {
        return;
    };
    let rest = &rest[..rest.len().min(MAX_LINE_LEN)];
    let line = match std::str::from_utf8(rest) {
        Ok(s) => s,
        Err(_) => return,
    };

    let dialect = DIALECTS[selector as usize % DIALECTS.len()];
    let Ok(parsed) = dialect.parse_line(line) else {
        return;
    };

    // anything that parsed must re-render and keep its own text
    assert_eq!(parsed.as_line(), line.trim_end_matches(&['\r', '\n'][..]));
    let converted = parsed.as_combined_line();
    if dialect != Dialect::S3 {
        assert!(Dialect::Combined.parse_line(&converted).is_ok(), "{}", converted);
    }
    for field in ["ip", "req", "code", "size", "ua", "year", "month", "day"] {
        let _ = parsed.field(field);
    }
});
