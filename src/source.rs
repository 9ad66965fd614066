use std::io::{self, BufRead};
use std::iter::FusedIterator;
use std::path::Path;

use crate::decompression::DecompressionReader;
use crate::dialect::Dialect;
use crate::error::{MergeError, MergeResult, ParseError};
use crate::platform::log_verbose;
use crate::record::Record;
use crate::resequencer::Resequencer;
use crate::stats::{stats_add_file_opened, stats_add_line_read, stats_add_malformed};

/// Default window for library callers; configured jobs use a larger one
pub const DEFAULT_WINDOW_SIZE: usize = 1000;

/// Turns one raw line into a record. `sequence` is the 1-based position of
/// the line in its source.
pub trait RecordParser {
    type Payload;

    fn parse_record(&self, line: &str, sequence: u64) -> Result<Record<Self::Payload>, ParseError>;
}

impl<F, P> RecordParser for F
where
    F: Fn(&str, u64) -> Result<Record<P>, ParseError>,
{
    type Payload = P;

    fn parse_record(&self, line: &str, sequence: u64) -> Result<Record<P>, ParseError> {
        self(line, sequence)
    }
}

/// Shared knobs for adapter and resequencer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceOptions {
    pub window_size: usize,
    /// Drop unparseable lines instead of failing the stream
    pub ignore_invalid: bool,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            ignore_invalid: true,
        }
    }
}

/// Parses raw lines into records, numbering every line it reads, including
/// the ones it later drops.
#[derive(Debug)]
pub struct SourceAdapter<L, F> {
    lines: L,
    parser: F,
    ignore_invalid: bool,
    sequence: u64,
    done: bool,
}

impl<L, F> SourceAdapter<L, F>
where
    L: Iterator<Item = io::Result<String>>,
    F: RecordParser,
{
    pub fn new(lines: L, parser: F, ignore_invalid: bool) -> Self {
        Self {
            lines,
            parser,
            ignore_invalid,
            sequence: 0,
            done: false,
        }
    }

    /// Number of raw lines read so far
    pub fn lines_read(&self) -> u64 {
        self.sequence
    }
}

impl<L, F> Iterator for SourceAdapter<L, F>
where
    L: Iterator<Item = io::Result<String>>,
    F: RecordParser,
{
    type Item = MergeResult<Record<F::Payload>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let line = match self.lines.next() {
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(MergeError::Io(e)));
                }
                None => {
                    self.done = true;
                    return None;
                }
            };
            self.sequence += 1;
            stats_add_line_read();

            match self.parser.parse_record(&line, self.sequence) {
                Ok(record) => return Some(Ok(record)),
                Err(source) if self.ignore_invalid => {
                    stats_add_malformed();
                    log_verbose(2, &format!("Skipping line {}: {}", self.sequence, source));
                }
                Err(source) => {
                    self.done = true;
                    return Some(Err(MergeError::MalformedRecord {
                        sequence: self.sequence,
                        line,
                        source,
                    }));
                }
            }
        }
    }
}

impl<L, F> FusedIterator for SourceAdapter<L, F>
where
    L: Iterator<Item = io::Result<String>>,
    F: RecordParser,
{
}

/// Line iterator that replaces invalid UTF-8 with U+FFFD instead of failing.
/// Strips `\n` and `\r\n` like [`BufRead::lines`].
#[derive(Debug)]
pub struct LossyLines<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: BufRead> LossyLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
        }
    }
}

impl<R: BufRead> Iterator for LossyLines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                if self.buf.last() == Some(&b'\n') {
                    self.buf.pop();
                    if self.buf.last() == Some(&b'\r') {
                        self.buf.pop();
                    }
                }
                Some(Ok(String::from_utf8_lossy(&self.buf).into_owned()))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// One raw line source bound to its own adapter and resequencer, yielding
/// an approximately ordered record stream ready for merging.
pub struct OrderedSource<L, F>
where
    L: Iterator<Item = io::Result<String>>,
    F: RecordParser,
{
    inner: Resequencer<SourceAdapter<L, F>, Record<F::Payload>>,
}

/// A log file opened through the decompression layer
pub type FileSource = OrderedSource<LossyLines<DecompressionReader>, Dialect>;

impl<L, F> OrderedSource<L, F>
where
    L: Iterator<Item = io::Result<String>>,
    F: RecordParser,
{
    /// Builds the pipeline; this already reads up to `window_size` lines
    pub fn new(lines: L, parser: F, options: &SourceOptions) -> MergeResult<Self> {
        let adapter = SourceAdapter::new(lines, parser, options.ignore_invalid);
        let inner = Resequencer::new(adapter, options.window_size)?;
        Ok(Self { inner })
    }

    pub fn window_size(&self) -> usize {
        self.inner.window_size()
    }
}

impl OrderedSource<LossyLines<DecompressionReader>, Dialect> {
    pub fn open(path: impl AsRef<Path>, dialect: Dialect, options: &SourceOptions) -> MergeResult<FileSource> {
        Self::open_with_helper(path, dialect, options, None)
    }

    pub fn open_with_helper(
        path: impl AsRef<Path>,
        dialect: Dialect,
        options: &SourceOptions,
        gzip_helper: Option<&Path>,
    ) -> MergeResult<FileSource> {
        let path = path.as_ref();
        let reader = DecompressionReader::open(path, gzip_helper)?;
        stats_add_file_opened();
        log_verbose(1, &format!("Reading {} as {}", path.display(), dialect));
        Self::new(LossyLines::new(reader), dialect, options)
    }
}

impl<L, F> Iterator for OrderedSource<L, F>
where
    L: Iterator<Item = io::Result<String>>,
    F: RecordParser,
{
    type Item = MergeResult<Record<F::Payload>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<L, F> FusedIterator for OrderedSource<L, F>
where
    L: Iterator<Item = io::Result<String>>,
    F: RecordParser,
{
}
