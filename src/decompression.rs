use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Chain, Cursor, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

type ChainReader = Chain<Cursor<Vec<u8>>, File>;
type GzipReader = BufReader<MultiGzDecoder<ChainReader>>;
type ZstdReader = BufReader<zstd::Decoder<'static, BufReader<ChainReader>>>;
type PlainReader = BufReader<ChainReader>;

const GZIP_MAGIC: [u8; 3] = [0x1F, 0x8B, 0x08];
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Streaming reader over a log file, decompressing as it goes.
/// gzip (`1F 8B 08`, multi-member) and zstd (`28 B5 2F FD`) are detected by
/// magic bytes; anything else is read as plain text.
pub enum DecompressionReader {
    Gzip(GzipReader),
    Zstd(ZstdReader),
    Plain(PlainReader),
    /// gzip decoded by an external `<helper> -d -c` process
    Helper(HelperProcess),
}

impl std::fmt::Debug for DecompressionReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecompressionReader::Gzip(_) => write!(f, "DecompressionReader::Gzip"),
            DecompressionReader::Zstd(_) => write!(f, "DecompressionReader::Zstd"),
            DecompressionReader::Plain(_) => write!(f, "DecompressionReader::Plain"),
            DecompressionReader::Helper(p) => write!(f, "DecompressionReader::Helper({})", p.program.display()),
        }
    }
}

impl BufRead for DecompressionReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self {
            DecompressionReader::Gzip(reader) => reader.fill_buf(),
            DecompressionReader::Zstd(reader) => reader.fill_buf(),
            DecompressionReader::Plain(reader) => reader.fill_buf(),
            DecompressionReader::Helper(reader) => reader.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            DecompressionReader::Gzip(reader) => reader.consume(amt),
            DecompressionReader::Zstd(reader) => reader.consume(amt),
            DecompressionReader::Plain(reader) => reader.consume(amt),
            DecompressionReader::Helper(reader) => reader.consume(amt),
        }
    }
}

impl Read for DecompressionReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            DecompressionReader::Gzip(reader) => reader.read(buf),
            DecompressionReader::Zstd(reader) => reader.read(buf),
            DecompressionReader::Plain(reader) => reader.read(buf),
            DecompressionReader::Helper(reader) => reader.read(buf),
        }
    }
}

fn detect_compression_file(mut file: File) -> io::Result<DecompressionReader> {
    let mut head = [0u8; 4];
    let n = read_head(&mut file, &mut head)?;

    // put the sniffed bytes back in front
    let chained = Cursor::new(head[..n].to_vec()).chain(file);

    if n >= 3 && head[..3] == GZIP_MAGIC {
        Ok(DecompressionReader::Gzip(BufReader::new(MultiGzDecoder::new(chained))))
    } else if n >= 4 && head == ZSTD_MAGIC {
        let decoder = zstd::Decoder::new(chained)?;
        Ok(DecompressionReader::Zstd(BufReader::new(decoder)))
    } else {
        Ok(DecompressionReader::Plain(BufReader::new(chained)))
    }
}

/// Fill `head` as far as the file allows; a single `read` may return short
fn read_head(file: &mut File, head: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < head.len() {
        match file.read(&mut head[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

fn is_gzip_file(path: &Path) -> io::Result<bool> {
    let mut head = [0u8; 3];
    let n = read_head(&mut File::open(path)?, &mut head)?;
    Ok(n == 3 && head == GZIP_MAGIC)
}

impl DecompressionReader {
    /// Open `path`, detecting the compression from its first bytes
    pub fn new<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Self::open(path, None)
    }

    /// Like [`DecompressionReader::new`], but gzip files are handed to
    /// `gzip_helper` when one is given.
    pub fn open<P: AsRef<Path>>(path: P, gzip_helper: Option<&Path>) -> io::Result<Self> {
        let path_ref = path.as_ref();

        if let Some(extension) = path_ref.extension().and_then(|ext| ext.to_str()) {
            if extension.eq_ignore_ascii_case("zip") {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!(
                        "ZIP file decompression is not supported. Only gzip and zstd files are supported for streaming decompression. Extract the ZIP file first: unzip {}",
                        path_ref.display()
                    ),
                ));
            }
        }

        if let Some(helper) = gzip_helper {
            if is_gzip_file(path_ref)? {
                return HelperProcess::spawn(helper, path_ref).map(DecompressionReader::Helper);
            }
        }

        let file = File::open(path_ref)?;
        detect_compression_file(file)
    }
}

/// Child process decompressing a file to its stdout. The child is killed
/// and reaped when the reader is dropped, so abandoning a read early never
/// leaves it running.
pub struct HelperProcess {
    program: PathBuf,
    child: Child,
    stdout: BufReader<ChildStdout>,
    status_checked: bool,
}

impl HelperProcess {
    pub fn spawn(program: &Path, file: &Path) -> io::Result<Self> {
        let mut child = Command::new(program)
            .arg("-d")
            .arg("-c")
            .arg(file)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                io::Error::new(
                    e.kind(),
                    format!("failed to start gzip helper '{}': {}", program.display(), e),
                )
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("gzip helper has no stdout pipe"))?;

        Ok(Self {
            program: program.to_path_buf(),
            child,
            stdout: BufReader::new(stdout),
            status_checked: false,
        })
    }

    /// At end of output, turn a failed exit into an error instead of a
    /// silently truncated log.
    fn check_exit(&mut self) -> io::Result<()> {
        if self.status_checked {
            return Ok(());
        }
        self.status_checked = true;
        let status = self.child.wait()?;
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::other(format!(
                "gzip helper '{}' exited with {}",
                self.program.display(),
                status
            )))
        }
    }
}

impl BufRead for HelperProcess {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        let at_end = self.stdout.fill_buf()?.is_empty();
        if at_end {
            self.check_exit()?;
        }
        self.stdout.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.stdout.consume(amt)
    }
}

impl Read for HelperProcess {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.stdout.read(buf)?;
        if n == 0 && !buf.is_empty() {
            self.check_exit()?;
        }
        Ok(n)
    }
}

impl Drop for HelperProcess {
    fn drop(&mut self) {
        if !self.status_checked {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn gzip_file(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(content.as_bytes()).unwrap();
        temp_file.write_all(&encoder.finish().unwrap()).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    #[test]
    fn test_plain_file_passthrough() -> io::Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        writeln!(temp_file, "test line 1")?;
        writeln!(temp_file, "test line 2")?;
        temp_file.flush()?;

        let reader = DecompressionReader::new(temp_file.path())?;
        assert!(matches!(reader, DecompressionReader::Plain(_)));
        let lines: Vec<String> = reader.lines().collect::<io::Result<_>>()?;
        assert_eq!(lines, vec!["test line 1", "test line 2"]);
        Ok(())
    }

    #[test]
    fn test_gzip_detected_by_magic_bytes() -> io::Result<()> {
        let temp_file = gzip_file("alpha\nbeta\n");
        let mut reader = DecompressionReader::new(temp_file.path())?;
        assert!(matches!(reader, DecompressionReader::Gzip(_)));
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        assert_eq!(content, "alpha\nbeta\n");
        Ok(())
    }

    #[test]
    fn test_multi_member_gzip() -> io::Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        for part in ["first\n", "second\n"] {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
            encoder.write_all(part.as_bytes())?;
            temp_file.write_all(&encoder.finish()?)?;
        }
        temp_file.flush()?;

        let mut content = String::new();
        DecompressionReader::new(temp_file.path())?.read_to_string(&mut content)?;
        assert_eq!(content, "first\nsecond\n");
        Ok(())
    }

    #[test]
    fn test_zstd_detected_by_magic_bytes() -> io::Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        let compressed = zstd::encode_all(&b"line one\nline two\n"[..], 0)?;
        temp_file.write_all(&compressed)?;
        temp_file.flush()?;

        let mut reader = DecompressionReader::new(temp_file.path())?;
        assert!(matches!(reader, DecompressionReader::Zstd(_)));
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        assert_eq!(content, "line one\nline two\n");
        Ok(())
    }

    #[test]
    fn test_short_and_empty_files_are_plain() -> io::Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        temp_file.write_all(&[0x1F])?;
        temp_file.flush()?;
        assert!(matches!(
            DecompressionReader::new(temp_file.path())?,
            DecompressionReader::Plain(_)
        ));

        let empty = NamedTempFile::new()?;
        let mut content = String::new();
        DecompressionReader::new(empty.path())?.read_to_string(&mut content)?;
        assert!(content.is_empty());
        Ok(())
    }

    #[test]
    fn test_zip_file_rejection() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("logs.ZIP");
        std::fs::write(&zip_path, b"fake zip content").unwrap();

        let error_msg = DecompressionReader::new(&zip_path).unwrap_err().to_string();
        assert!(error_msg.contains("ZIP file decompression is not supported"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = DecompressionReader::new("/nonexistent/access.log").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_missing_helper_fails_to_open() {
        let temp_file = gzip_file("x\n");
        let result = DecompressionReader::open(
            temp_file.path(),
            Some(Path::new("/nonexistent/gzip-helper")),
        );
        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_helper_process_decodes_gzip() -> io::Result<()> {
        let gzip = Path::new("/bin/gzip");
        if !gzip.exists() {
            eprintln!("Skipping helper test: /bin/gzip not available");
            return Ok(());
        }
        let temp_file = gzip_file("from helper\n");
        let mut reader = DecompressionReader::open(temp_file.path(), Some(gzip))?;
        assert!(matches!(reader, DecompressionReader::Helper(_)));
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        assert_eq!(content, "from helper\n");
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_helper_not_used_for_plain_files() -> io::Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        writeln!(temp_file, "plain")?;
        temp_file.flush()?;
        let reader = DecompressionReader::open(temp_file.path(), Some(Path::new("/bin/false")))?;
        assert!(matches!(reader, DecompressionReader::Plain(_)));
        Ok(())
    }
}
