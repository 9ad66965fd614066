use anyhow::Result;
use crossbeam_channel::Sender;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::process;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU8, Ordering};
use std::thread;

#[cfg(unix)]
use signal_hook::{
    consts::{SIGINT, SIGPIPE, SIGTERM, SIGUSR1},
    iterator::Signals,
};

#[cfg(windows)]
use signal_hook::{consts::SIGINT, flag};

/// Standard Unix exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    InvalidUsage = 2,
    SignalInt = 130,  // 128 + SIGINT (2)
    SignalPipe = 141, // 128 + SIGPIPE (13)
    SignalTerm = 143, // 128 + SIGTERM (15)
}

impl ExitCode {
    pub fn exit(self) -> ! {
        process::exit(self as i32)
    }

    /// Conventional `128 + n` code for a signal we handle
    pub fn for_signal(signal: i32) -> Option<Self> {
        match signal {
            2 => Some(ExitCode::SignalInt),
            13 => Some(ExitCode::SignalPipe),
            15 => Some(ExitCode::SignalTerm),
            _ => None,
        }
    }
}

/// Set by the signal thread; the merge loop checks it between records
pub static SHOULD_TERMINATE: AtomicBool = AtomicBool::new(false);
/// First shutdown signal received; 0 while none has arrived
static TERMINATING_SIGNAL: AtomicI32 = AtomicI32::new(0);

static NO_EMOJI: AtomicBool = AtomicBool::new(false);
static VERBOSITY: AtomicU8 = AtomicU8::new(0);

/// Control messages posted by the signal thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ctrl {
    Shutdown { immediate: bool },
    PrintStats,
}

pub struct SignalHandler {
    _handle: thread::JoinHandle<()>,
}

impl SignalHandler {
    pub fn new(ctrl_sender: Sender<Ctrl>) -> Result<Self> {
        #[cfg(unix)]
        {
            let mut signals = Signals::new([SIGINT, SIGPIPE, SIGTERM, SIGUSR1])?;

            let handle = thread::spawn(move || {
                let mut shutdown_count = 0;
                for sig in signals.forever() {
                    match sig {
                        SIGINT | SIGTERM => {
                            record_shutdown_signal(sig);
                            shutdown_count += 1;
                            let immediate = shutdown_count > 1;
                            let _ = ctrl_sender.send(Ctrl::Shutdown { immediate });
                            if immediate {
                                ExitCode::for_signal(sig).unwrap_or(ExitCode::GeneralError).exit();
                            }
                        }
                        SIGPIPE => {
                            record_shutdown_signal(sig);
                            ExitCode::SignalPipe.exit();
                        }
                        SIGUSR1 => {
                            let _ = ctrl_sender.send(Ctrl::PrintStats);
                        }
                        _ => {}
                    }
                }
            });

            Ok(SignalHandler { _handle: handle })
        }

        #[cfg(windows)]
        {
            let term_flag = std::sync::Arc::new(AtomicBool::new(false));
            flag::register(SIGINT, std::sync::Arc::clone(&term_flag))?;

            let handle = thread::spawn(move || {
                let mut shutdown_count = 0;
                loop {
                    thread::sleep(std::time::Duration::from_millis(100));
                    if term_flag.swap(false, Ordering::Relaxed) {
                        record_shutdown_signal(SIGINT);
                        shutdown_count += 1;
                        let immediate = shutdown_count > 1;
                        let _ = ctrl_sender.send(Ctrl::Shutdown { immediate });
                        if immediate {
                            ExitCode::SignalInt.exit();
                        }
                    }
                }
            });

            Ok(SignalHandler { _handle: handle })
        }
    }

    pub fn should_terminate() -> bool {
        SHOULD_TERMINATE.load(Ordering::Relaxed)
    }
}

fn record_shutdown_signal(signal: i32) {
    SHOULD_TERMINATE.store(true, Ordering::Relaxed);
    let _ = TERMINATING_SIGNAL.compare_exchange(0, signal, Ordering::Relaxed, Ordering::Relaxed);
}

/// Exit code owed to the signal that stopped the run, if any
pub fn signal_exit_code() -> Option<ExitCode> {
    ExitCode::for_signal(TERMINATING_SIGNAL.load(Ordering::Relaxed))
}

pub fn set_no_emoji(no_emoji: bool) {
    NO_EMOJI.store(no_emoji, Ordering::Relaxed);
}

pub fn set_verbosity(level: u8) {
    VERBOSITY.store(level, Ordering::Relaxed);
}

pub fn verbosity() -> u8 {
    VERBOSITY.load(Ordering::Relaxed)
}

pub fn format_error_message_auto(message: &str) -> String {
    if NO_EMOJI.load(Ordering::Relaxed) {
        format!("logweave: {}", message)
    } else {
        format!("⚠️  {}", message)
    }
}

pub fn format_info_message_auto(message: &str) -> String {
    if NO_EMOJI.load(Ordering::Relaxed) {
        format!("logweave: {}", message)
    } else {
        format!("🔹 {}", message)
    }
}

/// Print an informational line to stderr when running at `level` or above
pub fn log_verbose(level: u8, message: &str) {
    if verbosity() >= level {
        SafeStderr::new().writeln(&format_info_message_auto(message));
    }
}

pub fn log_warning(message: &str) {
    SafeStderr::new().writeln(&format_error_message_auto(message));
}

/// Stdout wrapper that turns a broken pipe into a quiet exit
pub struct SafeStdout {
    stdout: BufWriter<io::Stdout>,
}

impl Default for SafeStdout {
    fn default() -> Self {
        Self::new()
    }
}

impl SafeStdout {
    pub fn new() -> Self {
        Self {
            stdout: BufWriter::new(io::stdout()),
        }
    }

    pub fn writeln(&mut self, data: &str) -> Result<()> {
        match writeln!(self.stdout, "{}", data) {
            Ok(()) => Ok(()),
            Err(e) if is_broken_pipe(&e) => ExitCode::SignalPipe.exit(),
            Err(e) => Err(anyhow::anyhow!("Failed to write to stdout: {}", e)),
        }
    }

    pub fn flush(&mut self) -> Result<()> {
        match self.stdout.flush() {
            Ok(()) => Ok(()),
            Err(e) if is_broken_pipe(&e) => ExitCode::SignalPipe.exit(),
            Err(e) => Err(anyhow::anyhow!("Failed to flush stdout: {}", e)),
        }
    }
}

fn is_broken_pipe(e: &io::Error) -> bool {
    #[cfg(unix)]
    {
        e.kind() == io::ErrorKind::BrokenPipe
    }
    #[cfg(windows)]
    {
        e.kind() == io::ErrorKind::BrokenPipe
            || e.raw_os_error() == Some(232) // ERROR_NO_DATA
            || e.raw_os_error() == Some(109) // ERROR_BROKEN_PIPE
    }
}

pub struct SafeStderr {
    stderr: io::Stderr,
}

impl Default for SafeStderr {
    fn default() -> Self {
        Self::new()
    }
}

impl SafeStderr {
    pub fn new() -> Self {
        Self {
            stderr: io::stderr(),
        }
    }

    /// Write a line to stderr; if even that fails there is nobody left to tell
    pub fn writeln(&mut self, data: &str) {
        if writeln!(self.stderr, "{}", data).is_err() {
            ExitCode::GeneralError.exit();
        }
    }

    /// Carriage-return line used by the progress counter
    pub fn write_progress(&mut self, data: &str) {
        let _ = write!(self.stderr, "{}\r", data);
        let _ = self.stderr.flush();
    }
}

/// Error text for a failed output file creation, with a hint where one helps
pub fn create_helpful_error_message(path: &Path, error: &io::Error) -> String {
    let base_msg = format!("Cannot create output file '{}': {}", path.display(), error);

    let suggestion = match error.kind() {
        io::ErrorKind::PermissionDenied => "Suggestion: Check file permissions or choose a writable location",
        io::ErrorKind::NotFound => "Suggestion: Parent directory does not exist, create it first",
        _ if path.is_dir() => "Suggestion: Path points to a directory, specify a filename instead",
        _ => return base_msg,
    };

    format!("{}\n{}", base_msg, suggestion)
}

/// Buffered output file that reports its path on failure
pub struct SafeFileOut {
    file: BufWriter<File>,
    path: String,
}

impl SafeFileOut {
    /// Create the file, truncating it if it exists
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        match File::create(path_ref) {
            Ok(file) => Ok(Self {
                file: BufWriter::new(file),
                path: path_ref.to_string_lossy().to_string(),
            }),
            Err(e) => Err(anyhow::anyhow!("{}", create_helpful_error_message(path_ref, &e))),
        }
    }

    pub fn writeln(&mut self, data: &str) -> Result<()> {
        writeln!(self.file, "{}", data)
            .map_err(|e| anyhow::anyhow!("Output file write failed '{}': {}", self.path, e))
    }

    pub fn flush(&mut self) -> Result<()> {
        self.file
            .flush()
            .map_err(|e| anyhow::anyhow!("Output file flush failed '{}': {}", self.path, e))
    }
}
