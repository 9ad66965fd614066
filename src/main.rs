use anyhow::{anyhow, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{CommandFactory, Parser};
use crossbeam_channel::{unbounded, Receiver};
use std::borrow::Cow;
use std::path::{Path, PathBuf};

use logweave::cli::{Cli, StatsFormat};
use logweave::config::{JobFile, JOB_WINDOW_SIZE};
use logweave::dateglob::candidate_logs;
use logweave::platform::{
    format_error_message_auto, format_info_message_auto, log_verbose, log_warning, set_no_emoji,
    set_verbosity, signal_exit_code, Ctrl, ExitCode, SafeStderr, SafeStdout, SignalHandler,
};
use logweave::source::FileSource;
use logweave::stats::{
    get_thread_stats, stats_add_error, stats_add_files_written, stats_add_job,
    stats_add_record_emitted, stats_finish_processing, stats_start_timer,
};
use logweave::{
    DateRangeFilter, DateSplitter, Dialect, LogFields, MergeError, MergeResult, Merger,
    OrderedSource, Record, RecordStreamExt, SampleFilter, SourceOptions,
};

type RecordStream<'a> = Box<dyn Iterator<Item = MergeResult<Record>> + 'a>;

/// Everything a single merge run needs, after CLI and job settings are combined
struct MergePlan {
    label: String,
    inputs: Vec<PathBuf>,
    dialect: Dialect,
    options: SourceOptions,
    gzip_helper: Option<PathBuf>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    sample: bool,
    convert_combined: bool,
    show_progress: bool,
    /// strftime template; stdout when absent
    dest: Option<String>,
}

enum Sink {
    Stdout(SafeStdout),
    Split(DateSplitter),
}

impl Sink {
    fn open(dest: Option<&str>) -> Result<Self> {
        match dest {
            Some(template) => Ok(Sink::Split(DateSplitter::from_job_template(template)?)),
            None => Ok(Sink::Stdout(SafeStdout::new())),
        }
    }

    fn write(&mut self, date: NaiveDate, line: &str) -> Result<()> {
        match self {
            Sink::Stdout(out) => out.writeln(line),
            Sink::Split(splitter) => splitter.write_line(date, line),
        }
    }

    fn finish(self, label: &str) -> Result<()> {
        match self {
            Sink::Stdout(mut out) => out.flush(),
            Sink::Split(splitter) => {
                let outputs = splitter.finish()?;
                stats_add_files_written(outputs.len());
                for output in &outputs {
                    log_verbose(
                        1,
                        &format!("{}: wrote {} lines to {}", label, output.lines, output.path.display()),
                    );
                }
                Ok(())
            }
        }
    }
}

fn open_sources(plan: &MergePlan) -> Result<Vec<FileSource>> {
    plan.inputs
        .iter()
        .map(|path| {
            OrderedSource::open_with_helper(path, plan.dialect, &plan.options, plan.gzip_helper.as_deref())
                .with_context(|| format!("Cannot read log '{}'", path.display()))
        })
        .collect()
}

fn build_stream(sources: Vec<FileSource>, plan: &MergePlan) -> Result<RecordStream<'static>> {
    let merged = Merger::new(sources)?;
    let mut stream: RecordStream = Box::new(merged.progress(plan.show_progress).non_empty());

    if plan.start.is_some() || plan.end.is_some() {
        let range = DateRangeFilter::from_dates(plan.start, plan.end)?;
        stream = Box::new(stream.filter_records(range));
    }
    if plan.sample {
        stream = Box::new(stream.filter_records(SampleFilter::new()));
    }
    Ok(stream)
}

fn print_stats(format: StatsFormat) {
    let stats = get_thread_stats();
    let text = match format {
        StatsFormat::Table => format_info_message_auto(&stats.format_stats()),
        StatsFormat::Json => stats.to_json(),
    };
    SafeStderr::new().writeln(&text);
}

/// Pull records through to the sink, answering control messages between
/// records. A signal stops the merge but still closes every output file.
fn drain(
    stream: RecordStream<'_>,
    sink: &mut Sink,
    plan: &MergePlan,
    ctrl_rx: &Receiver<Ctrl>,
    stats_format: StatsFormat,
) -> Result<()> {
    for item in stream {
        while let Ok(msg) = ctrl_rx.try_recv() {
            if msg == Ctrl::PrintStats {
                print_stats(stats_format);
            }
        }
        if SignalHandler::should_terminate() {
            log_warning(&format!("{}: interrupted, closing output", plan.label));
            break;
        }

        let record = match item {
            Ok(record) => record,
            Err(MergeError::Empty) => {
                log_warning(&format!("{}: no records in input logs", plan.label));
                continue;
            }
            Err(e) => return Err(e).with_context(|| format!("{}: merge failed", plan.label)),
        };

        let line: Cow<'_, str> = if plan.convert_combined {
            Cow::Owned(record.payload().as_combined_line())
        } else {
            Cow::Borrowed(record.payload().as_line())
        };
        sink.write(record.date(), &line)?;
        stats_add_record_emitted();
    }
    Ok(())
}

fn run_merge(plan: &MergePlan, ctrl_rx: &Receiver<Ctrl>, stats_format: StatsFormat) -> Result<()> {
    if plan.show_progress {
        SafeStderr::new().writeln(&format_info_message_auto(&format!(
            "Merging {} from {} logs...",
            plan.label,
            plan.inputs.len()
        )));
    }

    let sources = open_sources(plan)?;
    let stream = build_stream(sources, plan)?;
    let mut sink = Sink::open(plan.dest.as_deref())?;

    let drained = drain(stream, &mut sink, plan, ctrl_rx, stats_format);
    let finished = sink.finish(&plan.label);
    drained?;
    finished
}

fn describe_plan(plan: &MergePlan) -> Result<()> {
    let mut out = SafeStdout::new();
    if plan.inputs.is_empty() {
        out.writeln(&format!("{}: no logs to merge.", plan.label))?;
        return out.flush();
    }
    out.writeln(&format!("{}: merge from {} logs:", plan.label, plan.inputs.len()))?;
    for input in &plan.inputs {
        out.writeln(&format!("  {}", input.display()))?;
    }
    if let Some(dest) = &plan.dest {
        let example = DateSplitter::from_job_template(dest)?.path_for(Utc::now().date_naive());
        out.writeln(&format!("to {} (eg. {})", dest, example.display()))?;
    }
    out.flush()
}

fn run_jobs(cli: &Cli, ctrl_rx: &Receiver<Ctrl>) -> Result<bool> {
    let jobs = JobFile::load_with_custom_path(cli.config.as_deref())?;
    if let Some(path) = &jobs.path {
        log_verbose(1, &format!("Using job file {}", path.display()));
    }

    let names: Vec<String> = if cli.all {
        jobs.job_names().map(str::to_string).collect()
    } else {
        cli.jobs.clone()
    };

    let mut all_ok = true;
    for name in &names {
        if SignalHandler::should_terminate() {
            break;
        }

        let job = match jobs.job(name) {
            Ok(job) => job,
            Err(e) => {
                log_warning(&e.to_string());
                stats_add_error();
                all_ok = false;
                continue;
            }
        };

        // end is exclusive for records but the log dated `end` can still hold
        // the last records of the day before, so it is searched inclusively
        let inputs = candidate_logs(&job.sources, &job.servers, cli.start_date, cli.end_date)
            .with_context(|| format!("{}: cannot search '{}'", job.name, job.sources))?;

        let plan = MergePlan {
            label: job.name.clone(),
            inputs,
            dialect: cli.format.unwrap_or(job.format),
            options: SourceOptions {
                window_size: cli.window_size.unwrap_or(job.window_size),
                ignore_invalid: job.ignore_invalid && !cli.strict,
            },
            gzip_helper: cli.gzip_helper.clone(),
            start: cli.start_date,
            end: cli.end_date,
            sample: cli.sample,
            convert_combined: cli.convert_combined,
            show_progress: !cli.quiet,
            dest: Some(job.dest.clone()),
        };

        if cli.no_act {
            describe_plan(&plan)?;
            continue;
        }
        if plan.inputs.is_empty() {
            log_warning(&format!("{}: no logs to merge.", plan.label));
            continue;
        }

        stats_add_job();
        if let Err(e) = run_merge(&plan, ctrl_rx, cli.stats_format) {
            SafeStderr::new().writeln(&format_error_message_auto(&format!("{:#}", e)));
            stats_add_error();
            all_ok = false;
        }
    }
    Ok(all_ok)
}

fn run_inputs(cli: &Cli, ctrl_rx: &Receiver<Ctrl>) -> Result<bool> {
    for input in &cli.inputs {
        if !Path::new(input).exists() {
            return Err(anyhow!("Input file not found: {}", input.display()));
        }
    }
    let plan = MergePlan {
        label: "input".to_string(),
        inputs: cli.inputs.clone(),
        dialect: cli.format.unwrap_or_default(),
        options: SourceOptions {
            window_size: cli.window_size.unwrap_or(JOB_WINDOW_SIZE),
            ignore_invalid: !cli.strict,
        },
        gzip_helper: cli.gzip_helper.clone(),
        start: cli.start_date,
        end: cli.end_date,
        sample: cli.sample,
        convert_combined: cli.convert_combined,
        show_progress: !cli.quiet && cli.dest.is_some(),
        dest: cli.dest.clone(),
    };
    stats_add_job();
    run_merge(&plan, ctrl_rx, cli.stats_format)?;
    Ok(true)
}

fn main() {
    let (ctrl_tx, ctrl_rx) = unbounded::<Ctrl>();
    let _signal_handler = match SignalHandler::new(ctrl_tx) {
        Ok(handler) => handler,
        Err(e) => {
            eprintln!("logweave: Failed to initialize signal handling: {}", e);
            ExitCode::GeneralError.exit();
        }
    };

    let cli = Cli::parse();
    set_no_emoji(cli.no_emoji);
    set_verbosity(cli.verbose);
    let mut stderr = SafeStderr::new();

    if let Some(shell) = cli.completions {
        clap_complete::generate(shell, &mut Cli::command(), "logweave", &mut std::io::stdout());
        return;
    }

    if let Err(e) = cli.validate() {
        stderr.writeln(&format_error_message_auto(&format!("Error: {}", e)));
        ExitCode::InvalidUsage.exit();
    }

    stats_start_timer();
    let result = if cli.inputs.is_empty() {
        run_jobs(&cli, &ctrl_rx)
    } else {
        run_inputs(&cli, &ctrl_rx)
    };
    stats_finish_processing();

    if cli.stats {
        print_stats(cli.stats_format);
    }

    let exit = match result {
        Ok(true) => ExitCode::Success,
        Ok(false) => ExitCode::GeneralError,
        Err(e) => {
            stderr.writeln(&format_error_message_auto(&format!("Error: {:#}", e)));
            ExitCode::GeneralError
        }
    };

    if let Some(code) = signal_exit_code() {
        code.exit();
    }
    exit.exit();
}
