use anyhow::{anyhow, Context, Result};
use chrono::format::{Item, StrftimeItems};
use chrono::NaiveDate;
use flate2::write::GzEncoder;
use flate2::Compression;
use indexmap::IndexMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::MergeResult;
use crate::platform::{create_helpful_error_message, SafeFileOut};
use crate::record::{LogFields, Record};

enum OutputFile {
    Plain(SafeFileOut),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl OutputFile {
    fn create(path: &Path, gzip: bool) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create output directory '{}'", parent.display()))?;
        }
        if gzip {
            let file = File::create(path).map_err(|e| anyhow!("{}", create_helpful_error_message(path, &e)))?;
            Ok(OutputFile::Gzip(GzEncoder::new(BufWriter::new(file), Compression::default())))
        } else {
            Ok(OutputFile::Plain(SafeFileOut::new(path)?))
        }
    }

    fn writeln(&mut self, line: &str) -> Result<()> {
        match self {
            OutputFile::Plain(out) => out.writeln(line),
            OutputFile::Gzip(encoder) => {
                encoder.write_all(line.as_bytes())?;
                encoder.write_all(b"\n")?;
                Ok(())
            }
        }
    }

    fn finish(self) -> Result<()> {
        match self {
            OutputFile::Plain(mut out) => out.flush(),
            OutputFile::Gzip(encoder) => {
                encoder.finish()?.flush()?;
                Ok(())
            }
        }
    }
}

/// Lines written to one output file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitOutput {
    pub path: PathBuf,
    pub lines: u64,
}

/// Writes records into one file per day, named by a strftime template such
/// as `merged/%Y/%m/%d.log.gz`. Existing files are overwritten; a template
/// ending in `.gz` gives gzip output.
pub struct DateSplitter {
    template: String,
    gzip: bool,
    outputs: IndexMap<PathBuf, (OutputFile, u64)>,
    last: Option<(NaiveDate, PathBuf)>,
}

impl DateSplitter {
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        if template.is_empty() {
            return Err(anyhow!("Output template is empty"));
        }
        if StrftimeItems::new(&template).any(|item| matches!(item, Item::Error)) {
            return Err(anyhow!("Invalid date format in output template '{}'", template));
        }
        let gzip = template.ends_with(".gz");
        Ok(Self {
            template,
            gzip,
            outputs: IndexMap::new(),
            last: None,
        })
    }

    /// Translate the `YYYY`, `MM` and `DD` placeholders used in job files
    pub fn from_job_template(dest: &str) -> Result<Self> {
        Self::new(job_template(dest))
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        PathBuf::from(date.format(&self.template).to_string())
    }

    /// Append `line` to the file for `date`, creating it on first use
    pub fn write_line(&mut self, date: NaiveDate, line: &str) -> Result<()> {
        // records arrive in date order, so the previous file is nearly always the one
        let path = match &self.last {
            Some((last_date, path)) if *last_date == date => path.clone(),
            _ => {
                let path = self.path_for(date);
                self.last = Some((date, path.clone()));
                path
            }
        };

        if !self.outputs.contains_key(&path) {
            let file = OutputFile::create(&path, self.gzip)?;
            self.outputs.insert(path.clone(), (file, 0));
        }
        if let Some((file, count)) = self.outputs.get_mut(&path) {
            file.writeln(line)
                .with_context(|| format!("Failed writing to '{}'", path.display()))?;
            *count += 1;
        }
        Ok(())
    }

    pub fn write_record<P: LogFields>(&mut self, record: &Record<P>) -> Result<()> {
        self.write_line(record.date(), record.payload().as_line())
    }

    /// Flush and close every file, in the order they were opened
    pub fn finish(self) -> Result<Vec<SplitOutput>> {
        let mut summary = Vec::with_capacity(self.outputs.len());
        for (path, (file, lines)) in self.outputs {
            file.finish()
                .with_context(|| format!("Failed to finish '{}'", path.display()))?;
            summary.push(SplitOutput { path, lines });
        }
        Ok(summary)
    }

    /// Split a whole record stream; the first stream error aborts the split
    pub fn split<I, P>(mut self, records: I) -> Result<Vec<SplitOutput>>
    where
        I: IntoIterator<Item = MergeResult<Record<P>>>,
        P: LogFields,
    {
        for record in records {
            self.write_record(&record?)?;
        }
        self.finish()
    }
}

/// `YYYY`/`MM`/`DD` to `%Y`/`%m`/`%d`
pub fn job_template(dest: &str) -> String {
    dest.replace("YYYY", "%Y").replace("MM", "%m").replace("DD", "%d")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::epoch_seconds;
    use flate2::read::MultiGzDecoder;
    use std::io::Read;

    // 2010-04-24T23:59:59Z
    const LAST_SECOND_OF_DAY: i64 = 1_272_153_599;

    fn record(secs: i64, text: &str) -> MergeResult<Record<String>> {
        Ok(Record::new(epoch_seconds(secs), 1, text.to_string()))
    }

    #[test]
    fn test_job_template_translation() {
        assert_eq!(job_template("/srv/YYYY/MM/DD.log.gz"), "/srv/%Y/%m/%d.log.gz");
    }

    #[test]
    fn test_invalid_template_rejected() {
        assert!(DateSplitter::new("out-%Q.log").is_err());
        assert!(DateSplitter::new("").is_err());
    }

    #[test]
    fn test_split_by_utc_day() {
        let dir = tempfile::tempdir().unwrap();
        let template = format!("{}/%Y-%m-%d.log", dir.path().display());
        let records = vec![
            record(LAST_SECOND_OF_DAY - 10, "a"),
            record(LAST_SECOND_OF_DAY, "b"),
            record(LAST_SECOND_OF_DAY + 1, "c"),
        ];
        let summary = DateSplitter::new(template).unwrap().split(records).unwrap();

        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].lines, 2);
        assert_eq!(summary[1].lines, 1);
        assert_eq!(
            fs::read_to_string(dir.path().join("2010-04-24.log")).unwrap(),
            "a\nb\n"
        );
        assert_eq!(fs::read_to_string(dir.path().join("2010-04-25.log")).unwrap(), "c\n");
    }

    #[test]
    fn test_existing_file_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("2010-04-24.log");
        fs::write(&target, "old content\n").unwrap();

        let template = format!("{}/%Y-%m-%d.log", dir.path().display());
        DateSplitter::new(template)
            .unwrap()
            .split(vec![record(LAST_SECOND_OF_DAY, "new")])
            .unwrap();
        assert_eq!(fs::read_to_string(target).unwrap(), "new\n");
    }

    #[test]
    fn test_gzip_output_and_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        let template = format!("{}/%Y/%m/%d.log.gz", dir.path().display());
        DateSplitter::new(template)
            .unwrap()
            .split(vec![record(LAST_SECOND_OF_DAY, "x"), record(LAST_SECOND_OF_DAY, "y")])
            .unwrap();

        let file = File::open(dir.path().join("2010/04/24.log.gz")).unwrap();
        let mut content = String::new();
        MultiGzDecoder::new(file).read_to_string(&mut content).unwrap();
        assert_eq!(content, "x\ny\n");
    }

    #[test]
    fn test_stream_error_aborts_split() {
        let dir = tempfile::tempdir().unwrap();
        let template = format!("{}/%Y-%m-%d.log", dir.path().display());
        let records = vec![
            record(LAST_SECOND_OF_DAY, "a"),
            Err(crate::error::MergeError::config("broken")),
        ];
        assert!(DateSplitter::new(template).unwrap().split(records).is_err());
    }
}
