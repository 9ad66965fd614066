use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

use crate::dialect::Dialect;
use crate::source::SourceOptions;

pub const DEFAULT_JOB_FILE: &str = "logs.ini";
/// Window used for configured jobs unless `window_size` says otherwise
pub const JOB_WINDOW_SIZE: usize = 5000;

/// One `[section]` of the job file, validated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobConfig {
    pub name: String,
    /// Output template, already translated to strftime syntax
    pub dest: String,
    /// Date-glob pattern of the input logs
    pub sources: String,
    pub servers: Vec<String>,
    pub format: Dialect,
    pub window_size: usize,
    pub ignore_invalid: bool,
}

impl JobConfig {
    pub fn source_options(&self) -> SourceOptions {
        SourceOptions {
            window_size: self.window_size,
            ignore_invalid: self.ignore_invalid,
        }
    }
}

/// Job definitions read from an INI file, sections kept in file order
#[derive(Debug, Clone, Default)]
pub struct JobFile {
    pub path: Option<PathBuf>,
    sections: IndexMap<String, IndexMap<String, String>>,
}

impl JobFile {
    /// `logs.ini` in the working directory, then the per-user config dir
    pub fn get_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(DEFAULT_JOB_FILE)];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("logweave").join(DEFAULT_JOB_FILE));
        }
        paths
    }

    pub fn find_config_path() -> Option<PathBuf> {
        Self::get_config_paths().into_iter().find(|p| p.exists())
    }

    pub fn load_with_custom_path(custom_path: Option<&str>) -> Result<Self> {
        match custom_path {
            Some(path) => Self::load_from_path(Path::new(path)),
            None => {
                let path = Self::find_config_path().ok_or_else(|| {
                    anyhow!(
                        "No job file found (looked for {})",
                        Self::get_config_paths()
                            .iter()
                            .map(|p| p.display().to_string())
                            .collect::<Vec<_>>()
                            .join(", ")
                    )
                })?;
                Self::load_from_path(&path)
            }
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read job file: {}", path.display()))?;
        let mut jobs = Self::parse_ini_content(&content)
            .with_context(|| format!("Invalid job file: {}", path.display()))?;
        jobs.path = Some(path.to_path_buf());
        Ok(jobs)
    }

    pub fn parse_ini_content(content: &str) -> Result<Self> {
        let mut sections: IndexMap<String, IndexMap<String, String>> = IndexMap::new();
        let mut current: Option<String> = None;

        for (idx, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                let name = line[1..line.len() - 1].trim().to_string();
                if name.is_empty() {
                    return Err(anyhow!("line {}: empty section name", idx + 1));
                }
                sections.entry(name.clone()).or_default();
                current = Some(name);
                continue;
            }

            let Some(sep) = line.find(&['=', ':'][..]) else {
                return Err(anyhow!("line {}: expected 'key = value', got '{}'", idx + 1, line));
            };
            let key = line[..sep].trim().to_ascii_lowercase();
            let value = line[sep + 1..].trim().to_string();

            let Some(section) = current.as_ref() else {
                return Err(anyhow!("line {}: '{}' appears before any [section]", idx + 1, key));
            };
            if let Some(entries) = sections.get_mut(section) {
                entries.insert(key, value);
            }
        }

        Ok(Self {
            path: None,
            sections,
        })
    }

    pub fn job_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    pub fn has_job(&self, name: &str) -> bool {
        self.sections.contains_key(name)
    }

    /// Validate one job section
    pub fn job(&self, name: &str) -> Result<JobConfig> {
        let entries = self
            .sections
            .get(name)
            .ok_or_else(|| anyhow!("No such job '{}'", name))?;
        let get = |key: &str| entries.get(key).map(String::as_str).filter(|v| !v.is_empty());

        let dest = get("dest").ok_or_else(|| anyhow!("Job '{}' missing dest", name))?;
        let sources = get("sources").ok_or_else(|| anyhow!("Job '{}' missing sources", name))?;

        // without a list, SERVER matches the empty string
        let servers = match get("servers") {
            Some(list) => list.split(',').map(|s| s.trim().to_string()).collect(),
            None => vec![String::new()],
        };

        let format = match get("format") {
            Some(f) => f
                .parse::<Dialect>()
                .map_err(|e| anyhow!("Job '{}': {}", name, e))?,
            None => Dialect::default(),
        };

        let window_size = match get("window_size") {
            Some(w) => w
                .parse::<usize>()
                .ok()
                .filter(|w| *w > 0)
                .ok_or_else(|| anyhow!("Job '{}': window_size must be a positive integer, got '{}'", name, w))?,
            None => JOB_WINDOW_SIZE,
        };

        let ignore_invalid = match get("ignore_invalid") {
            Some(v) => parse_bool(v).ok_or_else(|| anyhow!("Job '{}': ignore_invalid must be true or false, got '{}'", name, v))?,
            None => true,
        };

        Ok(JobConfig {
            name: name.to_string(),
            dest: crate::splitter::job_template(dest),
            sources: sources.to_string(),
            servers,
            format,
            window_size,
            ignore_invalid,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Some(true),
        "0" | "no" | "false" | "off" => Some(false),
        _ => None,
    }
}
