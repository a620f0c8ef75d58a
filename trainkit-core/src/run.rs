//! Run-directory bookkeeping.
//!
//! Every training run lives in `<log_dir>/<model_name>`. A new run gets a
//! timestamped name and a fresh directory; a resumed run points back at an
//! existing one through `load_path`.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::snapshot::{snapshot_source_tree, SnapshotReport, SnapshotRules};

/// Format of the timestamp embedded in new model names.
pub const RUN_TIME_FORMAT: &str = "%m%d_%H%M%S";

/// Where runs and datasets live, and which run to resume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSettings {
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_dataset")]
    pub dataset: String,
    /// Existing model directory or model name to resume from.
    #[serde(default)]
    pub load_path: Option<String>,
    /// Suffix appended to new model names.
    #[serde(default)]
    pub description: Option<String>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            data_dir: default_data_dir(),
            dataset: default_dataset(),
            load_path: None,
            description: None,
        }
    }
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_dataset() -> String {
    "default".to_string()
}

/// Resolved locations for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunPaths {
    pub model_name: String,
    pub model_dir: PathBuf,
    pub data_path: PathBuf,
    /// Snapshot target; `None` when resuming.
    pub code_dir: Option<PathBuf>,
    pub resumed: bool,
}

impl RunPaths {
    /// Snapshot `source` into the run's code directory.
    ///
    /// Resumed runs already carry their snapshot, so this returns `Ok(None)`.
    pub fn snapshot_code(&self, source: &Path, rules: &SnapshotRules) -> Result<Option<SnapshotReport>> {
        match &self.code_dir {
            Some(code_dir) => snapshot_source_tree(source, code_dir, rules).map(Some),
            None => Ok(None),
        }
    }
}

/// `"{dataset}_{MMDD_HHMMSS}"`, plus `"_{description}"` when given.
pub fn model_name(dataset: &str, description: Option<&str>, now: NaiveDateTime) -> String {
    let mut name = format!("{dataset}_{}", now.format(RUN_TIME_FORMAT));
    if let Some(desc) = description.filter(|d| !d.is_empty()) {
        name.push('_');
        name.push_str(desc);
    }
    name
}

/// Resolve (and for new runs, create) the directories of a run.
pub fn prepare_run(settings: &RunSettings, now: NaiveDateTime) -> Result<RunPaths> {
    let data_path = settings.data_dir.join(&settings.dataset);

    let paths = match settings.load_path.as_deref().filter(|p| !p.is_empty()) {
        Some(load_path) => {
            let (model_name, model_dir) = resolve_load_path(settings, load_path);
            if !model_dir.is_dir() {
                return Err(Error::run_dir(format!(
                    "cannot resume '{load_path}': {} is not a directory",
                    model_dir.display()
                )));
            }
            RunPaths {
                model_name,
                model_dir,
                data_path,
                code_dir: None,
                resumed: true,
            }
        }
        None => {
            let model_name = model_name(&settings.dataset, settings.description.as_deref(), now);
            let model_dir = settings.log_dir.join(&model_name);
            for dir in [&settings.log_dir, &settings.data_dir, &model_dir] {
                std::fs::create_dir_all(dir)?;
            }
            RunPaths {
                code_dir: Some(model_dir.join("code")),
                model_name,
                model_dir,
                data_path,
                resumed: false,
            }
        }
    };

    info!(
        model_dir = %paths.model_dir.display(),
        resumed = paths.resumed,
        "Prepared run directory"
    );
    Ok(paths)
}

/// Like [`prepare_run`], stamped with the local clock.
pub fn prepare_run_now(settings: &RunSettings) -> Result<RunPaths> {
    prepare_run(settings, Local::now().naive_local())
}

fn resolve_load_path(settings: &RunSettings, load_path: &str) -> (String, PathBuf) {
    let trim = |s: &str| s.trim_matches(|c: char| c == '.' || c == '/').to_string();
    let stripped = trim(load_path);
    let log_dir = trim(&settings.log_dir.to_string_lossy());

    if !log_dir.is_empty() && Path::new(&stripped).starts_with(&log_dir) {
        let model_dir = PathBuf::from(load_path);
        let model_name = model_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(stripped);
        return (model_name, model_dir);
    }

    let model_name = if load_path.starts_with(settings.dataset.as_str()) {
        load_path.to_string()
    } else {
        format!("{}_{load_path}", settings.dataset)
    };
    let model_dir = settings.log_dir.join(&model_name);
    (model_name, model_dir)
}
