//! JSON persistence for run configurations.
//!
//! Every config written here is pretty-printed with a four-space indent and
//! keys sorted at every nesting level, so two runs with the same settings
//! produce byte-identical files.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;

use crate::error::{Error, Result};

/// File name used for the primary run config.
pub const DEFAULT_CONFIG_NAME: &str = "params.json";

/// Write `config` as `dir/name` and return the written path.
pub fn save_config<T: Serialize + ?Sized>(config: &T, dir: &Path, name: &str) -> Result<PathBuf> {
    let value = serde_json::to_value(config)?;
    write_value(&value, dir, name)
}

/// Load a config previously written by [`save_config`].
pub fn load_saved_config<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// A set of named configs written together into one model directory.
#[derive(Debug, Clone, Default)]
pub struct ConfigBundle {
    entries: Vec<(String, Value)>,
}

impl ConfigBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `config` to be written as `name`.
    pub fn add<T: Serialize + ?Sized>(&mut self, name: &str, config: &T) -> Result<&mut Self> {
        validate_name(name)?;
        if self.entries.iter().any(|(existing, _)| existing == name) {
            return Err(Error::invalid_value(format!(
                "config '{name}' added twice"
            )));
        }
        self.entries
            .push((name.to_string(), serde_json::to_value(config)?));
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write every queued config into `dir`, in insertion order.
    pub fn write_all(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        info!(dir = %dir.display(), count = self.entries.len(), "Saving run configs");
        self.entries
            .iter()
            .map(|(name, value)| write_value(value, dir, name))
            .collect()
    }
}

fn write_value(value: &Value, dir: &Path, name: &str) -> Result<PathBuf> {
    validate_name(name)?;
    let path = dir.join(name);
    let sorted = sort_keys(value.clone());

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    sorted.serialize(&mut ser)?;

    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, &buf)?;
    if let Err(e) = std::fs::rename(&tmp, &path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    info!(path = %path.display(), "Saved config");
    Ok(path)
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(Error::invalid_value(format!(
            "config name '{name}' must be a plain file name"
        )));
    }
    Ok(())
}

/// `serde_json::Map` only keeps keys sorted while no crate in the build turns
/// on `preserve_order`, so order them explicitly.
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, sort_keys(v)))
                    .collect::<Map<String, Value>>(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Params {
        z_dim: usize,
        batch_size: usize,
        dataset: String,
        nested: Nested,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Nested {
        lr: f64,
        beta1: f64,
    }

    fn params() -> Params {
        Params {
            z_dim: 64,
            batch_size: 16,
            dataset: "celebA".into(),
            nested: Nested { lr: 0.0002, beta1: 0.5 },
        }
    }

    #[test]
    fn test_save_config_sorted_and_indented() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_config(&params(), dir.path(), DEFAULT_CONFIG_NAME).unwrap();
        assert_eq!(path, dir.path().join("params.json"));

        let content = std::fs::read_to_string(&path).unwrap();
        let expected = r#"{
    "batch_size": 16,
    "dataset": "celebA",
    "nested": {
        "beta1": 0.5,
        "lr": 0.0002
    },
    "z_dim": 64
}"#;
        assert_eq!(content, expected);
        assert!(!dir.path().join("params.tmp").exists());
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_config(&params(), dir.path(), "cc_params.json").unwrap();
        let loaded: Params = load_saved_config(&path).unwrap();
        assert_eq!(loaded, params());
    }

    #[test]
    fn test_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = save_config(&params(), &dir.path().join("gone"), "params.json").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_bundle_writes_every_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut bundle = ConfigBundle::new();
        bundle
            .add("params.json", &params())
            .unwrap()
            .add("dcgan_params.json", &serde_json::json!({"gf_dim": 64}))
            .unwrap();
        let paths = bundle.write_all(dir.path()).unwrap();
        assert_eq!(paths.len(), 2);
        assert!(dir.path().join("dcgan_params.json").exists());
    }

    #[test]
    fn test_bundle_rejects_duplicates_and_paths() {
        let mut bundle = ConfigBundle::new();
        bundle.add("params.json", &params()).unwrap();
        assert!(bundle.add("params.json", &params()).is_err());
        assert!(bundle.add("../escape.json", &params()).is_err());
        assert_eq!(bundle.len(), 1);
    }

    #[test]
    fn test_failed_rename_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("params.json");
        std::fs::create_dir(&blocker).unwrap();
        std::fs::write(blocker.join("keep"), "x").unwrap();

        let err = save_config(&params(), dir.path(), "params.json").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(!dir.path().join("params.tmp").exists());
        assert!(blocker.join("keep").exists());
    }

    #[test]
    fn test_keys_sorted_regardless_of_map_order() {
        let mut map = Map::new();
        map.insert("b".into(), Value::from(1));
        map.insert("a".into(), serde_json::json!({"d": 1, "c": 2}));
        let sorted = sort_keys(Value::Object(map));
        let keys: Vec<&String> = sorted.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        let inner: Vec<&String> = sorted["a"].as_object().unwrap().keys().collect();
        assert_eq!(inner, vec!["c", "d"]);
    }
}
