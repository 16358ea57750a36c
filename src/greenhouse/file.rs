use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use super::types::{ClusterKubeconfig, ClusterKubeconfigList};
use super::RecordSource;

/// Reads ClusterKubeconfigs from a YAML or JSON file, such as the output of
/// `kubectl get clusterkubeconfigs -o yaml`. Accepts a single object, a
/// `List` with `items`, or a bare sequence.
pub struct FileSource {
    path: PathBuf,
    name: Option<String>,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>, name: Option<String>) -> Self {
        Self {
            path: path.into(),
            name: name.filter(|n| !n.is_empty()),
        }
    }
}

impl RecordSource for FileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn fetch(&self) -> Result<Vec<ClusterKubeconfig>> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let mut records = parse_records(&contents)
            .with_context(|| format!("Failed to parse ClusterKubeconfigs from {}", self.path.display()))?;

        if let Some(name) = &self.name {
            records.retain(|record| &record.metadata.name == name);
        }
        Ok(records)
    }
}

fn parse_records(contents: &str) -> Result<Vec<ClusterKubeconfig>> {
    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }

    let value: serde_yaml::Value = serde_yaml::from_str(contents)?;
    let is_list = value.as_mapping().is_some_and(|map| map.contains_key("items"));

    if value.is_null() {
        Ok(Vec::new())
    } else if value.is_sequence() {
        Ok(serde_yaml::from_value(value)?)
    } else if is_list {
        let list: ClusterKubeconfigList = serde_yaml::from_value(value)?;
        Ok(list.items)
    } else {
        Ok(vec![serde_yaml::from_value(value)?])
    }
}
