use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Which M2M dataset to search, and where.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct DatasetSelection {
    pub dataset_name: String,
    pub node: String,
    pub max_results: u32,
    pub api_url: String,
}

pub fn dataset_selection_toml() -> toml::Table {
    toml::toml! {
        // Placeholder id; look up the NLCD dataset name with the M2M dataset-search endpoint
        dataset_name = "NLCD2019_ID"

        node = "LANDSAT_ARCHIVE"

        max_results = 10

        api_url = "https://m2m.cr.usgs.gov/api/api/json/stable/"
    }
}

impl Default for DatasetSelection {
    fn default() -> Self {
        Self::from_template(&dataset_selection_toml())
    }
}

impl DatasetSelection {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let selection: Self = toml::from_str(&content)?;
        selection.validate()?;
        Ok(selection)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn from_template(table: &toml::Table) -> Self {
        let selection: Self =
            toml::from_str(&table.to_string()).expect("Error serializing template");
        selection
    }

    /// Applies command line overrides on top of the file or template values.
    pub fn with_overrides(
        mut self,
        dataset_name: Option<String>,
        node: Option<String>,
        max_results: Option<u32>,
    ) -> Result<Self> {
        if let Some(dataset_name) = dataset_name {
            self.dataset_name = dataset_name;
        }
        if let Some(node) = node {
            self.node = node;
        }
        if let Some(max_results) = max_results {
            self.max_results = max_results;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if self.max_results == 0 {
            return Err(anyhow!("max_results must be at least 1"));
        }
        if self.dataset_name.is_empty() || self.node.is_empty() {
            return Err(anyhow!("dataset_name and node must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template() {
        let selection = DatasetSelection::default();
        assert_eq!(selection.dataset_name, "NLCD2019_ID");
        assert_eq!(selection.node, "LANDSAT_ARCHIVE");
        assert_eq!(selection.max_results, 10);
    }

    #[test]
    fn test_write_then_read_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("selection.toml");
        let selection = DatasetSelection {
            dataset_name: "annual_nlcd".to_string(),
            ..DatasetSelection::default()
        };
        selection.write(&path).unwrap();

        let read = DatasetSelection::read(&path).unwrap();
        assert_eq!(read, selection);
    }

    #[test]
    fn test_read_rejects_zero_max_results() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("selection.toml");
        fs::write(
            &path,
            r#"
dataset_name = "x"
node = "y"
max_results = 0
api_url = "http://localhost/"
"#,
        )
        .unwrap();
        assert!(DatasetSelection::read(&path).is_err());
    }

    #[test]
    fn test_overrides() {
        let selection = DatasetSelection::default()
            .with_overrides(Some("other".to_string()), None, Some(3))
            .unwrap();
        assert_eq!(selection.dataset_name, "other");
        assert_eq!(selection.node, "LANDSAT_ARCHIVE");
        assert_eq!(selection.max_results, 3);

        assert!(DatasetSelection::default()
            .with_overrides(None, None, Some(0))
            .is_err());
    }
}
