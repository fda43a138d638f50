use std::{collections::BTreeMap, path::Path};

use serde::Deserialize;

use crate::error::DetectError;

/// Name reported for class ids without an entry in the table.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Lookup table from class id to display name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelTable {
    names: Vec<Option<String>>,
}

#[derive(Deserialize)]
struct DatasetYaml {
    names: Option<ClassNames>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ClassNames {
    List(Vec<String>),
    Map(BTreeMap<u32, String>),
}

impl LabelTable {
    /// Create a table from names ordered by class id.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(|name| Some(name.into())).collect(),
        }
    }

    /// Parse the `names` entry of a dataset YAML document.
    ///
    /// `names` may be a sequence ordered by class id or a mapping from class id to
    /// name.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, DetectError> {
        let dataset: DatasetYaml = serde_yaml::from_str(yaml)?;
        let names = dataset
            .names
            .ok_or_else(|| DetectError::LabelError("Missing `names` entry".to_string()))?;

        Ok(match names {
            ClassNames::List(names) => Self::from_names(names),
            ClassNames::Map(map) => {
                let len = map.keys().next_back().map_or(0, |&id| id as usize + 1);
                let mut names = vec![None; len];
                for (id, name) in map {
                    names[id as usize] = Some(name);
                }
                Self { names }
            }
        })
    }

    /// Read and parse a dataset YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, DetectError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Name of a class, [`UNKNOWN_LABEL`] when the table has no entry for it.
    pub fn name(&self, class_id: u32) -> &str {
        self.names
            .get(class_id as usize)
            .and_then(|name| name.as_deref())
            .unwrap_or(UNKNOWN_LABEL)
    }

    /// Number of class ids covered by the table.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_names() {
        let labels = LabelTable::from_names(["person", "bicycle"]);
        assert_eq!(labels.len(), 2);
        assert_eq!(labels.name(0), "person");
        assert_eq!(labels.name(1), "bicycle");
        assert_eq!(labels.name(2), UNKNOWN_LABEL);
    }

    #[test]
    fn test_from_yaml_list() -> Result<(), DetectError> {
        let yaml = "path: ../datasets/coco\nnc: 3\nnames: ['person', 'bicycle', 'car']\n";
        let labels = LabelTable::from_yaml_str(yaml)?;
        assert_eq!(labels.len(), 3);
        assert_eq!(labels.name(2), "car");
        Ok(())
    }

    #[test]
    fn test_from_yaml_map_with_gaps() -> Result<(), DetectError> {
        let yaml = "names:\n  0: person\n  2: car\n";
        let labels = LabelTable::from_yaml_str(yaml)?;
        assert_eq!(labels.len(), 3);
        assert_eq!(labels.name(0), "person");
        assert_eq!(labels.name(1), UNKNOWN_LABEL);
        assert_eq!(labels.name(2), "car");
        Ok(())
    }

    #[test]
    fn test_from_yaml_missing_names() {
        let res = LabelTable::from_yaml_str("nc: 80\n");
        assert!(matches!(res, Err(DetectError::LabelError(_))));
    }

    #[test]
    fn test_from_yaml_file_missing() {
        let res = LabelTable::from_yaml_file("does/not/exist.yaml");
        assert!(matches!(res, Err(DetectError::Io(_))));
    }

    #[test]
    fn test_empty_table() {
        let labels = LabelTable::default();
        assert!(labels.is_empty());
        assert_eq!(labels.name(0), UNKNOWN_LABEL);
    }
}
