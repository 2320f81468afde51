//! DOE folder discovery and natural ordering.

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::config::InputConfig;

/// Errors that can occur while locating DOE exports.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No {marker} file found for {dataset}")]
    MissingFile { dataset: String, marker: String },

    #[error("Multiple {marker} files found for {dataset}: {files:?}")]
    AmbiguousFile {
        dataset: String,
        marker: String,
        files: Vec<PathBuf>,
    },
}

/// One component of a natural sort key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum NaturalChunk {
    Number(u128),
    Text(String),
}

fn digit_runs() -> &'static Regex {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    DIGITS.get_or_init(|| Regex::new(r"\d+").expect("digit pattern is valid"))
}

/// Split a name into alternating text and integer chunks so that embedded
/// numbers compare by value ("DOE-2" < "DOE-11"). Text compares case-insensitively.
pub fn natural_sort_key(s: &str) -> Vec<NaturalChunk> {
    let mut key = Vec::new();
    let mut last = 0;
    for m in digit_runs().find_iter(s) {
        key.push(NaturalChunk::Text(s[last..m.start()].to_lowercase()));
        key.push(match m.as_str().parse::<u128>() {
            Ok(n) => NaturalChunk::Number(n),
            Err(_) => NaturalChunk::Text(m.as_str().to_string()),
        });
        last = m.end();
    }
    key.push(NaturalChunk::Text(s[last..].to_lowercase()));
    key
}

/// Compare two names in natural order.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    natural_sort_key(a).cmp(&natural_sort_key(b))
}

/// Sort names in natural order.
pub fn natural_sort<S: AsRef<str>>(names: &mut [S]) {
    names.sort_by(|a, b| natural_cmp(a.as_ref(), b.as_ref()));
}

/// Export files of one DOE folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetFiles {
    /// Folder name of the DOE
    pub name: String,
    /// Path to the Analysis export
    pub analysis: PathBuf,
    /// Path to the ParamCurrent export
    pub schedule: PathBuf,
}

/// List DOE folder names directly below `root`, in natural order.
pub fn list_datasets(root: &Path) -> Result<Vec<String>, DiscoveryError> {
    if !root.is_dir() {
        return Err(DiscoveryError::DirectoryNotFound(root.to_path_buf()));
    }

    let entries = fs::read_dir(root).map_err(|e| DiscoveryError::ReadDir {
        path: root.to_path_buf(),
        source: e,
    })?;

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .collect();

    natural_sort(&mut names);
    Ok(names)
}

fn find_single(dir: &Path, dataset: &str, marker: &str) -> Result<PathBuf, DiscoveryError> {
    let entries = fs::read_dir(dir).map_err(|e| DiscoveryError::ReadDir {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut matches: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.contains(marker))
        })
        .collect();

    matches.sort();
    match matches.len() {
        0 => Err(DiscoveryError::MissingFile {
            dataset: dataset.to_string(),
            marker: marker.to_string(),
        }),
        1 => Ok(matches.remove(0)),
        _ => Err(DiscoveryError::AmbiguousFile {
            dataset: dataset.to_string(),
            marker: marker.to_string(),
            files: matches,
        }),
    }
}

/// Locate the Analysis and ParamCurrent exports of one DOE folder.
pub fn find_dataset_files(
    root: &Path,
    dataset: &str,
    input: &InputConfig,
) -> Result<DatasetFiles, DiscoveryError> {
    let dir = root.join(dataset);
    if !dir.is_dir() {
        return Err(DiscoveryError::DirectoryNotFound(dir));
    }

    Ok(DatasetFiles {
        name: dataset.to_string(),
        analysis: find_single(&dir, dataset, &input.analysis_marker)?,
        schedule: find_single(&dir, dataset, &input.schedule_marker)?,
    })
}

/// Locate the exports of every named DOE, in natural order of the names.
pub fn find_all_dataset_files<'a, I>(
    root: &Path,
    datasets: I,
    input: &InputConfig,
) -> Result<Vec<DatasetFiles>, DiscoveryError>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut names: Vec<&String> = datasets.into_iter().collect();
    natural_sort(&mut names);
    names
        .into_iter()
        .map(|name| find_dataset_files(root, name, input))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    fn create_dataset(root: &Path, name: &str, files: &[&str]) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        for file in files {
            File::create(dir.join(file)).unwrap();
        }
    }

    #[test]
    fn test_natural_sort() {
        let mut names = vec!["DOE-2", "DOE-11", "DOE-1"];
        natural_sort(&mut names);
        assert_eq!(names, vec!["DOE-1", "DOE-2", "DOE-11"]);
    }

    #[test]
    fn test_natural_sort_case_insensitive() {
        let mut names = vec!["doe-3", "DOE-20", "Doe-3a"];
        natural_sort(&mut names);
        assert_eq!(names, vec!["doe-3", "Doe-3a", "DOE-20"]);
    }

    #[test]
    fn test_natural_sort_key_chunks() {
        assert_eq!(
            natural_sort_key("DOE-12b"),
            vec![
                NaturalChunk::Text("doe-".into()),
                NaturalChunk::Number(12),
                NaturalChunk::Text("b".into()),
            ]
        );
    }

    #[test]
    fn test_list_datasets() {
        let temp_dir = TempDir::new().unwrap();
        create_dataset(temp_dir.path(), "DOE-10", &[]);
        create_dataset(temp_dir.path(), "DOE-9", &[]);
        File::create(temp_dir.path().join("notes.txt")).unwrap();

        let names = list_datasets(temp_dir.path()).unwrap();
        assert_eq!(names, vec!["DOE-9", "DOE-10"]);
    }

    #[test]
    fn test_list_datasets_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let result = list_datasets(&temp_dir.path().join("nope"));
        assert!(matches!(result, Err(DiscoveryError::DirectoryNotFound(_))));
    }

    #[test]
    fn test_find_dataset_files() {
        let temp_dir = TempDir::new().unwrap();
        create_dataset(
            temp_dir.path(),
            "DOE-1",
            &["DOE1_Analysis.csv", "DOE1_ParamCurrent.csv", "readme.md"],
        );

        let files = find_dataset_files(temp_dir.path(), "DOE-1", &InputConfig::default()).unwrap();
        assert_eq!(files.name, "DOE-1");
        assert!(files.analysis.ends_with("DOE1_Analysis.csv"));
        assert!(files.schedule.ends_with("DOE1_ParamCurrent.csv"));
    }

    #[test]
    fn test_find_dataset_files_missing_and_ambiguous() {
        let temp_dir = TempDir::new().unwrap();
        create_dataset(temp_dir.path(), "DOE-1", &["DOE1_Analysis.csv"]);
        create_dataset(
            temp_dir.path(),
            "DOE-2",
            &["a_Analysis.csv", "b_Analysis.csv", "ParamCurrent.csv"],
        );
        let input = InputConfig::default();

        let missing = find_dataset_files(temp_dir.path(), "DOE-1", &input);
        assert!(matches!(missing, Err(DiscoveryError::MissingFile { .. })));

        let ambiguous = find_dataset_files(temp_dir.path(), "DOE-2", &input);
        match ambiguous {
            Err(DiscoveryError::AmbiguousFile { files, .. }) => assert_eq!(files.len(), 2),
            other => panic!("Expected AmbiguousFile, got {:?}", other),
        }
    }

    #[test]
    fn test_find_all_dataset_files_natural_order() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["DOE-11", "DOE-2"] {
            create_dataset(temp_dir.path(), name, &["Analysis.csv", "ParamCurrent.csv"]);
        }
        let selected = vec!["DOE-11".to_string(), "DOE-2".to_string()];

        let files =
            find_all_dataset_files(temp_dir.path(), &selected, &InputConfig::default()).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["DOE-2", "DOE-11"]);
    }
}
