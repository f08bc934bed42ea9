//! Storage for state handed over between subproblems.
//!
//! A subproblem publishes its linked state exactly once, after it has been solved. The next
//! subproblem loads it before its model is built. Published artifacts are never overwritten.
use super::LinkedTimepointState;
use crate::input::{input_err_msg, read_csv_optional};
use crate::project::ProjectID;
use anyhow::{Context, Result, bail, ensure};
use indexmap::IndexMap;
use indexmap::map::Entry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// File name for linked state of storage projects
pub const STORAGE_STATE_FILE_NAME: &str = "stor_linked_timepoint_params.csv";

/// File name for linked state of projects with capacity commitment
pub const COMMITMENT_STATE_FILE_NAME: &str = "gen_commit_cap_linked_timepoint_params.csv";

/// Linked state for every project, keyed by project and linked timepoint index
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinkedStateStore(IndexMap<(ProjectID, i32), LinkedTimepointState>);

impl LinkedStateStore {
    /// Record the state of a project. Each (project, linked timepoint) can only be recorded once.
    pub fn insert(
        &mut self,
        project_id: ProjectID,
        linked_timepoint: i32,
        state: LinkedTimepointState,
    ) -> Result<()> {
        ensure!(
            linked_timepoint <= 0,
            "Linked timepoint index must not be positive (got {linked_timepoint})"
        );

        match self.0.entry((project_id, linked_timepoint)) {
            Entry::Occupied(entry) => bail!(
                "State of project {} at linked timepoint {linked_timepoint} has already been \
                recorded",
                entry.key().0
            ),
            Entry::Vacant(entry) => {
                entry.insert(state);
            }
        }

        Ok(())
    }

    /// Get the state of a project at a linked timepoint
    pub fn get(&self, project_id: &ProjectID, linked_timepoint: i32) -> Option<&LinkedTimepointState> {
        self.0.get(&(project_id.clone(), linked_timepoint))
    }

    /// Iterate over all records in the order they were inserted
    pub fn iter(&self) -> impl Iterator<Item = (&ProjectID, i32, &LinkedTimepointState)> {
        self.0
            .iter()
            .map(|((project_id, index), state)| (project_id, *index, state))
    }

    /// The number of records
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no records
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Somewhere to publish linked state so that later subproblems can find it
pub trait ArtifactStore {
    /// Load the state published for use by the given subproblem, if any
    fn load(&self, subproblem: u32) -> Result<Option<LinkedStateStore>>;

    /// Publish state for use by the given subproblem.
    ///
    /// It is an error to publish more than once for the same subproblem.
    fn publish(&mut self, subproblem: u32, states: &LinkedStateStore) -> Result<()>;
}

/// An [`ArtifactStore`] which keeps everything in memory
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore(HashMap<u32, LinkedStateStore>);

impl ArtifactStore for InMemoryArtifactStore {
    fn load(&self, subproblem: u32) -> Result<Option<LinkedStateStore>> {
        Ok(self.0.get(&subproblem).cloned())
    }

    fn publish(&mut self, subproblem: u32, states: &LinkedStateStore) -> Result<()> {
        ensure!(
            !self.0.contains_key(&subproblem),
            "Linked state for subproblem {subproblem} has already been published"
        );
        self.0.insert(subproblem, states.clone());

        Ok(())
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct StorageStateRow {
    project: ProjectID,
    linked_timepoint: i32,
    starting_energy_mwh: f64,
    charge_mw: f64,
    discharge_mw: f64,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct CommitmentStateRow {
    project: ProjectID,
    linked_timepoint: i32,
    committed_mw: f64,
    power_mw: f64,
}

/// An [`ArtifactStore`] which writes CSV files to `<root>/<subproblem>/`
#[derive(Debug)]
pub struct CsvArtifactStore {
    root: PathBuf,
}

impl CsvArtifactStore {
    /// Create a new [`CsvArtifactStore`] which keeps its files under `root`
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    fn file_paths(&self, subproblem: u32) -> (PathBuf, PathBuf) {
        let dir = self.root.join(subproblem.to_string());
        (
            dir.join(STORAGE_STATE_FILE_NAME),
            dir.join(COMMITMENT_STATE_FILE_NAME),
        )
    }
}

impl ArtifactStore for CsvArtifactStore {
    fn load(&self, subproblem: u32) -> Result<Option<LinkedStateStore>> {
        let (storage_path, commitment_path) = self.file_paths(subproblem);
        if !storage_path.exists() && !commitment_path.exists() {
            return Ok(None);
        }

        let mut states = LinkedStateStore::default();
        for row in read_csv_optional::<StorageStateRow>(&storage_path)? {
            let state = LinkedTimepointState::Storage {
                starting_energy_mwh: row.starting_energy_mwh,
                charge_mw: row.charge_mw,
                discharge_mw: row.discharge_mw,
            };
            states
                .insert(row.project, row.linked_timepoint, state)
                .with_context(|| input_err_msg(&storage_path))?;
        }
        for row in read_csv_optional::<CommitmentStateRow>(&commitment_path)? {
            let state = LinkedTimepointState::Commitment {
                committed_mw: row.committed_mw,
                power_mw: row.power_mw,
            };
            states
                .insert(row.project, row.linked_timepoint, state)
                .with_context(|| input_err_msg(&commitment_path))?;
        }

        Ok(Some(states))
    }

    fn publish(&mut self, subproblem: u32, states: &LinkedStateStore) -> Result<()> {
        let (storage_path, commitment_path) = self.file_paths(subproblem);
        let already_published =
            || format!("Linked state for subproblem {subproblem} has already been published");
        ensure!(
            !storage_path.exists() && !commitment_path.exists(),
            already_published()
        );
        let dir = self.root.join(subproblem.to_string());
        fs::create_dir_all(&dir)
            .with_context(|| format!("Could not create directory {}", dir.display()))?;

        // Both files are written under temporary names first, so a failure part way through
        // leaves nothing behind
        let storage_file = NamedTempFile::new_in(&dir)?;
        let commitment_file = NamedTempFile::new_in(&dir)?;
        write_state_files(states, storage_file.as_file(), commitment_file.as_file())?;

        storage_file
            .persist_noclobber(&storage_path)
            .with_context(already_published)?;
        if let Err(err) = commitment_file.persist_noclobber(&commitment_path) {
            fs::remove_file(&storage_path)?;
            return Err(err).with_context(already_published);
        }

        Ok(())
    }
}

/// Write linked states as CSV, storage and commitment states to separate files
fn write_state_files(
    states: &LinkedStateStore,
    storage_file: &File,
    commitment_file: &File,
) -> Result<()> {
    let mut storage_writer = csv::Writer::from_writer(storage_file);
    let mut commitment_writer = csv::Writer::from_writer(commitment_file);
    for (project_id, linked_timepoint, state) in states.iter() {
        let project = project_id.clone();
        match *state {
            LinkedTimepointState::Storage {
                starting_energy_mwh,
                charge_mw,
                discharge_mw,
            } => storage_writer.serialize(StorageStateRow {
                project,
                linked_timepoint,
                starting_energy_mwh,
                charge_mw,
                discharge_mw,
            })?,
            LinkedTimepointState::Commitment {
                committed_mw,
                power_mw,
            } => commitment_writer.serialize(CommitmentStateRow {
                project,
                linked_timepoint,
                committed_mw,
                power_mw,
            })?,
        }
    }
    storage_writer.flush()?;
    commitment_writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use tempfile::tempdir;

    fn example_states() -> LinkedStateStore {
        let mut states = LinkedStateStore::default();
        states
            .insert(
                "Battery1".into(),
                0,
                LinkedTimepointState::Storage {
                    starting_energy_mwh: 5.0,
                    charge_mw: 1.0,
                    discharge_mw: 0.0,
                },
            )
            .unwrap();
        states
            .insert(
                "Coal1".into(),
                0,
                LinkedTimepointState::Commitment {
                    committed_mw: 100.0,
                    power_mw: 80.0,
                },
            )
            .unwrap();
        states
    }

    #[test]
    fn test_linked_state_store_write_once() {
        let mut states = example_states();
        assert_eq!(states.len(), 2);
        assert_error!(
            states.insert(
                "Battery1".into(),
                0,
                LinkedTimepointState::Commitment {
                    committed_mw: 0.0,
                    power_mw: 0.0
                }
            ),
            "State of project Battery1 at linked timepoint 0 has already been recorded"
        );
    }

    #[test]
    fn test_in_memory_artifact_store() {
        let mut store = InMemoryArtifactStore::default();
        assert!(store.load(2).unwrap().is_none());
        store.publish(2, &example_states()).unwrap();
        assert_eq!(store.load(2).unwrap(), Some(example_states()));
        assert_error!(
            store.publish(2, &example_states()),
            "Linked state for subproblem 2 has already been published"
        );
    }

    #[test]
    fn test_csv_artifact_store() {
        let dir = tempdir().unwrap();
        let mut store = CsvArtifactStore::new(dir.path());
        assert!(store.load(2).unwrap().is_none());

        store.publish(2, &example_states()).unwrap();
        assert!(dir.path().join("2").join(STORAGE_STATE_FILE_NAME).exists());
        assert_eq!(store.load(2).unwrap(), Some(example_states()));

        assert_error!(
            store.publish(2, &LinkedStateStore::default()),
            "Linked state for subproblem 2 has already been published"
        );
    }

    #[test]
    fn test_csv_artifact_store_leaves_only_state_files() {
        let dir = tempdir().unwrap();
        let mut store = CsvArtifactStore::new(dir.path());
        store.publish(2, &example_states()).unwrap();

        let mut file_names: Vec<_> = fs::read_dir(dir.path().join("2"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        file_names.sort();
        assert_eq!(
            file_names,
            [COMMITMENT_STATE_FILE_NAME, STORAGE_STATE_FILE_NAME]
        );
    }

    #[test]
    fn test_csv_artifact_store_failed_publish_can_be_retried() {
        let dir = tempdir().unwrap();
        let mut store = CsvArtifactStore::new(dir.path());

        // Block the subproblem's directory with a file
        let blocked = dir.path().join("2");
        fs::write(&blocked, "").unwrap();
        assert!(store.publish(2, &example_states()).is_err());
        assert!(store.load(2).unwrap().is_none());

        fs::remove_file(&blocked).unwrap();
        store.publish(2, &example_states()).unwrap();
        assert_eq!(store.load(2).unwrap(), Some(example_states()));
    }

    #[test]
    fn test_csv_artifact_store_empty() {
        let dir = tempdir().unwrap();
        let mut store = CsvArtifactStore::new(dir.path());
        store.publish(3, &LinkedStateStore::default()).unwrap();
        assert!(store.load(3).unwrap().unwrap().is_empty());
    }
}
