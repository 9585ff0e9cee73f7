//! Display roster: enrolled user ids and names.
//!
//! Built either from a tabular `id,name` file or from the controller's
//! staff list; both produce the same mapping, with the sentinel unknown
//! entry always injected afterward.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use turngate_api::StaffUser;
use turngate_core::{UserId, UNKNOWN_USER};

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("roster unreadable: {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("roster malformed: {path} line {line}: {reason}")]
    Malformed {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Roster {
    names: BTreeMap<UserId, String>,
}

impl Roster {
    pub fn from_pairs(
        pairs: impl IntoIterator<Item = (UserId, String)>,
        unknown_name: &str,
    ) -> Self {
        let mut names: BTreeMap<UserId, String> = pairs.into_iter().collect();
        names.insert(UNKNOWN_USER, unknown_name.to_string());
        Self { names }
    }

    /// Parse a tabular roster file, one `id,name` pair per line.
    ///
    /// Blank lines and `#` comments are skipped; names may contain
    /// commas. Any malformed line rejects the whole file, so a bad
    /// roster never partially replaces a good one.
    pub fn load_file(path: &Path, unknown_name: &str) -> Result<Self, RosterError> {
        let raw = std::fs::read_to_string(path).map_err(|source| RosterError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut pairs = Vec::new();
        for (idx, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (id, name) = line.split_once(',').ok_or_else(|| RosterError::Malformed {
                path: path.to_path_buf(),
                line: idx + 1,
                reason: "expected `id,name`".to_string(),
            })?;
            let id: UserId = id.trim().parse().map_err(|e| RosterError::Malformed {
                path: path.to_path_buf(),
                line: idx + 1,
                reason: format!("bad user id: {e}"),
            })?;
            pairs.push((id, name.trim().to_string()));
        }

        Ok(Self::from_pairs(pairs, unknown_name))
    }

    /// Build from the controller's staff list.
    pub fn from_staff(staff: Vec<StaffUser>, unknown_name: &str) -> Self {
        Self::from_pairs(staff.into_iter().map(|u| (u.id, u.name)), unknown_name)
    }

    /// Display name for an id. Unlisted ids resolve to the unknown
    /// entry's name, so every lookup renders something.
    pub fn display_name(&self, id: UserId) -> &str {
        self.names
            .get(&id)
            .or_else(|| self.names.get(&UNKNOWN_USER))
            .map(String::as_str)
            .unwrap_or("unknown")
    }

    /// Enrolled ids in ascending order, sentinel excluded.
    pub fn enrolled_ids(&self) -> Vec<UserId> {
        self.names
            .keys()
            .copied()
            .filter(|&id| id != UNKNOWN_USER)
            .collect()
    }

    pub fn enrolled_count(&self) -> usize {
        self.enrolled_ids().len()
    }
}
