//! # Calculation Archive
//!
//! The `Archive` keeps saved calculations so they can be listed, reopened,
//! reported on and deleted later. Archives serialize to `.csz` files as
//! human-readable JSON (see [`crate::file_io`] for atomic saves).
//!
//! ## Structure
//!
//! ```text
//! Archive
//! ├── meta: ArchiveMetadata (version, timestamps)
//! └── entries: Vec<ArchiveEntry> (newest first)
//! ```
//!
//! Each entry keeps the inputs together with the outcome computed when it
//! was saved. Listings and reports read that snapshot, so a saved result
//! does not change when the lookup tables do.
//!
//! ## Example
//!
//! ```rust
//! use cable_core::archive::Archive;
//! use cable_core::calculations::{CableSizingInput, CalculationItem, LoadSpec};
//! use cable_core::tables::reference_database;
//!
//! let input = CableSizingInput {
//!     load: LoadSpec::Current { amps: 16.0 },
//!     length_m: 50.0,
//!     ..CableSizingInput::default()
//! };
//! let mut archive = Archive::new();
//! let id = archive
//!     .save_evaluated("Kitchen ring", CalculationItem::CableSizing(input), reference_database().unwrap())
//!     .unwrap();
//! assert_eq!(archive.entries[0].id, id);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::calculations::{CalculationItem, CalculationOutcome};
use crate::errors::CalcResult;
use crate::tables::CableTables;

/// Current schema version for .csz files
pub const SCHEMA_VERSION: &str = "0.2.0";

/// Root archive container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Archive {
    pub meta: ArchiveMetadata,

    /// Saved calculations, most recent first
    pub entries: Vec<ArchiveEntry>,
}

impl Archive {
    /// Create an empty archive.
    pub fn new() -> Self {
        let now = Utc::now();
        Archive {
            meta: ArchiveMetadata {
                version: SCHEMA_VERSION.to_string(),
                created: now,
                modified: now,
            },
            entries: Vec::new(),
        }
    }

    /// Save a calculation and its outcome at the front of the list.
    ///
    /// Returns the UUID assigned to the entry.
    pub fn save(&mut self, name: impl Into<String>, item: CalculationItem, outcome: CalculationOutcome) -> Uuid {
        let entry = ArchiveEntry {
            id: Uuid::new_v4(),
            name: name.into(),
            saved_at: Utc::now(),
            item,
            outcome,
        };
        let id = entry.id;
        info!(%id, name = %entry.name, kind = entry.item.calc_type(), "calculation archived");
        self.entries.insert(0, entry);
        self.touch();
        id
    }

    /// Evaluate `item` against `tables` and save it with the outcome.
    pub fn save_evaluated<T>(
        &mut self,
        name: impl Into<String>,
        item: CalculationItem,
        tables: &T,
    ) -> CalcResult<Uuid>
    where
        T: CableTables + ?Sized,
    {
        let outcome = item.evaluate(tables)?;
        Ok(self.save(name, item, outcome))
    }

    /// Remove an entry by UUID.
    ///
    /// Returns the removed entry if it existed.
    pub fn remove(&mut self, id: &Uuid) -> Option<ArchiveEntry> {
        let index = self.entries.iter().position(|e| &e.id == id)?;
        let entry = self.entries.remove(index);
        info!(%id, "archive entry deleted");
        self.touch();
        Some(entry)
    }

    /// Delete every entry.
    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            info!(count = self.entries.len(), "archive cleared");
            self.entries.clear();
            self.touch();
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<&ArchiveEntry> {
        self.entries.iter().find(|e| &e.id == id)
    }

    /// Find an entry by full UUID or by a unique prefix of its string form
    pub fn find(&self, key: &str) -> Option<&ArchiveEntry> {
        if let Ok(id) = Uuid::parse_str(key) {
            return self.get(&id);
        }
        let key = key.to_ascii_lowercase();
        let mut matches = self.entries.iter().filter(|e| e.id.to_string().starts_with(&key));
        match (matches.next(), matches.next()) {
            (Some(entry), None) => Some(entry),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Update the modified timestamp.
    pub fn touch(&mut self) {
        self.meta.modified = Utc::now();
    }
}

impl Default for Archive {
    fn default() -> Self {
        Archive::new()
    }
}

/// Archive metadata stored in the file header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveMetadata {
    /// Schema version (for migration compatibility)
    pub version: String,

    /// When the archive was created
    pub created: DateTime<Utc>,

    /// When the archive was last modified
    pub modified: DateTime<Utc>,
}

/// One saved calculation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub id: Uuid,

    /// Project or circuit name given when saving
    pub name: String,

    pub saved_at: DateTime<Utc>,

    pub item: CalculationItem,

    /// Outcome as computed when the entry was saved
    pub outcome: CalculationOutcome,
}
