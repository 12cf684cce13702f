use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, SimError};

// =============================================================================
// Reaction metadata
// =============================================================================

/// Metadata for one reaction, in the same position as its embedding vector.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReactionRecord {
    /// Database identifier, e.g. `rxn00001`.
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub abbreviation: String,
    /// Enzyme Commission numbers, most specific assignment first.
    #[serde(default)]
    pub ec_numbers: Vec<String>,
    /// Direction marker: `>`, `<`, `=` or `?`.
    #[serde(default)]
    pub reversibility: String,
    /// Gibbs free energy change, if estimated.
    #[serde(default)]
    pub deltag: Option<f64>,
    #[serde(default)]
    pub deltagerr: Option<f64>,
    #[serde(default)]
    pub definition: String,
    #[serde(default)]
    pub is_transport: bool,
    /// Reaction SMILES (`reactants>>products`), the input to the embedding model.
    #[serde(default)]
    pub rxn_smiles: String,
}

impl ReactionRecord {
    /// The first listed EC number, if any.
    pub fn primary_ec(&self) -> Option<&str> {
        self.ec_numbers.first().map(String::as_str)
    }

    /// Whether the primary EC number starts with `prefix`.
    ///
    /// Reactions without an EC assignment never match.
    pub fn has_ec_prefix(&self, prefix: &str) -> bool {
        self.primary_ec().is_some_and(|ec| ec.starts_with(prefix))
    }
}

/// Validated, position-indexed collection of reaction records.
///
/// Position `i` in the table corresponds to identifier `i` in the vector
/// store built from the same batch.
#[derive(Clone, Debug, Default)]
pub struct ReactionTable {
    records: Vec<ReactionRecord>,
    positions: HashMap<String, usize>,
}

impl ReactionTable {
    /// Build a table, checking that every record has a non-empty, unique id.
    pub fn new(records: Vec<ReactionRecord>) -> Result<Self> {
        let mut positions = HashMap::with_capacity(records.len());
        for (pos, record) in records.iter().enumerate() {
            if record.id.trim().is_empty() {
                return Err(SimError::InvalidMetadata(format!(
                    "record at position {} has an empty id",
                    pos
                )));
            }
            if let Some(prev) = positions.insert(record.id.clone(), pos) {
                return Err(SimError::InvalidMetadata(format!(
                    "duplicate reaction id {} at positions {} and {}",
                    record.id, prev, pos
                )));
            }
        }
        Ok(Self { records, positions })
    }

    /// Load a table from a JSON array of records.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let records: Vec<ReactionRecord> = serde_json::from_str(&content)?;
        let table = Self::new(records)?;
        info!(
            reactions = table.len(),
            path = %path.display(),
            "Reaction metadata loaded"
        );
        Ok(table)
    }

    /// Write the table as a pretty-printed JSON array.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.records)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&ReactionRecord> {
        self.records.get(position)
    }

    /// Position of the reaction with the given database id.
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn records(&self) -> &[ReactionRecord] {
        &self.records
    }
}
