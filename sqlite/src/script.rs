//! The rebuild script template used by column drop and column rename.
//!
//! The template is a JSON document holding the script as a list of lines:
//!
//! ```json
//! {
//!   "rebuild": [
//!     "CREATE TABLE {table}__shadow ({definitions});",
//!     "INSERT INTO {table}__shadow ({new_columns}) SELECT {old_columns} FROM {table};",
//!     "DROP TABLE {table};",
//!     "ALTER TABLE {table}__shadow RENAME TO {table};"
//!   ]
//! }
//! ```
//!
//! It has four slots, all of which must appear at least once:
//!
//! - `{definitions}`: column definitions of the new table shape
//! - `{new_columns}`: column list of the new shape (copy target)
//! - `{old_columns}`: matching column list of the current shape (copy source)
//! - `{table}`: name of the table being rebuilt
//!
//! A default template is compiled into the crate; [`RebuildScript::load`]
//! reads an override once at startup.

use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SqlDbError};

const DEFAULT_TEMPLATE: &str = include_str!("../scripts.json");

const SLOTS: [&str; 4] = ["{definitions}", "{new_columns}", "{old_columns}", "{table}"];

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScriptFile {
    rebuild: Vec<String>,
}

/// A validated four-slot rebuild script template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildScript {
    template: String,
}

impl RebuildScript {
    /// Returns the template compiled into the crate.
    pub fn embedded() -> Result<Self> {
        Self::from_json(DEFAULT_TEMPLATE)
    }

    /// Loads a template from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`SqlDbError::Io`] or [`SqlDbError::Json`] if the file cannot
    /// be read or parsed, and [`SqlDbError::Template`] if a slot is missing.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let parsed: ScriptFile = serde_json::from_reader(BufReader::new(file))?;
        Self::from_lines(parsed.rebuild)
    }

    /// Parses a template from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let parsed: ScriptFile = serde_json::from_str(json)?;
        Self::from_lines(parsed.rebuild)
    }

    /// Builds a template from individual script lines.
    pub fn from_lines<I, S>(lines: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let template = lines
            .into_iter()
            .map(|line| line.as_ref().to_string())
            .collect::<Vec<_>>()
            .join("\n");

        let missing: Vec<&str> = SLOTS
            .iter()
            .copied()
            .filter(|slot| !template.contains(slot))
            .collect();
        if !missing.is_empty() {
            return Err(SqlDbError::Template(format!(
                "missing slot(s): {}",
                missing.join(", ")
            )));
        }

        Ok(Self { template })
    }

    /// Fills the four slots and returns the executable script.
    ///
    /// Slots are substituted in a single pass, so slot-like text inside a
    /// substituted value (a quoted default, say) is left alone.
    pub fn render(
        &self,
        definitions: &str,
        new_columns: &str,
        old_columns: &str,
        table: &str,
    ) -> String {
        let values = [definitions, new_columns, old_columns, table];
        let mut out = String::with_capacity(self.template.len() + definitions.len() * 2);
        let mut rest = self.template.as_str();

        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            rest = &rest[start..];
            match SLOTS.iter().position(|slot| rest.starts_with(slot)) {
                Some(i) => {
                    out.push_str(values[i]);
                    rest = &rest[SLOTS[i].len()..];
                }
                None => {
                    out.push('{');
                    rest = &rest[1..];
                }
            }
        }
        out.push_str(rest);
        out
    }

    /// The raw template text.
    pub fn template(&self) -> &str {
        &self.template
    }
}
