//! Module census
//!
//! Partitions a module loader's registry into modules that have finished
//! initializing and modules still waiting, and renders the loaded set as a
//! `module.exports = [...];` literal for an operator to paste into a
//! module-path list. The registry is passed in explicitly; nothing here
//! reaches into a live runtime.

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;
use tracing::info;

/// One registry row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleEntry {
    pub identifier: String,
    pub is_initialized: bool,
    pub verbose_name: String,
}

/// Registry status as serialized by the module loader
#[derive(Debug, Deserialize)]
struct EntryStatus {
    #[serde(rename = "isInitialized")]
    is_initialized: bool,
    /// Only present in development builds of the registry
    #[serde(rename = "verboseName", default)]
    verbose_name: Option<String>,
}

/// Registry snapshot in its own iteration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleTable {
    entries: Vec<ModuleEntry>,
}

impl ModuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, identifier: impl Into<String>, is_initialized: bool, verbose_name: impl Into<String>) {
        self.entries.push(ModuleEntry {
            identifier: identifier.into(),
            is_initialized,
            verbose_name: verbose_name.into(),
        });
    }

    /// Parse a JSON object keyed by module identifier, keeping document order
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn entries(&self) -> &[ModuleEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<ModuleEntry> for ModuleTable {
    fn from_iter<I: IntoIterator<Item = ModuleEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'de> Deserialize<'de> for ModuleTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = ModuleTable;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of module identifier to module status")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((identifier, status)) = map.next_entry::<String, EntryStatus>()? {
                    let verbose_name = status.verbose_name.unwrap_or_else(|| identifier.clone());
                    entries.push(ModuleEntry {
                        identifier,
                        is_initialized: status.is_initialized,
                        verbose_name,
                    });
                }
                Ok(ModuleTable { entries })
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

/// Loaded and waiting module names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Census {
    /// Sorted ascending
    pub loaded: Vec<String>,
    /// Registry order
    pub waiting: Vec<String>,
}

impl Census {
    pub fn take(table: &ModuleTable) -> Self {
        let (loaded, waiting): (Vec<&ModuleEntry>, Vec<&ModuleEntry>) =
            table.entries().iter().partition(|entry| entry.is_initialized);

        let mut loaded: Vec<String> = loaded.into_iter().map(|e| e.verbose_name.clone()).collect();
        loaded.sort();

        Self {
            loaded,
            waiting: waiting.into_iter().map(|e| e.verbose_name.clone()).collect(),
        }
    }

    /// `module.exports = [...];` with the loaded names, two-space indented
    pub fn exports_literal(&self) -> Result<String, serde_json::Error> {
        Ok(format!(
            "module.exports = {};",
            serde_json::to_string_pretty(&self.loaded)?
        ))
    }

    pub fn log_summary(&self) {
        info!(
            loaded = self.loaded.len(),
            waiting = self.waiting.len(),
            "loaded: {} waiting: {}",
            self.loaded.len(),
            self.waiting.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_and_literal() {
        let mut table = ModuleTable::new();
        table.push("0", true, "C");
        table.push("1", false, "B");
        table.push("2", true, "A");

        let census = Census::take(&table);
        assert_eq!(census.loaded, vec!["A", "C"]);
        assert_eq!(census.waiting, vec!["B"]);
        assert_eq!(
            census.exports_literal().unwrap(),
            "module.exports = [\n  \"A\",\n  \"C\"\n];"
        );
    }

    #[test]
    fn test_waiting_keeps_registry_order() {
        let table = ModuleTable::from_json(
            r#"{
                "12": { "isInitialized": false, "verboseName": "node_modules/zeta/index.js" },
                "3": { "isInitialized": false, "verboseName": "node_modules/alpha/index.js" },
                "7": { "isInitialized": true, "verboseName": "App.tsx" }
            }"#,
        )
        .unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.entries()[0].identifier, "12");

        let census = Census::take(&table);
        assert_eq!(
            census.waiting,
            vec!["node_modules/zeta/index.js", "node_modules/alpha/index.js"]
        );
        assert_eq!(census.loaded, vec!["App.tsx"]);
    }

    #[test]
    fn test_missing_verbose_name_falls_back_to_identifier() {
        let table = ModuleTable::from_json(
            r#"{ "42": { "isInitialized": true, "dependencyMap": [1, 2], "hasError": false } }"#,
        )
        .unwrap();
        assert_eq!(table.entries()[0].verbose_name, "42");
    }

    #[test]
    fn test_empty_table() {
        let census = Census::take(&ModuleTable::new());
        assert!(census.loaded.is_empty());
        assert!(census.waiting.is_empty());
        assert_eq!(census.exports_literal().unwrap(), "module.exports = [];");
    }

    #[test]
    fn test_names_are_escaped() {
        let table: ModuleTable = vec![ModuleEntry {
            identifier: "1".to_string(),
            is_initialized: true,
            verbose_name: "weird \"name\".js".to_string(),
        }]
        .into_iter()
        .collect();

        let literal = Census::take(&table).exports_literal().unwrap();
        assert_eq!(literal, "module.exports = [\n  \"weird \\\"name\\\".js\"\n];");
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(ModuleTable::from_json("[1, 2, 3]").is_err());
    }
}
