//! Eligible-extension predicate
//!
//! Decides which filesystem entries are candidates for processing. Matching
//! is a case-insensitive suffix match on the file name, so `notes.MD` and
//! `notes.md` are both eligible under the `md` extension.

use std::path::Path;

/// Set of eligible file extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionFilter {
    /// Lower-cased suffixes including the leading dot (".md")
    suffixes: Vec<String>,
}

impl ExtensionFilter {
    /// Build a filter from extensions with or without a leading dot
    ///
    /// Empty entries are dropped.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut suffixes: Vec<String> = extensions
            .into_iter()
            .map(|ext| normalize_extension(ext.as_ref()))
            .filter(|ext| !ext.is_empty())
            .map(|ext| format!(".{}", ext))
            .collect();
        suffixes.sort();
        suffixes.dedup();

        Self { suffixes }
    }

    /// True if the path's file name ends with one of the extensions
    pub fn matches(&self, path: &Path) -> bool {
        let Some(name) = path.file_name() else {
            return false;
        };
        let name = name.to_string_lossy().to_lowercase();
        self.suffixes.iter().any(|suffix| name.ends_with(suffix.as_str()))
    }

    /// Extensions without the leading dot
    pub fn extensions(&self) -> Vec<&str> {
        self.suffixes.iter().map(|s| &s[1..]).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.suffixes.is_empty()
    }
}

impl Default for ExtensionFilter {
    fn default() -> Self {
        Self::new(["md"])
    }
}

/// Strip a leading dot and lower-case an extension
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}
