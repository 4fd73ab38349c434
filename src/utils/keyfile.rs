//! The `[Group]` / `Key=Value` file format
//!
//! Seat definitions, session definitions and display templates all use the
//! same desktop-entry-style format: named groups introduced by a `[Group
//! Name]` header, `Key=Value` pairs inside each group, `#` comment lines, and
//! `;`-separated list values with an optional trailing separator. [`KeyFile`]
//! is both the parsed representation of such a file and a builder for
//! writing one (used for state snapshots).
//!
//! Group and key order is preserved; looking up the *leading* group is how
//! callers recognize a file's kind.

use std::{fmt, io, path::Path};

use indexmap::IndexMap;

/// A parsed (or under-construction) key-value file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyFile {
    groups: IndexMap<String, IndexMap<String, String>>,
}

/// Errors produced while reading a key-value file.
#[derive(Debug, thiserror::Error)]
pub enum KeyFileError {
    /// The file could not be read.
    #[error("unable to read file: {0}")]
    Io(#[from] io::Error),
    /// A line was neither a group header, a key-value pair, a comment nor
    /// blank.
    #[error("malformed line {line}: {text:?}")]
    Malformed {
        /// 1-based line number.
        line: usize,
        /// The offending line.
        text: String,
    },
    /// A key-value pair appeared before the first group header.
    #[error("key outside of any group at line {line}")]
    KeyOutsideGroup {
        /// 1-based line number.
        line: usize,
    },
}

impl KeyFile {
    /// Creates an empty key file.
    pub fn new() -> KeyFile {
        KeyFile::default()
    }

    /// Reads and parses `path`.
    pub fn load(path: &Path) -> Result<KeyFile, KeyFileError> {
        let text = std::fs::read_to_string(path)?;
        KeyFile::parse(&text)
    }

    /// Parses the textual form.
    pub fn parse(text: &str) -> Result<KeyFile, KeyFileError> {
        let mut groups: IndexMap<String, IndexMap<String, String>> = IndexMap::new();
        let mut current: Option<String> = None;

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                groups.entry(name.to_owned()).or_default();
                current = Some(name.to_owned());
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let group = current
                    .as_deref()
                    .ok_or(KeyFileError::KeyOutsideGroup { line: index + 1 })?;
                groups
                    .entry(group.to_owned())
                    .or_default()
                    .insert(key.trim().to_owned(), value.trim().to_owned());
                continue;
            }

            return Err(KeyFileError::Malformed {
                line: index + 1,
                text: raw.to_owned(),
            });
        }

        Ok(KeyFile { groups })
    }

    /// Name of the first group in the file, if any.
    pub fn start_group(&self) -> Option<&str> {
        self.groups.keys().next().map(String::as_str)
    }

    /// The value of `key` in `group`.
    pub fn get(&self, group: &str, key: &str) -> Option<&str> {
        self.groups.get(group)?.get(key).map(String::as_str)
    }

    /// The boolean value of `key` in `group`.
    ///
    /// Recognizes `true`/`false` and `1`/`0`; anything else, including an
    /// absent key, reads as `false`.
    pub fn get_bool(&self, group: &str, key: &str) -> bool {
        matches!(self.get(group, key), Some("true") | Some("1"))
    }

    /// The `;`-separated list value of `key` in `group`.
    ///
    /// Empty segments (including one produced by a trailing separator) are
    /// dropped. An absent key yields an empty list.
    pub fn get_list(&self, group: &str, key: &str) -> Vec<String> {
        self.get(group, key)
            .map(|value| {
                value
                    .split(';')
                    .map(str::trim)
                    .filter(|segment| !segment.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The keys of `group`, in file order.
    pub fn keys(&self, group: &str) -> Vec<String> {
        self.groups
            .get(group)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Sets `key` in `group` to `value`, creating the group as needed.
    pub fn set(&mut self, group: &str, key: &str, value: &str) {
        self.groups
            .entry(group.to_owned())
            .or_default()
            .insert(key.to_owned(), value.to_owned());
    }
}

impl fmt::Display for KeyFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (group, entries)) in self.groups.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            writeln!(f, "[{group}]")?;
            for (key, value) in entries {
                writeln!(f, "{key}={value}")?;
            }
        }
        Ok(())
    }
}
