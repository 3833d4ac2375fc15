//! Ordered, comment-preserving property file model
//!
//! Device property files (`build.prop` and friends) are hand-maintained:
//! comments and blank lines carry meaning for whoever reads them next, so
//! a plain key/value map would destroy the file on rewrite. This model
//! keeps every line as an [`Entry`] in original order and only normalizes
//! the `key=value` form on output.
//!
//! The dialect is the property-file flavor these devices use: `#` or `!`
//! start a comment, the key ends at the first unescaped `=`, `:`, or
//! whitespace run, backslash continues a line, and `\t` `\n` `\r` `\f`
//! `\\` `\uXXXX` escapes are decoded on load. Malformed escapes are kept
//! verbatim rather than rejected; these files come from devices, not from
//! validators.

use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// One line of a property file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// A `key=value` line.
    Property { key: String, value: String },
    /// A comment line, stored verbatim including its leading `#`/`!`.
    Comment(String),
    /// An empty line.
    Blank,
}

/// An ordered property file. Property lookups see only `Property`
/// entries; comments and blanks ride along for round-trip output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyFile {
    entries: Vec<Entry>,
    modified: bool,
}

impl PropertyFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and parse a property file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| Error::PropertyLoad {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&text))
    }

    /// Parse property file text. Never fails; see the module notes on
    /// lenient escape handling.
    pub fn parse(text: &str) -> Self {
        let mut entries = Vec::new();
        let mut lines = text.lines();
        while let Some(raw) = lines.next() {
            let line = raw.trim_start_matches([' ', '\t', '\u{c}']);
            if line.is_empty() {
                entries.push(Entry::Blank);
                continue;
            }
            if line.starts_with('#') || line.starts_with('!') {
                entries.push(Entry::Comment(line.to_string()));
                continue;
            }

            // Assemble the logical line across backslash continuations.
            let mut logical = line.to_string();
            while has_continuation(&logical) {
                logical.pop();
                match lines.next() {
                    Some(next) => {
                        logical.push_str(next.trim_start_matches([' ', '\t', '\u{c}']))
                    }
                    None => break,
                }
            }

            let (key, value) = split_key_value(&logical);
            entries.push(Entry::Property {
                key: decode_escapes(key),
                value: decode_escapes(value),
            });
        }
        Self {
            entries,
            modified: false,
        }
    }

    /// Serialize back to disk.
    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_string()).map_err(|source| Error::PropertyStore {
            path: path.to_path_buf(),
            source,
        })
    }

    /// All entries in file order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Number of property entries (comments and blanks excluded).
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, Entry::Property { .. }))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value of the first property with the given key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.iter().find_map(|e| match e {
            Entry::Property { key: k, value } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    /// Keys of all property entries in file order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|e| match e {
            Entry::Property { key, .. } => Some(key.as_str()),
            _ => None,
        })
    }

    /// Set a property value, replacing the first existing entry with that
    /// key in place or appending a new one at the end of the file.
    pub fn set(&mut self, key: &str, value: &str) {
        for entry in &mut self.entries {
            if let Entry::Property { key: k, value: v } = entry {
                if k == key {
                    if v != value {
                        *v = value.to_string();
                        self.modified = true;
                    }
                    return;
                }
            }
        }
        self.entries.push(Entry::Property {
            key: key.to_string(),
            value: value.to_string(),
        });
        self.modified = true;
    }

    /// Remove the first property with the given key. Comments and blank
    /// lines around it are left untouched.
    pub fn remove(&mut self, key: &str) -> bool {
        let position = self.entries.iter().position(
            |e| matches!(e, Entry::Property { key: k, .. } if k == key),
        );
        match position {
            Some(i) => {
                self.entries.remove(i);
                self.modified = true;
                true
            }
            None => false,
        }
    }

    /// Whether the file has been changed since load.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn clear_modified(&mut self) {
        self.modified = false;
    }
}

impl fmt::Display for PropertyFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            match entry {
                Entry::Property { key, value } => {
                    writeln!(f, "{}={}", encode(key, true), encode(value, false))?
                }
                Entry::Comment(text) => writeln!(f, "{text}")?,
                Entry::Blank => writeln!(f)?,
            }
        }
        Ok(())
    }
}

/// A line whose trailing backslashes are odd in number continues on the
/// next line.
fn has_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|&c| c == '\\').count() % 2 == 1
}

/// Split a logical line at the first unescaped separator. The value skips
/// leading whitespace plus at most one `=`/`:` when the key was ended by
/// whitespace alone.
fn split_key_value(line: &str) -> (&str, &str) {
    let mut prev_backslash = false;
    let mut split: Option<(usize, char)> = None;
    for (i, c) in line.char_indices() {
        match c {
            '=' | ':' | ' ' | '\t' | '\u{c}' if !prev_backslash => {
                split = Some((i, c));
                break;
            }
            '\\' => prev_backslash = !prev_backslash,
            _ => prev_backslash = false,
        }
    }
    let Some((at, sep)) = split else {
        return (line, "");
    };

    let key = &line[..at];
    let rest = &line[at + sep.len_utf8()..];
    let mut seen_separator = sep == '=' || sep == ':';
    let mut value_start = rest.len();
    for (i, c) in rest.char_indices() {
        match c {
            ' ' | '\t' | '\u{c}' => continue,
            '=' | ':' if !seen_separator => {
                seen_separator = true;
                continue;
            }
            _ => {
                value_start = i;
                break;
            }
        }
    }
    (key, &rest[value_start..])
}

/// Decode `\t` `\n` `\r` `\f` `\\` and `\uXXXX`; an escaped other
/// character becomes itself. Malformed `\uXXXX` sequences and a trailing
/// backslash are preserved verbatim.
fn decode_escapes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('u') => {
                let hex: String = chars.clone().take(4).collect();
                let decoded = (hex.len() == 4 && hex.bytes().all(|b| b.is_ascii_hexdigit()))
                    .then(|| u32::from_str_radix(&hex, 16).ok())
                    .flatten()
                    .and_then(char::from_u32);
                match decoded {
                    Some(ch) => {
                        out.push(ch);
                        for _ in 0..4 {
                            chars.next();
                        }
                    }
                    None => out.push_str("\\u"),
                }
            }
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Escape control characters and backslashes; spaces are escaped
/// throughout keys but only in leading position for values.
fn encode(s: &str, escape_space: bool) -> String {
    let mut out = String::with_capacity(s.len());
    for (i, c) in s.chars().enumerate() {
        match c {
            ' ' if i == 0 || escape_space => out.push_str("\\ "),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{c}' => out.push_str("\\f"),
            '\\' => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out
}
