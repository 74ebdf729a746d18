use crate::error::{ModError, Result};
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Section name -> ordered key/value pairs.
pub type Sections = IndexMap<String, IndexMap<String, String>>;

static SECTION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\[([^\[\]]+)\]\s*$").expect("Invalid section regex"));

static KEY_VALUE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z0-9_.\-]+)\s*=\s*(.*?)\s*$").expect("Invalid key/value regex")
});

static COMMENTED_SECTION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:;|#|//)+\s*(\[[^\[\]]+\])").expect("Invalid commented section regex")
});

/// Which game settings file a fragment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingsKind {
    /// Fragment of `user.settings`.
    User,
    /// Fragment of `input.settings`.
    Input,
}

/// A parsed `.settings`/`.txt` fragment shipped by a mod.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsFragment {
    pub source: String,
    pub kind: SettingsKind,
    pub content: String,
    pub sections: Sections,
}

impl SettingsFragment {
    /// Sanitize and parse raw fragment text.
    ///
    /// Fails with [`ModError::UnexpectedInput`] when a key appears before any
    /// section header or when no section survives sanitizing.
    pub fn parse(source: impl Into<String>, kind: SettingsKind, text: &str) -> Result<Self> {
        let source = source.into();
        let content = sanitize(text);
        let sections = parse_sections(&content).map_err(|message| ModError::UnexpectedInput {
            path: source.as_str().into(),
            message,
        })?;

        Ok(Self {
            source,
            kind,
            content,
            sections,
        })
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|keys| keys.get(key))
            .map(String::as_str)
    }
}

/// Keep only `[section]` headers (including commented-out ones) and
/// `key = value` lines. Fragments are often pasted from forum posts.
pub fn sanitize(text: &str) -> String {
    let mut kept = Vec::new();
    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if SECTION_LINE.is_match(line) || KEY_VALUE_LINE.is_match(line) {
            kept.push(line.trim().to_string());
        } else if let Some(caps) = COMMENTED_SECTION_LINE.captures(line) {
            kept.push(caps[1].to_string());
        }
    }
    kept.join("\n")
}

fn parse_sections(content: &str) -> std::result::Result<Sections, String> {
    let mut sections = Sections::new();
    let mut current: Option<String> = None;

    for (number, line) in content.lines().enumerate() {
        if let Some(caps) = SECTION_LINE.captures(line) {
            let name = caps[1].trim().to_string();
            sections.entry(name.clone()).or_default();
            current = Some(name);
        } else if let Some(caps) = KEY_VALUE_LINE.captures(line) {
            let Some(section) = current.as_ref() else {
                return Err(format!("line {}: key outside of any section", number + 1));
            };
            if let Some(keys) = sections.get_mut(section) {
                keys.insert(caps[1].to_string(), caps[2].to_string());
            }
        }
    }

    if sections.is_empty() {
        return Err("no settings section found".to_string());
    }
    Ok(sections)
}
