//! Ordered ini document model
//!
//! Sections keep the order in which they first appeared, and options keep
//! the order in which they were first set. Overwriting an option replaces
//! its value in place.

use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::IniError;
use crate::parser;

/// A named group of options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    name: String,
    options: Vec<(String, String)>,
}

impl Section {
    /// Create an empty section.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: Vec::new(),
        }
    }

    /// Section name as written between the brackets.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up an option value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Whether the option is set, regardless of its value.
    pub fn contains(&self, key: &str) -> bool {
        self.options.iter().any(|(k, _)| k == key)
    }

    /// Set an option, replacing any existing value in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.options.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.options.push((key, value)),
        }
    }

    /// Set an option only when it is absent. Returns true if it was set.
    pub fn set_if_missing(&mut self, key: &str, value: &str) -> bool {
        if self.contains(key) {
            return false;
        }
        self.options.push((key.to_string(), value.to_string()));
        true
    }

    /// Remove an option, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.options.iter().position(|(k, _)| k == key)?;
        Some(self.options.remove(index).1)
    }

    /// Iterate options in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.options.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Overlay another section's options onto this one, key by key.
    fn overlay(&mut self, other: Section) {
        for (key, value) in other.options {
            self.set(key, value);
        }
    }
}

/// An ordered collection of sections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniDocument {
    sections: Vec<Section>,
}

impl IniDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse ini text.
    ///
    /// A repeated section header reopens the earlier section; a repeated
    /// option within the text keeps the last value.
    pub fn parse(text: &str) -> Result<Self, IniError> {
        parser::parse(text)
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn section_mut(&mut self, name: &str) -> Option<&mut Section> {
        self.sections.iter_mut().find(|s| s.name == name)
    }

    /// Get a section, appending an empty one if it does not exist yet.
    pub fn section_or_insert(&mut self, name: &str) -> &mut Section {
        let index = match self.sections.iter().position(|s| s.name == name) {
            Some(index) => index,
            None => {
                self.sections.push(Section::new(name));
                self.sections.len() - 1
            }
        };
        &mut self.sections[index]
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.section(name).is_some()
    }

    /// Look up `section.key`.
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section).and_then(|s| s.get(key))
    }

    /// Set `section.key`, creating the section if needed.
    pub fn set(&mut self, section: &str, key: impl Into<String>, value: impl Into<String>) {
        self.section_or_insert(section).set(key, value);
    }

    /// Set `section.key` only when absent, creating the section if needed.
    pub fn set_if_missing(&mut self, section: &str, key: &str, value: &str) -> bool {
        self.section_or_insert(section).set_if_missing(key, value)
    }

    pub fn remove_section(&mut self, name: &str) -> Option<Section> {
        let index = self.sections.iter().position(|s| s.name == name)?;
        Some(self.sections.remove(index))
    }

    /// Keep only the sections for which the predicate holds.
    pub fn retain_sections<F>(&mut self, f: F)
    where
        F: FnMut(&Section) -> bool,
    {
        self.sections.retain(f);
    }

    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    pub fn sections_mut(&mut self) -> impl Iterator<Item = &mut Section> {
        self.sections.iter_mut()
    }

    pub fn section_names(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Fold a later document into this one.
    ///
    /// Merge semantics:
    /// - Sections: additive (options from both survive)
    /// - Options: the later document wins per key
    /// - New sections are appended in the order they appear in `later`
    pub fn fold(&mut self, later: IniDocument) {
        for section in later.sections {
            match self.section_mut(&section.name) {
                Some(existing) => existing.overlay(section),
                None => self.sections.push(section),
            }
        }
    }

    /// Fold a sequence of documents left to right.
    pub fn fold_all<I>(documents: I) -> IniDocument
    where
        I: IntoIterator<Item = IniDocument>,
    {
        documents.into_iter().fold(IniDocument::new(), |mut acc, doc| {
            acc.fold(doc);
            acc
        })
    }
}

/// Serializes in ini syntax. Multi-line values become indented
/// continuation lines. A blank continuation line cannot be written (the
/// parser reads it as the end of the value), so blank lines inside a value
/// are dropped and the remaining lines are kept.
impl fmt::Display for IniDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, section) in self.sections.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "[{}]", section.name)?;
            for (key, value) in &section.options {
                let mut lines = value.split('\n');
                writeln!(f, "{}={}", key, lines.next().unwrap_or_default())?;
                for line in lines.filter(|l| !l.trim().is_empty()) {
                    writeln!(f, "    {}", line)?;
                }
            }
        }
        Ok(())
    }
}

struct OptionsRef<'a>(&'a Section);

impl Serialize for OptionsRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in self.0.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl Serialize for IniDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.sections.len()))?;
        for section in &self.sections {
            map.serialize_entry(&section.name, &OptionsRef(section))?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> IniDocument {
        IniDocument::parse(text).unwrap()
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut section = Section::new("program:web");
        section.set("command", "a");
        section.set("user", "alice");
        section.set("command", "b");

        let keys: Vec<_> = section.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["command", "user"]);
        assert_eq!(section.get("command"), Some("b"));
    }

    #[test]
    fn test_set_if_missing_keeps_existing() {
        let mut section = Section::new("program:web");
        section.set("user", "alice");

        assert!(!section.set_if_missing("user", "nobody"));
        assert!(section.set_if_missing("redirect_stderr", "true"));
        assert_eq!(section.get("user"), Some("alice"));
        assert_eq!(section.get("redirect_stderr"), Some("true"));
    }

    #[test]
    fn test_fold_is_per_key() {
        let mut base = doc("[program:a]\ncommand=x\nuser=alice\n");
        base.fold(doc("[program:a]\nuser=bob\n"));

        assert_eq!(base.get("program:a", "command"), Some("x"));
        assert_eq!(base.get("program:a", "user"), Some("bob"));
    }

    #[test]
    fn test_fold_appends_new_sections_in_order() {
        let mut base = doc("[a]\nk=1\n");
        base.fold(doc("[c]\nk=3\n[b]\nk=2\n[a]\nj=0\n"));

        assert_eq!(base.section_names(), vec!["a", "c", "b"]);
        assert_eq!(base.get("a", "j"), Some("0"));
    }

    #[test]
    fn test_disjoint_sections_union_regardless_of_order() {
        let f1 = doc("[x]\nk=1\n");
        let f2 = doc("[y]\nk=2\n");

        let ab = IniDocument::fold_all(vec![f1.clone(), f2.clone()]);
        let ba = IniDocument::fold_all(vec![f2, f1]);

        for merged in [&ab, &ba] {
            assert_eq!(merged.get("x", "k"), Some("1"));
            assert_eq!(merged.get("y", "k"), Some("2"));
        }
    }

    #[test]
    fn test_last_fragment_wins_for_shared_key() {
        let fragments = ["[s]\nk=1\n", "[s]\nk=2\n", "[s]\nk=3\n"];
        let merged = IniDocument::fold_all(fragments.iter().map(|t| doc(t)));
        assert_eq!(merged.get("s", "k"), Some("3"));

        let reversed = IniDocument::fold_all(fragments.iter().rev().map(|t| doc(t)));
        assert_eq!(reversed.get("s", "k"), Some("1"));
    }

    #[test]
    fn test_display_layout() {
        let mut d = IniDocument::new();
        d.set("supervisord", "nodaemon", "true");
        d.set("program:web", "command", "run");
        d.set("program:web", "environment", "A=1,\nB=2");

        let text = d.to_string();
        assert_eq!(
            text,
            "[supervisord]\nnodaemon=true\n\n[program:web]\ncommand=run\nenvironment=A=1,\n    B=2\n"
        );
        assert_eq!(doc(&text), d);
    }

    #[test]
    fn test_display_skips_blank_continuation_lines() {
        let mut d = IniDocument::new();
        d.set("program:worker", "environment", "A=1,\n\n   \nB=2");
        d.set("program:worker", "command", "celery");

        let text = d.to_string();
        assert_eq!(text, "[program:worker]\nenvironment=A=1,\n    B=2\ncommand=celery\n");

        let reparsed = doc(&text);
        assert_eq!(reparsed.get("program:worker", "environment"), Some("A=1,\nB=2"));
        assert_eq!(reparsed.get("program:worker", "command"), Some("celery"));
    }

    #[test]
    fn test_remove_and_retain() {
        let mut d = doc("[a]\nk=1\n[b]\nk=2\n[c]\nk=3\n");
        assert!(d.remove_section("b").is_some());
        assert!(d.remove_section("b").is_none());

        d.retain_sections(|s| s.name() != "c");
        assert_eq!(d.section_names(), vec!["a"]);
    }

    #[test]
    fn test_serialize_as_ordered_map() {
        let d = doc("[z]\nb=2\na=1\n[a]\nk=v\n");
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, r#"{"z":{"b":"2","a":"1"},"a":{"k":"v"}}"#);
    }
}
