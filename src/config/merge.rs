//! Program-section merge rules
//!
//! Applied to the folded document in this order:
//! - `__defaults__`: fill missing options (never overwrite)
//! - `__overrides__`: force-set options
//! - `exclude`: drop sections whose `exclude` option is true
//! - validation: every remaining program needs a non-empty `command`

use sup_ini::{parse_bool, IniDocument, Section};

use super::defaults::{
    AUTORELOAD_OPTION, AUTORELOAD_PROGRAM, DEFAULTS_SECTION, EXCLUDE_OPTION, EXTENSION_OPTIONS,
    OVERRIDES_SECTION, PROGRAM_PREFIX,
};
use super::effective::ConfigError;

/// Program name for a `program:<name>` section, if it is one
pub fn program_name(section: &str) -> Option<&str> {
    section.strip_prefix(PROGRAM_PREFIX)
}

fn is_program(section: &Section) -> bool {
    section.name().starts_with(PROGRAM_PREFIX)
        && section.name() != DEFAULTS_SECTION
        && section.name() != OVERRIDES_SECTION
}

/// Fill options from `program:__defaults__` into every program section
/// lacking them, then remove the meta-section.
pub fn apply_defaults(doc: &mut IniDocument) {
    let Some(defaults) = doc.remove_section(DEFAULTS_SECTION) else {
        return;
    };
    for section in doc.sections_mut().filter(|s| is_program(s)) {
        for (key, value) in defaults.iter() {
            section.set_if_missing(key, value);
        }
    }
}

/// Force options from `program:__overrides__` onto every program section,
/// then remove the meta-section.
pub fn apply_overrides(doc: &mut IniDocument) {
    let Some(overrides) = doc.remove_section(OVERRIDES_SECTION) else {
        return;
    };
    for section in doc.sections_mut().filter(|s| is_program(s)) {
        for (key, value) in overrides.iter() {
            section.set(key, value);
        }
    }
}

/// Drop every section whose `exclude` option is true.
///
/// Returns the names of the dropped sections.
pub fn drop_excluded(doc: &mut IniDocument) -> Result<Vec<String>, ConfigError> {
    let mut excluded = Vec::new();
    for section in doc.sections() {
        let Some(value) = section.get(EXCLUDE_OPTION) else {
            continue;
        };
        match parse_bool(value) {
            Some(true) => excluded.push(section.name().to_string()),
            Some(false) => {}
            None => {
                return Err(ConfigError::ValidationError(format!(
                    "[{}]: '{}' is not a valid boolean for option '{}'",
                    section.name(),
                    value,
                    EXCLUDE_OPTION
                )))
            }
        }
    }

    doc.retain_sections(|s| !excluded.iter().any(|name| name == s.name()));
    Ok(excluded)
}

/// Check that every program section has a non-empty `command`.
pub fn validate_programs(doc: &IniDocument) -> Result<(), ConfigError> {
    for section in doc.sections().filter(|s| is_program(s)) {
        let has_command = section
            .get("command")
            .map(|c| !c.trim().is_empty())
            .unwrap_or(false);
        if !has_command {
            let name = program_name(section.name()).unwrap_or(section.name());
            return Err(ConfigError::ValidationError(format!(
                "program '{}' has no command",
                name
            )));
        }
    }
    Ok(())
}

/// Names of all live program sections, in order
pub fn program_names(doc: &IniDocument) -> Vec<String> {
    doc.sections()
        .filter(|s| is_program(s))
        .filter_map(|s| program_name(s.name()))
        .map(str::to_string)
        .collect()
}

/// Programs whose `autoreload` option is true, in order
pub fn autoreload_targets(doc: &IniDocument) -> Vec<String> {
    doc.sections()
        .filter(|s| is_program(s))
        .filter(|s| s.get(AUTORELOAD_OPTION).and_then(parse_bool).unwrap_or(false))
        .filter_map(|s| program_name(s.name()))
        .map(str::to_string)
        .collect()
}

/// Drop the watcher program when no program opted into autoreload.
///
/// Returns the dropped section name.
pub fn drop_idle_watcher(doc: &mut IniDocument) -> Option<String> {
    let section = format!("{}{}", PROGRAM_PREFIX, AUTORELOAD_PROGRAM);
    if !doc.has_section(&section) || !autoreload_targets(doc).is_empty() {
        return None;
    }
    doc.remove_section(&section).map(|s| s.name().to_string())
}

/// Remove options that only the merge engine understands
pub fn strip_extension_options(doc: &mut IniDocument) {
    for section in doc.sections_mut() {
        for option in EXTENSION_OPTIONS {
            section.remove(option);
        }
    }
}
