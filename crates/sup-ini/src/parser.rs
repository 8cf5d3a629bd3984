//! Line-oriented ini parser.

use crate::document::IniDocument;
use crate::error::IniError;

/// Parse ini text into a document.
pub(crate) fn parse(text: &str) -> Result<IniDocument, IniError> {
    let mut doc = IniDocument::new();
    let mut current_section: Option<String> = None;
    // Option that an indented line would continue.
    let mut current_key: Option<String> = None;

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            current_key = None;
            continue;
        }
        if trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }

        let indented = raw.starts_with(' ') || raw.starts_with('\t');
        if indented {
            if let (Some(section), Some(key)) = (&current_section, &current_key) {
                let section = doc.section_or_insert(section);
                let line = strip_inline_comment(trimmed);
                let value = match section.get(key) {
                    Some(existing) if !existing.is_empty() => format!("{}\n{}", existing, line),
                    _ => line.to_string(),
                };
                section.set(key.clone(), value);
                continue;
            }
        }

        if trimmed.starts_with('[') {
            let name = trimmed
                .strip_prefix('[')
                .and_then(|rest| rest.strip_suffix(']'))
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .ok_or_else(|| IniError::MalformedHeader {
                    line: line_no,
                    text: trimmed.to_string(),
                })?;
            doc.section_or_insert(name);
            current_section = Some(name.to_string());
            current_key = None;
            continue;
        }

        let split_at = trimmed
            .find(['=', ':'])
            .ok_or_else(|| IniError::MissingDelimiter {
                line: line_no,
                text: trimmed.to_string(),
            })?;
        let key = trimmed[..split_at].trim();
        let value = strip_inline_comment(trimmed[split_at + 1..].trim());
        if key.is_empty() {
            return Err(IniError::EmptyKey { line: line_no });
        }

        let section = current_section
            .as_deref()
            .ok_or_else(|| IniError::OptionOutsideSection {
                line: line_no,
                key: key.to_string(),
            })?;
        doc.set(section, key, value);
        current_key = Some(key.to_string());
    }

    Ok(doc)
}

/// Drop a `;` or `#` comment that follows whitespace inside a value.
fn strip_inline_comment(value: &str) -> &str {
    let mut prev_is_space = false;
    for (i, c) in value.char_indices() {
        if (c == ';' || c == '#') && prev_is_space {
            return value[..i].trim_end();
        }
        prev_is_space = c.is_whitespace();
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_sections() {
        let doc = parse(
            "[supervisord]\nnodaemon=true\n\n[program:web]\ncommand = python manage.py runserver\n",
        )
        .unwrap();

        assert_eq!(doc.section_names(), vec!["supervisord", "program:web"]);
        assert_eq!(doc.get("supervisord", "nodaemon"), Some("true"));
        assert_eq!(
            doc.get("program:web", "command"),
            Some("python manage.py runserver")
        );
    }

    #[test]
    fn test_first_delimiter_splits() {
        let doc = parse(
            "[rpcinterface:supervisor]\nsupervisor.rpcinterface_factory = supervisor.rpcinterface:make_main_rpcinterface\n[supervisorctl]\nserverurl=http://127.0.0.1:9001\nlogfile: /tmp/x=y\n",
        )
        .unwrap();

        assert_eq!(
            doc.get("rpcinterface:supervisor", "supervisor.rpcinterface_factory"),
            Some("supervisor.rpcinterface:make_main_rpcinterface")
        );
        assert_eq!(
            doc.get("supervisorctl", "serverurl"),
            Some("http://127.0.0.1:9001")
        );
        assert_eq!(doc.get("supervisorctl", "logfile"), Some("/tmp/x=y"));
    }

    #[test]
    fn test_keys_are_case_sensitive() {
        let doc = parse("[s]\nKey=1\nkey=2\n").unwrap();
        assert_eq!(doc.get("s", "Key"), Some("1"));
        assert_eq!(doc.get("s", "key"), Some("2"));
    }

    #[test]
    fn test_duplicate_key_last_wins() {
        let doc = parse("[s]\nk=1\nk=2\n").unwrap();
        assert_eq!(doc.get("s", "k"), Some("2"));
        assert_eq!(doc.section("s").unwrap().len(), 1);
    }

    #[test]
    fn test_reopened_section_is_additive() {
        let doc = parse("[s]\na=1\n[t]\nx=0\n[s]\nb=2\n").unwrap();
        assert_eq!(doc.section_names(), vec!["s", "t"]);
        assert_eq!(doc.get("s", "a"), Some("1"));
        assert_eq!(doc.get("s", "b"), Some("2"));
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let doc = parse("; leading comment\n# another\n\n[s]\n; inside\nk=v\n\n").unwrap();
        assert_eq!(doc.get("s", "k"), Some("v"));
        assert_eq!(doc.section("s").unwrap().len(), 1);
    }

    #[test]
    fn test_inline_comments_stripped() {
        let doc = parse(
            "[program:beat]\nexclude=true ; not used here\nautoreload=false\t# static\ncommand=run;fast #1\nenvironment=A=1, ; first\n    B=2 ; second\n",
        )
        .unwrap();
        assert_eq!(doc.get("program:beat", "exclude"), Some("true"));
        assert_eq!(doc.get("program:beat", "autoreload"), Some("false"));
        assert_eq!(doc.get("program:beat", "command"), Some("run;fast"));
        assert_eq!(doc.get("program:beat", "environment"), Some("A=1,\nB=2"));
    }

    #[test]
    fn test_continuation_lines() {
        let doc = parse("[program:w]\nenvironment=A=1,\n    B=2,\n\tC=3\ncommand=run\n").unwrap();
        assert_eq!(doc.get("program:w", "environment"), Some("A=1,\nB=2,\nC=3"));
        assert_eq!(doc.get("program:w", "command"), Some("run"));
    }

    #[test]
    fn test_indented_option_after_blank_line_is_new_option() {
        let doc = parse("[s]\na=1\n\n  b=2\n").unwrap();
        assert_eq!(doc.get("s", "a"), Some("1"));
        assert_eq!(doc.get("s", "b"), Some("2"));
    }

    #[test]
    fn test_empty_value_allowed() {
        let doc = parse("[supervisorctl]\n[s]\nk=\n").unwrap();
        assert!(doc.has_section("supervisorctl"));
        assert_eq!(doc.get("s", "k"), Some(""));
    }

    #[test]
    fn test_option_outside_section() {
        let err = parse("k=v\n[s]\n").unwrap_err();
        assert_eq!(
            err,
            IniError::OptionOutsideSection {
                line: 1,
                key: "k".to_string()
            }
        );
    }

    #[test]
    fn test_missing_delimiter() {
        let err = parse("[s]\nnot an option\n").unwrap_err();
        assert!(matches!(err, IniError::MissingDelimiter { line: 2, .. }));
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_malformed_header() {
        assert!(matches!(
            parse("[s\nk=v\n").unwrap_err(),
            IniError::MalformedHeader { line: 1, .. }
        ));
        assert!(matches!(
            parse("[ ]\n").unwrap_err(),
            IniError::MalformedHeader { line: 1, .. }
        ));
    }

    #[test]
    fn test_empty_key() {
        assert_eq!(parse("[s]\n=v\n").unwrap_err(), IniError::EmptyKey { line: 2 });
    }
}
