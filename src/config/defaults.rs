//! Built-in defaults (layer 1)
//!
//! The first fragment of every merge. Rendered like any other fragment, so
//! it can react to `settings.DEBUG`.

/// Section whose options fill gaps in every program section.
pub const DEFAULTS_SECTION: &str = "program:__defaults__";

/// Section whose options are forced onto every program section.
pub const OVERRIDES_SECTION: &str = "program:__overrides__";

/// Prefix shared by all program sections.
pub const PROGRAM_PREFIX: &str = "program:";

/// Name of the built-in live-code watcher program.
pub const AUTORELOAD_PROGRAM: &str = "autoreload";

/// Option that drops a section from the merged result when true.
pub const EXCLUDE_OPTION: &str = "exclude";

/// Option marking a program for restart on code change.
pub const AUTORELOAD_OPTION: &str = "autoreload";

/// Options understood by the merge engine but not by the daemon.
pub const EXTENSION_OPTIONS: &[&str] = &[EXCLUDE_OPTION, AUTORELOAD_OPTION];

/// RPC interface factory installed when a config does not name one.
pub const RPCINTERFACE_FACTORY: &str = "supervisor.rpcinterface:make_main_rpcinterface";

/// Built-in default fragment template.
pub const BUILTIN_FRAGMENT: &str = r#"; Built-in process definitions.
[supervisord]
{% if settings.DEBUG %}
loglevel=debug
{% else %}
loglevel=info
{% endif %}

[supervisorctl]

[rpcinterface:supervisor]
supervisor.rpcinterface_factory=supervisor.rpcinterface:make_main_rpcinterface

[program:runserver]
command={{ PYTHON }} {{ PROJECT_DIR }}/manage.py runserver --noreload
directory={{ PROJECT_DIR }}
{% if not settings.DEBUG %}
exclude=true
{% endif %}

[program:autoreload]
command={{ SUPERVISOR_EXE }} {{ SUPERVISOR_OPTIONS }} autoreload
directory={{ PROJECT_DIR }}
autoreload=false
autorestart=true
startsecs=0
{% if not settings.DEBUG %}
exclude=true
{% endif %}

[program:__defaults__]
{% if settings.DEBUG %}
autoreload=true
{% endif %}
redirect_stderr=true
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{Renderer, TemplateContext};
    use sup_ini::IniDocument;

    fn render(debug: bool) -> IniDocument {
        let mut settings = toml::Table::new();
        settings.insert("DEBUG".to_string(), toml::Value::Boolean(debug));
        let ctx = TemplateContext::new("/srv/app", "/usr/bin/python3")
            .with_settings(&settings)
            .unwrap()
            .with_supervisor_exe("/usr/local/bin/proj-supervisor")
            .with_supervisor_options("--project-dir=/srv/app");
        let text = Renderer::new().render("builtin", BUILTIN_FRAGMENT, &ctx).unwrap();
        IniDocument::parse(&text).unwrap()
    }

    #[test]
    fn test_debug_defaults() {
        let doc = render(true);

        assert_eq!(doc.get("supervisord", "loglevel"), Some("debug"));
        assert_eq!(
            doc.get("program:runserver", "command"),
            Some("/usr/bin/python3 /srv/app/manage.py runserver --noreload")
        );
        assert_eq!(
            doc.get("program:autoreload", "command"),
            Some("/usr/local/bin/proj-supervisor --project-dir=/srv/app autoreload")
        );
        assert_eq!(doc.get("program:runserver", EXCLUDE_OPTION), None);
        assert_eq!(doc.get(DEFAULTS_SECTION, AUTORELOAD_OPTION), Some("true"));
        assert_eq!(doc.get(DEFAULTS_SECTION, "redirect_stderr"), Some("true"));
    }

    #[test]
    fn test_production_defaults() {
        let doc = render(false);

        assert_eq!(doc.get("supervisord", "loglevel"), Some("info"));
        assert_eq!(doc.get("program:runserver", EXCLUDE_OPTION), Some("true"));
        assert_eq!(doc.get("program:autoreload", EXCLUDE_OPTION), Some("true"));
        assert_eq!(doc.get(DEFAULTS_SECTION, AUTORELOAD_OPTION), None);
    }

    #[test]
    fn test_control_sections_present() {
        let doc = render(true);
        assert!(doc.has_section("supervisorctl"));
        assert_eq!(
            doc.get("rpcinterface:supervisor", "supervisor.rpcinterface_factory"),
            Some(RPCINTERFACE_FACTORY)
        );
    }
}
