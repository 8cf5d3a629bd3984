//! Command-line options as a config fragment (layer 4)
//!
//! CLI flags are turned into ordinary ini text and folded in after every
//! file fragment, so they go through exactly the same merge path.

use std::path::PathBuf;

use sup_ini::boolean::format_bool;
use sup_ini::IniDocument;

use super::defaults::{AUTORELOAD_OPTION, AUTORELOAD_PROGRAM, DEFAULTS_SECTION, EXCLUDE_OPTION};

/// Options accepted on the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupervisorOptions {
    /// Run the daemon in the background
    pub daemonize: bool,

    /// Daemon pid file
    pub pidfile: Option<String>,

    /// Daemon log file
    pub logfile: Option<String>,

    /// Explicit project directory
    pub project_dir: Option<PathBuf>,

    /// Programs to start automatically
    pub launch: Vec<String>,

    /// Programs not to start automatically
    pub nolaunch: Vec<String>,

    /// Programs to keep even if a fragment excludes them
    pub include: Vec<String>,

    /// Programs to drop from the config
    pub exclude: Vec<String>,

    /// Programs to restart on code change (all others are not)
    pub autoreload: Vec<String>,

    /// Disable the autoreload program entirely
    pub noreload: bool,
}

fn program(name: &str) -> String {
    format!("program:{}", name)
}

impl SupervisorOptions {
    /// Translate into a config document.
    ///
    /// Emission order matters where options collide: `exclude` is applied
    /// after `include`, and `noreload` after `autoreload`.
    pub fn to_document(&self) -> IniDocument {
        let mut doc = IniDocument::new();

        doc.set("supervisord", "nodaemon", format_bool(!self.daemonize));
        if let Some(pidfile) = self.pidfile.as_deref().filter(|p| !p.is_empty()) {
            doc.set("supervisord", "pidfile", pidfile);
        }
        if let Some(logfile) = self.logfile.as_deref().filter(|l| !l.is_empty()) {
            doc.set("supervisord", "logfile", logfile);
        }

        for name in &self.launch {
            doc.set(&program(name), "autostart", format_bool(true));
        }
        for name in &self.nolaunch {
            doc.set(&program(name), "autostart", format_bool(false));
        }
        for name in &self.include {
            doc.set(&program(name), EXCLUDE_OPTION, format_bool(false));
        }
        for name in &self.exclude {
            doc.set(&program(name), EXCLUDE_OPTION, format_bool(true));
        }

        if !self.autoreload.is_empty() {
            doc.set(&program(AUTORELOAD_PROGRAM), EXCLUDE_OPTION, format_bool(false));
            doc.set(DEFAULTS_SECTION, AUTORELOAD_OPTION, format_bool(false));
            for name in &self.autoreload {
                doc.set(&program(name), AUTORELOAD_OPTION, format_bool(true));
            }
        }
        if self.noreload {
            doc.set(&program(AUTORELOAD_PROGRAM), EXCLUDE_OPTION, format_bool(true));
        }

        doc
    }

    /// Translate into fragment text
    pub fn translate(&self) -> String {
        self.to_document().to_string()
    }

    /// The options as command-line flags, in a stable order
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.daemonize {
            args.push("--daemonize".to_string());
        }
        if let Some(pidfile) = &self.pidfile {
            args.push(format!("--pidfile={}", pidfile));
        }
        if let Some(logfile) = &self.logfile {
            args.push(format!("--logfile={}", logfile));
        }
        if let Some(dir) = &self.project_dir {
            args.push(format!("--project-dir={}", dir.display()));
        }
        let repeated = [
            ("launch", &self.launch),
            ("nolaunch", &self.nolaunch),
            ("include", &self.include),
            ("exclude", &self.exclude),
            ("autoreload", &self.autoreload),
        ];
        for (flag, names) in repeated {
            for name in names {
                args.push(format!("--{}={}", flag, name));
            }
        }
        if self.noreload {
            args.push("--noreload".to_string());
        }
        args
    }

    /// Flags joined into one shell-safe string (the SUPERVISOR_OPTIONS variable)
    pub fn to_command_line(&self) -> String {
        self.to_args()
            .iter()
            .map(|arg| shell_quote(arg))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_=./:,@+%".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_default_stays_in_foreground() {
        let doc = SupervisorOptions::default().to_document();
        assert_eq!(doc.get("supervisord", "nodaemon"), Some("true"));
        assert_eq!(doc.section_names(), vec!["supervisord"]);
    }

    #[test]
    fn test_daemonize() {
        let opts = SupervisorOptions {
            daemonize: true,
            ..Default::default()
        };
        assert_eq!(opts.to_document().get("supervisord", "nodaemon"), Some("false"));
    }

    #[test]
    fn test_pidfile_and_logfile_only_when_non_empty() {
        let opts = SupervisorOptions {
            pidfile: Some("/run/sup.pid".to_string()),
            logfile: Some(String::new()),
            ..Default::default()
        };
        let doc = opts.to_document();
        assert_eq!(doc.get("supervisord", "pidfile"), Some("/run/sup.pid"));
        assert_eq!(doc.get("supervisord", "logfile"), None);
    }

    #[test]
    fn test_launch_and_nolaunch() {
        let opts = SupervisorOptions {
            launch: names(&["web"]),
            nolaunch: names(&["celeryd"]),
            ..Default::default()
        };
        let doc = opts.to_document();
        assert_eq!(doc.get("program:web", "autostart"), Some("true"));
        assert_eq!(doc.get("program:celeryd", "autostart"), Some("false"));
    }

    #[test]
    fn test_include_and_exclude() {
        let opts = SupervisorOptions {
            include: names(&["a", "both"]),
            exclude: names(&["celerybeat", "both"]),
            ..Default::default()
        };
        let doc = opts.to_document();
        assert_eq!(doc.get("program:a", "exclude"), Some("false"));
        assert_eq!(doc.get("program:celerybeat", "exclude"), Some("true"));
        assert_eq!(doc.get("program:both", "exclude"), Some("true"));
    }

    #[test]
    fn test_autoreload_limits_watched_programs() {
        let opts = SupervisorOptions {
            autoreload: names(&["web", "worker"]),
            ..Default::default()
        };
        let doc = opts.to_document();
        assert_eq!(doc.get("program:autoreload", "exclude"), Some("false"));
        assert_eq!(doc.get(DEFAULTS_SECTION, "autoreload"), Some("false"));
        assert_eq!(doc.get("program:web", "autoreload"), Some("true"));
        assert_eq!(doc.get("program:worker", "autoreload"), Some("true"));
    }

    #[test]
    fn test_noreload_wins_over_autoreload() {
        let opts = SupervisorOptions {
            autoreload: names(&["web"]),
            noreload: true,
            ..Default::default()
        };
        let doc = opts.to_document();
        assert_eq!(doc.get("program:autoreload", "exclude"), Some("true"));
    }

    #[test]
    fn test_translate_is_parseable_and_deterministic() {
        let opts = SupervisorOptions {
            launch: names(&["web"]),
            exclude: names(&["beat"]),
            ..Default::default()
        };
        let text = opts.translate();
        assert_eq!(text, opts.translate());
        assert_eq!(IniDocument::parse(&text).unwrap(), opts.to_document());
    }

    #[test]
    fn test_to_args_reproduces_flags() {
        let opts = SupervisorOptions {
            daemonize: true,
            pidfile: Some("/run/s.pid".to_string()),
            project_dir: Some(PathBuf::from("/srv/app")),
            launch: names(&["a", "b"]),
            exclude: names(&["c"]),
            noreload: true,
            ..Default::default()
        };
        assert_eq!(
            opts.to_args(),
            names(&[
                "--daemonize",
                "--pidfile=/run/s.pid",
                "--project-dir=/srv/app",
                "--launch=a",
                "--launch=b",
                "--exclude=c",
                "--noreload",
            ])
        );
    }

    #[test]
    fn test_command_line_quotes_unsafe_args() {
        let opts = SupervisorOptions {
            project_dir: Some(PathBuf::from("/srv/my app")),
            logfile: Some("it's.log".to_string()),
            ..Default::default()
        };
        assert_eq!(
            opts.to_command_line(),
            r"'--logfile=it'\''s.log' '--project-dir=/srv/my app'"
        );
    }
}
