//! Invocation pipeline
//!
//! One invocation runs these steps in order:
//! 1. Discover the project and load its manifest
//! 2. Locate config fragments
//! 3. Build the template context
//! 4. Render and merge into one config
//! 5. Dispatch the positional command through the supervisor facade
//!
//! Every step is fatal on error; nothing is half-applied.

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{ConfigError, ConfigSource, MergedConfig, SupervisorOptions};
use crate::control::{ControlCommand, ControlError, ProcessSupervisor, Supervisor};
use crate::locator::{FragmentSource, Locator, LocatorError};
use crate::project::{Project, ProjectError};
use crate::template::{Renderer, TemplateContext, TemplateError};
use crate::watcher::{LiveCodeDirSet, Watcher, WatcherError};

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Project(#[from] ProjectError),

    #[error("{0}")]
    Locate(#[from] LocatorError),

    #[error("{0}")]
    Template(#[from] TemplateError),

    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Control(#[from] ControlError),

    #[error("{0}")]
    Watcher(#[from] WatcherError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Control(ControlError::Spawn { .. }) => 127,
            PipelineError::Watcher(WatcherError::Restart(ControlError::Spawn { .. })) => 127,
            _ => 1,
        }
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// `getconfig --json` output
#[derive(Debug, Serialize)]
struct ConfigReport<'a> {
    sources: &'a [ConfigSource],
    config: sup_ini::IniDocument,
}

/// A discovered project plus the options of this invocation
#[derive(Debug, Clone)]
pub struct Pipeline {
    project: Project,
    options: SupervisorOptions,
    renderer: Renderer,
    environ: Vec<(String, String)>,
    supervisor_exe: Option<String>,
}

impl Pipeline {
    /// Discover the project named by `options` (or the working directory)
    pub fn discover(options: SupervisorOptions) -> PipelineResult<Self> {
        let project = Project::discover(options.project_dir.as_deref())?;
        Ok(Self::new(project, options))
    }

    /// Pin `options.project_dir` to the resolved project so helper processes
    /// spawned from the config find the same project.
    pub fn new(project: Project, mut options: SupervisorOptions) -> Self {
        options.project_dir = Some(project.dir().to_path_buf());
        Self {
            project,
            options,
            renderer: Renderer::new(),
            environ: std::env::vars().collect(),
            supervisor_exe: None,
        }
    }

    /// Replace the environment exposed to templates as `environ`
    pub fn with_environ(mut self, environ: Vec<(String, String)>) -> Self {
        self.environ = environ;
        self
    }

    /// Executable used for `SUPERVISOR_EXE` (default: the running binary)
    pub fn with_supervisor_exe(mut self, exe: impl Into<String>) -> Self {
        self.supervisor_exe = Some(exe.into());
        self
    }

    pub fn with_renderer(mut self, renderer: Renderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn options(&self) -> &SupervisorOptions {
        &self.options
    }

    /// Supervisor backed by the executables named in the manifest
    pub fn process_supervisor(&self) -> ProcessSupervisor {
        let commands = &self.project.manifest().supervisor;
        ProcessSupervisor::new(
            commands.daemon.clone(),
            commands.client.clone(),
            self.project.state_dir(),
        )
    }

    /// Template context shared by every fragment of this invocation
    pub fn context(&self) -> PipelineResult<TemplateContext> {
        let supervisor_exe = match &self.supervisor_exe {
            Some(exe) => exe.clone(),
            None => std::env::current_exe()?.to_string_lossy().into_owned(),
        };
        let manifest = self.project.manifest();

        Ok(TemplateContext::new(self.project.dir(), manifest.python.clone())
            .with_settings(&manifest.settings)?
            .with_environ(self.environ.iter().cloned())
            .with_supervisor_exe(supervisor_exe)
            .with_supervisor_options(self.options.to_command_line()))
    }

    /// Locate, render and merge. Returns the located sources alongside.
    pub fn merge(&self) -> PipelineResult<(MergedConfig, Vec<FragmentSource>)> {
        let sources = Locator::from_project(&self.project).locate()?;
        debug!(fragments = sources.len(), "located fragments");

        let context = self.context()?;
        let merged = MergedConfig::build(
            &sources,
            &context,
            &self.renderer,
            &self.options,
            &self.project.secret(),
        )?;
        debug!(programs = ?merged.program_names(), "merged config");
        Ok((merged, sources))
    }

    /// Directories the watcher covers: the project, every component root,
    /// every fragment's directory and the manifest's extra paths
    pub fn live_dirs(&self, sources: &[FragmentSource]) -> LiveCodeDirSet {
        let mut paths: Vec<PathBuf> = vec![self.project.dir().to_path_buf()];
        paths.extend(self.project.components().into_iter().map(|c| c.root));
        paths.extend(sources.iter().filter_map(|s| s.path.clone()));
        paths.extend(self.project.watch_paths());
        LiveCodeDirSet::from_paths(paths)
    }

    /// Run `command` and return the process exit status
    pub fn run(
        &self,
        command: &ControlCommand,
        supervisor: &dyn Supervisor,
        out: &mut dyn Write,
    ) -> PipelineResult<i32> {
        let (merged, sources) = self.merge()?;
        let config = merged.to_daemon_config();

        match command {
            ControlCommand::Launch => {
                info!(project = %self.project.dir().display(), "launching supervisor");
                Ok(supervisor.launch(&config)?)
            }
            ControlCommand::GetConfig { json: false } => {
                out.write_all(config.as_bytes())?;
                out.flush()?;
                Ok(0)
            }
            ControlCommand::GetConfig { json: true } => {
                let report = ConfigReport {
                    sources: &merged.sources,
                    config: merged.daemon_document(),
                };
                serde_json::to_writer_pretty(&mut *out, &report)?;
                writeln!(out)?;
                out.flush()?;
                Ok(0)
            }
            ControlCommand::Autoreload => {
                let programs = merged.autoreload_programs();
                if programs.is_empty() {
                    info!("no program opted into autoreload, not watching");
                    return Ok(0);
                }
                let settings = &self.project.manifest().autoreload;
                let mut watcher = Watcher::new(
                    self.live_dirs(&sources),
                    settings.extensions.clone(),
                    Duration::from_millis(settings.interval_ms),
                );
                watcher.run(supervisor, &config, &programs)?;
                Ok(0)
            }
            ControlCommand::Shell | ControlCommand::Client { .. } => {
                let args = command.client_args().unwrap_or_default();
                Ok(supervisor.control(&config, &args)?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{RecordedCall, RecordingSupervisor};
    use std::fs;
    use tempfile::TempDir;

    fn project(files: &[(&str, &str)]) -> TempDir {
        let temp = TempDir::new().unwrap();
        for (path, content) in files {
            let full = temp.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
        temp
    }

    fn pipeline(temp: &TempDir, options: SupervisorOptions) -> Pipeline {
        Pipeline::new(Project::load(temp.path()).unwrap(), options)
            .with_environ(vec![])
            .with_supervisor_exe("/usr/bin/proj-supervisor")
    }

    fn run(p: &Pipeline, command: ControlCommand, sup: &RecordingSupervisor) -> (i32, String) {
        let mut out = Vec::new();
        let code = p.run(&command, sup, &mut out).unwrap();
        (code, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_getconfig_prints_daemon_config() {
        let temp = project(&[("supervisord.conf", "[program:web]\ncommand=gunicorn\n")]);
        let p = pipeline(&temp, SupervisorOptions::default());
        let sup = RecordingSupervisor::new();

        let (code, out) = run(&p, ControlCommand::GetConfig { json: false }, &sup);
        assert_eq!(code, 0);
        assert!(out.contains("[program:web]\ncommand=gunicorn\n"));
        assert!(out.contains("[inet_http_server]"));
        assert!(!out.contains("exclude="));
        assert!(sup.calls().is_empty());
    }

    #[test]
    fn test_getconfig_json_has_sources() {
        let temp = project(&[("supervisord.conf", "[program:web]\ncommand=gunicorn\n")]);
        let p = pipeline(&temp, SupervisorOptions::default());

        let (_, out) = run(&p, ControlCommand::GetConfig { json: true }, &RecordingSupervisor::new());
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["config"]["program:web"]["command"], "gunicorn");
        assert_eq!(value["sources"][0]["origin"], "builtin");
        assert_eq!(value["sources"][1]["origin"], "project");
        assert_eq!(value["sources"][2]["origin"], "cli");
    }

    #[test]
    fn test_launch_passes_config() {
        let temp = project(&[("supervisord.conf", "[program:web]\ncommand=gunicorn\n")]);
        let p = pipeline(&temp, SupervisorOptions::default());
        let sup = RecordingSupervisor::new().with_exit_code(2);

        let (code, _) = run(&p, ControlCommand::Launch, &sup);
        assert_eq!(code, 2);
        match &sup.calls()[..] {
            [RecordedCall::Launch { config }] => assert!(config.contains("nodaemon=true")),
            other => panic!("unexpected calls: {:?}", other),
        }
    }

    #[test]
    fn test_client_verb_passes_through() {
        let temp = project(&[("supervisord.conf", "[program:web]\ncommand=gunicorn\n")]);
        let p = pipeline(&temp, SupervisorOptions::default());
        let sup = RecordingSupervisor::new();

        let command = ControlCommand::parse(&["status".to_string(), "web".to_string()]);
        run(&p, command, &sup);
        assert!(matches!(
            &sup.calls()[..],
            [RecordedCall::Control { args, .. }] if args == &["status", "web"]
        ));

        let sup = RecordingSupervisor::new();
        run(&p, ControlCommand::Shell, &sup);
        assert!(matches!(&sup.calls()[..], [RecordedCall::Control { args, .. }] if args.is_empty()));
    }

    #[test]
    fn test_autoreload_program_gets_options() {
        let temp = project(&[
            ("supervise.toml", "[settings]\nDEBUG = true\n"),
            ("supervisord.conf", "[program:web]\ncommand=gunicorn\n"),
        ]);
        let p = pipeline(
            &temp,
            SupervisorOptions {
                exclude: vec!["runserver".to_string()],
                ..Default::default()
            },
        );

        let (merged, _) = p.merge().unwrap();
        let command = merged.get("program:autoreload", "command").unwrap();
        let dir = temp.path().canonicalize().unwrap();
        assert_eq!(
            command,
            format!(
                "/usr/bin/proj-supervisor --project-dir={} --exclude=runserver autoreload",
                dir.display()
            )
        );
        assert!(merged.get("program:runserver", "command").is_none());
    }

    #[test]
    fn test_live_dirs_cover_components_and_fragments() {
        let temp = project(&[
            (
                "supervise.toml",
                "[[component]]\nname = \"tasks\"\npath = \"/opt/tasks\"\n[autoreload]\npaths = [\"lib\"]\n",
            ),
            ("supervisord.conf", ""),
            ("contrib/tasks/supervisord.conf", ""),
        ]);
        let p = pipeline(&temp, SupervisorOptions::default());

        let (_, sources) = p.merge().unwrap();
        let dirs = p.live_dirs(&sources);
        let root = temp.path().canonicalize().unwrap();

        assert!(dirs.contains(&root));
        assert!(dirs.contains(std::path::Path::new("/opt/tasks")));
        assert_eq!(dirs.len(), 2);
    }

    #[test]
    fn test_validation_error_exit_code() {
        let temp = project(&[("supervisord.conf", "[program:foo]\nuser=bob\n")]);
        let p = pipeline(&temp, SupervisorOptions::default());

        let mut out = Vec::new();
        let err = p
            .run(&ControlCommand::Launch, &RecordingSupervisor::new(), &mut out)
            .unwrap_err();
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("foo"));
    }
}
