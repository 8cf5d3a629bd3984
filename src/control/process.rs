//! Real daemon/client processes

use std::fs;
use std::io::Write;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::{ControlError, Supervisor};

/// Config file read by the daemon.
pub const DAEMON_CONFIG_FILE: &str = "supervisord.conf";

/// Config file read by client invocations. Kept apart from the daemon's
/// file so a client call never rewrites what a running daemon reloads.
pub const CLIENT_CONFIG_FILE: &str = "supervisorctl.conf";

/// Runs `supervisord`/`supervisorctl` (or replacements) as child processes
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    daemon: String,
    client: String,
    state_dir: PathBuf,
}

impl ProcessSupervisor {
    pub fn new(daemon: impl Into<String>, client: impl Into<String>, state_dir: PathBuf) -> Self {
        Self {
            daemon: daemon.into(),
            client: client.into(),
            state_dir,
        }
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    /// Write `config` to `<state_dir>/<file_name>` via a temp file and rename.
    ///
    /// Each call writes its own uniquely named temp file, so concurrent
    /// invocations never publish a mixed file.
    pub fn materialize(&self, file_name: &str, config: &str) -> Result<PathBuf, ControlError> {
        let path = self.state_dir.join(file_name);
        let write_error = |source| ControlError::WriteConfig {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&self.state_dir).map_err(write_error)?;

        // Created 0600: the config carries the control password.
        let mut file = NamedTempFile::new_in(&self.state_dir).map_err(write_error)?;
        file.write_all(config.as_bytes()).map_err(write_error)?;
        file.as_file().sync_all().map_err(write_error)?;
        file.persist(&path).map_err(|e| write_error(e.error))?;

        debug!(path = %path.display(), "materialized config");
        Ok(path)
    }

    fn command(&self, program: &str, config_path: &Path, args: &[String]) -> Command {
        let mut command = Command::new(program);
        command.arg("-c").arg(config_path).args(args);
        command
    }

    fn spawn_error(program: &str) -> impl FnOnce(std::io::Error) -> ControlError + '_ {
        move |source| ControlError::Spawn {
            program: program.to_string(),
            source,
        }
    }
}

/// Exit status as a shell would report it
fn exit_code(status: ExitStatus) -> i32 {
    match status.code() {
        Some(code) => code,
        None => 128 + status.signal().unwrap_or(0),
    }
}

impl Supervisor for ProcessSupervisor {
    fn launch(&self, config: &str) -> Result<i32, ControlError> {
        let path = self.materialize(DAEMON_CONFIG_FILE, config)?;
        info!(daemon = %self.daemon, config = %path.display(), "starting daemon");

        let status = self
            .command(&self.daemon, &path, &[])
            .status()
            .map_err(Self::spawn_error(&self.daemon))?;
        Ok(exit_code(status))
    }

    fn control(&self, config: &str, args: &[String]) -> Result<i32, ControlError> {
        let path = self.materialize(CLIENT_CONFIG_FILE, config)?;
        debug!(client = %self.client, ?args, "running client");

        let status = self
            .command(&self.client, &path, args)
            .status()
            .map_err(Self::spawn_error(&self.client))?;
        Ok(exit_code(status))
    }

    fn spawn_detached(&self, config: &str, args: &[String]) -> Result<(), ControlError> {
        let path = self.materialize(CLIENT_CONFIG_FILE, config)?;

        let child = self
            .command(&self.client, &path, args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .process_group(0)
            .spawn()
            .map_err(Self::spawn_error(&self.client))?;
        info!(client = %self.client, pid = child.id(), ?args, "spawned detached client");
        Ok(())
    }
}
