//! Process control facade
//!
//! Everything that touches the external daemon and control client goes
//! through the [`Supervisor`] trait:
//! - `launch`: run the daemon in the foreground until it exits
//! - `control`: run the client with a verb (or interactively)
//! - `spawn_detached`: fire-and-forget client call in its own process group
//!
//! The config is handed over as text; implementations decide how the
//! external programs get to read it.

mod process;
mod recording;

pub use process::{ProcessSupervisor, CLIENT_CONFIG_FILE, DAEMON_CONFIG_FILE};
pub use recording::{RecordedCall, RecordingSupervisor};

use std::io;
use std::path::PathBuf;

/// Positional verb that opens the client's interactive prompt.
pub const SHELL_VERB: &str = "shell";

/// Positional verb that prints the merged config.
pub const GETCONFIG_VERB: &str = "getconfig";

/// Positional verb that runs the live-code watcher.
pub const AUTORELOAD_VERB: &str = "autoreload";

/// Interface to the external supervisor programs
pub trait Supervisor: Send + Sync {
    /// Run the daemon in the foreground and return its exit status
    fn launch(&self, config: &str) -> Result<i32, ControlError>;

    /// Run the client with `args`; empty `args` means interactive mode
    fn control(&self, config: &str, args: &[String]) -> Result<i32, ControlError>;

    /// Start the client with `args` in a new process group without waiting
    fn spawn_detached(&self, config: &str, args: &[String]) -> Result<(), ControlError>;
}

/// What the positional arguments ask for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// No positional arguments: run the daemon
    Launch,
    /// Print the merged config, as JSON with provenance when `json` is set
    GetConfig { json: bool },
    /// Interactive client
    Shell,
    /// Live-code watcher
    Autoreload,
    /// Any other verb, passed to the client verbatim
    Client { verb: String, args: Vec<String> },
}

impl ControlCommand {
    pub fn parse(positional: &[String]) -> Self {
        let Some((verb, rest)) = positional.split_first() else {
            return Self::Launch;
        };
        match verb.as_str() {
            GETCONFIG_VERB => Self::GetConfig {
                json: rest.iter().any(|arg| arg == "--json"),
            },
            SHELL_VERB => Self::Shell,
            AUTORELOAD_VERB => Self::Autoreload,
            _ => Self::Client {
                verb: verb.clone(),
                args: rest.to_vec(),
            },
        }
    }

    /// Client arguments for commands that go to the client
    pub fn client_args(&self) -> Option<Vec<String>> {
        match self {
            Self::Shell => Some(Vec::new()),
            Self::Client { verb, args } => {
                let mut all = Vec::with_capacity(args.len() + 1);
                all.push(verb.clone());
                all.extend(args.iter().cloned());
                Some(all)
            }
            _ => None,
        }
    }
}

/// Control facade errors
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("Failed to write config {}: {source}", path.display())]
    WriteConfig {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_no_positional_launches() {
        assert_eq!(ControlCommand::parse(&[]), ControlCommand::Launch);
    }

    #[test]
    fn test_builtin_verbs() {
        assert_eq!(
            ControlCommand::parse(&args(&["getconfig"])),
            ControlCommand::GetConfig { json: false }
        );
        assert_eq!(
            ControlCommand::parse(&args(&["getconfig", "--json"])),
            ControlCommand::GetConfig { json: true }
        );
        assert_eq!(ControlCommand::parse(&args(&["shell"])), ControlCommand::Shell);
        assert_eq!(ControlCommand::parse(&args(&["autoreload"])), ControlCommand::Autoreload);
    }

    #[test]
    fn test_unknown_verb_passes_through() {
        let command = ControlCommand::parse(&args(&["restart", "web", "--force"]));
        assert_eq!(
            command,
            ControlCommand::Client {
                verb: "restart".to_string(),
                args: args(&["web", "--force"]),
            }
        );
        assert_eq!(command.client_args(), Some(args(&["restart", "web", "--force"])));
    }

    #[test]
    fn test_shell_is_interactive_client() {
        assert_eq!(ControlCommand::Shell.client_args(), Some(Vec::new()));
        assert_eq!(ControlCommand::Launch.client_args(), None);
    }
}
