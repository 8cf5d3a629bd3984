//! Project Supervisor CLI
//!
//! Entry point for the `proj-supervisor` command-line tool.

use std::io;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use proj_supervisor::logging::{init_logging, level_for_verbosity};
use proj_supervisor::{ControlCommand, Pipeline, SupervisorOptions};

#[derive(Parser)]
#[command(name = "proj-supervisor")]
#[command(about = "Run a project's processes under supervisord", version)]
#[command(after_help = "With no COMMAND the daemon is launched. `getconfig [--json]` prints \
the merged config, `shell` opens the interactive client, `autoreload` runs the live-code \
watcher, and any other COMMAND is passed to the client.")]
struct Cli {
    /// Run the daemon in the background
    #[arg(long)]
    daemonize: bool,

    /// Daemon pid file
    #[arg(long, value_name = "PATH")]
    pidfile: Option<String>,

    /// Daemon log file
    #[arg(long, value_name = "PATH")]
    logfile: Option<String>,

    /// Project directory (default: nearest ancestor with a project config)
    #[arg(long, value_name = "PATH")]
    project_dir: Option<PathBuf>,

    /// Start this program automatically (repeatable)
    #[arg(long, value_name = "NAME")]
    launch: Vec<String>,

    /// Do not start this program automatically (repeatable)
    #[arg(long, value_name = "NAME")]
    nolaunch: Vec<String>,

    /// Keep this program even if a config excludes it (repeatable)
    #[arg(long, value_name = "NAME")]
    include: Vec<String>,

    /// Remove this program from the config (repeatable)
    #[arg(long, value_name = "NAME")]
    exclude: Vec<String>,

    /// Restart only these programs when code changes (repeatable)
    #[arg(long, value_name = "NAME")]
    autoreload: Vec<String>,

    /// Do not restart programs when code changes
    #[arg(long)]
    noreload: bool,

    /// Increase diagnostic output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// getconfig, shell, autoreload, or a client command with its arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
    command: Vec<String>,
}

impl Cli {
    fn options(&self) -> SupervisorOptions {
        SupervisorOptions {
            daemonize: self.daemonize,
            pidfile: self.pidfile.clone(),
            logfile: self.logfile.clone(),
            project_dir: self.project_dir.clone(),
            launch: self.launch.clone(),
            nolaunch: self.nolaunch.clone(),
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            autoreload: self.autoreload.clone(),
            noreload: self.noreload,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(level_for_verbosity(cli.verbose));

    let command = ControlCommand::parse(&cli.command);
    let result = Pipeline::discover(cli.options()).and_then(|pipeline| {
        let supervisor = pipeline.process_supervisor();
        pipeline.run(&command, &supervisor, &mut io::stdout().lock())
    });

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    }
}
