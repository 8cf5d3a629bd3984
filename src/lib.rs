//! Project Supervisor - per-project process supervision
//!
//! Merges process definitions contributed by a project, its installed
//! components and shared contrib fragments into one supervisord config,
//! then drives the external daemon and control client with it.

pub mod config;
pub mod control;
pub mod locator;
pub mod logging;
pub mod pipeline;
pub mod project;
pub mod template;
pub mod watcher;

pub use config::{ConfigError, MergedConfig, SupervisorOptions};
pub use control::{ControlCommand, ProcessSupervisor, RecordingSupervisor, Supervisor};
pub use pipeline::{Pipeline, PipelineError};
pub use project::{Project, ProjectError};
