//! Configuration merge system
//!
//! Builds one supervisor config from ordered fragments:
//! 1. Built-in defaults
//! 2. Component and contrib fragments
//! 3. Project `supervisord.conf`
//! 4. CLI flags
//!
//! Later fragments win per key. Program meta-sections, exclusion and the
//! derived control channel are applied to the folded result.

mod defaults;
mod effective;
mod merge;
pub mod options;
pub mod security;

pub use defaults::{
    AUTORELOAD_OPTION, AUTORELOAD_PROGRAM, BUILTIN_FRAGMENT, DEFAULTS_SECTION, EXCLUDE_OPTION,
    OVERRIDES_SECTION, PROGRAM_PREFIX,
};
pub use effective::{
    merge, ConfigError, ConfigOrigin, ConfigSource, MergedConfig, RenderedFragment,
};
pub use merge::program_name;
pub use options::SupervisorOptions;
pub use security::{ControlChannel, DerivedSecurityParams};
