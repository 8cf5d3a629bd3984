//! Project manifest and project-directory discovery
//!
//! Parses and validates the optional manifest at `<project>/supervise.toml`.
//! The manifest names the installed components (in installed order), the
//! project secret, the interpreter path and the opaque `settings` table
//! exposed to config templates.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Manifest file name looked up in the project directory.
pub const MANIFEST_FILE: &str = "supervise.toml";

/// Project-level config fragment file name.
pub const PROJECT_FRAGMENT: &str = "supervisord.conf";

/// Environment variable consulted when the manifest has no `secret_key`.
pub const SECRET_ENV: &str = "PROJECT_SECRET";

/// Directory (inside the project) holding materialized configs.
pub const STATE_DIR: &str = ".supervisor";

/// Project manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectManifest {
    /// Secret from which control-channel credentials are derived
    pub secret_key: Option<String>,

    /// Interpreter exposed to templates as PYTHON (default: "python3")
    #[serde(default = "default_python")]
    pub python: String,

    /// Root of shared contrib fragments, relative to the project (default: "contrib")
    #[serde(default = "default_contrib_dir")]
    pub contrib_dir: PathBuf,

    /// Installed components, in installed order
    #[serde(default, rename = "component")]
    pub components: Vec<ComponentEntry>,

    /// Opaque settings exposed to templates as `settings`
    #[serde(default)]
    pub settings: toml::Table,

    /// External supervisor executables
    #[serde(default)]
    pub supervisor: SupervisorCommands,

    /// Live-code watcher tuning
    #[serde(default)]
    pub autoreload: AutoreloadSettings,
}

fn default_python() -> String {
    "python3".to_string()
}

fn default_contrib_dir() -> PathBuf {
    PathBuf::from("contrib")
}

impl Default for ProjectManifest {
    fn default() -> Self {
        Self {
            secret_key: None,
            python: default_python(),
            contrib_dir: default_contrib_dir(),
            components: Vec::new(),
            settings: toml::Table::new(),
            supervisor: SupervisorCommands::default(),
            autoreload: AutoreloadSettings::default(),
        }
    }
}

/// A single installed component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentEntry {
    /// Dotted component name (e.g. "shop.tasks"); must be unique
    pub name: String,

    /// Component root directory, relative to the project or absolute
    pub path: PathBuf,
}

/// Names of the daemon and control-client executables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorCommands {
    #[serde(default = "default_daemon")]
    pub daemon: String,

    #[serde(default = "default_client")]
    pub client: String,
}

fn default_daemon() -> String {
    "supervisord".to_string()
}

fn default_client() -> String {
    "supervisorctl".to_string()
}

impl Default for SupervisorCommands {
    fn default() -> Self {
        Self {
            daemon: default_daemon(),
            client: default_client(),
        }
    }
}

/// Watcher settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoreloadSettings {
    /// File extensions (without the dot) considered source code
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Extra directories to watch, relative to the project or absolute
    #[serde(default)]
    pub paths: Vec<PathBuf>,

    /// Poll interval in milliseconds (default: 1000)
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_extensions() -> Vec<String> {
    vec!["py".to_string()]
}

fn default_interval_ms() -> u64 {
    1000
}

impl Default for AutoreloadSettings {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            paths: Vec::new(),
            interval_ms: default_interval_ms(),
        }
    }
}

/// Errors that can occur when locating or loading a project
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("Failed to read project files: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse supervise.toml: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Project directory does not exist: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Cannot determine project directory: no supervise.toml or supervisord.conf found above {}", .0.display())]
    NotFound(PathBuf),

    #[error("Duplicate component name: '{0}'")]
    DuplicateComponent(String),

    #[error("Component '{name}': {reason}")]
    InvalidComponent { name: String, reason: String },
}

/// An installed component resolved against the project directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub name: String,
    pub root: PathBuf,
}

/// A discovered project
#[derive(Debug, Clone)]
pub struct Project {
    dir: PathBuf,
    manifest: ProjectManifest,
}

impl Project {
    /// Locate the project directory and load its manifest.
    ///
    /// An explicit directory must exist. Otherwise the nearest ancestor of
    /// the working directory holding a manifest or a project fragment wins.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ProjectError> {
        match explicit {
            Some(dir) => Self::load(dir),
            None => {
                let cwd = std::env::current_dir()?;
                let dir = Self::find_root(&cwd).ok_or(ProjectError::NotFound(cwd))?;
                Self::load(&dir)
            }
        }
    }

    /// Nearest ancestor (inclusive) that looks like a project root
    pub fn find_root(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .find(|dir| dir.join(MANIFEST_FILE).is_file() || dir.join(PROJECT_FRAGMENT).is_file())
            .map(Path::to_path_buf)
    }

    /// Load the project rooted at `dir`; the manifest is optional.
    pub fn load(dir: &Path) -> Result<Self, ProjectError> {
        if !dir.is_dir() {
            return Err(ProjectError::NotADirectory(dir.to_path_buf()));
        }
        let dir = dir.canonicalize()?;

        let manifest_path = dir.join(MANIFEST_FILE);
        let manifest = if manifest_path.is_file() {
            debug!(path = %manifest_path.display(), "loading project manifest");
            Self::parse_manifest(&std::fs::read_to_string(&manifest_path)?)?
        } else {
            debug!(dir = %dir.display(), "no project manifest, using defaults");
            ProjectManifest::default()
        };

        Ok(Self { dir, manifest })
    }

    /// Build a project from an already-parsed manifest
    pub fn with_manifest(dir: PathBuf, manifest: ProjectManifest) -> Self {
        Self { dir, manifest }
    }

    /// Parse and validate manifest text
    pub fn parse_manifest(content: &str) -> Result<ProjectManifest, ProjectError> {
        let manifest: ProjectManifest = toml::from_str(content)?;

        let mut seen = HashSet::new();
        for component in &manifest.components {
            if component.name.trim().is_empty() {
                return Err(ProjectError::InvalidComponent {
                    name: "(unnamed)".to_string(),
                    reason: "name must not be empty".to_string(),
                });
            }
            if component.name.split('.').any(str::is_empty) {
                return Err(ProjectError::InvalidComponent {
                    name: component.name.clone(),
                    reason: "name must be a dotted identifier".to_string(),
                });
            }
            if !seen.insert(component.name.as_str()) {
                return Err(ProjectError::DuplicateComponent(component.name.clone()));
            }
        }

        Ok(manifest)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn manifest(&self) -> &ProjectManifest {
        &self.manifest
    }

    /// Installed components with roots resolved against the project
    pub fn components(&self) -> Vec<Component> {
        self.manifest
            .components
            .iter()
            .map(|c| Component {
                name: c.name.clone(),
                root: self.resolve(&c.path),
            })
            .collect()
    }

    /// Root of shared contrib fragments
    pub fn contrib_root(&self) -> PathBuf {
        self.resolve(&self.manifest.contrib_dir)
    }

    /// Where materialized configs are written
    pub fn state_dir(&self) -> PathBuf {
        self.dir.join(STATE_DIR)
    }

    /// Extra watcher directories
    pub fn watch_paths(&self) -> Vec<PathBuf> {
        self.manifest
            .autoreload
            .paths
            .iter()
            .map(|p| self.resolve(p))
            .collect()
    }

    /// The project secret used to derive control-channel credentials
    pub fn secret(&self) -> String {
        self.resolve_secret(std::env::var(SECRET_ENV).ok())
    }

    /// Secret precedence: manifest, then environment, then the project path
    pub fn resolve_secret(&self, env_secret: Option<String>) -> String {
        if let Some(secret) = self.manifest.secret_key.as_ref().filter(|s| !s.is_empty()) {
            return secret.clone();
        }
        if let Some(secret) = env_secret.filter(|s| !s.is_empty()) {
            return secret;
        }
        warn!(
            "no secret_key in {} and {} unset; deriving credentials from the project path",
            MANIFEST_FILE, SECRET_ENV
        );
        self.dir.to_string_lossy().into_owned()
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.dir.join(path)
        }
    }
}
