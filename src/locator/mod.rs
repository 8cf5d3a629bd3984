//! Config fragment discovery
//!
//! Collects raw fragment sources in merge-priority order:
//! 1. Built-in defaults
//! 2. Per component, in installed order: `<root>/management/supervisord.conf`,
//!    or failing that `<contrib>/<dotted/name>/supervisord.conf`
//! 3. Project `supervisord.conf`
//!
//! Missing files are skipped. Component fragments carry their root as
//! `APP_DIR`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::{ConfigOrigin, ConfigSource, BUILTIN_FRAGMENT};
use crate::project::{Component, Project, PROJECT_FRAGMENT};

/// Fragment file name inside components and contrib directories.
pub const FRAGMENT_FILE: &str = "supervisord.conf";

/// Directory inside a component root holding its fragment.
pub const COMPONENT_FRAGMENT_DIR: &str = "management";

/// Errors for fragment discovery
#[derive(Debug, thiserror::Error)]
pub enum LocatorError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// One located fragment, not yet rendered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentSource {
    /// Where the fragment came from
    pub origin: ConfigOrigin,

    /// Component name for component/contrib fragments
    pub component: Option<String>,

    /// File path (None for builtin)
    pub path: Option<PathBuf>,

    /// SHA-256 digest of the raw file bytes (None for builtin)
    pub digest: Option<String>,

    /// Raw template text
    pub text: String,

    /// APP_DIR override for component-scoped fragments
    pub app_dir: Option<PathBuf>,
}

impl FragmentSource {
    /// The built-in default fragment
    pub fn builtin() -> Self {
        Self {
            origin: ConfigOrigin::Builtin,
            component: None,
            path: None,
            digest: None,
            text: BUILTIN_FRAGMENT.to_string(),
            app_dir: None,
        }
    }

    /// Human-readable label used in error messages
    pub fn label(&self) -> String {
        ConfigSource::from(self).label()
    }

    fn from_file(
        origin: ConfigOrigin,
        path: &Path,
        component: Option<&Component>,
    ) -> Result<Self, LocatorError> {
        let bytes = fs::read(path).map_err(|source| LocatorError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = hex::encode(hasher.finalize());

        let text = String::from_utf8(bytes).map_err(|e| LocatorError::Read {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidData, e),
        })?;

        Ok(Self {
            origin,
            component: component.map(|c| c.name.clone()),
            path: Some(path.to_path_buf()),
            digest: Some(digest),
            text,
            app_dir: component.map(|c| c.root.clone()),
        })
    }
}

/// Finds fragment files for a project
#[derive(Debug, Clone)]
pub struct Locator {
    project_dir: PathBuf,
    contrib_root: PathBuf,
    components: Vec<Component>,
}

impl Locator {
    pub fn new(project_dir: PathBuf, contrib_root: PathBuf) -> Self {
        Self {
            project_dir,
            contrib_root,
            components: Vec::new(),
        }
    }

    /// Set the installed components, in installed order
    pub fn with_components(mut self, components: Vec<Component>) -> Self {
        self.components = components;
        self
    }

    pub fn from_project(project: &Project) -> Self {
        Self::new(project.dir().to_path_buf(), project.contrib_root())
            .with_components(project.components())
    }

    /// Component-local fragment path
    pub fn component_fragment(component: &Component) -> PathBuf {
        component
            .root
            .join(COMPONENT_FRAGMENT_DIR)
            .join(FRAGMENT_FILE)
    }

    /// Shared contrib fragment path; dotted names become nested directories
    pub fn contrib_fragment(&self, component: &Component) -> PathBuf {
        let mut path = self.contrib_root.clone();
        for part in component.name.split('.') {
            path.push(part);
        }
        path.join(FRAGMENT_FILE)
    }

    pub fn project_fragment(&self) -> PathBuf {
        self.project_dir.join(PROJECT_FRAGMENT)
    }

    /// Collect all fragments in priority order
    pub fn locate(&self) -> Result<Vec<FragmentSource>, LocatorError> {
        let mut sources = vec![FragmentSource::builtin()];

        for component in &self.components {
            let local = Self::component_fragment(component);
            if local.is_file() {
                debug!(component = %component.name, path = %local.display(), "found component fragment");
                sources.push(FragmentSource::from_file(
                    ConfigOrigin::Component,
                    &local,
                    Some(component),
                )?);
                continue;
            }

            let contrib = self.contrib_fragment(component);
            if contrib.is_file() {
                debug!(component = %component.name, path = %contrib.display(), "found contrib fragment");
                sources.push(FragmentSource::from_file(
                    ConfigOrigin::Contrib,
                    &contrib,
                    Some(component),
                )?);
            }
        }

        let project = self.project_fragment();
        if project.is_file() {
            debug!(path = %project.display(), "found project fragment");
            sources.push(FragmentSource::from_file(ConfigOrigin::Project, &project, None)?);
        }

        Ok(sources)
    }
}
