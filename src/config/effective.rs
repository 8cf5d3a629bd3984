//! Merged configuration with provenance
//!
//! The merged config captures the final supervisor document plus
//! information about which fragments contributed to it.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use sup_ini::{IniDocument, IniError};
use tracing::debug;

use super::merge::{
    apply_defaults, apply_overrides, autoreload_targets, drop_excluded, drop_idle_watcher,
    program_names, strip_extension_options, validate_programs,
};
use super::options::SupervisorOptions;
use super::security::{apply_control_channel, ControlChannel, DerivedSecurityParams};
use crate::locator::FragmentSource;
use crate::template::{Renderer, TemplateContext, TemplateError};

/// Origin of a configuration fragment
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    Component,
    Contrib,
    Project,
    Cli,
}

impl fmt::Display for ConfigOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin => write!(f, "builtin"),
            Self::Component => write!(f, "component"),
            Self::Contrib => write!(f, "contrib"),
            Self::Project => write!(f, "project"),
            Self::Cli => write!(f, "cli"),
        }
    }
}

/// A contributing config source with provenance
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ConfigSource {
    /// Origin of this source
    pub origin: ConfigOrigin,

    /// Component name (component/contrib origins only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,

    /// File path (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// SHA-256 digest of raw file bytes (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl ConfigSource {
    pub fn cli() -> Self {
        Self {
            origin: ConfigOrigin::Cli,
            component: None,
            path: None,
            digest: None,
        }
    }

    /// Human-readable label used in error messages
    pub fn label(&self) -> String {
        match (&self.path, &self.component) {
            (Some(path), Some(component)) => {
                format!("{} fragment for '{}' ({})", self.origin, component, path.display())
            }
            (Some(path), None) => format!("{} fragment ({})", self.origin, path.display()),
            (None, _) => format!("{} fragment", self.origin),
        }
    }
}

impl From<&FragmentSource> for ConfigSource {
    fn from(source: &FragmentSource) -> Self {
        Self {
            origin: source.origin.clone(),
            component: source.component.clone(),
            path: source.path.clone(),
            digest: source.digest.clone(),
        }
    }
}

/// A fragment after template rendering
#[derive(Debug, Clone)]
pub struct RenderedFragment {
    pub source: ConfigSource,
    pub text: String,
}

impl RenderedFragment {
    pub fn new(source: ConfigSource, text: impl Into<String>) -> Self {
        Self {
            source,
            text: text.into(),
        }
    }
}

/// Final merged configuration
#[derive(Debug, Clone)]
pub struct MergedConfig {
    /// The merged document, extension options included
    pub document: IniDocument,

    /// Contributing sources in precedence order
    pub sources: Vec<ConfigSource>,

    /// Sections dropped by `exclude`
    pub excluded: Vec<String>,

    /// Resolved control channel
    pub control: ControlChannel,
}

impl MergedConfig {
    /// Render located fragments and merge them.
    ///
    /// Component fragments are rendered with their own `APP_DIR` variant of
    /// `context`; everything else uses `context` as is.
    pub fn build(
        sources: &[FragmentSource],
        context: &TemplateContext,
        renderer: &Renderer,
        options: &SupervisorOptions,
        secret: &str,
    ) -> Result<Self, ConfigError> {
        let mut fragments = Vec::with_capacity(sources.len());
        for source in sources {
            let text = match &source.app_dir {
                Some(app_dir) => {
                    renderer.render(&source.label(), &source.text, &context.for_component(app_dir))?
                }
                None => renderer.render(&source.label(), &source.text, context)?,
            };
            fragments.push(RenderedFragment::new(ConfigSource::from(source), text));
        }
        merge(&fragments, options, secret)
    }

    /// Names of live program sections
    pub fn program_names(&self) -> Vec<String> {
        program_names(&self.document)
    }

    /// Programs whose `autoreload` option is true
    pub fn autoreload_programs(&self) -> Vec<String> {
        autoreload_targets(&self.document)
    }

    /// Get `section.key` from the merged document
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.document.get(section, key)
    }

    /// The document as the daemon sees it, extension options removed
    pub fn daemon_document(&self) -> IniDocument {
        let mut document = self.document.clone();
        strip_extension_options(&mut document);
        document
    }

    /// Serialized config for the daemon and client
    pub fn to_daemon_config(&self) -> String {
        self.daemon_document().to_string()
    }
}

/// Merge rendered fragments and CLI options into the final configuration.
///
/// Steps:
/// 1. Parse each fragment and fold left to right (last wins per key)
/// 2. Fold the CLI fragment last
/// 3. Apply `__defaults__`, then `__overrides__`
/// 4. Configure the control channel from the derived parameters
/// 5. Drop excluded sections, and the watcher program when idle
/// 6. Validate program sections
pub fn merge(
    fragments: &[RenderedFragment],
    options: &SupervisorOptions,
    secret: &str,
) -> Result<MergedConfig, ConfigError> {
    let mut document = IniDocument::new();
    let mut sources = Vec::with_capacity(fragments.len() + 1);

    for fragment in fragments {
        let parsed = IniDocument::parse(&fragment.text).map_err(|source| ConfigError::ParseError {
            fragment: fragment.source.label(),
            source,
        })?;
        debug!(fragment = %fragment.source.label(), sections = parsed.len(), "folding fragment");
        document.fold(parsed);
        sources.push(fragment.source.clone());
    }

    let cli = IniDocument::parse(&options.translate()).map_err(|source| ConfigError::ParseError {
        fragment: ConfigSource::cli().label(),
        source,
    })?;
    document.fold(cli);
    sources.push(ConfigSource::cli());

    apply_defaults(&mut document);
    apply_overrides(&mut document);

    let params = DerivedSecurityParams::derive(secret);
    let control = apply_control_channel(&mut document, &params)?;

    let mut excluded = drop_excluded(&mut document)?;
    if let Some(watcher) = drop_idle_watcher(&mut document) {
        debug!("no program opted into autoreload, dropping the watcher");
        excluded.push(watcher);
    }
    if !excluded.is_empty() {
        debug!(?excluded, "dropped excluded sections");
    }

    validate_programs(&document)?;

    Ok(MergedConfig {
        document,
        sources,
        excluded,
        control,
    })
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Parse error in {fragment}: {source}")]
    ParseError {
        fragment: String,
        #[source]
        source: IniError,
    },

    #[error("Template error: {0}")]
    TemplateError(#[from] TemplateError),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
