//! Template rendering for config fragments
//!
//! Fragments are rendered with minijinja against an explicit
//! [`TemplateContext`]. The context is passed into every render call; the
//! `templated` filter captures its own copy, so nothing reads ambient state.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use minijinja::value::ValueKind;
use minijinja::{Environment, ErrorKind, UndefinedBehavior, Value};
use serde::Serialize;
use tracing::debug;

/// Suffix appended to files produced by the `templated` filter.
pub const TEMPLATED_SUFFIX: &str = ".templated";

/// Errors raised while rendering templates
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("Failed to render {name}: {source}")]
    Render {
        name: String,
        #[source]
        source: minijinja::Error,
    },

    #[error("Invalid template context value: {0}")]
    Context(#[source] minijinja::Error),
}

/// Variables visible to fragment templates.
///
/// Constructed once per merge; [`TemplateContext::for_component`] derives
/// the `APP_DIR` variant used for a single component fragment.
#[derive(Debug, Clone)]
pub struct TemplateContext {
    project_dir: PathBuf,
    python: String,
    supervisor_options: String,
    supervisor_exe: String,
    settings: Value,
    environ: BTreeMap<String, String>,
    app_dir: Option<PathBuf>,
}

impl TemplateContext {
    pub fn new(project_dir: impl Into<PathBuf>, python: impl Into<String>) -> Self {
        Self {
            project_dir: project_dir.into(),
            python: python.into(),
            supervisor_options: String::new(),
            supervisor_exe: String::new(),
            settings: Value::from_serialize(BTreeMap::<String, String>::new()),
            environ: BTreeMap::new(),
            app_dir: None,
        }
    }

    /// Expose an arbitrary serializable object as `settings`
    pub fn with_settings<T: Serialize>(mut self, settings: &T) -> Result<Self, TemplateError> {
        let value = Value::from_serialize(settings);
        if value.kind() != ValueKind::Map {
            return Err(TemplateError::Context(minijinja::Error::new(
                ErrorKind::InvalidOperation,
                "settings must be a mapping",
            )));
        }
        self.settings = value;
        Ok(self)
    }

    pub fn with_environ<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.environ = vars.into_iter().collect();
        self
    }

    pub fn with_supervisor_options(mut self, options: impl Into<String>) -> Self {
        self.supervisor_options = options.into();
        self
    }

    pub fn with_supervisor_exe(mut self, exe: impl Into<String>) -> Self {
        self.supervisor_exe = exe.into();
        self
    }

    /// Copy of this context with `APP_DIR` set
    pub fn for_component(&self, app_dir: &Path) -> Self {
        let mut ctx = self.clone();
        ctx.app_dir = Some(app_dir.to_path_buf());
        ctx
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// The context as a template value
    pub fn to_value(&self) -> Value {
        let mut vars: BTreeMap<&str, Value> = BTreeMap::new();
        vars.insert(
            "PROJECT_DIR",
            Value::from(self.project_dir.to_string_lossy().into_owned()),
        );
        vars.insert("PYTHON", Value::from(self.python.clone()));
        vars.insert(
            "SUPERVISOR_OPTIONS",
            Value::from(self.supervisor_options.clone()),
        );
        vars.insert("SUPERVISOR_EXE", Value::from(self.supervisor_exe.clone()));
        vars.insert("settings", self.settings.clone());
        vars.insert("environ", Value::from_serialize(&self.environ));
        if let Some(app_dir) = &self.app_dir {
            vars.insert("APP_DIR", Value::from(app_dir.to_string_lossy().into_owned()));
        }
        Value::from_serialize(&vars)
    }
}

/// Renders fragment text.
#[derive(Debug, Clone, Copy, Default)]
pub struct Renderer {
    strict: bool,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail on undefined variables instead of rendering them empty
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Render `source` against `ctx`. `name` identifies the fragment in errors.
    pub fn render(&self, name: &str, source: &str, ctx: &TemplateContext) -> Result<String, TemplateError> {
        let env = self.environment(ctx);
        env.render_named_str(name, source, ctx.to_value())
            .map_err(|source| TemplateError::Render {
                name: name.to_string(),
                source,
            })
    }

    fn environment(&self, ctx: &TemplateContext) -> Environment<'static> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_keep_trailing_newline(true);
        if self.strict {
            env.set_undefined_behavior(UndefinedBehavior::Strict);
        }

        let renderer = *self;
        let filter_ctx = ctx.clone();
        env.add_filter("templated", move |path: String| -> Result<String, minijinja::Error> {
            renderer.render_file(&filter_ctx, Path::new(&path))
        });
        env
    }

    /// Render a file relative to `PROJECT_DIR` and write it next to the
    /// source with a `.templated` suffix. Returns the written path.
    fn render_file(&self, ctx: &TemplateContext, relative: &Path) -> Result<String, minijinja::Error> {
        let full_path = ctx.project_dir().join(relative);
        let io_error = |action: &str, err: std::io::Error| {
            minijinja::Error::new(
                ErrorKind::InvalidOperation,
                format!("cannot {} {}: {}", action, full_path.display(), err),
            )
        };

        let source = std::fs::read_to_string(&full_path).map_err(|e| io_error("read", e))?;
        let rendered = self
            .render(&full_path.to_string_lossy(), &source, ctx)
            .map_err(|e| minijinja::Error::new(ErrorKind::InvalidOperation, e.to_string()))?;

        let mut target = full_path.clone().into_os_string();
        target.push(TEMPLATED_SUFFIX);
        let target = PathBuf::from(target);
        std::fs::write(&target, rendered).map_err(|e| io_error("write", e))?;

        debug!(source = %full_path.display(), target = %target.display(), "rendered templated file");
        Ok(target.to_string_lossy().into_owned())
    }
}
