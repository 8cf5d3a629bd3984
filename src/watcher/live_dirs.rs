//! Minimal set of directories covering all live code

use std::path::{Path, PathBuf};

/// Directories to watch, with no member nested inside another
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveCodeDirSet {
    dirs: Vec<PathBuf>,
}

impl LiveCodeDirSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a mix of directories and files (files contribute their parent)
    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut set = Self::new();
        for path in paths {
            let path = path.as_ref();
            if path.is_file() {
                if let Some(parent) = path.parent() {
                    set.insert(parent);
                }
            } else {
                set.insert(path);
            }
        }
        set
    }

    /// Add `dir` unless an existing member already covers it.
    ///
    /// Members nested inside `dir` are dropped. Returns whether the set changed.
    pub fn insert(&mut self, dir: &Path) -> bool {
        let dir = normalize(dir);
        if self.dirs.iter().any(|member| dir.starts_with(member)) {
            return false;
        }
        self.dirs.retain(|member| !member.starts_with(&dir));
        self.dirs.push(dir);
        true
    }

    pub fn contains(&self, dir: &Path) -> bool {
        let dir = normalize(dir);
        self.dirs.iter().any(|member| *member == dir)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.dirs.iter().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }
}

/// Canonical path when it exists, otherwise absolute with `.`/`..` folded
fn normalize(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            std::path::Component::CurDir => {}
            std::path::Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}
