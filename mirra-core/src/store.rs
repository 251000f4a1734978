use std::collections::HashMap;
use std::path::{Component, Path};

use walkdir::WalkDir;

use crate::error::{BuildError, Result};

/// Layouts and components, read once at the start of a run and shared
/// read-only by every file build.
#[derive(Debug, Default, Clone)]
pub struct TemplateStore {
    layouts: HashMap<String, String>,
    components: HashMap<String, String>,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(layouts: P, components: Q) -> Result<Self> {
        Ok(Self {
            layouts: read_templates(layouts.as_ref())?,
            components: read_templates(components.as_ref())?,
        })
    }

    pub fn with_layout(mut self, name: &str, text: &str) -> Self {
        self.layouts.insert(name.to_string(), text.to_string());
        self
    }

    pub fn with_component(mut self, name: &str, text: &str) -> Self {
        self.components.insert(name.to_string(), text.to_string());
        self
    }

    /// `name` must already be normalized with [`template_key`].
    pub fn layout(&self, name: &str) -> Option<&str> {
        self.layouts.get(name).map(String::as_str)
    }

    /// `name` must already be normalized with [`template_key`].
    pub fn component(&self, name: &str) -> Option<&str> {
        self.components.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.layouts.len() + self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Turns a reference as written by an author into a store key.
///
/// Returns `None` for references that would leave the shared directory:
/// absolute paths and anything containing `..`.
pub fn template_key(reference: &str) -> Option<String> {
    let reference = reference.trim().replace('\\', "/");
    let path = Path::new(&reference);

    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if parts.is_empty() {
        return None;
    }

    Some(parts.join("/"))
}

fn read_templates(dir: &Path) -> Result<HashMap<String, String>> {
    let mut templates = HashMap::new();

    for entry in WalkDir::new(dir).min_depth(1) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(dir)
            .map_err(|_| BuildError::InvalidPath(entry.path().to_path_buf()))?;
        let Some(key) = relative.to_str().and_then(template_key) else {
            log::warn!("Skipping template with unusable name: {}", entry.path().display());
            continue;
        };

        match std::fs::read_to_string(entry.path()) {
            Ok(text) => {
                templates.insert(key, text);
            }
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                log::warn!("Skipping non UTF-8 template: {}", entry.path().display());
            }
            Err(e) => return Err(BuildError::io(entry.path(), e)),
        }
    }

    Ok(templates)
}
