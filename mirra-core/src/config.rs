use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Everything one build run needs to know, fixed for the duration of the run.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BuildRunConfig {
    /// Root of the tree that gets mirrored
    pub source: PathBuf,
    /// Root of the mirrored output tree
    pub output: PathBuf,
    /// Shared layouts, never mirrored
    pub layouts: PathBuf,
    /// Shared components/includes, never mirrored
    pub components: PathBuf,
    /// Rebuild every file regardless of timestamps
    pub force: bool,
    /// Content index file name, written at the output root
    pub index_file: String,
    /// Page left out of the content index, relative to the output root
    pub not_found_page: String,
    /// Marker telling the host to serve underscore-prefixed directories
    pub routing_marker: String,
    /// Output files copied back into the source tree instead of deleted
    pub passthrough_files: Vec<String>,
}

impl Default for BuildRunConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("./src"),
            output: PathBuf::from("./docs"),
            layouts: PathBuf::from("./src/layouts"),
            components: PathBuf::from("./src/components"),
            force: false,
            index_file: "pages.json".into(),
            not_found_page: "404.html".into(),
            routing_marker: ".nojekyll".into(),
            passthrough_files: vec!["CNAME".into()],
        }
    }
}

impl BuildRunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the source root. Layouts and components follow it when they
    /// still point at their default location.
    pub fn source_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        let defaults = Self::default();
        let source = path.as_ref().to_path_buf();
        if self.layouts == defaults.layouts {
            self.layouts = source.join("layouts");
        }
        if self.components == defaults.components {
            self.components = source.join("components");
        }
        self.source = source;
        self
    }

    pub fn output_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.output = path.as_ref().to_path_buf();
        self
    }

    pub fn layouts_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.layouts = path.as_ref().to_path_buf();
        self
    }

    pub fn components_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.components = path.as_ref().to_path_buf();
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn index_path(&self) -> PathBuf {
        self.output.join(&self.index_file)
    }

    pub fn routing_marker_path(&self) -> PathBuf {
        self.output.join(&self.routing_marker)
    }

    /// Shared template directories, excluded from mirroring.
    pub fn shared_dirs(&self) -> Vec<PathBuf> {
        vec![self.layouts.clone(), self.components.clone()]
    }

    pub fn is_passthrough(&self, file_name: &str) -> bool {
        self.passthrough_files
            .iter()
            .any(|name| name.eq_ignore_ascii_case(file_name))
    }
}
