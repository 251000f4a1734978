use std::path::{Path, PathBuf};

/// How a source file turns into its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// HTML, expanded through the template engine
    Markup,
    /// Markdown, converted to HTML first, then expanded
    Markdown,
    /// Anything else, copied byte for byte
    Asset,
}

impl SourceKind {
    pub fn of(path: &Path) -> Self {
        match extension(path) {
            Some("html") => SourceKind::Markup,
            Some("md") => SourceKind::Markdown,
            _ => SourceKind::Asset,
        }
    }

    pub fn is_template(&self) -> bool {
        !matches!(self, SourceKind::Asset)
    }
}

pub fn is_markup(path: &Path) -> bool {
    extension(path) == Some("html")
}

pub fn is_markdown(path: &Path) -> bool {
    extension(path) == Some("md")
}

/// Where the build output of `mirror` lands: markdown becomes `.html`,
/// everything else keeps its name.
pub fn output_path(mirror: &Path) -> PathBuf {
    if is_markdown(mirror) {
        mirror.with_extension("html")
    } else {
        mirror.to_path_buf()
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}
