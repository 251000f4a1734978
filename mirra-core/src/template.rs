use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::frontmatter::SourceItem;
use crate::markdown;
use crate::page::SourceKind;
use crate::props::parse_props;
use crate::store::{TemplateStore, template_key};

/// Exact token a layout must contain; the page content replaces it.
pub const CONTENT_PLACEHOLDER: &str = "{{ content }}";

/// Comment markers the indexer understands; never component references.
pub const NOINDEX_START: &str = "noindex";
pub const NOINDEX_END: &str = "/noindex";

static VARIABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(.*?)\}\}").expect("variable pattern is valid"));
static COMPONENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<!--(.*?)-->").expect("component pattern is valid"));

pub type Bindings = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticKind {
    MissingComponent(String),
    InvalidComponentName(String),
    MalformedProps { component: String, message: String },
    MissingVariable(String),
    MissingLayout(String),
    MissingPlaceholder(String),
    CircularReference(Vec<String>),
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::MissingComponent(name) => {
                write!(f, "Component file not found: \"{name}\"")
            }
            DiagnosticKind::InvalidComponentName(name) => {
                write!(f, "Component reference leaves the components folder: \"{name}\"")
            }
            DiagnosticKind::MalformedProps { component, message } => {
                write!(f, "Component props for \"{component}\" are not a valid object: {message}")
            }
            DiagnosticKind::MissingVariable(name) => {
                write!(f, "Variable \"{name}\" has no value and no fallback")
            }
            DiagnosticKind::MissingLayout(name) => write!(f, "Layout file not found: \"{name}\""),
            DiagnosticKind::MissingPlaceholder(name) => {
                write!(f, "Layout \"{name}\" has no {CONTENT_PLACEHOLDER} placeholder")
            }
            DiagnosticKind::CircularReference(chain) => {
                write!(f, "Circular component reference: {}", chain.join(" -> "))
            }
        }
    }
}

/// A template problem that was recovered from.
///
/// `template` names the layout or component the marker sits in; `None`
/// means the page itself. `line` counts within that text.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub file: PathBuf,
    pub template: Option<String>,
    pub line: Option<usize>,
    pub kind: DiagnosticKind,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file.display())?;
        if let Some(template) = &self.template {
            write!(f, " (in {template})")?;
        }
        if let Some(line) = self.line {
            write!(f, " line {line}")?;
        }
        write!(f, ": {}", self.kind)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub text: String,
    pub diagnostics: Vec<Diagnostic>,
}

/// Expands layouts, components and variables in page content.
pub struct TemplateEngine<'a> {
    store: &'a TemplateStore,
}

impl<'a> TemplateEngine<'a> {
    pub fn new(store: &'a TemplateStore) -> Self {
        Self { store }
    }

    /// Renders one page: markdown conversion, own expansion, then the
    /// layout named in its frontmatter, if any.
    pub fn render_page(&self, item: &SourceItem, kind: SourceKind, file: &Path) -> Rendered {
        let body = match kind {
            SourceKind::Markdown => markdown::to_html(&item.content),
            _ => item.content.clone(),
        };

        let mut expansion = Expansion {
            store: self.store,
            file,
            diagnostics: Vec::new(),
        };

        // Markdown markers are located in the source, not the generated HTML.
        let origin = Origin {
            template: None,
            first_line: item.body_line,
            source: (kind == SourceKind::Markdown).then_some(item.content.as_str()),
        };
        let content = expansion.expand(&body, &item.data, &mut Vec::new(), origin);
        let text = match item.data.get("layout").filter(|l| !l.trim().is_empty()) {
            Some(layout) => expansion.wrap(layout, content, &item.data),
            None => content,
        };

        Rendered {
            text,
            diagnostics: expansion.diagnostics,
        }
    }

    /// Expands `text` against `bindings` with no layout step.
    pub fn render_str(&self, text: &str, bindings: &Bindings, file: &Path) -> Rendered {
        let mut expansion = Expansion {
            store: self.store,
            file,
            diagnostics: Vec::new(),
        };
        let text = expansion.expand(text, bindings, &mut Vec::new(), Origin::page());

        Rendered {
            text,
            diagnostics: expansion.diagnostics,
        }
    }
}

/// Where expanded text came from, for diagnostic line numbers.
#[derive(Clone, Copy)]
struct Origin<'t> {
    template: Option<&'t str>,
    /// Line of the original file the expanded text starts on
    first_line: usize,
    /// Text to find markers in when it differs from the expanded text
    source: Option<&'t str>,
}

impl Origin<'_> {
    fn page() -> Self {
        Self {
            template: None,
            first_line: 1,
            source: None,
        }
    }

    fn line(&self, text: &str, caps: &Captures) -> Option<usize> {
        let marker = caps.get(0)?;
        let line = match self.source {
            Some(source) => line_of(source, source.find(marker.as_str())?),
            None => line_of(text, marker.start()),
        };
        Some(line + self.first_line - 1)
    }
}

struct Expansion<'a, 'f> {
    store: &'a TemplateStore,
    file: &'f Path,
    diagnostics: Vec<Diagnostic>,
}

impl Expansion<'_, '_> {
    fn wrap(&mut self, layout_ref: &str, content: String, data: &Bindings) -> String {
        let store = self.store;
        let layout_ref = layout_ref.trim();
        let layout = template_key(layout_ref).and_then(|key| store.layout(&key).map(|l| (key, l)));

        let Some((key, layout)) = layout else {
            self.report(Origin::page(), None, DiagnosticKind::MissingLayout(layout_ref.into()));
            return content;
        };
        if !layout.contains(CONTENT_PLACEHOLDER) {
            self.report(Origin::page(), None, DiagnosticKind::MissingPlaceholder(key));
            return content;
        }

        let mut bindings = data.clone();
        bindings.insert("content".into(), content.clone());

        // Each stretch of layout around the placeholder is expanded on its
        // own so the already expanded content is not scanned again.
        let mut out = String::with_capacity(layout.len() + content.len());
        let mut line = 1;
        for (i, segment) in layout.split(CONTENT_PLACEHOLDER).enumerate() {
            if i > 0 {
                out.push_str(&content);
            }
            let origin = Origin {
                template: Some(&key),
                first_line: line,
                source: None,
            };
            out.push_str(&self.expand(segment, &bindings, &mut Vec::new(), origin));
            line += segment.matches('\n').count();
        }

        out
    }

    /// Variables first, then component references, each component
    /// expanded recursively against the merged bindings.
    fn expand(
        &mut self,
        text: &str,
        bindings: &Bindings,
        stack: &mut Vec<String>,
        origin: Origin<'_>,
    ) -> String {
        let text = VARIABLE_RE.replace_all(text, |caps: &Captures| {
            self.variable(text, caps, bindings, origin)
        });

        let expanded = COMPONENT_RE.replace_all(&text, |caps: &Captures| {
            self.component(&text, caps, bindings, stack, origin)
        });

        expanded.into_owned()
    }

    fn variable(
        &mut self,
        text: &str,
        caps: &Captures,
        bindings: &Bindings,
        origin: Origin<'_>,
    ) -> String {
        let marker = &caps[0];
        let (name, fallback) = match caps[1].split_once("||") {
            Some((name, fallback)) => (name.trim(), Some(fallback.trim())),
            None => (caps[1].trim(), None),
        };

        if let Some(value) = bindings.get(name).filter(|v| !v.is_empty()) {
            return value.clone();
        }
        if let Some(fallback) = fallback {
            return fallback.to_string();
        }

        let line = origin.line(text, caps);
        self.report(origin, line, DiagnosticKind::MissingVariable(name.into()));
        marker.to_string()
    }

    fn component(
        &mut self,
        text: &str,
        caps: &Captures,
        bindings: &Bindings,
        stack: &mut Vec<String>,
        origin: Origin<'_>,
    ) -> String {
        let marker = &caps[0];
        let inner = caps[1].trim();
        if inner == NOINDEX_START || inner == NOINDEX_END {
            return marker.to_string();
        }

        let line = origin.line(text, caps);
        let (reference, props) = match inner.split_once(',') {
            Some((reference, props)) => (reference.trim(), Some(props.trim())),
            None => (inner, None),
        };

        let Some(key) = template_key(reference) else {
            self.report(origin, line, DiagnosticKind::InvalidComponentName(reference.into()));
            return marker.to_string();
        };
        let store = self.store;
        let Some(component) = store.component(&key) else {
            self.report(origin, line, DiagnosticKind::MissingComponent(reference.into()));
            return marker.to_string();
        };
        if stack.contains(&key) {
            let mut chain = stack.clone();
            chain.push(key);
            self.report(origin, line, DiagnosticKind::CircularReference(chain));
            return marker.to_string();
        }

        let mut merged = bindings.clone();
        if let Some(props) = props {
            match parse_props(props) {
                Ok(props) => {
                    merged.extend(props.into_iter().map(|(k, v)| (k, v.to_string())));
                }
                Err(e) => {
                    let kind = DiagnosticKind::MalformedProps {
                        component: key.clone(),
                        message: e.to_string(),
                    };
                    self.report(origin, line, kind);
                }
            }
        }

        let name = key.clone();
        stack.push(key);
        let nested = Origin {
            template: Some(&name),
            ..Origin::page()
        };
        let expanded = self.expand(component, &merged, stack, nested);
        stack.pop();

        expanded
    }

    fn report(&mut self, origin: Origin<'_>, line: Option<usize>, kind: DiagnosticKind) {
        let diagnostic = Diagnostic {
            file: self.file.to_path_buf(),
            template: origin.template.map(str::to_owned),
            line,
            kind,
        };

        match diagnostic.kind {
            DiagnosticKind::MissingVariable(_) => log::warn!("{diagnostic}"),
            _ => log::error!("{diagnostic}"),
        }
        self.diagnostics.push(diagnostic);
    }
}

fn line_of(text: &str, offset: usize) -> usize {
    text[..offset].matches('\n').count() + 1
}
