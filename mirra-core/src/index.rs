use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{BuildError, Result};
use crate::output::write_atomic;
use crate::page::is_markup;

/// Summary of one rendered page. Field order is the serialized order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub title: String,
    pub description: String,
    pub url: String,
    pub content: String,
}

macro_rules! pattern {
    ($name:ident, $re:expr) => {
        static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($re).expect("index pattern is valid"));
    };
}

pattern!(TITLE_RE, r"(?is)<title\b[^>]*>(.*?)</title\s*>");
pattern!(META_RE, r"(?is)<meta\b[^>]*>");
pattern!(META_NAME_RE, r#"(?i)\bname\s*=\s*["']?description["']?"#);
pattern!(META_CONTENT_RE, r#"(?is)\bcontent\s*=\s*(?:"([^"]*)"|'([^']*)')"#);
pattern!(MAIN_RE, r"(?is)<main\b[^>]*>(.*)</main\s*>");
pattern!(BODY_RE, r"(?is)<body\b[^>]*>(.*)</body\s*>");
pattern!(NOINDEX_RE, r"(?is)<!--\s*noindex\s*-->.*?<!--\s*/noindex\s*-->");
pattern!(ASIDE_RE, r"(?is)<aside\b[^>]*>.*?</aside\s*>");
pattern!(SCRIPT_RE, r"(?is)<script\b[^>]*>.*?</script\s*>");
pattern!(STYLE_RE, r"(?is)<style\b[^>]*>.*?</style\s*>");
pattern!(COMMENT_RE, r"(?s)<!--.*?-->");
pattern!(TAG_RE, r"<[^>]+>");
pattern!(SPACE_RE, r"\s+");

/// Walks the finished output tree in file-name order and summarizes every
/// `.html` page except `not_found_page`.
///
/// Pages that cannot be read are logged and left out.
pub fn build_index(output: &Path, not_found_page: &str) -> Result<Vec<ContentRecord>> {
    let mut records = Vec::new();

    for entry in WalkDir::new(output).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() || !is_markup(entry.path()) {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(output)
            .map_err(|_| BuildError::InvalidPath(entry.path().to_path_buf()))?;
        let url = url_of(relative);
        if url.trim_start_matches('/') == not_found_page.trim_start_matches('/') {
            continue;
        }

        match std::fs::read_to_string(entry.path()) {
            Ok(markup) => records.push(extract(&markup, url)),
            Err(e) => log::error!("Could not index {}: {e}", entry.path().display()),
        }
    }

    Ok(records)
}

pub fn extract(markup: &str, url: String) -> ContentRecord {
    let title = TITLE_RE
        .captures(markup)
        .map(|caps| condense(&caps[1]))
        .unwrap_or_default();

    let description = META_RE
        .find_iter(markup)
        .map(|m| m.as_str())
        .find(|tag| META_NAME_RE.is_match(tag))
        .and_then(|tag| META_CONTENT_RE.captures(tag))
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| condense(m.as_str()))
        .unwrap_or_default();

    let region = MAIN_RE
        .captures(markup)
        .or_else(|| BODY_RE.captures(markup))
        .and_then(|caps| caps.get(1))
        .map_or(markup, |m| m.as_str());

    let mut body = NOINDEX_RE.replace_all(region, " ").into_owned();
    for re in [&*ASIDE_RE, &*SCRIPT_RE, &*STYLE_RE, &*COMMENT_RE, &*TAG_RE] {
        body = re.replace_all(&body, " ").into_owned();
    }

    ContentRecord {
        title,
        description,
        url,
        content: condense(&body),
    }
}

/// Serializes the index as 4-space indented JSON.
pub fn to_json(records: &[ContentRecord]) -> Result<String> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    records.serialize(&mut serializer)?;

    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// Writes the index unless the file already holds exactly this content.
/// Returns whether a write happened.
pub fn write_index(path: &Path, records: &[ContentRecord]) -> Result<bool> {
    let json = to_json(records)?;
    match std::fs::read_to_string(path) {
        Ok(existing) if existing == json => return Ok(false),
        _ => {}
    }

    write_atomic(path, json.as_bytes())?;
    Ok(true)
}

fn url_of(relative: &Path) -> String {
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    format!("/{}", parts.join("/"))
}

fn condense(text: &str) -> String {
    let decoded = html_escape::decode_html_entities(text);
    SPACE_RE.replace_all(&decoded, " ").trim().to_string()
}
