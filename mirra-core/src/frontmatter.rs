use std::collections::BTreeMap;
use std::path::Path;

use serde_yaml::Value;
use thiserror::Error;

const DELIMITER: &str = "---";

#[derive(Error, Debug)]
pub enum FrontmatterError {
    #[error("invalid frontmatter: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("frontmatter must be a mapping of keys to values")]
    NotAMapping,
    #[error("frontmatter value for `{0}` is not a string, number or boolean")]
    NotScalar(String),
}

/// A content file split into its metadata and body.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceItem {
    pub data: BTreeMap<String, String>,
    pub content: String,
    /// Line of the source file that `content` starts on
    pub body_line: usize,
}

impl Default for SourceItem {
    fn default() -> Self {
        Self {
            data: BTreeMap::new(),
            content: String::new(),
            body_line: 1,
        }
    }
}

impl SourceItem {
    /// Splits off a leading `---` block and parses it as flat YAML.
    ///
    /// Text without a complete leading block comes back untouched with no
    /// data. The body after a block is trimmed.
    pub fn parse(text: &str) -> Result<Self, FrontmatterError> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let Some((block, body_start)) = split(text) else {
            return Ok(Self::plain(text));
        };

        Ok(Self {
            data: parse_block(block)?,
            ..Self::body(text, body_start)
        })
    }

    /// Like [`SourceItem::parse`], but a malformed block is logged and
    /// treated as empty metadata.
    pub fn parse_lossy(text: &str, file: &Path) -> Self {
        match Self::parse(text) {
            Ok(item) => item,
            Err(e) => {
                log::warn!("{}: {e}, ignoring frontmatter", file.display());
                let text = text.strip_prefix('\u{feff}').unwrap_or(text);
                match split(text) {
                    Some((_, body_start)) => Self::body(text, body_start),
                    None => Self::plain(text),
                }
            }
        }
    }

    fn plain(text: &str) -> Self {
        Self {
            content: text.to_string(),
            ..Self::default()
        }
    }

    /// The trimmed body starting at byte `start` of `text`.
    fn body(text: &str, start: usize) -> Self {
        let body = &text[start..];
        let leading = body.len() - body.trim_start().len();

        Self {
            data: BTreeMap::new(),
            content: body.trim().to_string(),
            body_line: text[..start + leading].matches('\n').count() + 1,
        }
    }
}

/// Returns the text between the opening and closing delimiter lines, and
/// the byte offset just past the closing one.
fn split(text: &str) -> Option<(&str, usize)> {
    let (first, rest) = text.split_once('\n')?;
    if first.trim_end() != DELIMITER {
        return None;
    }

    let rest_start = first.len() + 1;
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == DELIMITER {
            return Some((&rest[..offset], rest_start + offset + line.len()));
        }
        offset += line.len();
    }

    None
}

fn parse_block(block: &str) -> Result<BTreeMap<String, String>, FrontmatterError> {
    let mapping = match serde_yaml::from_str::<Value>(block)? {
        Value::Null => return Ok(BTreeMap::new()),
        Value::Mapping(mapping) => mapping,
        _ => return Err(FrontmatterError::NotAMapping),
    };

    let mut data = BTreeMap::new();
    for (key, value) in mapping {
        let key = scalar(&key).ok_or(FrontmatterError::NotAMapping)?;
        let value = scalar(&value).ok_or_else(|| FrontmatterError::NotScalar(key.clone()))?;
        data.insert(key, value);
    }

    Ok(data)
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}
