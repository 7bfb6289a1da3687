//! Chapter front matter: the metadata block at the top of a chapter file.
//!
//! A chapter file may open with a YAML block fenced by `---` lines:
//!
//! ```text
//! ---
//! title: The Prophecy
//! tags: [prophecy, "main plot"]
//! published: 2024-03-01
//! ---
//! # Chapter 1
//!
//! Body markdown starts here.
//! ```
//!
//! ## Tolerance
//!
//! Parsing never fails. Content authors edit these files by hand, and a typo in
//! one chapter must not take the whole site down:
//!
//! - **No block**: the record is empty and the whole text is the body.
//! - **Unterminated block**: treated exactly like no block.
//! - **Malformed YAML**: the record is empty and the whole text (delimiters
//!   included) is the body. The [`FrontMatterStatus::Malformed`] status lets the
//!   caller surface a build warning.
//!
//! ## Scalars
//!
//! YAML happily reads `password: 1234` as an integer and `published: 2024` as a
//! number. Every string-valued key accepts any scalar and keeps its textual
//! form, so those records still parse. Flags accept `true`/`false`,
//! `yes`/`no`, `on`/`off` and `1`/`0` in any case, quoted or not.

use serde::{Deserialize, Deserializer};

/// Line that opens and closes a front matter block.
const DELIMITER: &str = "---";

/// Typed chapter front matter. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FrontMatter {
    #[serde(deserialize_with = "scalar_string")]
    pub title: Option<String>,
    #[serde(deserialize_with = "scalar_list")]
    pub tags: Vec<String>,
    #[serde(deserialize_with = "scalar_bool")]
    pub hidden: bool,
    #[serde(deserialize_with = "scalar_bool")]
    pub draft: bool,
    #[serde(deserialize_with = "scalar_string")]
    pub password: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub password_hint: Option<String>,
    /// HTML-safe commentary shown under the chapter when translation notes are on.
    #[serde(deserialize_with = "scalar_string")]
    pub translator_commentary: Option<String>,
    /// Publication date, `YYYY-MM-DD`. Kept as text; validity is checked where
    /// the date is consumed (feeds, sitemap).
    #[serde(deserialize_with = "scalar_string")]
    pub published: Option<String>,
    #[serde(deserialize_with = "scalar_opt_bool")]
    pub show_tags: Option<bool>,
    #[serde(deserialize_with = "scalar_opt_bool")]
    pub show_metadata: Option<bool>,
    #[serde(deserialize_with = "scalar_opt_bool")]
    pub show_translation_notes: Option<bool>,
    pub seo: SeoOverrides,
    pub social_embeds: SocialOverrides,
    pub comments: CommentsOverride,
    #[serde(deserialize_with = "scalar_string")]
    pub author: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub translator: Option<String>,
}

/// `seo:` overrides shared by chapter front matter and story config.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SeoOverrides {
    #[serde(deserialize_with = "scalar_opt_bool")]
    pub allow_indexing: Option<bool>,
    #[serde(deserialize_with = "scalar_string")]
    pub meta_description: Option<String>,
}

/// `social_embeds:` overrides shared by chapter front matter and story config.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SocialOverrides {
    #[serde(deserialize_with = "scalar_string")]
    pub title: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub description: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub image: Option<String>,
    #[serde(deserialize_with = "scalar_list")]
    pub keywords: Vec<String>,
}

/// `comments:` override shared by chapter front matter and story config.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CommentsOverride {
    #[serde(deserialize_with = "scalar_opt_bool")]
    pub enabled: Option<bool>,
}

impl FrontMatter {
    /// True when a non-blank password is set.
    pub fn password_set(&self) -> bool {
        self.password
            .as_deref()
            .is_some_and(|p| !p.trim().is_empty())
    }
}

/// How the front matter block of a file was handled.
#[derive(Debug, Clone, PartialEq)]
pub enum FrontMatterStatus {
    /// No delimited block at the top of the file.
    Absent,
    /// A block was found and parsed.
    Parsed,
    /// A block was found but could not be parsed; the record is empty.
    Malformed(String),
}

/// A content file split into its metadata record and markdown body.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub front: FrontMatter,
    pub body: String,
    pub status: FrontMatterStatus,
}

/// Split raw file text into front matter and body.
///
/// See the module docs for the tolerance rules.
pub fn parse(text: &str) -> ParsedFile {
    let Some((block, body)) = split_block(text) else {
        return ParsedFile {
            front: FrontMatter::default(),
            body: text.to_string(),
            status: FrontMatterStatus::Absent,
        };
    };

    if block.trim().is_empty() {
        return ParsedFile {
            front: FrontMatter::default(),
            body: body.to_string(),
            status: FrontMatterStatus::Parsed,
        };
    }

    match serde_yaml::from_str::<Option<FrontMatter>>(block) {
        Ok(front) => ParsedFile {
            front: front.unwrap_or_default(),
            body: body.to_string(),
            status: FrontMatterStatus::Parsed,
        },
        Err(err) => ParsedFile {
            front: FrontMatter::default(),
            body: text.to_string(),
            status: FrontMatterStatus::Malformed(err.to_string()),
        },
    }
}

/// Locate the delimited block. Returns `(block, body)`.
fn split_block(text: &str) -> Option<(&str, &str)> {
    let text_start = text.strip_prefix('\u{feff}').unwrap_or(text);
    let (first, rest) = split_line(text_start)?;
    if first.trim_end() != DELIMITER {
        return None;
    }

    let mut offset = 0;
    let mut remaining = rest;
    while let Some((line, after)) = split_line(remaining) {
        if line.trim_end() == DELIMITER {
            return Some((&rest[..offset], after));
        }
        offset += remaining.len() - after.len();
        remaining = after;
    }
    None
}

/// Split off the first line. The returned line excludes its terminator; the
/// remainder starts after it. Returns `None` on empty input.
fn split_line(text: &str) -> Option<(&str, &str)> {
    if text.is_empty() {
        return None;
    }
    match text.find('\n') {
        Some(pos) => {
            let line = &text[..pos];
            Some((line.strip_suffix('\r').unwrap_or(line), &text[pos + 1..]))
        }
        None => Some((text, "")),
    }
}

/// Accept any YAML scalar for a string-valued key. Shared with the config
/// structs, which follow the same rule.
pub(crate) fn scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_yaml::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_yaml::Value::Null) => Ok(None),
        Some(v) => scalar_text(&v)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("expected a scalar value")),
    }
}

/// Accept a list of scalars, or a single scalar as a one-element list.
pub(crate) fn scalar_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_yaml::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_yaml::Value::Null) => Ok(Vec::new()),
        Some(serde_yaml::Value::Sequence(items)) => items
            .iter()
            .map(|item| {
                scalar_text(item)
                    .ok_or_else(|| serde::de::Error::custom("expected a list of scalars"))
            })
            .collect(),
        Some(v) => scalar_text(&v)
            .map(|s| vec![s])
            .ok_or_else(|| serde::de::Error::custom("expected a list of scalars")),
    }
}

/// Accept YAML 1.1 style booleans for a flag.
pub(crate) fn scalar_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_opt_bool(deserializer)?.unwrap_or(false))
}

/// [`scalar_bool`] for override keys, where null means unset.
pub(crate) fn scalar_opt_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_yaml::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_yaml::Value::Null) => Ok(None),
        Some(v) => scalar_text(&v)
            .and_then(|text| parse_flag(&text))
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("expected a boolean (true/false, yes/no, on/off, 1/0)")),
    }
}

fn parse_flag(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" | "y" => Some(true),
        "false" | "no" | "off" | "0" | "n" => Some(false),
        _ => None,
    }
}

fn scalar_text(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
