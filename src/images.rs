//! Image placement for chapter bodies and cover art.
//!
//! ## Chapter images
//!
//! A chapter body may embed images with markdown syntax (`![alt](map.png)`) or
//! raw HTML (`<img src="map.png">`). Relative references resolve against the
//! chapter file's directory and are copied next to the story:
//!
//! ```text
//! content/novel/chapters/map.png        ← ![Map](map.png) in chapter-1.md
//! build/novel/images/chapter-1/map.png  ← copied here
//! build/novel/en/chapter-1/index.html   ← references ../../images/chapter-1/map.png
//! ```
//!
//! Every language of a chapter shares one image directory. Two different
//! source files with the same name in one chapter directory get a content
//! hash prefix for the second one. External URLs, site-rooted paths and
//! `data:` URIs are left alone, as is any reference whose file is missing.
//!
//! ## Cover art
//!
//! Covers are content-addressed: `/static/images/{hash12}-{name}`. The same
//! file used by several stories or arcs is stored once.

use crate::naming;
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Hex characters of the content hash in cover art file names.
pub const COVER_HASH_LEN: usize = 12;

/// Site-relative directory holding cover art.
pub const COVER_DIR: &str = "static/images";

static MARKDOWN_IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"!\[[^\]]*\]\(\s*<?([^)\s>]+)>?(?:\s+["'][^"']*["'])?\s*\)"#).unwrap()
});

static HTML_IMG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<img\b[^>]*?\bsrc\s*=\s*["']([^"']+)["']"#).unwrap()
});

/// Whether an image reference points at a file next to the chapter.
pub fn is_local_reference(src: &str) -> bool {
    let lower = src.to_ascii_lowercase();
    !(src.is_empty()
        || src.starts_with('/')
        || src.starts_with('#')
        || lower.starts_with("http://")
        || lower.starts_with("https://")
        || lower.starts_with("data:")
        || lower.contains("://"))
}

/// Replace capture group 1 of every match with `f(group)`, when `f` returns
/// `Some`.
pub fn rewrite_sources(body: &str, mut f: impl FnMut(&str) -> Option<String>) -> String {
    let body = replace_group(&MARKDOWN_IMAGE_RE, body, &mut f);
    replace_group(&HTML_IMG_RE, &body, &mut f)
}

fn replace_group(
    re: &Regex,
    text: &str,
    f: &mut impl FnMut(&str) -> Option<String>,
) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in re.captures_iter(text) {
        let Some(group) = caps.get(1) else { continue };
        if let Some(replacement) = f(group.as_str()) {
            out.push_str(&text[last..group.start()]);
            out.push_str(&replacement);
            last = group.end();
        }
    }
    out.push_str(&text[last..]);
    out
}

/// Copies chapter images for one story, remembering what each chapter
/// directory already holds across languages.
#[derive(Debug)]
pub struct ChapterImages {
    story_root: PathBuf,
    /// chapter id → (output file name → source file)
    placed: HashMap<String, HashMap<String, PathBuf>>,
}

impl ChapterImages {
    /// `story_root` is the story's output directory (`build/{story}`).
    pub fn new(story_root: &Path) -> Self {
        Self {
            story_root: story_root.to_path_buf(),
            placed: HashMap::new(),
        }
    }

    /// Copy every local image the body references and return the body with
    /// those references rewritten relative to the chapter page.
    pub fn place(&mut self, chapter_id: &str, body: &str, source_dir: Option<&Path>) -> io::Result<String> {
        let Some(source_dir) = source_dir else {
            return Ok(body.to_string());
        };

        let mut failure = None;
        let rewritten = rewrite_sources(body, |src| {
            if failure.is_some() || !is_local_reference(src) {
                return None;
            }
            let source = source_dir.join(src);
            if !source.is_file() {
                tracing::warn!(chapter = chapter_id, src, "image not found, leaving reference unchanged");
                return None;
            }
            match self.copy_into_chapter(chapter_id, &source) {
                Ok(name) => Some(format!("../../images/{chapter_id}/{name}")),
                Err(err) => {
                    failure = Some(err);
                    None
                }
            }
        });

        match failure {
            Some(err) => Err(err),
            None => Ok(rewritten),
        }
    }

    fn copy_into_chapter(&mut self, chapter_id: &str, source: &Path) -> io::Result<String> {
        let source = source.canonicalize()?;
        let placed = self.placed.entry(chapter_id.to_string()).or_default();

        if let Some((name, _)) = placed.iter().find(|(_, s)| **s == source) {
            return Ok(name.clone());
        }

        let base = file_name(&source);
        let name = if placed.contains_key(&base) {
            format!("{}-{base}", naming::hash_prefix(&fs::read(&source)?, 8))
        } else {
            base
        };

        let dir = self.story_root.join("images").join(chapter_id);
        fs::create_dir_all(&dir)?;
        fs::copy(&source, dir.join(&name))?;
        tracing::debug!(chapter = chapter_id, name = %name, "image copied");
        placed.insert(name.clone(), source);
        Ok(name)
    }
}

/// Content-addressed file name for cover art: `{hash12}-{basename}`.
pub fn cover_file_name(source: &Path) -> io::Result<String> {
    let bytes = fs::read(source)?;
    Ok(format!(
        "{}-{}",
        naming::hash_prefix(&bytes, COVER_HASH_LEN),
        file_name(source)
    ))
}

/// Copy cover art into `/static/images/` once and return its site URL.
pub fn place_cover(source: &Path, output_root: &Path) -> io::Result<String> {
    let name = cover_file_name(source)?;
    let dir = output_root.join(COVER_DIR);
    let dest = dir.join(&name);
    if !dest.exists() {
        fs::create_dir_all(&dir)?;
        fs::copy(source, &dest)?;
    }
    Ok(format!("/{COVER_DIR}/{name}"))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "image".to_string())
}
