//! Language discovery and chapter lookup with primary-language fallback.
//!
//! Every story has one primary language whose chapter files live directly in
//! `chapters/`. Translations live in two-letter subdirectories:
//!
//! ```text
//! chapters/
//! ├── chapter-1.md        # primary language, always present
//! ├── chapter-2.md
//! └── fr/
//!     └── chapter-1.md    # French translation of chapter 1 only
//! ```
//!
//! Requesting `chapter-2` in French falls back to the primary file and flags the
//! result as `translation_missing`, so the page can still be generated under its
//! French URL with a "not translated" banner.
//!
//! ## Lookup outcomes
//!
//! Lookups distinguish three cases instead of one catch-all:
//!
//! - **Absent file**: expected; move on to the fallback silently.
//! - **Malformed front matter**: warn, keep the chapter with an empty record.
//! - **Any other I/O failure**: [`LanguageError`], which aborts the build.

use crate::metadata::{self, FrontMatter, FrontMatterStatus};
use crate::scan::Story;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Extension of chapter files.
pub const CHAPTER_EXTENSION: &str = "md";

#[derive(Error, Debug)]
pub enum LanguageError {
    #[error("IO error reading {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

/// Where a resolved chapter's content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentSource {
    /// The language-specific file (or the primary file, for the primary language).
    Own,
    /// The primary-language file, standing in for a missing translation.
    PrimaryFallback,
    /// Neither file exists; the record is synthetic.
    NotFound,
}

/// Parsed front matter and body of one chapter file.
#[derive(Debug, Clone, Default)]
pub struct ChapterRecord {
    pub front: FrontMatter,
    pub body: String,
    /// Source file, `None` for the synthetic not-found record.
    pub path: Option<PathBuf>,
}

impl ChapterRecord {
    /// Placeholder used when a declared chapter has no file at all.
    pub fn not_found(chapter_id: &str) -> Self {
        Self {
            front: FrontMatter::default(),
            body: format!("# {chapter_id}\n\nContent not found."),
            path: None,
        }
    }

    /// Directory relative image references in the body resolve against.
    pub fn source_dir(&self) -> Option<&Path> {
        self.path.as_deref().and_then(Path::parent)
    }
}

/// A chapter record resolved for one language.
#[derive(Debug, Clone)]
pub struct ResolvedChapter {
    pub record: ChapterRecord,
    pub source: ContentSource,
    /// True when the requested language has no file of its own.
    pub translation_missing: bool,
}

/// All languages a story is published in: the primary language plus every
/// two-character subdirectory of `chapters/`, sorted and deduplicated.
pub fn available_languages(chapters_dir: &Path, primary: &str) -> Vec<String> {
    let mut languages = vec![primary.to_string()];
    if let Ok(entries) = fs::read_dir(chapters_dir) {
        languages.extend(
            entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_dir())
                .map(|e| e.file_name().to_string_lossy().to_string())
                .filter(|name| name.chars().count() == 2),
        );
    }
    languages.sort();
    languages.dedup();
    languages
}

/// Path of a chapter file. `lang = None` addresses the primary-language root.
pub fn chapter_file(chapters_dir: &Path, chapter_id: &str, lang: Option<&str>) -> PathBuf {
    let file_name = format!("{chapter_id}.{CHAPTER_EXTENSION}");
    match lang {
        Some(lang) => chapters_dir.join(lang).join(file_name),
        None => chapters_dir.join(file_name),
    }
}

/// Whether `lang` has its own file for the chapter.
///
/// Always true for the primary language. Says nothing about whether the
/// translated text actually differs from the primary text.
pub fn translation_exists(chapters_dir: &Path, chapter_id: &str, lang: &str, primary: &str) -> bool {
    lang == primary || chapter_file(chapters_dir, chapter_id, Some(lang)).is_file()
}

/// Resolve a chapter's content for `lang`, falling back to the primary file.
pub fn resolve(story: &Story, chapter_id: &str, lang: &str) -> Result<ResolvedChapter, LanguageError> {
    let translation_missing =
        !translation_exists(&story.chapters_dir, chapter_id, lang, &story.primary_language);

    if lang != story.primary_language {
        let path = chapter_file(&story.chapters_dir, chapter_id, Some(lang));
        if let Some(record) = read_record(&path)? {
            return Ok(ResolvedChapter {
                record,
                source: ContentSource::Own,
                translation_missing,
            });
        }
    }

    let path = chapter_file(&story.chapters_dir, chapter_id, None);
    match read_record(&path)? {
        Some(record) => Ok(ResolvedChapter {
            record,
            source: if translation_missing {
                ContentSource::PrimaryFallback
            } else {
                ContentSource::Own
            },
            translation_missing,
        }),
        None => {
            tracing::warn!(story = %story.slug, chapter = chapter_id, "chapter file not found");
            Ok(ResolvedChapter {
                record: ChapterRecord::not_found(chapter_id),
                source: ContentSource::NotFound,
                translation_missing,
            })
        }
    }
}

/// Read and parse one chapter file. `Ok(None)` means the file does not exist.
fn read_record(path: &Path) -> Result<Option<ChapterRecord>, LanguageError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(LanguageError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let parsed = metadata::parse(&text);
    if let FrontMatterStatus::Malformed(reason) = &parsed.status {
        tracing::warn!(path = %path.display(), %reason, "malformed front matter, treating as empty");
    }
    Ok(Some(ChapterRecord {
        front: parsed.front,
        body: parsed.body,
        path: Some(path.to_path_buf()),
    }))
}
