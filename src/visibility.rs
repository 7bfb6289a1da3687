//! Chapter publication policy.
//!
//! Front matter carries three independent flags (`hidden`, `draft`,
//! `password`). They reduce to one inclusion decision, [`should_skip`], that
//! every aggregate surface applies: table of contents, navigation, tag index,
//! sitemap, robots allow-set, feeds, e-books. A skipped chapter still gets its
//! own page; it is just never linked to or listed.
//!
//! Translation status is separate: a chapter missing in some language is still
//! listed there, rendered from the primary text with a banner.

use crate::metadata::FrontMatter;

/// Options fixed for the whole build and passed to every planner call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Treat `draft: true` chapters as publishable.
    pub include_drafts: bool,
}

/// Dominant state of a chapter, for display and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChapterState {
    Visible,
    Hidden,
    Draft,
    PasswordProtected,
    TranslationMissing,
}

impl ChapterState {
    pub fn label(self) -> &'static str {
        match self {
            ChapterState::Visible => "visible",
            ChapterState::Hidden => "hidden",
            ChapterState::Draft => "draft",
            ChapterState::PasswordProtected => "password-protected",
            ChapterState::TranslationMissing => "translation missing",
        }
    }
}

/// Whether a chapter is left out of every aggregate surface.
pub fn should_skip(front: &FrontMatter, opts: BuildOptions) -> bool {
    front.hidden || (front.draft && !opts.include_drafts) || front.password_set()
}

/// Reduce the flags to one state. Precedence: hidden, excluded draft,
/// password, missing translation.
pub fn classify(front: &FrontMatter, translation_missing: bool, opts: BuildOptions) -> ChapterState {
    if front.hidden {
        ChapterState::Hidden
    } else if front.draft && !opts.include_drafts {
        ChapterState::Draft
    } else if front.password_set() {
        ChapterState::PasswordProtected
    } else if translation_missing {
        ChapterState::TranslationMissing
    } else {
        ChapterState::Visible
    }
}

/// Visibility of one chapter in one language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visibility {
    pub skip: bool,
    pub state: ChapterState,
    pub translation_missing: bool,
}

impl Visibility {
    /// Evaluate `front` (the record the page renders from; the primary record
    /// when the translation is missing).
    pub fn evaluate(front: &FrontMatter, translation_missing: bool, opts: BuildOptions) -> Self {
        Self {
            skip: should_skip(front, opts),
            state: classify(front, translation_missing, opts),
            translation_missing,
        }
    }
}
