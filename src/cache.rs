//! Per-build chapter record cache.
//!
//! Every chapter file is read and parsed exactly once per build. The cache
//! holds, for each (story, language) edition, the resolved record of every
//! declared chapter together with its visibility and effective page settings.
//! Pages, the tag index, the sitemap, robots rules, feeds and e-books all read
//! from the same entries, so they cannot disagree about what is published.
//!
//! Stories are loaded in parallel; each edition is loaded sequentially in
//! reading order.

use crate::config::SiteConfig;
use crate::language::{self, LanguageError, ResolvedChapter};
use crate::resolve::{self, PageSettings};
use crate::scan::{Manifest, Story};
use crate::visibility::{BuildOptions, Visibility};
use rayon::prelude::*;
use std::collections::HashMap;

/// One declared chapter resolved for one language.
#[derive(Debug, Clone)]
pub struct ChapterEntry {
    pub id: String,
    pub arc_index: usize,
    /// Front matter title, else the declared title, else the id.
    pub title: String,
    pub resolved: ResolvedChapter,
    pub visibility: Visibility,
    pub settings: PageSettings,
}

impl ChapterEntry {
    pub fn skip(&self) -> bool {
        self.visibility.skip
    }

    pub fn published(&self) -> Option<&str> {
        self.resolved.record.front.published.as_deref()
    }
}

/// All chapters of one story in one language, in reading order.
#[derive(Debug, Clone)]
pub struct LanguageEdition {
    pub story: String,
    pub lang: String,
    pub is_primary: bool,
    pub chapters: Vec<ChapterEntry>,
}

impl LanguageEdition {
    pub fn entry(&self, id: &str) -> Option<&ChapterEntry> {
        self.chapters.iter().find(|c| c.id == id)
    }

    /// Chapters that appear in aggregate surfaces.
    pub fn listed(&self) -> impl Iterator<Item = &ChapterEntry> {
        self.chapters.iter().filter(|c| !c.skip())
    }

    pub fn has_listed(&self) -> bool {
        self.listed().next().is_some()
    }
}

#[derive(Debug, Default)]
pub struct ChapterCache {
    editions: HashMap<String, Vec<LanguageEdition>>,
}

impl ChapterCache {
    /// Read every declared chapter of every story in every language.
    pub fn build(manifest: &Manifest, opts: BuildOptions) -> Result<Self, LanguageError> {
        let loaded: Vec<(String, Vec<LanguageEdition>)> = manifest
            .stories
            .par_iter()
            .map(|story| {
                let editions = story
                    .languages
                    .iter()
                    .map(|lang| load_edition(&manifest.site, story, lang, opts))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((story.slug.clone(), editions))
            })
            .collect::<Result<Vec<_>, LanguageError>>()?;

        Ok(Self {
            editions: loaded.into_iter().collect(),
        })
    }

    pub fn edition(&self, story: &str, lang: &str) -> Option<&LanguageEdition> {
        self.editions
            .get(story)?
            .iter()
            .find(|e| e.lang == lang)
    }

    /// Every edition of a story, sorted by language code.
    pub fn editions(&self, story: &str) -> &[LanguageEdition] {
        self.editions.get(story).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn load_edition(
    site: &SiteConfig,
    story: &Story,
    lang: &str,
    opts: BuildOptions,
) -> Result<LanguageEdition, LanguageError> {
    let mut chapters = Vec::with_capacity(story.chapter_count());
    for (arc_index, chapter) in story.chapters() {
        let resolved = language::resolve(story, &chapter.id, lang)?;
        let front = &resolved.record.front;
        let title = front
            .title
            .clone()
            .or_else(|| chapter.declared_title.clone())
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| chapter.id.clone());
        let visibility = Visibility::evaluate(front, resolved.translation_missing, opts);
        let settings = resolve::resolve_chapter(site, &story.config, front, &title);
        tracing::debug!(
            story = %story.slug,
            lang,
            chapter = %chapter.id,
            state = visibility.state.label(),
            "chapter loaded"
        );
        chapters.push(ChapterEntry {
            id: chapter.id.clone(),
            arc_index,
            title,
            resolved,
            visibility,
            settings,
        });
    }

    Ok(LanguageEdition {
        story: story.slug.clone(),
        lang: lang.to_string(),
        is_primary: lang == story.primary_language,
        chapters,
    })
}
