//! End-to-end build of a small two-story site through the public API.

use quire::cache::ChapterCache;
use quire::generate::{self, GenerateError};
use quire::output;
use quire::scan;
use quire::visibility::BuildOptions;
use std::fs;
use std::io::Read;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn read(root: &Path, rel: &str) -> String {
    let path = root.join(rel);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("{}: {e}", path.display()))
}

/// `saga` has two arcs and per-arc bundles; `notes` is all drafts.
fn source_tree() -> TempDir {
    let src = TempDir::new().unwrap();
    let root = src.path();
    write(
        root,
        "site_config.yaml",
        "site_name: Night Shelf\nsite_url: https://shelf.example.org/\nsite_description: Serials\n",
    );
    write(
        root,
        "content/saga/config.yaml",
        "\
title: The Saga
description: A long story.
epub:
  arc_bundles: true
arcs:
  - title: Beginnings
    chapters:
      - id: one
      - id: two
  - title: Endings
    chapters:
      - id: three
      - id: four
",
    );
    write(root, "content/saga/chapters/one.md", "---\ntitle: Dawn\npublished: 2024-03-01\ntags: [Sun]\n---\nThe sun rose.");
    write(root, "content/saga/chapters/two.md", "---\ntitle: Noon\nhidden: true\n---\nNobody sees this.");
    write(root, "content/saga/chapters/three.md", "---\ntitle: Dusk\npublished: 2024-03-03\ntags: [Sun, Night]\n---\nThe sun set.");
    write(root, "content/saga/chapters/four.md", "---\ntitle: Midnight\npassword: owl\n---\nOnly owls know.");
    write(root, "content/saga/chapters/es/one.md", "---\ntitle: Amanecer\n---\nEl sol salió.");

    write(root, "content/notes/config.yaml", "title: Notes\n");
    write(root, "content/notes/chapters/draft.md", "---\ntitle: Sketch\ndraft: true\n---\nRough.");
    src
}

#[test]
fn full_build_produces_consistent_site() {
    let src = source_tree();
    let out = TempDir::new().unwrap();
    let build = out.path().join("site");

    let manifest = scan::scan(src.path()).unwrap();
    let summary = generate::generate(&manifest, &build, BuildOptions::default()).unwrap();
    assert!(summary.epub.failed.is_empty());

    // Every declared chapter has a page in both languages.
    for lang in ["en", "es"] {
        for id in ["one", "two", "three", "four"] {
            assert!(build.join("saga").join(lang).join(id).join("index.html").is_file(), "{lang}/{id}");
        }
    }

    let toc = read(&build, "saga/en/toc/index.html");
    assert!(toc.contains("/saga/en/one/"));
    assert!(toc.contains("/saga/en/three/"));
    assert!(!toc.contains("/saga/en/two/"));
    assert!(!toc.contains("/saga/en/four/"));
    assert!(toc.contains("/static/epub/saga.epub"));
    assert!(toc.contains("/static/epub/saga-beginnings.epub"));
    assert!(toc.contains("/static/epub/saga-endings.epub"));

    // Navigation skips the hidden chapter.
    let one = read(&build, "saga/en/one/index.html");
    assert!(one.contains(r#"rel="next" href="/saga/en/three/""#));

    // Spanish falls back for untranslated chapters.
    let es_three = read(&build, "saga/es/three/index.html");
    assert!(es_three.contains("The sun set."));
    assert!(es_three.contains("translation-missing"));
    let es_toc = read(&build, "saga/es/toc/index.html");
    assert!(es_toc.contains("/saga/es/one/"));

    // The protected body only ships encrypted.
    let four = read(&build, "saga/en/four/index.html");
    assert!(!four.contains("Only owls know."));
    assert!(four.contains("data-ciphertext"));

    let tags = read(&build, "saga/en/tags/sun/index.html");
    assert!(tags.contains("/saga/en/one/"));
    assert!(tags.contains("/saga/en/three/"));

    let robots = read(&build, "robots.txt");
    assert!(robots.contains("Disallow: /saga/en/two/"));
    assert!(robots.contains("Disallow: /saga/es/four/"));

    let sitemap = read(&build, "sitemap.xml");
    assert!(sitemap.contains("https://shelf.example.org/saga/en/one/"));
    assert!(!sitemap.contains("/saga/en/two/"));
    assert!(!sitemap.contains("/notes/"));

    let rss = read(&build, "rss.xml");
    assert!(rss.contains("Dawn"));
    assert!(rss.contains("Dusk"));
    assert!(!rss.contains("Sketch"));

    // Drafts-only story has pages but no listing on the home page.
    assert!(build.join("notes/en/draft/index.html").is_file());
    let index = read(&build, "index.html");
    assert!(index.contains("The Saga"));
    assert!(!index.contains("Notes"));
}

#[test]
fn epub_contains_only_listed_chapters() {
    let src = source_tree();
    let out = TempDir::new().unwrap();
    let build = out.path().join("site");
    let manifest = scan::scan(src.path()).unwrap();
    generate::generate(&manifest, &build, BuildOptions::default()).unwrap();

    let file = fs::File::open(build.join("static/epub/saga.epub")).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    assert_eq!(archive.by_index(0).unwrap().name(), "mimetype");

    let mut text = String::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).unwrap();
        if entry.name().ends_with(".xhtml") {
            entry.read_to_string(&mut text).unwrap();
        }
    }
    assert!(text.contains("The sun rose."));
    assert!(text.contains("The sun set."));
    assert!(!text.contains("Nobody sees this."));
    assert!(!text.contains("Only owls know."));

    let file = fs::File::open(build.join("static/epub/saga-endings.epub")).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut chapter = String::new();
    archive
        .by_name("OEBPS/chap-1.xhtml")
        .unwrap()
        .read_to_string(&mut chapter)
        .unwrap();
    assert!(chapter.contains("The sun set."));
    assert!(archive.by_name("OEBPS/chap-2.xhtml").is_err());
}

#[test]
fn include_drafts_publishes_draft_story() {
    let src = source_tree();
    let out = TempDir::new().unwrap();
    let build = out.path().join("site");
    let manifest = scan::scan(src.path()).unwrap();
    generate::generate(&manifest, &build, BuildOptions { include_drafts: true }).unwrap();

    let index = read(&build, "index.html");
    assert!(index.contains("Notes"));
    assert!(read(&build, "notes/en/toc/index.html").contains("/notes/en/draft/"));
    assert!(build.join("static/epub/notes.epub").is_file());
}

#[test]
fn check_reports_states_without_writing() {
    let src = source_tree();
    let manifest = scan::scan(src.path()).unwrap();
    let cache = ChapterCache::build(&manifest, BuildOptions::default()).unwrap();
    let lines = output::format_check_output(&manifest, &cache).join("\n");
    assert!(lines.contains("two Noon [hidden]"));
    assert!(lines.contains("four Midnight [password-protected]"));
    assert!(lines.contains("draft Sketch [draft]"));
    assert!(!src.path().join("build").exists());
}

#[test]
fn output_inside_source_is_refused() {
    let src = source_tree();
    let manifest = scan::scan(src.path()).unwrap();
    let err = generate::generate(&manifest, src.path(), BuildOptions::default()).unwrap_err();
    assert!(matches!(err, GenerateError::UnsafeOutput(_)));
}
