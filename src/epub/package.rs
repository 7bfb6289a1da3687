//! EPUB 3 container writer.
//!
//! Writes an OCF zip: `mimetype` first and stored, then `META-INF/container.xml`
//! and the `OEBPS/` package (OPF, nav document, NCX for older readers,
//! stylesheet, optional cover page, chapter XHTML, images). Inputs are already
//! resolved; this module does no content lookup.

use super::EpubError;
use crate::feeds::xml_escape;
use std::fs::{self, File};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;

const STYLE_CSS: &str = r#"@charset "utf-8";

html { font-family: serif; }
body { margin: 0; padding: 0 1.2em; line-height: 1.6; }
h1 { font-size: 1.5em; margin: 1.5em 0 1em; }
img { max-width: 100%; height: auto; }
blockquote { margin: 1em 0; padding: 0 1em; border-left: 4px solid #ddd; }
.cover { text-align: center; }
"#;

#[derive(Debug, Clone)]
pub struct PackageChapter {
    pub title: String,
    /// XHTML-safe body fragment.
    pub body: String,
}

/// A group of chapters shown as one nav entry.
#[derive(Debug, Clone)]
pub struct PackageSection {
    pub title: String,
    pub chapters: Vec<PackageChapter>,
}

#[derive(Debug, Clone)]
pub struct PackageImage {
    /// Path inside `OEBPS/`, e.g. `images/img-1.png`.
    pub href: String,
    pub source: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Package {
    pub identifier: String,
    pub title: String,
    pub lang: String,
    pub creator: Option<String>,
    pub contributor: Option<String>,
    pub description: Option<String>,
    /// RFC 3339, second precision.
    pub modified: String,
    /// Nested in the nav when there is more than one.
    pub sections: Vec<PackageSection>,
    pub images: Vec<PackageImage>,
    pub cover: Option<PathBuf>,
}

impl Package {
    fn nested(&self) -> bool {
        self.sections.len() > 1
    }

    /// `(file stem, chapter)` in reading order.
    fn chapter_files(&self) -> Vec<(String, &PackageChapter)> {
        self.sections
            .iter()
            .flat_map(|s| s.chapters.iter())
            .enumerate()
            .map(|(i, c)| (format!("chap-{}", i + 1), c))
            .collect()
    }

    fn cover_href(&self) -> Option<String> {
        let cover = self.cover.as_ref()?;
        let ext = cover
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("jpg")
            .to_ascii_lowercase();
        Some(format!("images/cover.{ext}"))
    }
}

/// Write `package` to `out_path`, replacing any existing file.
pub fn write_package(out_path: &Path, package: &Package) -> Result<(), EpubError> {
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut zip = zip::ZipWriter::new(File::create(out_path)?);

    // mimetype must be the first entry and stored uncompressed
    let stored = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored)
        .unix_permissions(0o644);
    zip.start_file("mimetype", stored)?;
    zip.write_all(b"application/epub+zip")?;

    let deflated = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(0o644);

    let chapters = package.chapter_files();
    let cover_href = package.cover_href();

    let mut entries: Vec<(String, String)> = vec![
        ("META-INF/container.xml".into(), render_container_xml()),
        ("OEBPS/content.opf".into(), render_content_opf(package, &chapters, cover_href.as_deref())),
        ("OEBPS/nav.xhtml".into(), render_nav_xhtml(package, &chapters)),
        ("OEBPS/toc.ncx".into(), render_toc_ncx(package, &chapters)),
        ("OEBPS/style.css".into(), STYLE_CSS.to_string()),
    ];
    if let Some(href) = &cover_href {
        let body = format!(
            "<div class=\"cover\"><img src=\"{}\" alt=\"{}\" /></div>",
            xml_escape(href),
            xml_escape(&package.title)
        );
        entries.push((
            "OEBPS/cover.xhtml".into(),
            wrap_xhtml_document(&package.title, &package.lang, &body),
        ));
    }
    for (stem, chapter) in &chapters {
        let body = format!("<h1>{}</h1>\n{}", xml_escape(&chapter.title), chapter.body);
        entries.push((
            format!("OEBPS/{stem}.xhtml"),
            wrap_xhtml_document(&chapter.title, &package.lang, &body),
        ));
    }

    for (name, contents) in entries {
        zip.start_file(name, deflated)?;
        zip.write_all(contents.as_bytes())?;
    }

    if let (Some(href), Some(source)) = (&cover_href, &package.cover) {
        zip.start_file(format!("OEBPS/{href}"), deflated)?;
        zip.write_all(&fs::read(source)?)?;
    }
    for image in &package.images {
        zip.start_file(format!("OEBPS/{}", image.href), deflated)?;
        zip.write_all(&fs::read(&image.source)?)?;
    }

    zip.finish()?;
    Ok(())
}

fn render_container_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#
    .to_string()
}

fn render_content_opf(
    package: &Package,
    chapters: &[(String, &PackageChapter)],
    cover_href: Option<&str>,
) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str(&format!(
        "<package xmlns=\"http://www.idpf.org/2007/opf\" unique-identifier=\"bookid\" version=\"3.0\" xml:lang=\"{}\">\n",
        xml_escape(&package.lang)
    ));
    out.push_str("  <metadata xmlns:dc=\"http://purl.org/dc/elements/1.1/\">\n");
    out.push_str(&format!(
        "    <dc:identifier id=\"bookid\">{}</dc:identifier>\n",
        xml_escape(&package.identifier)
    ));
    out.push_str(&format!("    <dc:title>{}</dc:title>\n", xml_escape(&package.title)));
    out.push_str(&format!(
        "    <dc:language>{}</dc:language>\n",
        xml_escape(&package.lang)
    ));
    if let Some(creator) = &package.creator {
        out.push_str(&format!("    <dc:creator>{}</dc:creator>\n", xml_escape(creator)));
    }
    if let Some(contributor) = &package.contributor {
        out.push_str(&format!(
            "    <dc:contributor>{}</dc:contributor>\n",
            xml_escape(contributor)
        ));
    }
    if let Some(description) = &package.description {
        out.push_str(&format!(
            "    <dc:description>{}</dc:description>\n",
            xml_escape(description)
        ));
    }
    out.push_str(&format!(
        "    <meta property=\"dcterms:modified\">{}</meta>\n",
        xml_escape(&package.modified)
    ));
    if cover_href.is_some() {
        out.push_str("    <meta name=\"cover\" content=\"cover-image\" />\n");
    }
    out.push_str("  </metadata>\n");

    out.push_str("  <manifest>\n");
    out.push_str(
        "    <item id=\"nav\" href=\"nav.xhtml\" media-type=\"application/xhtml+xml\" properties=\"nav\" />\n",
    );
    out.push_str("    <item id=\"ncx\" href=\"toc.ncx\" media-type=\"application/x-dtbncx+xml\" />\n");
    out.push_str("    <item id=\"css\" href=\"style.css\" media-type=\"text/css\" />\n");
    if let Some(href) = cover_href {
        out.push_str(&format!(
            "    <item id=\"cover-image\" href=\"{}\" media-type=\"{}\" properties=\"cover-image\" />\n",
            xml_escape(href),
            media_type_for_asset(href)
        ));
        out.push_str(
            "    <item id=\"cover\" href=\"cover.xhtml\" media-type=\"application/xhtml+xml\" />\n",
        );
    }
    for (stem, _) in chapters {
        out.push_str(&format!(
            "    <item id=\"{stem}\" href=\"{stem}.xhtml\" media-type=\"application/xhtml+xml\" />\n"
        ));
    }
    for (idx, image) in package.images.iter().enumerate() {
        out.push_str(&format!(
            "    <item id=\"img-{}\" href=\"{}\" media-type=\"{}\" />\n",
            idx + 1,
            xml_escape(&image.href),
            media_type_for_asset(&image.href)
        ));
    }
    out.push_str("  </manifest>\n");

    out.push_str("  <spine toc=\"ncx\">\n");
    if cover_href.is_some() {
        out.push_str("    <itemref idref=\"cover\" linear=\"no\" />\n");
    }
    for (stem, _) in chapters {
        out.push_str(&format!("    <itemref idref=\"{stem}\" />\n"));
    }
    out.push_str("  </spine>\n");
    out.push_str("</package>\n");
    out
}

fn render_nav_xhtml(package: &Package, chapters: &[(String, &PackageChapter)]) -> String {
    let mut list = String::from("    <ol>\n");
    let mut files = chapters.iter();
    for section in &package.sections {
        let items: Vec<String> = files
            .by_ref()
            .take(section.chapters.len())
            .map(|(stem, c)| format!("<li><a href=\"{stem}.xhtml\">{}</a></li>", xml_escape(&c.title)))
            .collect();
        if package.nested() {
            list.push_str(&format!(
                "      <li><span>{}</span>\n        <ol>\n",
                xml_escape(&section.title)
            ));
            for item in items {
                list.push_str(&format!("          {item}\n"));
            }
            list.push_str("        </ol>\n      </li>\n");
        } else {
            for item in items {
                list.push_str(&format!("      {item}\n"));
            }
        }
    }
    list.push_str("    </ol>\n");

    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str("<!DOCTYPE html>\n");
    out.push_str(&format!(
        "<html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:epub=\"http://www.idpf.org/2007/ops\" lang=\"{0}\" xml:lang=\"{0}\">\n",
        xml_escape(&package.lang)
    ));
    out.push_str("<head>\n");
    out.push_str(&format!("  <title>{}</title>\n", xml_escape(&package.title)));
    out.push_str("  <meta charset=\"utf-8\" />\n");
    out.push_str("  <link rel=\"stylesheet\" type=\"text/css\" href=\"style.css\" />\n");
    out.push_str("</head>\n");
    out.push_str("<body>\n");
    out.push_str(&format!("  <h1>{}</h1>\n", xml_escape(&package.title)));
    out.push_str("  <nav epub:type=\"toc\" id=\"toc\">\n");
    out.push_str(&list);
    out.push_str("  </nav>\n");
    out.push_str("</body>\n");
    out.push_str("</html>\n");
    out
}

fn render_toc_ncx(package: &Package, chapters: &[(String, &PackageChapter)]) -> String {
    let mut points = String::new();
    let mut play = 0;
    let mut files = chapters.iter();
    for (section_idx, section) in package.sections.iter().enumerate() {
        let section_files: Vec<&(String, &PackageChapter)> =
            files.by_ref().take(section.chapters.len()).collect();
        let Some((first_stem, _)) = section_files.first() else {
            continue;
        };
        let indent = if package.nested() {
            play += 1;
            points.push_str(&format!(
                "    <navPoint id=\"section-{}\" playOrder=\"{play}\">\n      <navLabel><text>{}</text></navLabel>\n      <content src=\"{first_stem}.xhtml\" />\n",
                section_idx + 1,
                xml_escape(&section.title)
            ));
            "      "
        } else {
            "    "
        };
        for (stem, chapter) in section_files {
            play += 1;
            points.push_str(&format!(
                "{indent}<navPoint id=\"nav-{stem}\" playOrder=\"{play}\">\n{indent}  <navLabel><text>{}</text></navLabel>\n{indent}  <content src=\"{stem}.xhtml\" />\n{indent}</navPoint>\n",
                xml_escape(&chapter.title)
            ));
        }
        if package.nested() {
            points.push_str("    </navPoint>\n");
        }
    }

    let depth = if package.nested() { 2 } else { 1 };
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str("<ncx xmlns=\"http://www.daisy.org/z3986/2005/ncx/\" version=\"2005-1\">\n");
    out.push_str("  <head>\n");
    out.push_str(&format!(
        "    <meta name=\"dtb:uid\" content=\"{}\" />\n",
        xml_escape(&package.identifier)
    ));
    out.push_str(&format!("    <meta name=\"dtb:depth\" content=\"{depth}\" />\n"));
    out.push_str("    <meta name=\"dtb:totalPageCount\" content=\"0\" />\n");
    out.push_str("    <meta name=\"dtb:maxPageNumber\" content=\"0\" />\n");
    out.push_str("  </head>\n");
    out.push_str(&format!(
        "  <docTitle><text>{}</text></docTitle>\n",
        xml_escape(&package.title)
    ));
    out.push_str("  <navMap>\n");
    out.push_str(&points);
    out.push_str("  </navMap>\n");
    out.push_str("</ncx>\n");
    out
}

pub fn media_type_for_asset(rel_path: &str) -> &'static str {
    let ext = Path::new(rel_path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "avif" => "image/avif",
        _ => "application/octet-stream",
    }
}

fn wrap_xhtml_document(title: &str, lang: &str, body_html: &str) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str("<!DOCTYPE html>\n");
    out.push_str(&format!(
        "<html xmlns=\"http://www.w3.org/1999/xhtml\" lang=\"{0}\" xml:lang=\"{0}\">\n",
        xml_escape(lang)
    ));
    out.push_str("<head>\n");
    out.push_str(&format!("  <title>{}</title>\n", xml_escape(title)));
    out.push_str("  <meta charset=\"utf-8\" />\n");
    out.push_str("  <link rel=\"stylesheet\" type=\"text/css\" href=\"style.css\" />\n");
    out.push_str("</head>\n");
    out.push_str("<body>\n");
    out.push_str(body_html);
    if !body_html.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("</body>\n");
    out.push_str("</html>\n");
    out
}

/// Self-close void tags (`<br>` → `<br />`) so HTML fragments parse as XHTML.
pub fn ensure_xhtml_void_tags(html: &str) -> String {
    const VOID_TAGS: &[&str] = &[
        "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
        "source", "track", "wbr",
    ];

    let bytes = html.as_bytes();
    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;

    while let Some(rel_lt) = html[cursor..].find('<') {
        let lt = cursor + rel_lt;
        out.push_str(&html[cursor..lt]);

        // end of tag, ignoring `>` inside quoted attribute values
        let mut in_quote: Option<u8> = None;
        let mut gt = lt + 1;
        while gt < bytes.len() {
            let b = bytes[gt];
            match in_quote {
                Some(q) if b == q => in_quote = None,
                Some(_) => {}
                None if b == b'"' || b == b'\'' => in_quote = Some(b),
                None if b == b'>' => break,
                None => {}
            }
            gt += 1;
        }
        if gt >= bytes.len() {
            out.push_str(&html[lt..]);
            return out;
        }

        let raw_tag = &html[lt..=gt];
        let name_start = lt + 1;
        let name_end = html[name_start..gt]
            .find(|c: char| !c.is_ascii_alphabetic())
            .map_or(gt, |i| name_start + i);
        let is_void = VOID_TAGS.contains(&html[name_start..name_end].to_ascii_lowercase().as_str());

        let tag_without_gt = &html[lt..gt];
        if is_void && !tag_without_gt.trim_end().ends_with('/') {
            out.push_str(tag_without_gt);
            out.push_str(" />");
        } else {
            out.push_str(raw_tag);
        }
        cursor = gt + 1;
    }

    out.push_str(&html[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    fn chapter(title: &str) -> PackageChapter {
        PackageChapter {
            title: title.into(),
            body: format!("<p>{title} body</p>"),
        }
    }

    fn package(sections: Vec<PackageSection>) -> Package {
        Package {
            identifier: "urn:quire:abc".into(),
            title: "Novel & Co".into(),
            lang: "en".into(),
            creator: Some("Jane".into()),
            contributor: None,
            description: None,
            modified: "2024-01-01T00:00:00Z".into(),
            sections,
            images: vec![],
            cover: None,
        }
    }

    fn read_entry(path: &Path, name: &str) -> String {
        let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut out = String::new();
        archive.by_name(name).unwrap().read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn void_tags_self_closed() {
        let out = ensure_xhtml_void_tags("<p>日本語<br>x</p><img src=\"a>b.png\"><hr/>");
        assert_eq!(out, "<p>日本語<br />x</p><img src=\"a>b.png\" /><hr/>");
    }

    #[test]
    fn comments_untouched() {
        let out = ensure_xhtml_void_tags("<!-- <br> --><b>x</b>");
        assert_eq!(out, "<!-- <br> --><b>x</b>");
    }

    #[test]
    fn mimetype_first_and_stored() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out/book.epub");
        write_package(
            &path,
            &package(vec![PackageSection {
                title: "Arc".into(),
                chapters: vec![chapter("One"), chapter("Two")],
            }]),
        )
        .unwrap();

        let mut archive = zip::ZipArchive::new(File::open(&path).unwrap()).unwrap();
        let first = archive.by_index(0).unwrap();
        assert_eq!(first.name(), "mimetype");
        assert_eq!(first.compression(), zip::CompressionMethod::Stored);
        drop(first);
        assert!(archive.by_name("OEBPS/chap-2.xhtml").is_ok());

        let opf = read_entry(&path, "OEBPS/content.opf");
        assert!(opf.contains("<dc:title>Novel &amp; Co</dc:title>"));
        assert!(opf.contains("<dc:creator>Jane</dc:creator>"));
        assert!(opf.contains("<itemref idref=\"chap-1\" />\n    <itemref idref=\"chap-2\" />"));

        let nav = read_entry(&path, "OEBPS/nav.xhtml");
        assert!(!nav.contains("<span>Arc</span>"), "single section is flat");
    }

    #[test]
    fn sections_nest_in_nav() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("book.epub");
        write_package(
            &path,
            &package(vec![
                PackageSection {
                    title: "Arc One".into(),
                    chapters: vec![chapter("One")],
                },
                PackageSection {
                    title: "Arc Two".into(),
                    chapters: vec![chapter("Two")],
                },
            ]),
        )
        .unwrap();
        let nav = read_entry(&path, "OEBPS/nav.xhtml");
        assert!(nav.contains("<span>Arc Two</span>"));
        assert!(nav.contains("<a href=\"chap-2.xhtml\">Two</a>"));
        let ncx = read_entry(&path, "OEBPS/toc.ncx");
        assert!(ncx.contains("playOrder=\"4\""));
    }

    #[test]
    fn cover_and_images_packaged() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("cover.png"), b"png").unwrap();
        fs::write(tmp.path().join("map.jpg"), b"jpg").unwrap();
        let mut pkg = package(vec![PackageSection {
            title: "Arc".into(),
            chapters: vec![chapter("One")],
        }]);
        pkg.cover = Some(tmp.path().join("cover.png"));
        pkg.images = vec![PackageImage {
            href: "images/img-1.jpg".into(),
            source: tmp.path().join("map.jpg"),
        }];
        let path = tmp.path().join("book.epub");
        write_package(&path, &pkg).unwrap();

        let opf = read_entry(&path, "OEBPS/content.opf");
        assert!(opf.contains("href=\"images/cover.png\" media-type=\"image/png\" properties=\"cover-image\""));
        assert!(opf.contains("href=\"images/img-1.jpg\" media-type=\"image/jpeg\""));
        assert_eq!(read_entry(&path, "OEBPS/images/img-1.jpg"), "jpg");
        assert!(read_entry(&path, "OEBPS/cover.xhtml").contains("images/cover.png"));
    }
}
