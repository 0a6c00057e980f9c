//! EPUB 3 container writer.
//!
//! Produces `mimetype`, `META-INF/container.xml` and an `OEBPS/` tree with
//! the package document, a navigation document, an NCX table of contents
//! for EPUB 2 readers, a stylesheet, a covers page, one XHTML page per
//! chapter and every image.

use std::io::{Seek, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::SaverError;
use crate::models::{LoadedChapter, LoadedImage};
use crate::utils::xml_escape;

pub const NAV_CSS: &str = "body { font-family: Roboto, Times, Times New Roman, serif; }\n";

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

/// Everything needed to write one book.
pub struct EpubBook<'a> {
    pub identifier: String,
    pub title: &'a str,
    pub language: &'a str,
    pub author: &'a str,
    /// `dcterms:modified`, `YYYY-MM-DDThh:mm:ssZ`.
    pub modified: String,
    pub covers: &'a [LoadedImage],
    /// Chapters in reading order.
    pub chapters: Vec<LoadedChapter>,
}

/// One file in the manifest.
struct Item {
    id: String,
    href: String,
    media_type: String,
    properties: Option<&'static str>,
}

fn cover_href(index: usize, image: &LoadedImage) -> String {
    format!("images/cover-{}{}", index, image.extension())
}

fn chapter_href(chapter: &LoadedChapter) -> String {
    format!("chapters/{}.xhtml", chapter.id())
}

fn chapter_image_href(chapter: &LoadedChapter, index: usize, image: &LoadedImage) -> String {
    format!("images/{}-{}{}", chapter.id(), index, image.extension())
}

/// Write the book to any seekable destination.
pub fn write_epub<W: Write + Seek>(book: &EpubBook<'_>, writer: W) -> Result<(), SaverError> {
    let mut zip = ZipWriter::new(writer);
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    // mimetype must be the first entry and uncompressed
    zip.start_file("mimetype", stored)?;
    zip.write_all(b"application/epub+zip")?;

    zip.start_file("META-INF/container.xml", deflated)?;
    zip.write_all(CONTAINER_XML.as_bytes())?;

    let items = manifest_items(book);

    zip.start_file("OEBPS/content.opf", deflated)?;
    zip.write_all(generate_opf(book, &items).as_bytes())?;

    zip.start_file("OEBPS/nav.xhtml", deflated)?;
    zip.write_all(generate_nav(book).as_bytes())?;

    zip.start_file("OEBPS/toc.ncx", deflated)?;
    zip.write_all(generate_ncx(book).as_bytes())?;

    zip.start_file("OEBPS/style/nav.css", deflated)?;
    zip.write_all(NAV_CSS.as_bytes())?;

    if !book.covers.is_empty() {
        zip.start_file("OEBPS/covers.xhtml", deflated)?;
        zip.write_all(generate_covers_page(book).as_bytes())?;
        for (index, cover) in book.covers.iter().enumerate() {
            zip.start_file(format!("OEBPS/{}", cover_href(index, cover)), stored)?;
            zip.write_all(&cover.data)?;
        }
    }

    for chapter in &book.chapters {
        zip.start_file(format!("OEBPS/{}", chapter_href(chapter)), deflated)?;
        zip.write_all(generate_chapter(book, chapter).as_bytes())?;
        for (index, image) in chapter.images().iter().enumerate() {
            zip.start_file(
                format!("OEBPS/{}", chapter_image_href(chapter, index + 1, image)),
                stored,
            )?;
            zip.write_all(&image.data)?;
        }
    }

    zip.finish()?;
    Ok(())
}

fn manifest_items(book: &EpubBook<'_>) -> Vec<Item> {
    let mut items = vec![
        Item {
            id: "nav".to_string(),
            href: "nav.xhtml".to_string(),
            media_type: "application/xhtml+xml".to_string(),
            properties: Some("nav"),
        },
        Item {
            id: "ncx".to_string(),
            href: "toc.ncx".to_string(),
            media_type: "application/x-dtbncx+xml".to_string(),
            properties: None,
        },
        Item {
            id: "style".to_string(),
            href: "style/nav.css".to_string(),
            media_type: "text/css".to_string(),
            properties: None,
        },
    ];

    if !book.covers.is_empty() {
        items.push(Item {
            id: "covers".to_string(),
            href: "covers.xhtml".to_string(),
            media_type: "application/xhtml+xml".to_string(),
            properties: None,
        });
        for (index, cover) in book.covers.iter().enumerate() {
            items.push(Item {
                id: format!("cover-{}", index),
                href: cover_href(index, cover),
                media_type: cover.media_type(),
                properties: (index == 0).then_some("cover-image"),
            });
        }
    }

    for chapter in &book.chapters {
        items.push(Item {
            id: format!("chapter-{}", chapter.id()),
            href: chapter_href(chapter),
            media_type: "application/xhtml+xml".to_string(),
            properties: None,
        });
        for (index, image) in chapter.images().iter().enumerate() {
            items.push(Item {
                id: format!("image-{}-{}", chapter.id(), index + 1),
                href: chapter_image_href(chapter, index + 1, image),
                media_type: image.media_type(),
                properties: None,
            });
        }
    }

    items
}

fn generate_opf(book: &EpubBook<'_>, items: &[Item]) -> String {
    let mut opf = String::new();

    opf.push_str(&format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="BookId" xml:lang="{}">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
"#,
        xml_escape(book.language)
    ));
    opf.push_str(&format!(
        "    <dc:identifier id=\"BookId\">{}</dc:identifier>\n",
        xml_escape(&book.identifier)
    ));
    opf.push_str(&format!(
        "    <dc:title>{}</dc:title>\n",
        xml_escape(book.title)
    ));
    opf.push_str(&format!(
        "    <dc:language>{}</dc:language>\n",
        xml_escape(book.language)
    ));
    opf.push_str(&format!(
        "    <dc:creator id=\"creator\">{}</dc:creator>\n",
        xml_escape(book.author)
    ));
    opf.push_str(&format!(
        "    <meta property=\"dcterms:modified\">{}</meta>\n",
        book.modified
    ));
    if !book.covers.is_empty() {
        opf.push_str("    <meta name=\"cover\" content=\"cover-0\"/>\n");
    }
    opf.push_str("  </metadata>\n  <manifest>\n");

    for item in items {
        let properties = item
            .properties
            .map(|p| format!(" properties=\"{}\"", p))
            .unwrap_or_default();
        opf.push_str(&format!(
            "    <item id=\"{}\" href=\"{}\" media-type=\"{}\"{}/>\n",
            item.id,
            xml_escape(&item.href),
            xml_escape(&item.media_type),
            properties
        ));
    }

    opf.push_str("  </manifest>\n  <spine toc=\"ncx\">\n");
    if !book.covers.is_empty() {
        opf.push_str("    <itemref idref=\"covers\"/>\n");
    }
    opf.push_str("    <itemref idref=\"nav\"/>\n");
    for chapter in &book.chapters {
        opf.push_str(&format!(
            "    <itemref idref=\"chapter-{}\"/>\n",
            chapter.id()
        ));
    }
    opf.push_str("  </spine>\n</package>\n");
    opf
}

fn xhtml_page(language: &str, title: &str, stylesheet: &str, body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops" xml:lang="{lang}" lang="{lang}">
<head>
  <title>{title}</title>
  <link rel="stylesheet" type="text/css" href="{stylesheet}"/>
</head>
<body>
{body}</body>
</html>
"#,
        lang = xml_escape(language),
        title = xml_escape(title),
        stylesheet = stylesheet,
        body = body
    )
}

fn generate_nav(book: &EpubBook<'_>) -> String {
    let mut body = String::from("  <nav epub:type=\"toc\" id=\"toc\">\n    <h1>Contents</h1>\n    <ol>\n");
    for chapter in &book.chapters {
        body.push_str(&format!(
            "      <li><a href=\"{}\">{}</a></li>\n",
            chapter_href(chapter),
            xml_escape(&chapter.base_name())
        ));
    }
    body.push_str("    </ol>\n  </nav>\n");
    xhtml_page(book.language, book.title, "style/nav.css", &body)
}

fn generate_ncx(book: &EpubBook<'_>) -> String {
    let mut ncx = String::new();
    ncx.push_str(&format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head>
    <meta name="dtb:uid" content="{}"/>
    <meta name="dtb:depth" content="1"/>
    <meta name="dtb:totalPageCount" content="0"/>
    <meta name="dtb:maxPageNumber" content="0"/>
  </head>
  <docTitle><text>{}</text></docTitle>
  <navMap>
"#,
        xml_escape(&book.identifier),
        xml_escape(book.title)
    ));
    for (order, chapter) in book.chapters.iter().enumerate() {
        ncx.push_str(&format!(
            "    <navPoint id=\"navpoint-{id}\" playOrder=\"{order}\">\n      <navLabel><text>{label}</text></navLabel>\n      <content src=\"{src}\"/>\n    </navPoint>\n",
            id = chapter.id(),
            order = order + 1,
            label = xml_escape(&chapter.base_name()),
            src = chapter_href(chapter)
        ));
    }
    ncx.push_str("  </navMap>\n</ncx>\n");
    ncx
}

fn generate_covers_page(book: &EpubBook<'_>) -> String {
    let mut body = String::new();
    for (index, cover) in book.covers.iter().enumerate() {
        body.push_str(&format!(
            "  <img src=\"{}\" alt=\"cover {}\"/>\n",
            xml_escape(&cover_href(index, cover)),
            index + 1
        ));
    }
    xhtml_page(book.language, book.title, "style/nav.css", &body)
}

fn generate_chapter(book: &EpubBook<'_>, chapter: &LoadedChapter) -> String {
    let mut body = format!("  <p>{}</p>\n  <br/>\n", xml_escape(chapter.title()));
    for paragraph in chapter.paragraphs() {
        body.push_str(&format!("  <p>{}</p>\n", xml_escape(paragraph)));
    }
    if !chapter.images().is_empty() {
        body.push_str("  <h1>Images</h1>\n");
        for (index, image) in chapter.images().iter().enumerate() {
            body.push_str(&format!(
                "  <img src=\"../{}\" alt=\"{}\"/>\n",
                xml_escape(&chapter_image_href(chapter, index + 1, image)),
                xml_escape(&image.name())
            ));
        }
    }
    xhtml_page(
        book.language,
        &chapter.base_name(),
        "../style/nav.css",
        &body,
    )
}
