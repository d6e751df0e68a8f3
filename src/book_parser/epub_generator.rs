//! EPUB 打包。

use std::fs;
use std::io::Cursor;
use std::path::Path;

use epub_builder::{EpubBuilder, EpubContent, EpubVersion, ReferenceType, ZipLibrary};
use tracing::debug;

use super::html_utils::escape_html;
use crate::base_system::context::Config;
use crate::download::error::DownloadError;
use crate::download::models::ChapterContent;

/// 用于从 book_id 确定性生成 UUID v5 的命名空间。
const EPUB_UUID_NAMESPACE: uuid::Uuid = uuid::Uuid::from_bytes([
    0x3c, 0x51, 0x2e, 0x8a, 0x47, 0x0b, 0x4f, 0x61, 0x9a, 0x6e, 0x1d, 0x25, 0xc4, 0x90, 0x7b, 0x13,
]);

const STYLESHEET: &str = "body { line-height: 1.5; }\nh1 { text-align: center; margin: 1em 0; }\np { text-indent: 1.5em; margin: 0 0 0.4em 0; }\n";

/// 一次打包所需的全部内容。
pub struct PackageInput<'a> {
    pub book_id: &'a str,
    pub title: &'a str,
    pub chapters: &'a [ChapterContent],
    pub cover: Option<&'a Path>,
}

/// 把下载好的章节写成电子书文件。
pub trait BookPackager {
    fn package(&self, input: &PackageInput<'_>, output_path: &Path) -> Result<(), DownloadError>;
}

pub struct EpubGenerator {
    author: String,
    language: String,
    toc_title: String,
    honor_before_toc: bool,
}

impl EpubGenerator {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            author: cfg.epub_author.clone(),
            language: cfg.epub_language.clone(),
            toc_title: cfg.toc_title.clone(),
            honor_before_toc: cfg.first_chapter_before_toc,
        }
    }

    fn build(&self, input: &PackageInput<'_>) -> Result<Vec<u8>, DownloadError> {
        let zip = ZipLibrary::new().map_err(packaging)?;
        let mut book = EpubBuilder::new(zip).map_err(packaging)?;
        book.epub_version(EpubVersion::V30);
        book.set_uuid(uuid::Uuid::new_v5(
            &EPUB_UUID_NAMESPACE,
            input.book_id.as_bytes(),
        ));
        book.metadata("title", input.title).map_err(packaging)?;
        book.metadata("lang", self.language.as_str())
            .map_err(packaging)?;
        book.metadata("toc_name", self.toc_title.as_str())
            .map_err(packaging)?;
        if !self.author.trim().is_empty() {
            book.metadata("author", self.author.trim())
                .map_err(packaging)?;
        }
        book.stylesheet(Cursor::new(STYLESHEET.as_bytes()))
            .map_err(packaging)?;

        if let Some(cover) = input.cover {
            match fs::read(cover) {
                Ok(bytes) => {
                    let (ext, mime) = image_mime(cover);
                    book.add_cover_image(format!("images/cover.{ext}"), Cursor::new(bytes), mime)
                        .map_err(packaging)?;
                }
                Err(e) => debug!(path = %cover.display(), error = %e, "封面文件不可读，跳过"),
            }
        }

        let (front, rest): (Vec<_>, Vec<_>) = input
            .chapters
            .iter()
            .enumerate()
            .partition(|(_, ch)| self.honor_before_toc && ch.before_toc);

        for (i, ch) in &front {
            book.add_content(self.chapter_content(*i, ch))
                .map_err(packaging)?;
        }
        // 目录页插在此处
        book.inline_toc();
        for (i, ch) in &rest {
            book.add_content(self.chapter_content(*i, ch))
                .map_err(packaging)?;
        }

        let mut buffer = Vec::new();
        book.generate(&mut buffer).map_err(packaging)?;
        Ok(buffer)
    }

    fn chapter_content(&self, index: usize, ch: &ChapterContent) -> EpubContent<Cursor<Vec<u8>>> {
        let html = wrap_chapter_html(&ch.title, &ch.html_body, &self.language);
        EpubContent::new(
            format!("chapter_{:04}.xhtml", index + 1),
            Cursor::new(html.into_bytes()),
        )
        .title(ch.title.as_str())
        .reftype(ReferenceType::Text)
    }
}

impl BookPackager for EpubGenerator {
    fn package(&self, input: &PackageInput<'_>, output_path: &Path) -> Result<(), DownloadError> {
        let bytes = self.build(input)?;

        let parent = output_path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)
            .and_then(|_| fs::write(output_path, bytes))
            .map_err(|e| {
                DownloadError::Packaging(format!("写入 {} 失败: {e}", output_path.display()))
            })?;
        debug!(path = %output_path.display(), chapters = input.chapters.len(), "EPUB 已写入");
        Ok(())
    }
}

fn packaging(e: impl std::fmt::Display) -> DownloadError {
    DownloadError::Packaging(e.to_string())
}

fn image_mime(path: &Path) -> (&'static str, &'static str) {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "png" => ("png", "image/png"),
        "webp" => ("webp", "image/webp"),
        "gif" => ("gif", "image/gif"),
        _ => ("jpg", "image/jpeg"),
    }
}

fn wrap_chapter_html(title: &str, body: &str, lang: &str) -> String {
    let escaped_title = escape_html(title);
    let lang = escape_html(lang);
    format!(
        "<?xml version='1.0' encoding='utf-8'?>\n<!DOCTYPE html>\n<html xmlns=\"http://www.w3.org/1999/xhtml\" lang=\"{lang}\" xml:lang=\"{lang}\">\n  <head>\n    <title>{escaped_title}</title>\n    <link href=\"stylesheet.css\" rel=\"stylesheet\" type=\"text/css\"/>\n  </head>\n  <body><h1>{escaped_title}</h1>\n{body}\n  </body>\n</html>"
    )
}
