//! 书籍链接解析与规范化。

use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use super::context::sanitize_filename;
use crate::download::error::DownloadError;

const KNOWN_HOSTS: [&str; 2] = ["ranobelib.me", "ranobelib.ru"];

static RE_BOOK_PATH: OnceLock<Regex> = OnceLock::new();

fn re_book_path() -> &'static Regex {
    RE_BOOK_PATH.get_or_init(|| Regex::new(r"/book/(\d+)(?:--(.+))?").expect("compile RE_BOOK_PATH"))
}

/// 一本书的远端标识：数字 ID 与可读 slug（已做文件名清理）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookRef {
    pub book_id: String,
    pub slug: String,
}

impl BookRef {
    /// 生成 EPUB 时使用的书名。
    pub fn display_title(&self) -> String {
        if self.slug.is_empty() {
            format!("Book {}", self.book_id)
        } else {
            self.slug.clone()
        }
    }
}

/// 解析形如 `https://ranobelib.me/ru/book/40218--slug` 的链接。
///
/// 没有协议头时按 `https://` 补全；仅接受两个已知域名。
pub fn parse_book_ref(raw: &str) -> Result<BookRef, DownloadError> {
    let trimmed = raw.trim();
    let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let url = Url::parse(&with_scheme)
        .map_err(|e| DownloadError::InvalidReference(format!("无法解析链接 '{trimmed}': {e}")))?;

    let host = url.host_str().unwrap_or("").to_ascii_lowercase();
    if !KNOWN_HOSTS.iter().any(|known| host.contains(known)) {
        return Err(DownloadError::InvalidReference(format!(
            "不支持的域名 '{host}'，需要 ranobelib.me 或 ranobelib.ru 的链接"
        )));
    }

    let caps = re_book_path().captures(url.path()).ok_or_else(|| {
        DownloadError::InvalidReference(format!("链接中找不到书籍 ID: {}", url.path()))
    })?;

    let book_id = caps[1].to_string();
    let slug = caps
        .get(2)
        .map(|m| m.as_str().trim_end_matches('/').to_string())
        .unwrap_or_else(|| format!("book-{book_id}"));

    Ok(BookRef {
        slug: sanitize_filename(&slug),
        book_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_link_without_scheme() {
        let r = parse_book_ref("ranobelib.me/ru/book/40218--the-devious-first-daughter").unwrap();
        assert_eq!(r.book_id, "40218");
        assert_eq!(r.slug, "the-devious-first-daughter");
    }

    #[test]
    fn parses_full_link_with_query_and_trailing_slash() {
        let r = parse_book_ref("  https://RanobeLib.me/book/28369--empress/?section=chapters ").unwrap();
        assert_eq!(r.book_id, "28369");
        assert_eq!(r.slug, "empress");
    }

    #[test]
    fn defaults_slug_to_book_id() {
        let r = parse_book_ref("http://ranobelib.ru/ru/book/777").unwrap();
        assert_eq!(r.book_id, "777");
        assert_eq!(r.slug, "book-777");
        assert_eq!(r.display_title(), "book-777");
    }

    #[test]
    fn slug_with_nested_path_is_sanitized() {
        let r = parse_book_ref("https://ranobelib.me/ru/book/5--name/read").unwrap();
        assert_eq!(r.slug, "nameread");
    }

    #[test]
    fn rejects_foreign_host() {
        let err = parse_book_ref("https://example.com/ru/book/40218--x").unwrap_err();
        assert!(matches!(err, DownloadError::InvalidReference(_)));
    }

    #[test]
    fn rejects_path_without_book_id() {
        let err = parse_book_ref("https://ranobelib.me/ru/catalog").unwrap_err();
        assert!(matches!(err, DownloadError::InvalidReference(_)));
    }

    #[test]
    fn rejects_unparsable_url() {
        let err = parse_book_ref("https://ranobelib.me:notaport/book/1").unwrap_err();
        assert!(matches!(err, DownloadError::InvalidReference(_)));
    }
}
