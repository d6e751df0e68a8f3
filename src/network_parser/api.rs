//! ranobelib 接口：章节目录、单章正文与封面。

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use reqwest::header::{ACCEPT, REFERER, USER_AGENT};
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use super::network::Transport;
use crate::base_system::context::{Config, sanitize_filename};
use crate::book_parser::html_utils::{ChapterBody, clean_body};
use crate::download::chapter_number::ChapterNumber;
use crate::download::error::DownloadError;
use crate::download::models::{ChapterContent, ChapterMeta};

const COVER_ACCEPT: &str = "image/webp,image/apng,image/*,*/*;q=0.8";

pub struct RanobeLibApi<'a, T: Transport> {
    transport: &'a T,
    base_url: String,
    user_agent: String,
    cover_referer: String,
}

impl<'a, T: Transport> RanobeLibApi<'a, T> {
    pub fn new(transport: &'a T, config: &Config) -> Self {
        Self {
            transport,
            base_url: config.base_url.trim().trim_end_matches('/').to_string(),
            user_agent: config.user_agent.clone(),
            cover_referer: config.cover_referer.clone(),
        }
    }

    /// 拉取整本书的章节目录。
    pub fn list_chapters(&self, book_id: &str, slug: &str) -> Result<Vec<ChapterMeta>, DownloadError> {
        let slug_part = if slug.is_empty() {
            String::new()
        } else {
            format!("--{slug}")
        };
        let url = format!("{}/{book_id}{slug_part}/chapters", self.base_url);

        let resp = self
            .transport
            .get_json(&url)
            .map_err(|e| DownloadError::CatalogFetch(format!("{e:#}")))?;

        let Some(items) = resp.get("data").and_then(Value::as_array) else {
            return Err(DownloadError::CatalogFetch(
                "目录接口返回格式不正确（data 不是数组）".to_string(),
            ));
        };

        let catalog: Vec<ChapterMeta> = items.iter().map(chapter_meta_from_record).collect();
        debug!(book_id, count = catalog.len(), "目录获取完成");
        Ok(catalog)
    }

    /// 拉取单章正文并清理 HTML。`number` 为目录中的原始章节号。
    pub fn fetch_chapter(
        &self,
        book_id: &str,
        volume: i64,
        number: &str,
    ) -> Result<ChapterContent, DownloadError> {
        let fail = |reason: String| DownloadError::ChapterFetch {
            volume,
            number: number.to_string(),
            reason,
        };

        let url = format!(
            "{}/{book_id}/chapter?number={number}&volume={volume}",
            self.base_url
        );
        let resp = self.transport.get_json(&url).map_err(|e| fail(format!("{e:#}")))?;

        let Some(data) = resp.get("data").filter(|d| d.is_object()) else {
            return Err(fail("接口返回缺少 data 对象".to_string()));
        };

        let requested = ChapterNumber::parse(number);
        let title = non_empty_str(data.get("name"))
            .map(str::to_string)
            .unwrap_or_else(|| format!("Chapter {requested}"));
        let body = ChapterBody::from_value(data.get("content").unwrap_or(&Value::Null));

        Ok(ChapterContent {
            title,
            html_body: clean_body(body),
            volume: data.get("volume").and_then(parse_volume).unwrap_or(volume),
            number: data
                .get("number")
                .filter(|v| !v.is_null())
                .map(ChapterNumber::from_value)
                .unwrap_or(requested),
            before_toc: false,
        })
    }

    /// 下载封面到 `out_dir/cover_<slug>.<ext>`。失败只记日志，返回 `None`。
    pub fn download_cover(&self, book_id: &str, slug: &str, out_dir: &Path) -> Option<PathBuf> {
        match self.try_download_cover(book_id, slug, out_dir) {
            Ok(Some(path)) => {
                info!(path = %path.display(), "封面已保存");
                Some(path)
            }
            Ok(None) => {
                info!(book_id, "该书没有封面");
                None
            }
            Err(e) => {
                warn!("{}", DownloadError::CoverFetch(format!("{e:#}")));
                None
            }
        }
    }

    fn try_download_cover(&self, book_id: &str, slug: &str, out_dir: &Path) -> Result<Option<PathBuf>> {
        let url = format!("{}/{book_id}/covers", self.base_url);
        let resp = self.transport.get_json(&url)?;

        let Some(cover_url) = resp
            .get("data")
            .and_then(Value::as_array)
            .and_then(|list| list.first())
            .and_then(|first| first.get("cover"))
            .and_then(|cover| non_empty_str(cover.get("default")))
        else {
            return Ok(None);
        };

        let headers = [
            (USER_AGENT, self.user_agent.clone()),
            (REFERER, self.cover_referer.clone()),
            (ACCEPT, COVER_ACCEPT.to_string()),
        ];
        let bytes = self.transport.get_bytes(cover_url, &headers)?;
        if bytes.is_empty() {
            return Err(anyhow!("封面内容为空: {cover_url}"));
        }

        fs::create_dir_all(out_dir)?;
        let name = if slug.is_empty() { book_id } else { slug };
        let path = out_dir.join(format!(
            "cover_{}.{}",
            sanitize_filename(name),
            cover_extension(cover_url)
        ));
        fs::write(&path, &bytes)?;
        Ok(Some(path))
    }
}

fn chapter_meta_from_record(item: &Value) -> ChapterMeta {
    let volume = item.get("volume").and_then(parse_volume).unwrap_or(1);
    let number_raw = match item.get("number") {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    let index = ["index", "item_number"]
        .iter()
        .find_map(|key| item.get(*key).and_then(Value::as_i64))
        .unwrap_or(0);
    let id = match item.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    let title = non_empty_str(item.get("name"))
        .map(str::to_string)
        .unwrap_or_else(|| {
            format!("Volume {volume}, chapter {}", ChapterNumber::parse(&number_raw))
        });

    ChapterMeta {
        id,
        index,
        volume,
        number_raw,
        title,
    }
}

/// 卷号按整数前缀解析（`"2"`、`2`、`"3a"`），解析不出返回 `None`。
fn parse_volume(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            let sign_len = usize::from(s.starts_with(['+', '-']));
            let digits = s[sign_len..]
                .bytes()
                .take_while(u8::is_ascii_digit)
                .count();
            if digits == 0 {
                return None;
            }
            s[..sign_len + digits].parse().ok()
        }
        _ => None,
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.trim().is_empty())
}

/// 从封面 URL 的路径部分取扩展名，取不到时用 `jpg`。
fn cover_extension(cover_url: &str) -> String {
    let path = Url::parse(cover_url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| cover_url.split(['?', '#']).next().unwrap_or("").to_string());
    let file = path.rsplit('/').next().unwrap_or("");
    match file.rsplit_once('.') {
        Some((_, ext))
            if !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            ext.to_ascii_lowercase()
        }
        _ => "jpg".to_string(),
    }
}
