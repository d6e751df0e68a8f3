//! 全局配置结构（Config）与默认值。
//!
//! 该模块同时提供生成 `config.yml` 的字段元信息，以及文件名清理工具。

use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::config::{ConfigSpec, FieldMeta};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // 网络配置
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_cover_referer")]
    pub cover_referer: String,

    // 冷却配置
    #[serde(default = "default_delay_min_ms")]
    pub delay_min_ms: u64,
    #[serde(default = "default_delay_max_ms")]
    pub delay_max_ms: u64,
    #[serde(default = "default_failure_delay_ms")]
    pub failure_delay_ms: u64,
    #[serde(default = "default_ci_delay_min_ms")]
    pub ci_delay_min_ms: u64,
    #[serde(default = "default_ci_delay_max_ms")]
    pub ci_delay_max_ms: u64,

    // 保存配置
    #[serde(default = "default_save_path")]
    pub save_path: String,
    #[serde(default = "default_epub_author")]
    pub epub_author: String,
    #[serde(default = "default_toc_title")]
    pub toc_title: String,
    #[serde(default = "default_epub_language")]
    pub epub_language: String,
    #[serde(default = "default_true")]
    pub first_chapter_before_toc: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout: default_request_timeout(),
            max_retries: default_max_retries(),
            user_agent: default_user_agent(),
            cover_referer: default_cover_referer(),
            delay_min_ms: default_delay_min_ms(),
            delay_max_ms: default_delay_max_ms(),
            failure_delay_ms: default_failure_delay_ms(),
            ci_delay_min_ms: default_ci_delay_min_ms(),
            ci_delay_max_ms: default_ci_delay_max_ms(),
            save_path: default_save_path(),
            epub_author: default_epub_author(),
            toc_title: default_toc_title(),
            epub_language: default_epub_language(),
            first_chapter_before_toc: default_true(),
        }
    }
}

impl ConfigSpec for Config {
    const FILE_NAME: &'static str = "config.yml";

    fn fields() -> &'static [FieldMeta] {
        static FIELDS: [FieldMeta; 15] = [
            FieldMeta {
                name: "base_url",
                description: "API 根地址（书籍接口前缀）",
            },
            FieldMeta {
                name: "request_timeout",
                description: "请求超时时间（秒）",
            },
            FieldMeta {
                name: "max_retries",
                description: "单个请求的最大重试次数",
            },
            FieldMeta {
                name: "user_agent",
                description: "请求使用的 User-Agent",
            },
            FieldMeta {
                name: "cover_referer",
                description: "下载封面时附带的 Referer",
            },
            FieldMeta {
                name: "delay_min_ms",
                description: "章节之间的最小冷却时间, 单位ms",
            },
            FieldMeta {
                name: "delay_max_ms",
                description: "章节之间的最大冷却时间, 单位ms",
            },
            FieldMeta {
                name: "failure_delay_ms",
                description: "章节下载失败后的冷却时间, 单位ms",
            },
            FieldMeta {
                name: "ci_delay_min_ms",
                description: "GitLab CI 环境下的最小冷却时间, 单位ms",
            },
            FieldMeta {
                name: "ci_delay_max_ms",
                description: "GitLab CI 环境下的最大冷却时间, 单位ms",
            },
            FieldMeta {
                name: "save_path",
                description: "保存路径（epub 与临时封面）",
            },
            FieldMeta {
                name: "epub_author",
                description: "EPUB 作者字段",
            },
            FieldMeta {
                name: "toc_title",
                description: "EPUB 目录页标题",
            },
            FieldMeta {
                name: "epub_language",
                description: "EPUB 语言代码",
            },
            FieldMeta {
                name: "first_chapter_before_toc",
                description: "是否将第一章放在目录页之前",
            },
        ];
        &FIELDS
    }
}

impl Config {
    pub fn default_save_dir(&self) -> PathBuf {
        if self.save_path.trim().is_empty() {
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        } else {
            PathBuf::from(&self.save_path)
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout.max(1))
    }
}

fn re_separators() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r#"["<>|*?:\\/\r\n]"#).expect("compile separators"))
}

fn re_whitespace() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"\s+").expect("compile whitespace"))
}

fn re_dots() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"\.{2,}").expect("compile dots"))
}

/// 清理文件名：去掉 `" < > | * ? : \ /` 与回车换行，空白折叠为 `-`，
/// 连续的点折叠为一个，去掉首尾的点与空白；结果为空时返回 `book`。
pub fn sanitize_filename(name: &str) -> String {
    let stripped = re_separators().replace_all(name, "");
    let hyphened = re_whitespace().replace_all(&stripped, "-");
    let single_dots = re_dots().replace_all(&hyphened, ".");
    let cleaned = single_dots
        .trim_matches(|c: char| c == '.' || c.is_whitespace())
        .to_string();

    if cleaned.is_empty() {
        "book".to_string()
    } else {
        cleaned
    }
}

fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    "https://api.cdnlibs.org/api/manga".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_cover_referer() -> String {
    "https://ranobelib.me/".to_string()
}

fn default_delay_min_ms() -> u64 {
    3000
}

fn default_delay_max_ms() -> u64 {
    3000
}

fn default_failure_delay_ms() -> u64 {
    2000
}

fn default_ci_delay_min_ms() -> u64 {
    3000
}

fn default_ci_delay_max_ms() -> u64 {
    7000
}

fn default_save_path() -> String {
    "./output".to_string()
}

fn default_epub_author() -> String {
    "Unknown".to_string()
}

fn default_toc_title() -> String {
    "Оглавление".to_string()
}

fn default_epub_language() -> String {
    "ru".to_string()
}
