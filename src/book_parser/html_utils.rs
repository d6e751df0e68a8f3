//! HTML 文本处理工具。
//!
//! 章节正文的形态归一化与清理，以及转义等纯文本操作。

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

fn re_p_open() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"<p[^>]*>").expect("compile p_open"))
}

fn re_p_boundary() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"</p>\s*<p>").expect("compile p_boundary"))
}

fn re_whitespace() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"\s+").expect("compile whitespace"))
}

fn re_all_tags() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"<[^>]+>").expect("compile tags"))
}

// ── 正文形态 ────────────────────────────────────────────────────

/// 接口返回的正文可能是字符串、片段数组或单个对象。
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ChapterBody {
    Html(String),
    Fragments(Vec<BodyFragment>),
    Single(BodyFragment),
    Missing,
}

/// 片段中携带文本的字段。
#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct BodyFragment {
    pub text: Option<String>,
    pub content: Option<String>,
}

impl BodyFragment {
    fn from_value(value: &Value) -> Self {
        Self {
            text: value.get("text").and_then(Value::as_str).map(str::to_string),
            content: value
                .get("content")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }
}

impl ChapterBody {
    pub(crate) fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) => ChapterBody::Html(s.clone()),
            Value::Array(items) => ChapterBody::Fragments(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => BodyFragment {
                            text: Some(s.clone()),
                            content: None,
                        },
                        other => BodyFragment::from_value(other),
                    })
                    .collect(),
            ),
            Value::Object(_) => ChapterBody::Single(BodyFragment::from_value(value)),
            _ => ChapterBody::Missing,
        }
    }

    /// 拼成一段 HTML：数组按换行连接（每项优先 `text`），单个对象优先 `content`。
    pub(crate) fn into_html(self) -> String {
        match self {
            ChapterBody::Html(s) => s,
            ChapterBody::Fragments(items) => items
                .into_iter()
                .map(|f| f.text.or(f.content).unwrap_or_default())
                .collect::<Vec<_>>()
                .join("\n"),
            ChapterBody::Single(f) => f.content.or(f.text).unwrap_or_default(),
            ChapterBody::Missing => String::new(),
        }
    }
}

// ── 清理 ────────────────────────────────────────────────────────

/// 清理章节正文，规则顺序固定：
/// 1. 去掉 `<p>` 上的属性
/// 2. 段落之间补换行
/// 3. 连续空白折叠为一个空格
/// 4. 每对 `</p><p>` 之间恰好一个换行
/// 5. 没有任何 `<p>` 时，去掉所有标签后包进一个段落
pub(crate) fn clean_html_content(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }

    let cleaned = re_p_open().replace_all(html, "<p>");
    let cleaned = re_p_boundary().replace_all(&cleaned, "</p>\n<p>");
    let cleaned = re_whitespace().replace_all(&cleaned, " ");
    let cleaned = re_p_boundary().replace_all(&cleaned, "</p>\n<p>");
    let cleaned = cleaned.trim();

    if cleaned.contains("<p>") {
        return cleaned.to_string();
    }
    let plain = re_all_tags().replace_all(cleaned, "");
    format!("<p>{}</p>", plain.trim())
}

pub(crate) fn clean_body(body: ChapterBody) -> String {
    clean_html_content(&body.into_html())
}

// ── HTML 转义 ───────────────────────────────────────────────────

pub(crate) fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
