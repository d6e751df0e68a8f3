//! 命令行交互：收集书籍链接与章节范围，打印摘要。

use std::io::{self, BufRead, Write};

use anyhow::{Result, anyhow};

use crate::base_system::book_ref::BookRef;
use crate::download::models::RangeQuery;
use crate::download::range::describe_range;

const BANNER: &str = "═══════════════════════════════════════════════════════\n  ranobelib.me 小说下载（EPUB）\n═══════════════════════════════════════════════════════\n";

const RANGE_HELP: &str = "章节范围格式：\n  - \"1-150\"    第 1 卷的 1~150 章（简写）\n  - \"1\"        从第 1 卷第 1 章开始\n  - \"1:1-1:5\"  第 1 卷 1~5 章（完整写法）\n  - \"1:1-5\"    第 1 卷 1~5 章（右侧沿用左侧卷号）\n  - \"2:63.1\"   从第 2 卷 63.1 章开始到末尾\n  - （留空）    全部章节\n";

/// 启动时可用的输入来源。环境变量由调用方读取后传入。
#[derive(Debug, Clone, Default)]
pub struct InputSources {
    pub non_interactive: bool,
    pub env_book_url: Option<String>,
    pub env_range: Option<String>,
    pub positional_range: Option<String>,
}

impl InputSources {
    pub fn is_unattended_input(&self) -> bool {
        self.non_interactive || non_empty(self.env_book_url.as_deref()).is_some()
    }

    /// 范围优先取 `CHAPTER_RANGE`，其次位置参数（忽略以 `--` 开头的值）。
    fn preset_range(&self) -> String {
        non_empty(self.env_range.as_deref())
            .or_else(|| {
                non_empty(self.positional_range.as_deref()).filter(|s| !s.starts_with("--"))
            })
            .unwrap_or("")
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInput {
    pub book_url: String,
    pub range: String,
}

/// 从标准输入收集参数。
pub fn collect_inputs(sources: &InputSources) -> Result<UserInput> {
    let stdin = io::stdin();
    let mut lock = stdin.lock();
    collect_inputs_from(sources, &mut lock, &mut io::stdout())
}

pub(crate) fn collect_inputs_from<R: BufRead, W: Write>(
    sources: &InputSources,
    input: &mut R,
    out: &mut W,
) -> Result<UserInput> {
    writeln!(out, "{BANNER}")?;

    if sources.is_unattended_input() {
        let book_url = non_empty(sources.env_book_url.as_deref())
            .ok_or_else(|| anyhow!("非交互模式需要设置 BOOK_URL"))?
            .trim()
            .to_string();
        let range = sources.preset_range();
        writeln!(out, "书籍链接: {book_url}")?;
        if range.is_empty() {
            writeln!(out, "章节范围: 未指定（下载全部章节）\n")?;
        } else {
            writeln!(out, "章节范围: \"{range}\"\n")?;
        }
        return Ok(UserInput { book_url, range });
    }

    let book_url = read_line(
        input,
        out,
        "请输入书籍链接（例如 https://ranobelib.me/ru/book/40218--the-devious-first-daughter）：",
    )?;
    let book_url = book_url.trim().to_string();
    if book_url.is_empty() {
        return Err(anyhow!("书籍链接不能为空"));
    }

    writeln!(out, "{RANGE_HELP}")?;
    let range = read_line(input, out, "请输入章节范围（直接回车下载全部章节）：")?;
    Ok(UserInput {
        book_url,
        range: range.trim().to_string(),
    })
}

pub fn print_book(book: &BookRef) {
    println!("✓ 找到书籍: ID={}, Slug={}\n", book.book_id, book.slug);
}

pub fn print_range(query: &RangeQuery) {
    let (volumes, chapters) = describe_range(query);
    println!("下载参数:");
    println!("  卷: {volumes}");
    println!("  章: {chapters}");
}

fn read_line<R: BufRead, W: Write>(input: &mut R, out: &mut W, prompt: &str) -> Result<String> {
    write!(out, "{prompt}")?;
    out.flush().ok();
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line)
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn run(sources: &InputSources, stdin: &str) -> (Result<UserInput>, String) {
        let mut input = Cursor::new(stdin.as_bytes().to_vec());
        let mut out = Vec::new();
        let res = collect_inputs_from(sources, &mut input, &mut out);
        (res, String::from_utf8(out).unwrap())
    }

    #[test]
    fn env_book_url_selects_non_interactive() {
        let sources = InputSources {
            env_book_url: Some("https://ranobelib.me/ru/book/1--a".to_string()),
            env_range: Some(" 1-5 ".to_string()),
            positional_range: Some("7".to_string()),
            ..InputSources::default()
        };
        let (res, out) = run(&sources, "");
        assert_eq!(
            res.unwrap(),
            UserInput {
                book_url: "https://ranobelib.me/ru/book/1--a".to_string(),
                range: "1-5".to_string(),
            }
        );
        assert!(out.contains("\"1-5\""));
    }

    #[test]
    fn positional_range_used_without_env_range() {
        let sources = InputSources {
            non_interactive: true,
            env_book_url: Some("ranobelib.me/ru/book/1".to_string()),
            positional_range: Some("2:3".to_string()),
            ..InputSources::default()
        };
        assert_eq!(run(&sources, "").0.unwrap().range, "2:3");

        let flag_like = InputSources {
            positional_range: Some("--debug".to_string()),
            ..sources
        };
        assert_eq!(run(&flag_like, "").0.unwrap().range, "");
    }

    #[test]
    fn non_interactive_flag_without_book_url_fails() {
        let sources = InputSources {
            non_interactive: true,
            ..InputSources::default()
        };
        assert!(run(&sources, "https://ranobelib.me/ru/book/1\n").0.is_err());
    }

    #[test]
    fn interactive_reads_both_answers_and_shows_help() {
        let (res, out) = run(
            &InputSources::default(),
            "  https://ranobelib.me/ru/book/5--x  \n2:1-9\n",
        );
        assert_eq!(
            res.unwrap(),
            UserInput {
                book_url: "https://ranobelib.me/ru/book/5--x".to_string(),
                range: "2:1-9".to_string(),
            }
        );
        assert!(out.contains("章节范围格式"));
    }

    #[test]
    fn interactive_empty_url_is_an_error() {
        let (res, out) = run(&InputSources::default(), "\n");
        assert!(res.is_err());
        assert!(!out.contains("章节范围格式"));
    }

    #[test]
    fn interactive_range_may_be_empty() {
        let (res, _) = run(&InputSources::default(), "ranobelib.me/ru/book/5\n");
        assert_eq!(res.unwrap().range, "");
    }
}
