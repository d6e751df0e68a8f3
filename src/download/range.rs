//! 章节范围：解析用户输入的范围表达式，并按范围筛选、排序目录。
//!
//! 支持的写法：
//! - `1-150`      第 1 卷的 1~150 章（无冒号时卷号固定为 1）
//! - `63.1`       从第 1 卷 63.1 章开始到末尾
//! - `2:5`        从第 2 卷第 5 章开始到末尾
//! - `2:5-3:9`    第 2 卷第 5 章到第 3 卷第 9 章
//! - `2:5-9`      第 2 卷 5~9 章（右侧沿用左侧卷号）
//! - 空串         全部章节

use super::chapter_number::ChapterNumber;
use super::error::DownloadError;
use super::models::{ChapterMeta, RangeQuery};

pub fn parse_range(input: &str) -> Result<RangeQuery, DownloadError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(RangeQuery::open());
    }

    // 多余的 '-' 段直接忽略，只取前两段
    let parts: Vec<&str> = trimmed.split('-').take(2).collect();

    if !trimmed.contains(':') {
        let start = ChapterNumber::parse(parts[0].trim());
        return Ok(match parts.get(1) {
            None => RangeQuery::open_from(1, start),
            Some(end) => RangeQuery::closed(1, start, 1, ChapterNumber::parse(end.trim())),
        });
    }

    let start_parts = split_bound(trimmed, parts[0])?;
    let start_volume = parse_volume(start_parts[0]).unwrap_or(1);
    let start_chapter = parse_chapter_token(start_parts.get(1).copied());

    let Some(end_raw) = parts.get(1) else {
        return Ok(RangeQuery::open_from(start_volume, start_chapter));
    };

    let end_parts = split_bound(trimmed, end_raw)?;
    if end_parts.len() == 1 {
        let end_chapter = ChapterNumber::parse(end_parts[0].trim());
        return Ok(RangeQuery::closed(
            start_volume,
            start_chapter,
            start_volume,
            end_chapter,
        ));
    }

    let end_volume = parse_volume(end_parts[0]).unwrap_or(start_volume);
    let end_chapter = parse_chapter_token(end_parts.get(1).copied());
    Ok(RangeQuery::closed(
        start_volume,
        start_chapter,
        end_volume,
        end_chapter,
    ))
}

/// 按 (卷, 章节号) 稳定排序后筛选出范围内的章节。
pub fn select_chapters(catalog: &[ChapterMeta], query: &RangeQuery) -> Vec<ChapterMeta> {
    let mut sorted: Vec<ChapterMeta> = catalog.to_vec();
    sorted.sort_by(|a, b| {
        a.volume
            .cmp(&b.volume)
            .then_with(|| ChapterNumber::compare(a.number(), b.number()))
    });

    sorted
        .into_iter()
        .filter(|ch| {
            let number = ch.number();
            if ch.volume < query.start_volume
                || (ch.volume == query.start_volume && number < query.start_chapter)
            {
                return false;
            }
            let Some(end) = query.end else {
                return true;
            };
            !(ch.volume > end.volume || (ch.volume == end.volume && number > end.chapter))
        })
        .collect()
}

/// 在已排序的章节列表中找出同卷内不连续的位置，返回 (卷, 前一章, 后一章)。
///
/// 相邻两章视为连续：相同章节号、下一个子章节、下一整章或下一整章的首个子章节。
pub fn find_gaps(sorted: &[ChapterMeta]) -> Vec<(i64, ChapterNumber, ChapterNumber)> {
    sorted
        .windows(2)
        .filter(|w| w[0].volume == w[1].volume)
        .filter_map(|w| {
            let prev = w[0].number();
            let next = w[1].number();
            let contiguous = next == prev
                || Some(next) == prev.next_sub()
                || next == prev.next_whole()
                || next == prev.next_whole().first_sub();
            (!contiguous).then_some((w[0].volume, prev, next))
        })
        .collect()
}

/// 范围的可读描述，用于控制台输出。
pub fn describe_range(query: &RangeQuery) -> (String, String) {
    let volumes = match query.end_volume() {
        Some(end) => format!("{}-{end}", query.start_volume),
        None => format!("{} (到末尾)", query.start_volume),
    };
    let chapters = match query.end_chapter() {
        Some(end) => format!("{}-{end}", query.start_chapter),
        None => format!("{} (到末尾)", query.start_chapter),
    };
    (volumes, chapters)
}

fn split_bound<'a>(input: &str, bound: &'a str) -> Result<Vec<&'a str>, DownloadError> {
    let pieces: Vec<&str> = bound.split(':').collect();
    if pieces.len() > 2 {
        return Err(syntax_error(input, "每个边界最多包含一个 ':'"));
    }
    Ok(pieces)
}

/// 卷号按整数前缀解析；解析失败或为 0 时返回 `None`，由调用方决定默认值。
fn parse_volume(token: &str) -> Option<i64> {
    let t = token.trim();
    let (sign, digits) = match t.as_bytes().first() {
        Some(b'-') => (-1, &t[1..]),
        Some(b'+') => (1, &t[1..]),
        _ => (1, t),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end]
        .parse::<i64>()
        .ok()
        .map(|v| v * sign)
        .filter(|v| *v != 0)
}

fn parse_chapter_token(token: Option<&str>) -> ChapterNumber {
    match token.map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => ChapterNumber::parse(t),
        None => ChapterNumber::ONE,
    }
}

fn syntax_error(input: &str, reason: &str) -> DownloadError {
    DownloadError::RangeSyntax {
        input: input.to_string(),
        reason: reason.to_string(),
    }
}
