//! 下载相关的数据模型定义。
//!
//! 包含范围查询、目录条目、章节正文与下载结果。

use std::path::PathBuf;

use super::chapter_number::ChapterNumber;

/// 规范化后的章节范围。`end` 为 `None` 表示一直下载到目录末尾。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeQuery {
    pub start_volume: i64,
    pub start_chapter: ChapterNumber,
    pub end: Option<RangeEnd>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeEnd {
    pub volume: i64,
    pub chapter: ChapterNumber,
}

impl RangeQuery {
    pub fn open() -> Self {
        Self {
            start_volume: 1,
            start_chapter: ChapterNumber::ONE,
            end: None,
        }
    }

    pub fn open_from(start_volume: i64, start_chapter: ChapterNumber) -> Self {
        Self {
            start_volume,
            start_chapter,
            end: None,
        }
    }

    pub fn closed(
        start_volume: i64,
        start_chapter: ChapterNumber,
        end_volume: i64,
        end_chapter: ChapterNumber,
    ) -> Self {
        Self {
            start_volume,
            start_chapter,
            end: Some(RangeEnd {
                volume: end_volume,
                chapter: end_chapter,
            }),
        }
    }

    pub fn end_volume(&self) -> Option<i64> {
        self.end.map(|e| e.volume)
    }

    pub fn end_chapter(&self) -> Option<ChapterNumber> {
        self.end.map(|e| e.chapter)
    }
}

/// 目录中的一个章节条目。
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterMeta {
    pub id: String,
    pub index: i64,
    pub volume: i64,
    /// 接口返回的原始章节号，请求正文时原样回传。
    pub number_raw: String,
    pub title: String,
}

impl ChapterMeta {
    pub fn number(&self) -> ChapterNumber {
        ChapterNumber::parse(&self.number_raw)
    }
}

/// 一章下载完成的正文。
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterContent {
    pub title: String,
    pub html_body: String,
    pub volume: i64,
    pub number: ChapterNumber,
    /// 是否放在自动生成的目录页之前。
    pub before_toc: bool,
}

#[derive(Debug, Clone)]
pub struct DownloadReport {
    pub epub_path: PathBuf,
    pub downloaded: usize,
    pub skipped: usize,
    pub has_cover: bool,
}

#[derive(Debug, Clone)]
pub enum DownloadOutcome {
    Packaged(DownloadReport),
    /// 选中的章节一章都没下载成功，未生成文件。
    NoChaptersDownloaded { attempted: usize },
}
