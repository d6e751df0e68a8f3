//! 下载流程中的错误类型。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("无效的书籍链接: {0}")]
    InvalidReference(String),
    #[error("无法解析章节范围 '{input}': {reason}")]
    RangeSyntax { input: String, reason: String },
    #[error("获取章节目录失败: {0}")]
    CatalogFetch(String),
    #[error("获取章节失败 (卷 {volume}, 章 {number}): {reason}")]
    ChapterFetch {
        volume: i64,
        number: String,
        reason: String,
    },
    #[error("获取封面失败: {0}")]
    CoverFetch(String),
    #[error("生成 EPUB 失败: {0}")]
    Packaging(String),
    #[error("删除临时文件失败: {0}")]
    TempFileCleanup(String),
}
