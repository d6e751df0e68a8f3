//! 章节正文清理与 EPUB 打包。

pub mod epub_generator;
pub(crate) mod html_utils;
