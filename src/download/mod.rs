//! 下载流程模块入口。
//!
//! 子模块：
//! - `chapter_number` — 可带小数的章节号
//! - `range`          — 范围表达式解析与目录筛选
//! - `pacing`         — 请求间隔策略与等待
//! - `downloader`     — 下载主流程编排
//! - `models`         — 数据模型
//! - `error`          — 错误类型

pub mod chapter_number;
pub mod downloader;
pub mod error;
pub mod models;
pub mod pacing;
pub mod range;
