//! 下载流程：按筛选后的目录顺序逐章拉取正文，失败跳过，最后打包。
//!
//! 单线程顺序执行，同一时刻只有一个章节请求在途。

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::error::DownloadError;
use super::models::{ChapterContent, ChapterMeta, DownloadOutcome, DownloadReport};
use super::pacing::{Pacer, Sleeper};
use super::range::find_gaps;
use crate::base_system::book_ref::BookRef;
use crate::base_system::context::sanitize_filename;
use crate::base_system::file_cleaner::remove_temp_file;
use crate::book_parser::epub_generator::{BookPackager, PackageInput};
use crate::network_parser::api::RanobeLibApi;
use crate::network_parser::network::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Fetching(usize),
    Pacing { next: usize, after_failure: bool },
    Done,
}

pub struct DownloadPipeline<'a, T: Transport, S: Sleeper, P: BookPackager> {
    api: &'a RanobeLibApi<'a, T>,
    pacer: &'a Pacer<S>,
    packager: &'a P,
    output_dir: PathBuf,
}

impl<'a, T: Transport, S: Sleeper, P: BookPackager> DownloadPipeline<'a, T, S, P> {
    pub fn new(
        api: &'a RanobeLibApi<'a, T>,
        pacer: &'a Pacer<S>,
        packager: &'a P,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            api,
            pacer,
            packager,
            output_dir: output_dir.into(),
        }
    }

    /// 下载 `selected` 中的章节并打包。打包失败向上返回，单章失败只跳过。
    pub fn run(&self, book: &BookRef, selected: &[ChapterMeta]) -> Result<DownloadOutcome, DownloadError> {
        for (volume, after, first_missing) in find_gaps(selected) {
            debug!(volume, after = %after, first_missing = %first_missing, "目录中章节号不连续");
        }

        let (chapters, skipped) = self.collect(book, selected);
        if chapters.is_empty() {
            return Ok(DownloadOutcome::NoChaptersDownloaded {
                attempted: selected.len(),
            });
        }
        println!("\n共下载 {} 章", chapters.len());

        let cover = self
            .api
            .download_cover(&book.book_id, &book.slug, &self.output_dir);
        if cover.is_none() {
            println!("未获取到封面，将生成无封面的 EPUB");
        }

        let epub_path = self
            .output_dir
            .join(format!("{}.epub", sanitize_filename(&book.slug)));
        let title = book.display_title();
        self.packager.package(
            &PackageInput {
                book_id: &book.book_id,
                title: &title,
                chapters: &chapters,
                cover: cover.as_deref(),
            },
            &epub_path,
        )?;
        info!(path = %epub_path.display(), "EPUB 生成完成");

        if let Some(path) = &cover {
            cleanup_cover(path);
        }

        Ok(DownloadOutcome::Packaged(DownloadReport {
            epub_path,
            downloaded: chapters.len(),
            skipped,
            has_cover: cover.is_some(),
        }))
    }

    fn collect(&self, book: &BookRef, selected: &[ChapterMeta]) -> (Vec<ChapterContent>, usize) {
        let mut out: Vec<ChapterContent> = Vec::with_capacity(selected.len());
        let mut skipped = 0usize;
        let mut stage = if selected.is_empty() {
            Stage::Done
        } else {
            Stage::Fetching(0)
        };

        loop {
            stage = match stage {
                Stage::Fetching(i) => {
                    let meta = &selected[i];
                    debug!(id = %meta.id, index = meta.index, title = %meta.title, "获取章节");
                    let after_failure = match self.api.fetch_chapter(
                        &book.book_id,
                        meta.volume,
                        &meta.number_raw,
                    ) {
                        Ok(mut content) => {
                            content.before_toc = out.is_empty();
                            println!(
                                "✓ 已下载: 第 {} 卷 第 {} 章 - {}",
                                meta.volume,
                                meta.number(),
                                content.title
                            );
                            out.push(content);
                            false
                        }
                        Err(e) => {
                            warn!("{e}");
                            println!("⚠ 跳过: 第 {} 卷 第 {} 章 ({e})", meta.volume, meta.number());
                            skipped += 1;
                            true
                        }
                    };
                    Stage::Pacing {
                        next: i + 1,
                        after_failure,
                    }
                }
                Stage::Pacing {
                    next,
                    after_failure,
                } => match selected.get(next) {
                    Some(meta) => {
                        let label = format!("{}:{}", meta.volume, meta.number());
                        self.pacer.pause(&label, after_failure);
                        Stage::Fetching(next)
                    }
                    None => Stage::Done,
                },
                Stage::Done => break,
            };
        }

        (out, skipped)
    }
}

fn cleanup_cover(path: &Path) {
    match remove_temp_file(path) {
        Ok(()) => debug!(path = %path.display(), "临时封面已删除"),
        Err(e) => warn!("{e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base_system::context::Config;
    use crate::download::pacing::PacingPolicy;
    use crate::download::pacing::tests::RecordingSleeper;
    use anyhow::{Result, anyhow};
    use reqwest::header::HeaderName;
    use serde_json::{Value, json};
    use std::cell::RefCell;
    use std::time::Duration;

    const BASE: &str = "https://api.test/api/manga";

    #[derive(Default)]
    struct FakeTransport {
        chapters: Vec<(i64, &'static str)>,
        failing: Vec<(i64, &'static str)>,
        with_cover: bool,
        requested: RefCell<Vec<String>>,
    }

    impl Transport for FakeTransport {
        fn get_json(&self, url: &str) -> Result<Value> {
            self.requested.borrow_mut().push(url.to_string());
            if url == format!("{BASE}/9/covers") {
                return if self.with_cover {
                    Ok(json!({"data": [{"cover": {"default": "https://img.test/c.jpg"}}]}))
                } else {
                    Err(anyhow!("covers unavailable"))
                };
            }
            for &(volume, number) in &self.chapters {
                if url == format!("{BASE}/9/chapter?number={number}&volume={volume}") {
                    if self.failing.contains(&(volume, number)) {
                        return Err(anyhow!("HTTP 500"));
                    }
                    return Ok(json!({"data": {
                        "name": format!("V{volume} C{number}"),
                        "content": format!("<p>text {volume}/{number}</p>"),
                        "volume": volume.to_string(),
                        "number": number,
                    }}));
                }
            }
            Err(anyhow!("unexpected url {url}"))
        }

        fn get_bytes(&self, _url: &str, _headers: &[(HeaderName, String)]) -> Result<Vec<u8>> {
            Ok(b"JPEG".to_vec())
        }
    }

    #[derive(Default)]
    struct RecordingPackager {
        calls: RefCell<Vec<(Vec<(i64, String, bool)>, String, Option<PathBuf>, PathBuf)>>,
        cover_existed: RefCell<bool>,
    }

    impl BookPackager for RecordingPackager {
        fn package(&self, input: &PackageInput<'_>, output_path: &Path) -> Result<(), DownloadError> {
            *self.cover_existed.borrow_mut() = input.cover.is_some_and(Path::exists);
            self.calls.borrow_mut().push((
                input
                    .chapters
                    .iter()
                    .map(|c| (c.volume, c.number.to_string(), c.before_toc))
                    .collect(),
                input.title.to_string(),
                input.cover.map(Path::to_path_buf),
                output_path.to_path_buf(),
            ));
            Ok(())
        }
    }

    fn meta(volume: i64, number: &str) -> ChapterMeta {
        ChapterMeta {
            id: format!("{volume}-{number}"),
            index: 0,
            volume,
            number_raw: number.to_string(),
            title: String::new(),
        }
    }

    fn book() -> BookRef {
        BookRef {
            book_id: "9".to_string(),
            slug: "my-book".to_string(),
        }
    }

    fn pacer() -> Pacer<RecordingSleeper> {
        Pacer::new(
            PacingPolicy {
                min_ms: 5,
                max_ms: 5,
                failure_ms: 1,
            },
            RecordingSleeper::default(),
            true,
        )
    }

    fn config() -> Config {
        Config {
            base_url: BASE.to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn failed_chapter_is_skipped_and_run_still_packages() {
        let dir = tempfile::tempdir().unwrap();
        let transport = FakeTransport {
            chapters: vec![(1, "1"), (1, "2"), (1, "3")],
            failing: vec![(1, "2")],
            with_cover: true,
            ..FakeTransport::default()
        };
        let cfg = config();
        let api = RanobeLibApi::new(&transport, &cfg);
        let pacer = pacer();
        let packager = RecordingPackager::default();
        let pipeline = DownloadPipeline::new(&api, &pacer, &packager, dir.path());

        let selected = vec![meta(1, "1"), meta(1, "2"), meta(1, "3")];
        let outcome = pipeline.run(&book(), &selected).unwrap();

        let calls = packager.calls.borrow();
        assert_eq!(calls.len(), 1);
        let (chapters, title, cover, out) = &calls[0];
        assert_eq!(
            chapters,
            &vec![(1, "1".to_string(), true), (1, "3".to_string(), false)]
        );
        assert_eq!(title, "my-book");
        assert_eq!(cover.as_deref(), Some(dir.path().join("cover_my-book.jpg").as_path()));
        assert_eq!(out, &dir.path().join("my-book.epub"));
        assert!(*packager.cover_existed.borrow());

        // 打包后临时封面被删除
        assert!(!dir.path().join("cover_my-book.jpg").exists());

        match outcome {
            DownloadOutcome::Packaged(report) => {
                assert_eq!(report.downloaded, 2);
                assert_eq!(report.skipped, 1);
                assert!(report.has_cover);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        // 成功后随机等待，失败后固定惩罚等待，最后一章之后不再等待
        assert_eq!(
            *pacer.sleeper().slept.borrow(),
            vec![Duration::from_millis(5), Duration::from_millis(1)]
        );
        assert!(transport
            .requested
            .borrow()
            .iter()
            .any(|u| u.ends_with("/9/covers")));
    }

    #[test]
    fn zero_successes_skip_cover_and_packaging() {
        let dir = tempfile::tempdir().unwrap();
        let transport = FakeTransport {
            chapters: vec![(1, "1"), (1, "2")],
            failing: vec![(1, "1"), (1, "2")],
            with_cover: true,
            ..FakeTransport::default()
        };
        let cfg = config();
        let api = RanobeLibApi::new(&transport, &cfg);
        let pacer = pacer();
        let packager = RecordingPackager::default();
        let pipeline = DownloadPipeline::new(&api, &pacer, &packager, dir.path());

        let outcome = pipeline
            .run(&book(), &[meta(1, "1"), meta(1, "2")])
            .unwrap();
        assert!(matches!(
            outcome,
            DownloadOutcome::NoChaptersDownloaded { attempted: 2 }
        ));
        assert!(packager.calls.borrow().is_empty());
        assert!(!transport
            .requested
            .borrow()
            .iter()
            .any(|u| u.ends_with("/covers")));
    }

    #[test]
    fn missing_cover_still_packages() {
        let dir = tempfile::tempdir().unwrap();
        let transport = FakeTransport {
            chapters: vec![(2, "63.1")],
            ..FakeTransport::default()
        };
        let cfg = config();
        let api = RanobeLibApi::new(&transport, &cfg);
        let pacer = pacer();
        let packager = RecordingPackager::default();
        let pipeline = DownloadPipeline::new(&api, &pacer, &packager, dir.path());

        let outcome = pipeline.run(&book(), &[meta(2, "63.1")]).unwrap();
        let calls = packager.calls.borrow();
        assert_eq!(calls[0].0, vec![(2, "63.1".to_string(), true)]);
        assert!(calls[0].2.is_none());
        assert!(matches!(
            outcome,
            DownloadOutcome::Packaged(DownloadReport { has_cover: false, .. })
        ));
        assert!(pacer.sleeper().slept.borrow().is_empty());
    }

    #[test]
    fn empty_selection_reports_nothing_downloaded() {
        let dir = tempfile::tempdir().unwrap();
        let transport = FakeTransport::default();
        let cfg = config();
        let api = RanobeLibApi::new(&transport, &cfg);
        let pacer = pacer();
        let packager = RecordingPackager::default();
        let pipeline = DownloadPipeline::new(&api, &pacer, &packager, dir.path());

        assert!(matches!(
            pipeline.run(&book(), &[]).unwrap(),
            DownloadOutcome::NoChaptersDownloaded { attempted: 0 }
        ));
        assert!(transport.requested.borrow().is_empty());
    }

    #[test]
    fn packaging_error_propagates() {
        struct FailingPackager;
        impl BookPackager for FailingPackager {
            fn package(&self, _: &PackageInput<'_>, _: &Path) -> Result<(), DownloadError> {
                Err(DownloadError::Packaging("disk full".to_string()))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let transport = FakeTransport {
            chapters: vec![(1, "1")],
            ..FakeTransport::default()
        };
        let cfg = config();
        let api = RanobeLibApi::new(&transport, &cfg);
        let pacer = pacer();
        let pipeline = DownloadPipeline::new(&api, &pacer, &FailingPackager, dir.path());

        assert!(matches!(
            pipeline.run(&book(), &[meta(1, "1")]),
            Err(DownloadError::Packaging(_))
        ));
    }
}
