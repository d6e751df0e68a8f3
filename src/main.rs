//! ranobelib.me 小说下载器：按章节范围下载正文并打包为 EPUB。
//!
//! 代码结构（读代码入口）：
//! - `base_system`：配置/日志/书籍链接解析/临时文件清理
//! - `download`：章节号、范围解析与筛选、限速、下载主流程
//! - `network_parser`：HTTP 传输与远端接口
//! - `book_parser`：正文清理与 EPUB 打包
//! - `ui`：命令行交互

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info};

mod base_system;
mod book_parser;
mod download;
mod network_parser;
mod ui;

use base_system::book_ref::parse_book_ref;
use base_system::config::load_or_create;
use base_system::context::Config;
use base_system::logging::{LogOptions, LogSystem};
use book_parser::epub_generator::EpubGenerator;
use download::downloader::DownloadPipeline;
use download::models::DownloadOutcome;
use download::pacing::{Pacer, PacingPolicy, ThreadSleeper};
use download::range::{parse_range, select_chapters};
use network_parser::api::RanobeLibApi;
use network_parser::network::{NetworkConfig, RanobeLibNetwork};
use ui::noui::{self, InputSources};

const VERSION: &str = env!("CARGO_PKG_VERSION");

const CI_FLAGS: [&str; 5] = ["CI", "GITHUB_ACTIONS", "GITLAB_CI", "CIRCLECI", "TRAVIS"];

#[derive(Debug, Parser)]
#[command(name = "ranobelib-downloader")]
#[command(about = "Download ranobelib.me novels as EPUB")]
struct Cli {
    /// 章节范围，例如 `1-150`、`2:5-3:9`（环境变量 CHAPTER_RANGE 优先）
    range: Option<String>,

    /// 不进行交互，从 BOOK_URL / CHAPTER_RANGE 读取参数
    #[arg(long, default_value_t = false)]
    non_interactive: bool,

    /// 启用调试日志输出
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// 显示版本信息后退出
    #[arg(long, default_value_t = false)]
    version: bool,

    /// 数据目录路径（用于存放 config.yml 和 logs）
    #[arg(long)]
    data_dir: Option<String>,

    /// 输出目录，覆盖配置中的 save_path
    #[arg(long)]
    output_dir: Option<String>,
}

/// 运行环境标记，启动时读取一次。
#[derive(Debug, Clone, Copy, Default)]
struct Deployment {
    unattended: bool,
    gitlab: bool,
}

impl Deployment {
    fn detect() -> Self {
        let flag = |name: &str| std::env::var(name).map(|v| v == "true").unwrap_or(false);
        Self {
            unattended: CI_FLAGS.iter().any(|name| flag(name)),
            gitlab: flag("GITLAB_CI"),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("ranobelib-downloader v{}", VERSION);
        return Ok(());
    }

    let data_dir = cli.data_dir.as_deref().map(Path::new);
    let _log = init_logging(cli.debug, data_dir)?;
    info!(target: "startup", "当前版本: v{}", VERSION);

    let mut config = load_or_create::<Config>(data_dir)?;
    if let Some(dir) = cli.output_dir.as_deref().filter(|d| !d.trim().is_empty()) {
        config.save_path = dir.trim().to_string();
    }

    let deployment = Deployment::detect();
    let sources = InputSources {
        non_interactive: cli.non_interactive,
        env_book_url: std::env::var("BOOK_URL").ok(),
        env_range: std::env::var("CHAPTER_RANGE").ok(),
        positional_range: cli.range.clone(),
    };
    let unattended = deployment.unattended || sources.is_unattended_input();

    let input = noui::collect_inputs(&sources)?;
    let book = parse_book_ref(&input.book_url)?;
    noui::print_book(&book);

    let query = parse_range(&input.range)?;
    debug!(range = %input.range, ?query, "范围解析完成");
    noui::print_range(&query);

    run_download(&config, &book, &query, deployment, unattended)
}

fn run_download(
    config: &Config,
    book: &base_system::book_ref::BookRef,
    query: &download::models::RangeQuery,
    deployment: Deployment,
    unattended: bool,
) -> Result<()> {
    let network = RanobeLibNetwork::new(NetworkConfig::from_config(config))?;
    let api = RanobeLibApi::new(&network, config);

    let catalog = api.list_chapters(&book.book_id, &book.slug)?;
    println!("\n目录共 {} 章", catalog.len());

    let selected = select_chapters(&catalog, query);
    if selected.is_empty() {
        println!("✗ 指定范围内没有章节");
        return Ok(());
    }
    println!("按范围需下载 {} 章\n", selected.len());

    let pacer = Pacer::new(
        PacingPolicy::from_config(config, deployment.gitlab),
        ThreadSleeper,
        unattended,
    );
    let packager = EpubGenerator::from_config(config);
    let output_dir: PathBuf = config.default_save_dir();
    let pipeline = DownloadPipeline::new(&api, &pacer, &packager, output_dir);

    match pipeline.run(book, &selected)? {
        DownloadOutcome::Packaged(report) => {
            println!("✓ EPUB 已生成: {}", report.epub_path.display());
            if report.skipped > 0 {
                println!("⚠ 有 {} 章下载失败已跳过", report.skipped);
            }
            info!(
                downloaded = report.downloaded,
                skipped = report.skipped,
                has_cover = report.has_cover,
                "下载完成"
            );
        }
        DownloadOutcome::NoChaptersDownloaded { attempted } => {
            println!("✗ 没有成功下载任何章节（尝试 {attempted} 章），未生成文件");
        }
    }
    Ok(())
}

fn init_logging(debug: bool, base_dir: Option<&Path>) -> Result<LogSystem> {
    let opts = LogOptions {
        debug,
        use_color: true,
    };
    Ok(LogSystem::init_with_base(opts, base_dir)?)
}
