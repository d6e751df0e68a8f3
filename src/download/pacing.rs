//! 章节请求之间的限速等待。

use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::info;

use crate::base_system::context::Config;
use crate::network_parser::network::jitter_fraction;

const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "✓"];

/// 两次请求之间的等待策略（毫秒）。成功后在 `[min, max]` 内均匀取值，失败后固定 `failure`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingPolicy {
    pub min_ms: u64,
    pub max_ms: u64,
    pub failure_ms: u64,
}

impl PacingPolicy {
    /// `gitlab` 为真时使用更宽的 CI 区间。
    pub fn from_config(cfg: &Config, gitlab: bool) -> Self {
        let (min_ms, max_ms) = if gitlab {
            (cfg.ci_delay_min_ms, cfg.ci_delay_max_ms)
        } else {
            (cfg.delay_min_ms, cfg.delay_max_ms)
        };
        Self {
            min_ms: min_ms.min(max_ms),
            max_ms: max_ms.max(min_ms),
            failure_ms: cfg.failure_delay_ms,
        }
    }

    pub fn next_delay(&self, after_failure: bool) -> Duration {
        if after_failure {
            Duration::from_millis(self.failure_ms)
        } else {
            self.draw_with(jitter_fraction())
        }
    }

    /// `fraction` 取 `[0, 1)`，映射到闭区间 `[min, max]`。
    pub fn draw_with(&self, fraction: f64) -> Duration {
        let span = self.max_ms.saturating_sub(self.min_ms).saturating_add(1);
        let offset = ((fraction.clamp(0.0, 1.0) * span as f64) as u64).min(span.saturating_sub(1));
        Duration::from_millis(self.min_ms.saturating_add(offset))
    }
}

pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// 执行等待：交互终端下显示转圈提示，无人值守时只写一行日志。
pub struct Pacer<S: Sleeper> {
    policy: PacingPolicy,
    sleeper: S,
    unattended: bool,
}

impl<S: Sleeper> Pacer<S> {
    pub fn new(policy: PacingPolicy, sleeper: S, unattended: bool) -> Self {
        Self {
            policy,
            sleeper,
            unattended,
        }
    }

    pub fn pause(&self, next_label: &str, after_failure: bool) -> Duration {
        let delay = self.policy.next_delay(after_failure);
        if self.unattended {
            info!("等待 {} ms 后下载下一章 ({next_label})", delay.as_millis());
            self.sleeper.sleep(delay);
            return delay;
        }

        let style = ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(SPINNER_FRAMES);
        let spinner = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
        spinner.set_style(style);
        spinner.set_message(format!("下载下一章... ({next_label})"));
        spinner.enable_steady_tick(Duration::from_millis(100));
        self.sleeper.sleep(delay);
        spinner.finish_and_clear();
        delay
    }

    #[cfg(test)]
    pub(crate) fn sleeper(&self) -> &S {
        &self.sleeper
    }
}
