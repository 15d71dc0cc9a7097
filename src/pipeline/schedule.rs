//! 轮询调度 (Cancellable polling)
//!
//! 任务成功 → 等待轮询间隔; 记录库/文件库故障 → 记录错误, 等待退避间隔;
//! 其它错误 (单个片段打不开等) → 记录警告, 按正常间隔继续.
//! 等待通过 [`Ticker`] 完成, 测试里换成脚本化的实现.

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use tracing::{error, info, warn};

use crate::config::ScheduleConfig;
use crate::error::Result;

/// 等待一段时间; 返回 false 表示收到停止信号
pub trait Ticker {
    fn wait(&mut self, duration: Duration) -> bool;
}

/// 基于停止通道的等待
pub struct ChannelTicker {
    shutdown: Receiver<()>,
}

/// 停止句柄, 可跨线程传递
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Sender<()>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        let _ = self.tx.try_send(());
    }
}

/// 创建停止句柄与对应的等待器
pub fn shutdown_channel() -> (ShutdownHandle, ChannelTicker) {
    let (tx, rx) = bounded(1);
    (ShutdownHandle { tx }, ChannelTicker { shutdown: rx })
}

impl Ticker for ChannelTicker {
    fn wait(&mut self, duration: Duration) -> bool {
        match self.shutdown.recv_timeout(duration) {
            Err(RecvTimeoutError::Timeout) => true,
            // 收到信号或句柄全部释放
            Ok(()) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }
}

/// 一次调度运行的统计
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    pub runs: u64,
    pub successes: u64,
    pub backoffs: u64,
    pub skipped: u64,
}

pub struct Scheduler {
    poll_interval: Duration,
    error_backoff: Duration,
}

impl Scheduler {
    pub fn new(poll_interval: Duration, error_backoff: Duration) -> Self {
        Self {
            poll_interval,
            error_backoff,
        }
    }

    pub fn from_config(config: &ScheduleConfig) -> Self {
        Self::new(
            Duration::from_secs(config.poll_interval_secs),
            Duration::from_secs(config.error_backoff_secs),
        )
    }

    /// 反复执行 `task` 直到停止
    pub fn run<T, F>(&self, ticker: &mut dyn Ticker, mut task: F) -> RunStats
    where
        F: FnMut() -> Result<T>,
    {
        let mut stats = RunStats::default();
        loop {
            stats.runs += 1;
            let wait = match task() {
                Ok(_) => {
                    stats.successes += 1;
                    self.poll_interval
                }
                Err(e) if e.is_transient() => {
                    stats.backoffs += 1;
                    error!("❌ 存储不可用: {} | {:?} 后重试", e, self.error_backoff);
                    self.error_backoff
                }
                Err(e) => {
                    stats.skipped += 1;
                    warn!("⚠️  本轮跳过: {}", e);
                    self.poll_interval
                }
            };

            if !ticker.wait(wait) {
                info!("🛑 收到停止信号, 共运行 {} 轮", stats.runs);
                return stats;
            }
        }
    }
}
