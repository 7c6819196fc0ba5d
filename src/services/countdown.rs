//! 倒计时 - 业务能力层
//!
//! 单一计时器，一秒一跳，从 `timing * 60` 倒数到 0。
//! 计时状态（`tick()`）与时间源（tokio interval 任务）分开：
//! 编排器在自己的事件循环里调用 `tick()`，interval 任务只负责投递事件。

use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::debug;

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// 一次 tick 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// 仍在计时，附带剩余秒数
    Running(u64),
    /// 本次 tick 归零，只会出现一次
    Expired,
    /// 未启动或已停止
    Idle,
}

/// 倒计时控制器
///
/// 没有暂停/恢复，启动后一直运行到 `stop()` 或归零
#[derive(Debug, Default)]
pub struct Countdown {
    remaining_seconds: u64,
    armed: bool,
    ticker: Option<JoinHandle<()>>,
}

impl Countdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置总时长并开始计时
    pub fn arm(&mut self, seconds: u64) {
        self.stop_ticker();
        self.remaining_seconds = seconds;
        self.armed = true;
        debug!("倒计时启动: {} 秒", seconds);
    }

    /// 启动时间源：每秒向事件通道投递一次 `event`
    ///
    /// 通道关闭后任务自动结束；`stop()` 或 drop 时任务被中止
    pub fn start_ticker<E>(&mut self, events: UnboundedSender<E>, event: E)
    where
        E: Clone + Send + 'static,
    {
        self.stop_ticker();
        let handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
            loop {
                interval.tick().await;
                if events.send(event.clone()).is_err() {
                    break;
                }
            }
        });
        self.ticker = Some(handle);
    }

    pub fn tick(&mut self) -> TickOutcome {
        if !self.armed {
            return TickOutcome::Idle;
        }

        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            self.stop();
            debug!("倒计时结束");
            return TickOutcome::Expired;
        }

        TickOutcome::Running(self.remaining_seconds)
    }

    /// 停止计时并销毁时间源
    pub fn stop(&mut self) {
        self.armed = false;
        self.stop_ticker();
    }

    fn stop_ticker(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
    }

    pub fn remaining_seconds(&self) -> u64 {
        self.remaining_seconds
    }

    pub fn is_running(&self) -> bool {
        self.armed
    }

    pub fn has_ticker(&self) -> bool {
        self.ticker.is_some()
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}

/// 剩余时间格式化为 `mm:ss`
pub fn format_remaining(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
