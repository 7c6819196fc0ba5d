//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `app` - 终端应用
//! - 打开缓存、创建网关客户端
//! - 分发 login / my-tests / take / resume / history 命令
//! - 把终端输入和 Ctrl-C 转换为事件
//!
//! ### `attempt_orchestrator` - 考试编排器
//! - 页面调度：说明 → 答题 → (确认) → 交卷 → 成绩
//! - 持有答题状态和倒计时
//! - 倒计时归零 / 离开答题页时强制交卷
//!
//! ## 层次关系
//!
//! ```text
//! app (命令 + 终端输入)
//!     ↓
//! attempt_orchestrator (一次考试)
//!     ↓
//! workflow::QuestionBoard (单题状态) + services::Countdown (计时)
//!     ↓
//! clients::TestGateway (网关) + infrastructure::AttemptCache (本地缓存)
//! ```

pub mod app;
pub mod attempt_orchestrator;
pub mod screen;

pub use app::App;
pub use attempt_orchestrator::{AttemptOptions, AttemptOrchestrator};
pub use screen::{AttemptEvent, ForceReason, Screen, UserAction};
