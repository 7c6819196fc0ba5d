//! # Take Test
//!
//! LMS 限时考试客户端
//!
//! ## 架构设计
//!
//! 本系统采用四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有本地持久化缓存，只暴露 get / put / remove 能力
//!
//! ### ② 业务能力层（Services / Clients）
//! - `clients/` - `TestGateway` 网关接口及其 HTTP 实现
//! - `services/` - `Countdown` 倒计时能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 单题状态机 `QuestionBoard` 与答题状态 `AttemptState`
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/attempt_orchestrator` - 一次考试的页面调度与交卷
//! - `orchestrator/app` - 终端应用入口
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::{HttpGateway, TestGateway};
pub use config::Config;
pub use error::{AttemptError, AttemptResult, CacheError, GatewayError};
pub use infrastructure::{AttemptCache, FileAttemptCache, MemoryAttemptCache};
pub use models::{QuestionState, SubmissionSummary, TestDefinition};
pub use orchestrator::{App, AttemptEvent, AttemptOptions, AttemptOrchestrator, Screen, UserAction};
pub use services::Countdown;
pub use workflow::{AttemptState, QuestionBoard};
