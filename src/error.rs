//! 错误类型
//!
//! 库内部使用 `thiserror` 定义的强类型错误，二进制入口处统一转换为 `anyhow::Error`。

use thiserror::Error;

use crate::models::QuestionState;

/// 网关（LMS REST API）调用错误
///
/// 任何一种都对应"网关不可用"：网络失败、非 2xx 状态码或响应体无法解析。
#[derive(Debug, Error)]
pub enum GatewayError {
    /// 网络请求失败
    #[error("API请求失败 ({endpoint}): {source}")]
    Request {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    /// API 返回错误状态码
    #[error("API返回错误响应 ({endpoint}): status={status}, message={message}")]
    BadStatus {
        endpoint: String,
        status: u16,
        message: String,
    },
    /// 响应体解析失败
    #[error("响应解析失败 ({endpoint}): {reason}")]
    Decode { endpoint: String, reason: String },
}

impl GatewayError {
    pub fn endpoint(&self) -> &str {
        match self {
            GatewayError::Request { endpoint, .. }
            | GatewayError::BadStatus { endpoint, .. }
            | GatewayError::Decode { endpoint, .. } => endpoint,
        }
    }

    /// 服务端明确拒绝（4xx），重试不会成功
    pub fn is_rejected(&self) -> bool {
        matches!(self, GatewayError::BadStatus { status, .. } if (400..500).contains(status))
    }
}

/// 本地缓存读写错误
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("缓存文件读写失败 ({path}): {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("缓存内容序列化失败 (key: {key}): {source}")]
    Serde {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// 答题流程中的错误
#[derive(Debug, Error)]
pub enum AttemptError {
    /// 未选择选项就保存
    #[error("题目 {question_id} 尚未选择选项，无法保存")]
    PreconditionFailed { question_id: String },

    /// 当前状态不允许该操作
    #[error("题目 {question_id} 当前状态为 {from}，不能执行 {action}")]
    InvalidTransition {
        question_id: String,
        from: QuestionState,
        action: &'static str,
    },

    #[error("题目 {0} 不属于当前试卷")]
    UnknownQuestion(String),

    #[error("题目 {question_id} 没有选项 {option}")]
    UnknownOption { question_id: String, option: u32 },

    /// 已保存的题目不能再修改选项
    #[error("题目 {0} 已保存，选项不可修改")]
    OptionLocked(String),

    #[error("题目索引 {index} 超出范围 [0, {count})")]
    QuestionIndexOutOfRange { index: usize, count: usize },

    /// 当前页面不接受该操作
    #[error("当前页面 {screen} 不支持操作: {action}")]
    WrongScreen {
        screen: &'static str,
        action: &'static str,
    },

    #[error("缓存中没有试卷数据，请先通过 take 命令打开试卷")]
    MissingTestDefinition,

    #[error("答题记录ID不存在，考试尚未开始")]
    MissingAttemptId,

    /// 缓存中还有上次未交卷的考试
    #[error("存在未完成的答题记录 {0}，请先执行 resume 命令")]
    UnfinishedAttempt(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// 答题流程结果类型
pub type AttemptResult<T> = Result<T, AttemptError>;
