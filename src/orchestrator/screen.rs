//! 页面、用户操作与事件定义

use std::fmt;
use std::str::FromStr;

/// 答题流程的页面
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// 考试说明
    Instructions,
    /// 答题中
    Questions,
    /// 还有题目未操作，等待确认交卷
    AwaitingConfirmation,
    /// 交卷中（不可关闭的等待框）
    Submitting,
    /// 交卷失败，等待手动重试
    SubmitFailed,
    /// 成绩页（终态）
    Result,
}

impl Screen {
    pub fn name(self) -> &'static str {
        match self {
            Screen::Instructions => "instructions",
            Screen::Questions => "questions",
            Screen::AwaitingConfirmation => "awaiting-confirmation",
            Screen::Submitting => "submitting",
            Screen::SubmitFailed => "submit-failed",
            Screen::Result => "result",
        }
    }

    /// 计时器运行期间的页面
    pub fn is_active(self) -> bool {
        matches!(self, Screen::Questions | Screen::AwaitingConfirmation)
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 强制交卷的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceReason {
    /// 倒计时归零
    Timeout,
    /// 关闭/离开答题页
    Abandoned,
    /// 上次进程中断，重新打开时恢复
    Recovered,
}

impl fmt::Display for ForceReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForceReason::Timeout => f.write_str("时间到"),
            ForceReason::Abandoned => f.write_str("离开答题页"),
            ForceReason::Recovered => f.write_str("恢复未完成的考试"),
        }
    }
}

/// 用户操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    Start,
    /// 跳转到指定题目（从 0 开始）
    GoTo(usize),
    Next,
    Previous,
    Select(u32),
    Save,
    SaveAndNext,
    Review,
    Flag,
    Submit,
    Confirm,
    Cancel,
    Retry,
}

impl UserAction {
    pub fn name(self) -> &'static str {
        match self {
            UserAction::Start => "start",
            UserAction::GoTo(_) => "goto",
            UserAction::Next => "next",
            UserAction::Previous => "prev",
            UserAction::Select(_) => "select",
            UserAction::Save => "save",
            UserAction::SaveAndNext => "save-next",
            UserAction::Review => "review",
            UserAction::Flag => "flag",
            UserAction::Submit => "submit",
            UserAction::Confirm => "confirm",
            UserAction::Cancel => "cancel",
            UserAction::Retry => "retry",
        }
    }
}

/// 终端命令解析失败
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseActionError(pub String);

impl fmt::Display for ParseActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "无法识别的命令: {}", self.0)
    }
}

impl std::error::Error for ParseActionError {}

impl FromStr for UserAction {
    type Err = ParseActionError;

    /// 终端命令；题号从 1 开始，与页面上的 Q1、Q2 对应
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let command = parts.next().unwrap_or_default().to_lowercase();
        let arg = parts.next();
        let err = || ParseActionError(s.trim().to_string());

        let action = match (command.as_str(), arg) {
            ("start", None) => UserAction::Start,
            ("goto" | "g", Some(n)) => {
                let n: usize = n.parse().map_err(|_| err())?;
                UserAction::GoTo(n.checked_sub(1).ok_or_else(err)?)
            }
            ("next", None) => UserAction::Next,
            ("prev" | "previous", None) => UserAction::Previous,
            ("select" | "s", Some(key)) => UserAction::Select(key.parse().map_err(|_| err())?),
            ("save", None) => UserAction::Save,
            ("save-next" | "sn", None) => UserAction::SaveAndNext,
            ("review" | "r", None) => UserAction::Review,
            ("flag" | "f", None) => UserAction::Flag,
            ("submit", None) => UserAction::Submit,
            ("confirm" | "y", None) => UserAction::Confirm,
            ("cancel" | "n", None) => UserAction::Cancel,
            ("retry", None) => UserAction::Retry,
            _ => return Err(err()),
        };

        Ok(action)
    }
}

/// 事件循环的输入
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptEvent {
    /// 倒计时每秒一次
    Tick,
    User(UserAction),
    /// 宿主关闭（Ctrl-C / 输入结束）
    Unload,
}
