use serde::{Deserialize, Serialize};
use std::fmt;

/// 单个题目的作答状态
///
/// 不在状态表中的题目视为 `Unanswered`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionState {
    #[default]
    Unanswered,
    Answered,
    Review,
    Flagged,
}

impl QuestionState {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionState::Unanswered => "unanswered",
            QuestionState::Answered => "answered",
            QuestionState::Review => "review",
            QuestionState::Flagged => "flagged",
        }
    }

    /// 已保存的题目（answered / flagged）选项只读
    pub fn locks_selection(self) -> bool {
        matches!(self, QuestionState::Answered | QuestionState::Flagged)
    }
}

impl fmt::Display for QuestionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
