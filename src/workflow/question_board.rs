//! 题目状态机 - 流程层
//!
//! 记录每道题的已选选项和作答状态，并校验状态迁移：
//!
//! ```text
//! unanswered --save(已选)--> answered --flag--> flagged
//! unanswered --review-->     review   --save(已选)--> answered
//! ```
//!
//! 只做本地校验，不发起任何网关调用。

use std::collections::HashMap;

use crate::error::{AttemptError, AttemptResult};
use crate::models::{QuestionState, TestDefinition};

/// 题目上的状态操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardAction {
    Save,
    Review,
    Flag,
}

impl BoardAction {
    fn name(self) -> &'static str {
        match self {
            BoardAction::Save => "save",
            BoardAction::Review => "review",
            BoardAction::Flag => "flag",
        }
    }
}

/// 迁移表
///
/// `has_selection` 仅对 `Save` 有意义；返回 `None` 表示非法迁移。
fn next_state(
    from: QuestionState,
    action: BoardAction,
    has_selection: bool,
) -> Option<QuestionState> {
    use QuestionState::*;

    match (from, action) {
        (Unanswered | Review | Answered | Flagged, BoardAction::Save) if has_selection => {
            Some(Answered)
        }
        (_, BoardAction::Save) => None,
        (Unanswered, BoardAction::Review) => Some(Review),
        (Review | Answered | Flagged, BoardAction::Review) => None,
        (Answered, BoardAction::Flag) => Some(Flagged),
        (Unanswered | Review | Flagged, BoardAction::Flag) => None,
    }
}

/// 题目状态表
#[derive(Debug, Clone)]
pub struct QuestionBoard {
    /// 试卷中题目ID及其可选项
    options: HashMap<String, Vec<u32>>,
    selected_option: HashMap<String, u32>,
    question_state: HashMap<String, QuestionState>,
}

impl QuestionBoard {
    pub fn new(test: &TestDefinition) -> Self {
        let options = test
            .questions
            .iter()
            .map(|q| (q.id.clone(), q.options.iter().map(|o| o.key).collect()))
            .collect();

        Self {
            options,
            selected_option: HashMap::new(),
            question_state: HashMap::new(),
        }
    }

    fn ensure_known(&self, question_id: &str) -> AttemptResult<&[u32]> {
        self.options
            .get(question_id)
            .map(Vec::as_slice)
            .ok_or_else(|| AttemptError::UnknownQuestion(question_id.to_string()))
    }

    /// 记录选项，不改变作答状态
    pub fn select_option(&mut self, question_id: &str, option: u32) -> AttemptResult<()> {
        let keys = self.ensure_known(question_id)?;
        if !keys.is_empty() && !keys.contains(&option) {
            return Err(AttemptError::UnknownOption {
                question_id: question_id.to_string(),
                option,
            });
        }
        self.selected_option.insert(question_id.to_string(), option);
        Ok(())
    }

    pub fn mark_answered(&mut self, question_id: &str) -> AttemptResult<QuestionState> {
        self.apply(question_id, BoardAction::Save)
    }

    pub fn mark_for_review(&mut self, question_id: &str) -> AttemptResult<QuestionState> {
        self.apply(question_id, BoardAction::Review)
    }

    pub fn flag(&mut self, question_id: &str) -> AttemptResult<QuestionState> {
        self.apply(question_id, BoardAction::Flag)
    }

    fn apply(&mut self, question_id: &str, action: BoardAction) -> AttemptResult<QuestionState> {
        self.ensure_known(question_id)?;

        let from = self.state_of(question_id);
        let has_selection = self.selected_option.contains_key(question_id);

        match next_state(from, action, has_selection) {
            Some(to) => {
                self.question_state.insert(question_id.to_string(), to);
                Ok(to)
            }
            None if action == BoardAction::Save => Err(AttemptError::PreconditionFailed {
                question_id: question_id.to_string(),
            }),
            None => Err(AttemptError::InvalidTransition {
                question_id: question_id.to_string(),
                from,
                action: action.name(),
            }),
        }
    }

    /// 当前状态，没有记录的题目视为 `Unanswered`
    pub fn state_of(&self, question_id: &str) -> QuestionState {
        self.question_state
            .get(question_id)
            .copied()
            .unwrap_or_default()
    }

    pub fn selected(&self, question_id: &str) -> Option<u32> {
        self.selected_option.get(question_id).copied()
    }

    /// 是否每道题都至少被设置过一次状态（不要求全部 answered）
    pub fn is_complete(&self, question_count: usize) -> bool {
        self.question_state.len() == question_count
    }

    pub fn recorded_count(&self) -> usize {
        self.question_state.len()
    }

    pub fn count_in(&self, state: QuestionState) -> usize {
        self.question_state.values().filter(|s| **s == state).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Question, QuestionOption};

    fn sample_test(count: usize) -> TestDefinition {
        let questions = (1..=count)
            .map(|i| Question {
                id: format!("q{}", i),
                prompt: format!("Question {}", i),
                options: (0..4)
                    .map(|key| QuestionOption {
                        key,
                        value: format!("Option {}", key),
                    })
                    .collect(),
                correct_answer: Some(1),
                reasoning: None,
                tags: Vec::new(),
            })
            .collect();

        TestDefinition {
            id: "test".to_string(),
            test_name: "Sample".to_string(),
            timing: 1.0,
            positive_scoring: 4.0,
            negative_scoring: 1.0,
            questions,
            cut_off: None,
            batch_id: None,
        }
    }

    #[test]
    fn test_mark_answered_requires_selection() {
        let mut board = QuestionBoard::new(&sample_test(2));

        let err = board.mark_answered("q1").unwrap_err();
        assert!(matches!(err, AttemptError::PreconditionFailed { .. }));
        assert_eq!(board.recorded_count(), 0);

        board.select_option("q1", 2).unwrap();
        assert_eq!(board.state_of("q1"), QuestionState::Unanswered);
        assert_eq!(board.mark_answered("q1").unwrap(), QuestionState::Answered);
    }

    #[test]
    fn test_flag_only_from_answered() {
        for setup in [
            QuestionState::Unanswered,
            QuestionState::Review,
            QuestionState::Answered,
            QuestionState::Flagged,
        ] {
            let mut board = QuestionBoard::new(&sample_test(1));
            match setup {
                QuestionState::Unanswered => {}
                QuestionState::Review => {
                    board.mark_for_review("q1").unwrap();
                }
                QuestionState::Answered => {
                    board.select_option("q1", 0).unwrap();
                    board.mark_answered("q1").unwrap();
                }
                QuestionState::Flagged => {
                    board.select_option("q1", 0).unwrap();
                    board.mark_answered("q1").unwrap();
                    board.flag("q1").unwrap();
                }
            }

            let result = board.flag("q1");
            if setup == QuestionState::Answered {
                assert_eq!(result.unwrap(), QuestionState::Flagged);
            } else {
                assert!(matches!(result, Err(AttemptError::InvalidTransition { .. })));
                assert_eq!(board.state_of("q1"), setup);
            }
        }
    }

    #[test]
    fn test_review_only_from_unanswered() {
        let mut board = QuestionBoard::new(&sample_test(3));

        assert_eq!(board.mark_for_review("q1").unwrap(), QuestionState::Review);
        // 再次标记也不允许
        assert!(matches!(
            board.mark_for_review("q1"),
            Err(AttemptError::InvalidTransition { .. })
        ));

        board.select_option("q2", 1).unwrap();
        board.mark_answered("q2").unwrap();
        assert!(matches!(
            board.mark_for_review("q2"),
            Err(AttemptError::InvalidTransition { .. })
        ));

        // 只选了选项但未保存，仍是 unanswered
        board.select_option("q3", 1).unwrap();
        assert_eq!(board.mark_for_review("q3").unwrap(), QuestionState::Review);

        board.flag("q2").unwrap();
        assert!(matches!(
            board.mark_for_review("q2"),
            Err(AttemptError::InvalidTransition { .. })
        ));
        assert_eq!(board.state_of("q2"), QuestionState::Flagged);
    }

    #[test]
    fn test_save_after_flag_returns_to_answered() {
        let mut board = QuestionBoard::new(&sample_test(1));
        board.select_option("q1", 1).unwrap();
        board.mark_answered("q1").unwrap();
        board.flag("q1").unwrap();

        // 再次保存会取消标记
        assert_eq!(board.mark_answered("q1").unwrap(), QuestionState::Answered);
        assert_eq!(board.selected("q1"), Some(1));
    }

    #[test]
    fn test_review_then_answer() {
        let mut board = QuestionBoard::new(&sample_test(1));
        board.mark_for_review("q1").unwrap();
        board.select_option("q1", 3).unwrap();
        assert_eq!(board.mark_answered("q1").unwrap(), QuestionState::Answered);
        assert_eq!(board.selected("q1"), Some(3));
    }

    #[test]
    fn test_is_complete_counts_any_state() {
        let mut board = QuestionBoard::new(&sample_test(2));
        assert!(!board.is_complete(2));

        board.mark_for_review("q1").unwrap();
        assert!(!board.is_complete(2));

        board.mark_for_review("q2").unwrap();
        assert!(board.is_complete(2));
        assert_eq!(board.count_in(QuestionState::Answered), 0);
    }

    #[test]
    fn test_unknown_question_and_option() {
        let mut board = QuestionBoard::new(&sample_test(1));
        assert!(matches!(
            board.select_option("q9", 0),
            Err(AttemptError::UnknownQuestion(_))
        ));
        assert!(matches!(
            board.select_option("q1", 42),
            Err(AttemptError::UnknownOption { .. })
        ));
        assert!(matches!(
            board.flag("q9"),
            Err(AttemptError::UnknownQuestion(_))
        ));
        assert_eq!(board.recorded_count(), 0);
    }

    #[test]
    fn test_reselect_overwrites() {
        let mut board = QuestionBoard::new(&sample_test(1));
        board.select_option("q1", 0).unwrap();
        board.select_option("q1", 2).unwrap();
        assert_eq!(board.selected("q1"), Some(2));
    }
}
