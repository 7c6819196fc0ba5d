//! 答题状态
//!
//! 一次考试的全部可变状态，只由编排器持有

use std::fmt::Display;

use crate::models::TestDefinition;
use crate::workflow::QuestionBoard;

#[derive(Debug, Clone)]
pub struct AttemptState {
    /// 网关返回的答题记录ID，考试结束清理缓存前不会被清空
    pub attempt_id: String,
    pub board: QuestionBoard,
    current_question_index: usize,
    question_count: usize,
}

impl AttemptState {
    pub fn new(attempt_id: String, test: &TestDefinition) -> Self {
        Self {
            attempt_id,
            board: QuestionBoard::new(test),
            current_question_index: 0,
            question_count: test.question_count(),
        }
    }

    pub fn current_question_index(&self) -> usize {
        self.current_question_index
    }

    /// 跳转到任意题目，越界返回 `false`
    pub fn go_to(&mut self, index: usize) -> bool {
        if index < self.question_count {
            self.current_question_index = index;
            true
        } else {
            false
        }
    }

    /// 下一题，停在最后一题
    pub fn advance(&mut self) {
        if self.current_question_index + 1 < self.question_count {
            self.current_question_index += 1;
        }
    }

    /// 上一题，停在第一题
    pub fn retreat(&mut self) {
        self.current_question_index = self.current_question_index.saturating_sub(1);
    }

    pub fn is_complete(&self) -> bool {
        self.board.is_complete(self.question_count)
    }

    pub fn question_count(&self) -> usize {
        self.question_count
    }
}

impl Display for AttemptState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[答题记录 #{} 第 {}/{} 题 已操作 {}]",
            self.attempt_id,
            self.current_question_index + 1,
            self.question_count,
            self.board.recorded_count()
        )
    }
}
