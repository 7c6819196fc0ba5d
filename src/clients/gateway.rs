//! 远程考试网关接口
//!
//! 编排层只依赖这个 trait，HTTP 实现和测试用的内存实现都可以注入。

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::models::{AttemptHistoryEntry, QuestionState, SubmissionSummary, TestDefinition};

#[async_trait]
pub trait TestGateway: Send + Sync {
    /// 开始考试，返回答题记录ID
    async fn start_attempt(&self, test_id: &str) -> Result<String, GatewayError>;

    /// 保存单个题目的作答状态（尽力而为）
    async fn update_question_state(
        &self,
        attempt_id: &str,
        question_id: &str,
        selected_option: Option<u32>,
        state: QuestionState,
    ) -> Result<(), GatewayError>;

    /// 交卷并获取成绩
    async fn submit_attempt(&self, attempt_id: &str) -> Result<SubmissionSummary, GatewayError>;

    /// 查询历史答题记录
    async fn fetch_attempt_history(
        &self,
        test_id: &str,
    ) -> Result<Vec<AttemptHistoryEntry>, GatewayError>;

    /// 当前学员可参加的试卷
    async fn fetch_my_tests(&self) -> Result<Vec<TestDefinition>, GatewayError>;
}
