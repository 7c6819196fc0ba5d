#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use take_test::infrastructure::TEST_STATE_KEY;
use take_test::models::{AttemptHistoryEntry, Question, QuestionOption};
use take_test::{
    AttemptCache, AttemptOptions, AttemptOrchestrator, GatewayError, MemoryAttemptCache,
    QuestionState, SubmissionSummary, TestDefinition, TestGateway,
};

pub const ATTEMPT_ID: &str = "attempt-1";

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedUpdate {
    pub attempt_id: String,
    pub question_id: String,
    pub selected_option: Option<u32>,
    pub state: QuestionState,
}

/// 内存网关：记录所有调用，可按需注入失败
#[derive(Default)]
pub struct FakeGateway {
    pub fail_start: AtomicBool,
    pub fail_updates: AtomicBool,
    /// 接下来多少次交卷请求失败
    pub submit_failures: AtomicUsize,
    /// 服务端拒绝所有交卷（例如已被服务端结束的答题记录）
    pub reject_submits: AtomicBool,
    pub question_count: AtomicUsize,
    pub started: Mutex<Vec<String>>,
    pub updates: Mutex<Vec<RecordedUpdate>>,
    pub submitted: Mutex<Vec<String>>,
}

impl FakeGateway {
    pub fn for_test(test: &TestDefinition) -> Arc<Self> {
        let gateway = Self::default();
        gateway
            .question_count
            .store(test.question_count(), Ordering::SeqCst);
        Arc::new(gateway)
    }

    pub fn submitted(&self) -> Vec<String> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn updates(&self) -> Vec<RecordedUpdate> {
        self.updates.lock().unwrap().clone()
    }

    fn unavailable(endpoint: &str) -> GatewayError {
        GatewayError::BadStatus {
            endpoint: endpoint.to_string(),
            status: 503,
            message: "Something went wrong".to_string(),
        }
    }

    /// 按收到的逐题状态评分，每道已保存的题记 4 分
    fn grade(&self) -> SubmissionSummary {
        let mut latest: HashMap<String, QuestionState> = HashMap::new();
        for update in self.updates.lock().unwrap().iter() {
            latest.insert(update.question_id.clone(), update.state);
        }
        let answered = latest
            .values()
            .filter(|s| matches!(s, QuestionState::Answered | QuestionState::Flagged))
            .count() as u32;
        let total = self.question_count.load(Ordering::SeqCst) as u32;

        SubmissionSummary {
            total_score: f64::from(answered * 4),
            max_score: f64::from(total * 4),
            total_questions: total,
            total_answered: answered,
            total_unanswered: total - answered,
            passed: total > 0 && answered * 2 >= total,
        }
    }
}

#[async_trait]
impl TestGateway for FakeGateway {
    async fn start_attempt(&self, test_id: &str) -> Result<String, GatewayError> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(Self::unavailable("testresults/create"));
        }
        self.started.lock().unwrap().push(test_id.to_string());
        Ok(ATTEMPT_ID.to_string())
    }

    async fn update_question_state(
        &self,
        attempt_id: &str,
        question_id: &str,
        selected_option: Option<u32>,
        state: QuestionState,
    ) -> Result<(), GatewayError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(Self::unavailable("testresults/update"));
        }
        self.updates.lock().unwrap().push(RecordedUpdate {
            attempt_id: attempt_id.to_string(),
            question_id: question_id.to_string(),
            selected_option,
            state,
        });
        Ok(())
    }

    async fn submit_attempt(&self, attempt_id: &str) -> Result<SubmissionSummary, GatewayError> {
        self.submitted.lock().unwrap().push(attempt_id.to_string());
        if self.reject_submits.load(Ordering::SeqCst) {
            return Err(GatewayError::BadStatus {
                endpoint: format!("testresults/submit/{}", attempt_id),
                status: 409,
                message: "Test already submitted".to_string(),
            });
        }
        let remaining_failures = self.submit_failures.load(Ordering::SeqCst);
        if remaining_failures > 0 {
            self.submit_failures
                .store(remaining_failures - 1, Ordering::SeqCst);
            return Err(Self::unavailable("testresults/submit"));
        }
        Ok(self.grade())
    }

    async fn fetch_attempt_history(
        &self,
        _test_id: &str,
    ) -> Result<Vec<AttemptHistoryEntry>, GatewayError> {
        Ok(Vec::new())
    }

    async fn fetch_my_tests(&self) -> Result<Vec<TestDefinition>, GatewayError> {
        Ok(Vec::new())
    }
}

/// 构造 `count` 道四选一题目的试卷
pub fn sample_test(count: usize, timing_minutes: f64) -> TestDefinition {
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
            reasoning: Some("because".to_string()),
            tags: Vec::new(),
        })
        .collect();

    TestDefinition {
        id: "test-1".to_string(),
        test_name: "Sample Test".to_string(),
        timing: timing_minutes,
        positive_scoring: 4.0,
        negative_scoring: 1.0,
        questions,
        cut_off: None,
        batch_id: None,
    }
}

pub fn fast_options() -> AttemptOptions {
    AttemptOptions {
        submit_retries: 1,
        submit_retry_delay: Duration::ZERO,
        result_grace_period: Duration::from_secs(5),
    }
}

/// 把试卷写入缓存后打开编排器（与 take 命令的顺序一致）
pub fn open_orchestrator(
    test: &TestDefinition,
    gateway: Arc<FakeGateway>,
    cache: Arc<MemoryAttemptCache>,
) -> AttemptOrchestrator {
    cache.put_json(TEST_STATE_KEY, test).unwrap();
    AttemptOrchestrator::open(gateway, cache, fast_options()).unwrap()
}

/// 等待所有逐题保存请求完成
pub async fn settle(orchestrator: &AttemptOrchestrator) {
    while orchestrator.pending_updates() > 0 {
        tokio::task::yield_now().await;
    }
}
