//! 考试编排器 - 编排层
//!
//! ## 职责
//!
//! 负责一次考试的完整流程，是考试级别的编排器：
//!
//! 1. **页面调度**：说明 → 答题 → (确认) → 交卷 → 成绩
//! 2. **状态持有**：唯一持有 `AttemptState` 和倒计时
//! 3. **网关调用**：开始考试、逐题保存（不等待结果）、交卷
//! 4. **强制交卷**：倒计时归零或离开答题页时跳过确认直接交卷
//! 5. **缓存清理**：成绩页停留一段时间后清理本地缓存
//!
//! 所有事件都在同一个事件循环里串行处理，不需要加锁。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use crate::clients::TestGateway;
use crate::config::Config;
use crate::error::{AttemptError, AttemptResult};
use crate::infrastructure::{AttemptCache, ATTEMPT_ID_KEY, TEST_STATE_KEY};
use crate::models::{Question, SubmissionSummary, TestDefinition};
use crate::orchestrator::screen::{AttemptEvent, ForceReason, Screen, UserAction};
use crate::services::{format_remaining, Countdown, TickOutcome};
use crate::utils::logging;
use crate::workflow::AttemptState;

/// 编排器参数
#[derive(Debug, Clone)]
pub struct AttemptOptions {
    /// 交卷失败后的自动重试次数
    pub submit_retries: usize,
    pub submit_retry_delay: Duration,
    /// 成绩页停留时间
    pub result_grace_period: Duration,
}

impl Default for AttemptOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for AttemptOptions {
    fn from(config: &Config) -> Self {
        Self {
            submit_retries: config.submit_retries,
            submit_retry_delay: config.submit_retry_delay(),
            result_grace_period: config.result_grace_period(),
        }
    }
}

/// 考试编排器
pub struct AttemptOrchestrator {
    gateway: Arc<dyn TestGateway>,
    cache: Arc<dyn AttemptCache>,
    options: AttemptOptions,
    test: TestDefinition,
    screen: Screen,
    attempt: Option<AttemptState>,
    countdown: Countdown,
    events: Option<UnboundedSender<AttemptEvent>>,
    result: Option<SubmissionSummary>,
    /// 上次进程遗留的答题记录
    recovered: bool,
    forced: Option<ForceReason>,
    /// 尚未完成的逐题保存请求数
    pending_updates: Arc<AtomicUsize>,
}

impl AttemptOrchestrator {
    /// 从缓存中读取试卷并打开答题页
    ///
    /// 缓存中已有答题记录ID时说明上次考试没有正常结束，进入恢复模式
    pub fn open(
        gateway: Arc<dyn TestGateway>,
        cache: Arc<dyn AttemptCache>,
        options: AttemptOptions,
    ) -> AttemptResult<Self> {
        let test: TestDefinition = cache
            .get_json(TEST_STATE_KEY)?
            .ok_or(AttemptError::MissingTestDefinition)?;

        let stale_attempt = cache.get(ATTEMPT_ID_KEY)?;
        let mut orchestrator = Self::new(gateway, cache, test, options);

        if let Some(attempt_id) = stale_attempt {
            warn!(
                "⚠️ 发现未完成的答题记录 {}，将直接交卷",
                attempt_id
            );
            orchestrator.attempt = Some(AttemptState::new(attempt_id, &orchestrator.test));
            orchestrator.screen = Screen::Questions;
            orchestrator.recovered = true;
        }

        Ok(orchestrator)
    }

    /// 使用已有的试卷数据创建编排器，初始页面为考试说明
    pub fn new(
        gateway: Arc<dyn TestGateway>,
        cache: Arc<dyn AttemptCache>,
        test: TestDefinition,
        options: AttemptOptions,
    ) -> Self {
        Self {
            gateway,
            cache,
            options,
            test,
            screen: Screen::Instructions,
            attempt: None,
            countdown: Countdown::new(),
            events: None,
            result: None,
            recovered: false,
            forced: None,
            pending_updates: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// 把试卷写入缓存，供随后的 `open` 读取
    ///
    /// 缓存中还有未交卷的答题记录时拒绝覆盖，避免用新试卷的名义交上次的卷
    pub fn stage(cache: &impl AttemptCache, test: &TestDefinition) -> AttemptResult<()> {
        if let Some(attempt_id) = cache.get(ATTEMPT_ID_KEY)? {
            return Err(AttemptError::UnfinishedAttempt(attempt_id));
        }
        cache.put_json(TEST_STATE_KEY, test)?;
        Ok(())
    }

    /// 挂接事件通道，开始考试后倒计时会向其投递 `Tick`
    pub fn with_events(mut self, events: UnboundedSender<AttemptEvent>) -> Self {
        self.events = Some(events);
        self
    }

    // ========== 只读访问 ==========

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn test(&self) -> &TestDefinition {
        &self.test
    }

    pub fn attempt(&self) -> Option<&AttemptState> {
        self.attempt.as_ref()
    }

    pub fn result(&self) -> Option<&SubmissionSummary> {
        self.result.as_ref()
    }

    pub fn remaining_seconds(&self) -> u64 {
        self.countdown.remaining_seconds()
    }

    pub fn is_recovered(&self) -> bool {
        self.recovered
    }

    pub fn forced_reason(&self) -> Option<ForceReason> {
        self.forced
    }

    pub fn pending_updates(&self) -> usize {
        self.pending_updates.load(Ordering::SeqCst)
    }

    pub fn current_question(&self) -> Option<&Question> {
        let index = self.attempt.as_ref()?.current_question_index();
        self.test.questions.get(index)
    }

    // ========== 页面守卫 ==========

    fn require(&self, expected: Screen, action: &'static str) -> AttemptResult<()> {
        if self.screen == expected {
            Ok(())
        } else {
            Err(AttemptError::WrongScreen {
                screen: self.screen.name(),
                action,
            })
        }
    }

    fn attempt_mut(&mut self) -> AttemptResult<&mut AttemptState> {
        self.attempt.as_mut().ok_or(AttemptError::MissingAttemptId)
    }

    fn current_question_id(&self) -> AttemptResult<String> {
        self.current_question()
            .map(|q| q.id.clone())
            .ok_or(AttemptError::QuestionIndexOutOfRange {
                index: self
                    .attempt
                    .as_ref()
                    .map(AttemptState::current_question_index)
                    .unwrap_or_default(),
                count: self.test.question_count(),
            })
    }

    // ========== 说明页 ==========

    /// 开始考试
    ///
    /// 网关调用失败时停留在说明页，不修改任何状态
    pub async fn start(&mut self) -> AttemptResult<()> {
        self.require(Screen::Instructions, "start")?;

        info!("📝 开始考试: {}", self.test.test_name);

        let attempt_id = match self.gateway.start_attempt(&self.test.id).await {
            Ok(id) => id,
            Err(e) => {
                error!("❌ 开始考试失败: {}", e);
                return Err(e.into());
            }
        };

        if let Err(e) = self.cache.put(ATTEMPT_ID_KEY, &attempt_id) {
            warn!("⚠️ 答题记录ID写入缓存失败，刷新后将无法恢复: {}", e);
        }

        let total_seconds = self.test.time_budget_seconds();
        logging::log_attempt_start(&self.test, &attempt_id, total_seconds);

        self.attempt = Some(AttemptState::new(attempt_id, &self.test));
        self.screen = Screen::Questions;

        // 时长为 0 时没有可以计的秒数，直接按超时交卷
        if total_seconds == 0 {
            warn!("⏰ 考试时长为 0，自动交卷");
            return self.force_submit(ForceReason::Timeout).await;
        }

        self.countdown.arm(total_seconds);
        if let Some(events) = &self.events {
            self.countdown.start_ticker(events.clone(), AttemptEvent::Tick);
        }

        Ok(())
    }

    // ========== 答题页 ==========

    pub fn go_to(&mut self, index: usize) -> AttemptResult<()> {
        self.require(Screen::Questions, "goto")?;
        let count = self.test.question_count();
        if self.attempt_mut()?.go_to(index) {
            Ok(())
        } else {
            Err(AttemptError::QuestionIndexOutOfRange { index, count })
        }
    }

    pub fn next(&mut self) -> AttemptResult<()> {
        self.require(Screen::Questions, "next")?;
        self.attempt_mut()?.advance();
        Ok(())
    }

    pub fn previous(&mut self) -> AttemptResult<()> {
        self.require(Screen::Questions, "prev")?;
        self.attempt_mut()?.retreat();
        Ok(())
    }

    /// 为当前题目选择选项
    ///
    /// 已保存（answered / flagged）的题目选项只读
    pub fn select_option(&mut self, option: u32) -> AttemptResult<()> {
        self.require(Screen::Questions, "select")?;
        let question_id = self.current_question_id()?;
        let attempt = self.attempt_mut()?;

        if attempt.board.state_of(&question_id).locks_selection() {
            return Err(AttemptError::OptionLocked(question_id));
        }
        attempt.board.select_option(&question_id, option)
    }

    /// 保存当前题目
    pub fn save(&mut self) -> AttemptResult<()> {
        self.require(Screen::Questions, "save")?;
        let question_id = self.current_question_id()?;
        self.attempt_mut()?.board.mark_answered(&question_id)?;
        self.persist(&question_id);
        Ok(())
    }

    /// 保存并进入下一题（最后一题时停留）
    pub fn save_and_next(&mut self) -> AttemptResult<()> {
        self.save()?;
        self.attempt_mut()?.advance();
        Ok(())
    }

    pub fn mark_for_review(&mut self) -> AttemptResult<()> {
        self.require(Screen::Questions, "review")?;
        let question_id = self.current_question_id()?;
        self.attempt_mut()?.board.mark_for_review(&question_id)?;
        self.persist(&question_id);
        Ok(())
    }

    pub fn flag(&mut self) -> AttemptResult<()> {
        self.require(Screen::Questions, "flag")?;
        let question_id = self.current_question_id()?;
        self.attempt_mut()?.board.flag(&question_id)?;
        self.persist(&question_id);
        Ok(())
    }

    /// 把单题状态推送到网关，不等待结果
    ///
    /// 失败只记录日志，本地状态始终为准
    fn persist(&self, question_id: &str) {
        let Some(attempt) = &self.attempt else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("⚠️ 当前没有 tokio 运行时，题目 {} 的状态只保存在本地", question_id);
            return;
        };

        let gateway = Arc::clone(&self.gateway);
        let pending = Arc::clone(&self.pending_updates);
        let attempt_id = attempt.attempt_id.clone();
        let question_id = question_id.to_string();
        let selected = attempt.board.selected(&question_id);
        let state = attempt.board.state_of(&question_id);

        pending.fetch_add(1, Ordering::SeqCst);
        runtime.spawn(async move {
            match gateway
                .update_question_state(&attempt_id, &question_id, selected, state)
                .await
            {
                Ok(()) => debug!("题目 {} 状态已保存: {}", question_id, state),
                Err(e) => warn!("⚠️ 题目 {} 状态保存失败（不影响答题）: {}", question_id, e),
            }
            pending.fetch_sub(1, Ordering::SeqCst);
        });
    }

    // ========== 交卷 ==========

    /// 请求交卷
    ///
    /// 每道题都操作过时直接交卷，否则进入确认页
    pub async fn request_submit(&mut self) -> AttemptResult<()> {
        self.require(Screen::Questions, "submit")?;

        let complete = self
            .attempt
            .as_ref()
            .map(AttemptState::is_complete)
            .unwrap_or(false);

        if complete {
            self.submit().await
        } else {
            info!("还有题目未作答，等待确认交卷");
            self.screen = Screen::AwaitingConfirmation;
            Ok(())
        }
    }

    pub async fn confirm(&mut self) -> AttemptResult<()> {
        self.require(Screen::AwaitingConfirmation, "confirm")?;
        self.submit().await
    }

    /// 取消交卷，回到答题页，不修改任何状态
    pub fn cancel(&mut self) -> AttemptResult<()> {
        self.require(Screen::AwaitingConfirmation, "cancel")?;
        self.screen = Screen::Questions;
        Ok(())
    }

    pub async fn retry_submit(&mut self) -> AttemptResult<()> {
        self.require(Screen::SubmitFailed, "retry")?;
        self.submit().await
    }

    /// 倒计时推进一秒，归零时强制交卷
    pub async fn on_tick(&mut self) -> AttemptResult<()> {
        match self.countdown.tick() {
            TickOutcome::Expired => {
                warn!("⏰ 考试时间到，自动交卷");
                self.force_submit(ForceReason::Timeout).await
            }
            TickOutcome::Running(remaining) => {
                if remaining % 60 == 0 {
                    info!("⏳ 剩余时间 {}", format_remaining(remaining));
                }
                Ok(())
            }
            TickOutcome::Idle => Ok(()),
        }
    }

    /// 强制交卷，跳过确认（包括已打开的确认页）
    ///
    /// 只在答题中/确认页有效，其余页面忽略
    pub async fn force_submit(&mut self, reason: ForceReason) -> AttemptResult<()> {
        if !self.screen.is_active() {
            debug!("页面 {} 忽略强制交卷 ({})", self.screen, reason);
            return Ok(());
        }

        info!("📤 强制交卷: {}", reason);
        self.forced = Some(reason);
        self.submit().await
    }

    async fn submit(&mut self) -> AttemptResult<()> {
        // 离开答题页时销毁计时器
        self.countdown.stop();
        self.screen = Screen::Submitting;

        let attempt_id = match &self.attempt {
            Some(attempt) => attempt.attempt_id.clone(),
            None => {
                self.screen = Screen::SubmitFailed;
                return Err(AttemptError::MissingAttemptId);
            }
        };

        let pending = self.pending_updates();
        if pending > 0 {
            // 逐题保存请求不会被等待或取消，可能晚于交卷到达服务端
            warn!("⚠️ 交卷时仍有 {} 个题目状态请求未完成", pending);
        }

        info!("📤 正在交卷...");

        let attempts = self.options.submit_retries + 1;
        let mut last_error = None;
        for attempt in 1..=attempts {
            match self.gateway.submit_attempt(&attempt_id).await {
                Ok(summary) => {
                    logging::print_result(&self.test, &summary);
                    self.result = Some(summary);
                    self.screen = Screen::Result;
                    return Ok(());
                }
                Err(e) => {
                    warn!("交卷失败 (尝试 {}/{}): {}", attempt, attempts, e);
                    let rejected = e.is_rejected();
                    last_error = Some(e);
                    if rejected {
                        break;
                    }
                    if attempt < attempts {
                        tokio::time::sleep(self.options.submit_retry_delay).await;
                    }
                }
            }
        }

        error!("❌ 交卷失败，可输入 retry 重新提交");
        self.screen = Screen::SubmitFailed;
        match last_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// 清理本次考试的缓存（试卷数据和答题记录ID）
    pub fn teardown(&mut self) {
        self.countdown.stop();
        for key in [TEST_STATE_KEY, ATTEMPT_ID_KEY] {
            if let Err(e) = self.cache.remove(key) {
                warn!("⚠️ 清理缓存 {} 失败: {}", key, e);
            }
        }
        info!("🗑️ 已清理本地考试缓存");
    }

    // ========== 事件循环 ==========

    /// 分发一个用户操作
    pub async fn handle(&mut self, action: UserAction) -> AttemptResult<()> {
        match action {
            UserAction::Start => self.start().await,
            UserAction::GoTo(index) => self.go_to(index),
            UserAction::Next => self.next(),
            UserAction::Previous => self.previous(),
            UserAction::Select(option) => self.select_option(option),
            UserAction::Save => self.save(),
            UserAction::SaveAndNext => self.save_and_next(),
            UserAction::Review => self.mark_for_review(),
            UserAction::Flag => self.flag(),
            UserAction::Submit => self.request_submit().await,
            UserAction::Confirm => self.confirm().await,
            UserAction::Cancel => self.cancel(),
            UserAction::Retry => self.retry_submit().await,
        }
    }

    /// 运行事件循环直到考试结束
    ///
    /// - 交卷成功：成绩页停留 `result_grace_period` 后清理缓存
    /// - 离开答题页导致的强制交卷、成绩页被关闭：立即清理
    /// - 交卷失败后宿主关闭：保留缓存，下次打开时恢复
    ///
    /// `render` 在每个事件处理完后调用，用于刷新界面
    pub async fn run<F>(
        &mut self,
        mut events: UnboundedReceiver<AttemptEvent>,
        mut render: F,
    ) -> AttemptResult<Option<SubmissionSummary>>
    where
        F: FnMut(&Self),
    {
        if self.recovered {
            match self.force_submit(ForceReason::Recovered).await {
                Ok(()) => {}
                // 服务端已不接受这条记录（已交卷或已被服务端结束），保留也无法再交
                Err(AttemptError::Gateway(e)) if e.is_rejected() => {
                    warn!("⚠️ 服务端拒绝恢复交卷，丢弃本地答题记录: {}", e);
                    self.teardown();
                    return Ok(None);
                }
                Err(e) => error!("❌ 恢复交卷失败: {}", e),
            }
        }
        render(&*self);

        loop {
            if self.screen == Screen::Result {
                // 成绩页停留期间只响应关闭
                if self.forced != Some(ForceReason::Abandoned) {
                    tokio::select! {
                        _ = tokio::time::sleep(self.options.result_grace_period) => {}
                        _ = wait_for_unload(&mut events) => {
                            debug!("成绩页被关闭，立即清理");
                        }
                    }
                }
                self.teardown();
                return Ok(self.result.clone());
            }

            let event = events.recv().await.unwrap_or(AttemptEvent::Unload);
            let unloading = event == AttemptEvent::Unload;
            let is_tick = event == AttemptEvent::Tick;
            let before = self.screen;

            let outcome = match event {
                AttemptEvent::Tick => self.on_tick().await,
                AttemptEvent::User(action) => self.handle(action).await,
                AttemptEvent::Unload => self.force_submit(ForceReason::Abandoned).await,
            };

            if let Err(e) = outcome {
                warn!("操作未执行: {}", e);
            }
            // 普通的倒计时不刷新界面
            if !is_tick || self.screen != before {
                render(&*self);
            }

            if unloading && self.screen != Screen::Result {
                match self.screen {
                    Screen::Instructions => info!("考试未开始，退出"),
                    _ => warn!("⚠️ 交卷未完成，答题记录保留在本地缓存中"),
                }
                return Ok(None);
            }
        }
    }
}

async fn wait_for_unload(events: &mut UnboundedReceiver<AttemptEvent>) {
    loop {
        match events.recv().await {
            Some(AttemptEvent::Unload) | None => return,
            Some(_) => continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::MemoryAttemptCache;
    use crate::models::QuestionState;

    struct NoopGateway;

    #[async_trait::async_trait]
    impl TestGateway for NoopGateway {
        async fn start_attempt(&self, _: &str) -> Result<String, crate::error::GatewayError> {
            Ok("attempt".to_string())
        }

        async fn update_question_state(
            &self,
            _: &str,
            _: &str,
            _: Option<u32>,
            _: QuestionState,
        ) -> Result<(), crate::error::GatewayError> {
            Ok(())
        }

        async fn submit_attempt(
            &self,
            _: &str,
        ) -> Result<SubmissionSummary, crate::error::GatewayError> {
            Ok(SubmissionSummary {
                total_score: 0.0,
                max_score: 0.0,
                total_questions: 0,
                total_answered: 0,
                total_unanswered: 0,
                passed: false,
            })
        }

        async fn fetch_attempt_history(
            &self,
            _: &str,
        ) -> Result<Vec<crate::models::AttemptHistoryEntry>, crate::error::GatewayError> {
            Ok(Vec::new())
        }

        async fn fetch_my_tests(&self) -> Result<Vec<TestDefinition>, crate::error::GatewayError> {
            Ok(Vec::new())
        }
    }

    fn empty_test() -> TestDefinition {
        TestDefinition {
            id: "t".to_string(),
            test_name: "Empty".to_string(),
            timing: 1.0,
            positive_scoring: 1.0,
            negative_scoring: 0.0,
            questions: Vec::new(),
            cut_off: None,
            batch_id: None,
        }
    }

    #[test]
    fn test_open_without_test_state() {
        let result = AttemptOrchestrator::open(
            Arc::new(NoopGateway),
            Arc::new(MemoryAttemptCache::new()),
            AttemptOptions::default(),
        );
        assert!(matches!(result, Err(AttemptError::MissingTestDefinition)));
    }

    #[test]
    fn test_question_actions_rejected_before_start() {
        let mut orchestrator = AttemptOrchestrator::new(
            Arc::new(NoopGateway),
            Arc::new(MemoryAttemptCache::new()),
            empty_test(),
            AttemptOptions::default(),
        );

        assert!(matches!(
            orchestrator.save(),
            Err(AttemptError::WrongScreen { .. })
        ));
        assert!(matches!(
            orchestrator.cancel(),
            Err(AttemptError::WrongScreen { .. })
        ));
        assert_eq!(orchestrator.screen(), Screen::Instructions);
    }

    #[test]
    fn test_empty_test_is_immediately_complete() {
        let mut orchestrator = AttemptOrchestrator::new(
            Arc::new(NoopGateway),
            Arc::new(MemoryAttemptCache::new()),
            empty_test(),
            AttemptOptions::default(),
        );

        tokio_test::block_on(orchestrator.start()).unwrap();
        assert_eq!(orchestrator.screen(), Screen::Questions);
        assert!(orchestrator.current_question().is_none());

        // 没有题目时 0 == 0，直接交卷
        tokio_test::block_on(orchestrator.request_submit()).unwrap();
        assert_eq!(orchestrator.screen(), Screen::Result);
    }

    fn one_question_test() -> TestDefinition {
        TestDefinition {
            questions: vec![Question {
                id: "q1".to_string(),
                prompt: "Which planet is the largest?".to_string(),
                options: vec![
                    crate::models::QuestionOption {
                        key: 0,
                        value: "Earth".to_string(),
                    },
                    crate::models::QuestionOption {
                        key: 1,
                        value: "Jupiter".to_string(),
                    },
                ],
                correct_answer: Some(1),
                reasoning: None,
                tags: Vec::new(),
            }],
            ..empty_test()
        }
    }

    #[test]
    fn test_save_outside_runtime_keeps_local_state() {
        let mut orchestrator = AttemptOrchestrator::new(
            Arc::new(NoopGateway),
            Arc::new(MemoryAttemptCache::new()),
            one_question_test(),
            AttemptOptions::default(),
        );
        tokio_test::block_on(orchestrator.start()).unwrap();

        // 不在 tokio 运行时中：不推送网关，本地状态照常更新
        orchestrator.select_option(1).unwrap();
        orchestrator.save().unwrap();
        orchestrator.flag().unwrap();

        let attempt = orchestrator.attempt().unwrap();
        assert_eq!(attempt.board.state_of("q1"), QuestionState::Flagged);
        assert_eq!(orchestrator.pending_updates(), 0);
    }

    #[test]
    fn test_stage_refuses_while_attempt_unfinished() {
        let cache = MemoryAttemptCache::new();
        cache.put(ATTEMPT_ID_KEY, "stale-old").unwrap();

        let result = AttemptOrchestrator::stage(&cache, &one_question_test());
        assert!(matches!(result, Err(AttemptError::UnfinishedAttempt(id)) if id == "stale-old"));
        assert!(!cache.contains(TEST_STATE_KEY));

        cache.remove(ATTEMPT_ID_KEY).unwrap();
        AttemptOrchestrator::stage(&cache, &one_question_test()).unwrap();
        assert!(cache.contains(TEST_STATE_KEY));
    }
}
