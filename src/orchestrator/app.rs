//! 终端应用 - 编排层入口
//!
//! ## 职责
//!
//! 1. **应用初始化**：打开本地缓存、读取登录令牌、创建网关客户端
//! 2. **命令分发**：登录、我的考试、参加考试、恢复考试、历史成绩
//! 3. **事件来源**：把终端输入、Ctrl-C 转换为 `AttemptEvent`
//! 4. **界面输出**：按页面打印当前状态
//!
//! 考试流程本身委托给 `AttemptOrchestrator`

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{info, warn};

use crate::clients::{HttpGateway, TestGateway};
use crate::config::Config;
use crate::infrastructure::{AttemptCache, FileAttemptCache, AUTH_TOKEN_KEY};
use crate::models::QuestionState;
use crate::orchestrator::attempt_orchestrator::{AttemptOptions, AttemptOrchestrator};
use crate::orchestrator::screen::{AttemptEvent, Screen, UserAction};
use crate::services::format_remaining;
use crate::utils::logging::truncate_text;

/// 应用主结构
pub struct App {
    config: Config,
    cache: Arc<FileAttemptCache>,
    gateway: Arc<HttpGateway>,
}

impl App {
    /// 初始化应用
    pub fn initialize(config: Config) -> Result<Self> {
        let cache = FileAttemptCache::open(&config.cache_file)
            .with_context(|| format!("无法打开缓存文件: {}", config.cache_file))?;

        let token = cache.get(AUTH_TOKEN_KEY)?;
        let gateway = HttpGateway::new(&config)?.with_token(token);

        info!("🌐 LMS 地址: {}", config.api_base_url);
        if !gateway.has_token() {
            warn!("⚠️ 尚未登录，请先执行 login 命令");
        }

        Ok(Self {
            config,
            cache: Arc::new(cache),
            gateway: Arc::new(gateway),
        })
    }

    /// 登录并保存令牌
    pub async fn login(&self, email: &str, password: &str) -> Result<()> {
        let token = self.gateway.login(email, password).await?;
        self.cache.put(AUTH_TOKEN_KEY, &token)?;
        info!("✓ 登录成功");
        Ok(())
    }

    /// 列出当前学员的考试
    pub async fn list_my_tests(&self) -> Result<()> {
        let tests = self.gateway.fetch_my_tests().await?;

        if tests.is_empty() {
            println!("No tests available.");
            return Ok(());
        }

        println!(
            "{:<26} {:<30} {:>6} {:>6} {:>5} {:>8}",
            "ID", "名称", "正分", "负分", "题数", "时长"
        );
        for test in &tests {
            println!(
                "{:<26} {:<30} {:>6} {:>6} {:>5} {:>6}分钟",
                test.id,
                truncate_text(&test.test_name, 28),
                test.positive_scoring,
                test.negative_scoring,
                test.question_count(),
                test.timing
            );
        }
        Ok(())
    }

    /// 打开一场考试：写入试卷数据后进入答题流程
    ///
    /// 上次的考试未交卷时拒绝打开新考试，需要先 resume
    pub async fn take(&self, test_id: &str) -> Result<()> {
        let tests = self.gateway.fetch_my_tests().await?;
        let test = tests
            .into_iter()
            .find(|t| t.id == test_id)
            .with_context(|| format!("没有找到考试: {}", test_id))?;

        AttemptOrchestrator::stage(&*self.cache, &test)?;
        self.run_attempt().await
    }

    /// 使用缓存中的试卷继续（或恢复）考试
    pub async fn run_attempt(&self) -> Result<()> {
        let (tx, rx) = mpsc::unbounded_channel();

        let cache: Arc<dyn AttemptCache> = self.cache.clone();
        let gateway: Arc<dyn TestGateway> = self.gateway.clone();
        let mut orchestrator =
            AttemptOrchestrator::open(gateway, cache, AttemptOptions::from(&self.config))?
                .with_events(tx.clone());

        spawn_input_reader(tx.clone());
        spawn_unload_guard(tx);

        let summary = orchestrator.run(rx, render).await?;
        match summary {
            Some(summary) => info!(
                "考试结束: {}/{} ({})",
                summary.total_score,
                summary.max_score,
                if summary.passed { "通过" } else { "未通过" }
            ),
            None => info!("考试未完成"),
        }
        Ok(())
    }

    /// 历史成绩
    pub async fn history(&self, test_id: &str) -> Result<()> {
        let entries = self.gateway.fetch_attempt_history(test_id).await?;
        if entries.is_empty() {
            println!("暂无历史记录");
            return Ok(());
        }

        for entry in &entries {
            let submitted = entry
                .submitted_at
                .map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{}  {}  得分 {}/{}  已答 {}/{}  {}",
                entry.id,
                submitted,
                entry.summary.total_score,
                entry.summary.max_score,
                entry.summary.total_answered,
                entry.summary.total_questions,
                if entry.summary.passed { "通过" } else { "未通过" }
            );
        }
        Ok(())
    }
}

/// 读取终端输入，输入结束视为离开答题页
fn spawn_input_reader(events: UnboundedSender<AttemptEvent>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => match line.parse::<UserAction>() {
                    Ok(action) => {
                        if events.send(AttemptEvent::User(action)).is_err() {
                            break;
                        }
                    }
                    Err(e) => println!("{}", e),
                },
                Ok(None) | Err(_) => {
                    let _ = events.send(AttemptEvent::Unload);
                    break;
                }
            }
        }
    });
}

/// Ctrl-C 时强制交卷，而不是直接退出
fn spawn_unload_guard(events: UnboundedSender<AttemptEvent>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = events.send(AttemptEvent::Unload);
        }
    });
}

// ========== 界面输出 ==========

fn state_marker(state: QuestionState) -> &'static str {
    match state {
        QuestionState::Unanswered => " ",
        QuestionState::Answered => "✓",
        QuestionState::Review => "?",
        QuestionState::Flagged => "!",
    }
}

fn render(orchestrator: &AttemptOrchestrator) {
    let test = orchestrator.test();

    match orchestrator.screen() {
        Screen::Instructions => {
            println!("\n{}", "=".repeat(60));
            println!("Instructions for {}", test.test_name);
            println!("- Time limit: {} minutes", test.timing);
            println!(
                "- Positive scoring: {} points per correct answer",
                test.positive_scoring
            );
            println!(
                "- Negative scoring: {} points per incorrect answer",
                test.negative_scoring
            );
            println!("- Do not close the program once the test starts.");
            println!("输入 start 开始考试");
        }
        Screen::Questions => {
            let (Some(attempt), Some(question)) =
                (orchestrator.attempt(), orchestrator.current_question())
            else {
                println!("No questions available for this test.");
                return;
            };
            let current = attempt.current_question_index();

            let navigator: Vec<String> = test
                .questions
                .iter()
                .enumerate()
                .map(|(i, q)| {
                    let marker = state_marker(attempt.board.state_of(&q.id));
                    if i == current {
                        format!(">Q{}[{}]", i + 1, marker)
                    } else {
                        format!("Q{}[{}]", i + 1, marker)
                    }
                })
                .collect();

            println!("\n{}", "─".repeat(60));
            println!(
                "剩余时间 {}   {}",
                format_remaining(orchestrator.remaining_seconds()),
                navigator.join(" ")
            );
            println!("Question {}: {}", current + 1, question.prompt);

            let selected = attempt.board.selected(&question.id);
            for option in &question.options {
                let mark = if selected == Some(option.key) { "(*)" } else { "( )" };
                println!("  {} {}. {}", mark, option.key, option.value);
            }
            println!("命令: s <选项> | save | sn | review | flag | goto <题号> | next | prev | submit");
        }
        Screen::AwaitingConfirmation => {
            let recorded = orchestrator
                .attempt()
                .map(|a| a.board.recorded_count())
                .unwrap_or_default();
            println!(
                "\n还有 {} 道题未作答，确定交卷吗？(y 确认 / n 返回)",
                test.question_count().saturating_sub(recorded)
            );
        }
        Screen::Submitting => println!("\n交卷中，请稍候..."),
        Screen::SubmitFailed => println!("\n交卷失败，输入 retry 重新提交"),
        Screen::Result => {
            if let Some(summary) = orchestrator.result() {
                println!("\n{}", "=".repeat(60));
                println!("{}", if summary.passed { "PASSED" } else { "FAILED" });
                println!("Score: {}/{}", summary.total_score, summary.max_score);
                println!(
                    "Answered: {}  Unanswered: {}",
                    summary.total_answered, summary.total_unanswered
                );
                println!("{}", "=".repeat(60));
            }
        }
    }
}
