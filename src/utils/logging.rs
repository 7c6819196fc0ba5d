/// 日志工具模块
///
/// 提供日志初始化和考试过程中的格式化输出
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::models::{SubmissionSummary, TestDefinition};
use crate::services::format_remaining;

/// 初始化日志
///
/// 优先使用 `RUST_LOG`，否则按 `verbose` 选择 debug / info
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录考试开始信息
///
/// # 参数
/// - `test`: 试卷
/// - `attempt_id`: 答题记录ID
/// - `total_seconds`: 时间预算
pub fn log_attempt_start(test: &TestDefinition, attempt_id: &str, total_seconds: u64) {
    info!("{}", "=".repeat(60));
    info!("🚀 考试开始 - {}", test.test_name);
    info!("🆔 答题记录: {}", attempt_id);
    info!(
        "📋 题目数: {} | 时长: {}",
        test.question_count(),
        format_remaining(total_seconds)
    );
    info!(
        "开始时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
}

/// 打印成绩
pub fn print_result(test: &TestDefinition, summary: &SubmissionSummary) {
    info!("\n{}", "=".repeat(60));
    info!("📊 {} 成绩", test.test_name);
    info!(
        "交卷时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("得分: {}/{}", summary.total_score, summary.max_score);
    info!(
        "已答: {} | 未答: {} | 总题数: {}",
        summary.total_answered, summary.total_unanswered, summary.total_questions
    );
    if summary.passed {
        info!("✅ 通过");
    } else {
        info!("❌ 未通过");
    }
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（按字符计）
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
