use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 交卷后网关返回的成绩汇总
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionSummary {
    pub total_score: f64,
    pub max_score: f64,
    pub total_questions: u32,
    pub total_answered: u32,
    pub total_unanswered: u32,
    pub passed: bool,
}

/// 历史答题记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptHistoryEntry {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub summary: SubmissionSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_entry_flattened() {
        let json = r#"{
            "_id": "r1",
            "submitted_at": "2024-10-21T10:00:00Z",
            "total_score": 4,
            "max_score": 8,
            "total_questions": 2,
            "total_answered": 1,
            "total_unanswered": 1,
            "passed": false
        }"#;
        let entry: AttemptHistoryEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.summary.total_answered, 1);
        assert!(!entry.summary.passed);
        assert!(entry.submitted_at.is_some());
    }
}
