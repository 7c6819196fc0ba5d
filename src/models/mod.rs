pub mod question_state;
pub mod submission;

pub use question_state::QuestionState;
pub use submission::{AttemptHistoryEntry, SubmissionSummary};
pub use test::{Question, QuestionOption, Tag, TestDefinition};
