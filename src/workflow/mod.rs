pub mod attempt_state;
pub mod question_board;

pub use attempt_state::AttemptState;
pub use question_board::{BoardAction, QuestionBoard};
