pub mod attempt_cache;

pub use attempt_cache::{
    AttemptCache, FileAttemptCache, MemoryAttemptCache, ATTEMPT_ID_KEY, AUTH_TOKEN_KEY,
    TEST_STATE_KEY,
};
