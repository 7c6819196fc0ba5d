pub mod countdown;

pub use countdown::{format_remaining, Countdown, TickOutcome};
