//! Activity records: interactions (the audit/activity trail) and event logs.

pub mod event_log;
pub mod interaction;

pub use event_log::EventLog;
pub use interaction::{Interaction, InteractionSubject, NewInteraction};
