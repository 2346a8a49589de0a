//! Data Models
//!
//! Sessions, phases, reports, citations, and streaming progress events.

pub mod events;
pub mod report;
pub mod session;

pub use events::{PhaseProgress, ProgressEvent};
pub use report::{Citation, HistoryPage, ResearchPayload, SessionDetail, TokenUsage};
pub use session::{PhaseRecord, ResearchMode, SessionRecord, SessionStatus};
