//! Business Logic Services
//!
//! The orchestrator and its collaborators: LLM adapter, search adapter, and
//! the result cache.

pub mod cache;
pub mod llm;
pub mod orchestrator;
pub mod search;
