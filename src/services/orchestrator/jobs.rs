//! Deep Job Registry
//!
//! Deep-mode POSTs return immediately; the pipeline runs when a client
//! connects to the session's stream endpoint. This registry holds the pending
//! work between those two requests. Claiming is one-shot: the first stream
//! connection takes the job, later connections find nothing.

use std::collections::HashMap;
use std::sync::Mutex;

/// A deep research run waiting for its stream connection.
#[derive(Debug, Clone)]
pub struct PendingDeepJob {
    pub query: String,
}

/// Process-wide registry of unclaimed deep jobs, keyed by session id.
#[derive(Default)]
pub struct DeepJobs {
    pending: Mutex<HashMap<String, PendingDeepJob>>,
}

impl DeepJobs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, session_id: String, query: String) {
        self.pending
            .lock()
            .expect("job registry lock poisoned")
            .insert(session_id, PendingDeepJob { query });
    }

    /// Take the pending job for a session, if any.
    pub fn claim(&self, session_id: &str) -> Option<PendingDeepJob> {
        self.pending
            .lock()
            .expect("job registry lock poisoned")
            .remove(session_id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .expect("job registry lock poisoned")
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_is_one_shot() {
        let jobs = DeepJobs::new();
        jobs.register("abc".to_string(), "What is HTTP?".to_string());
        assert_eq!(jobs.pending_count(), 1);

        let job = jobs.claim("abc").unwrap();
        assert_eq!(job.query, "What is HTTP?");
        assert!(jobs.claim("abc").is_none());
        assert_eq!(jobs.pending_count(), 0);
    }

    #[test]
    fn test_claim_unknown_session() {
        let jobs = DeepJobs::new();
        assert!(jobs.claim("missing").is_none());
    }
}
