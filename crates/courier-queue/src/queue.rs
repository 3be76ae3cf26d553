//! In-memory dispatch queue state
//!
//! Everything the processing loop, the scheduler and producers share lives
//! in [`DispatchQueue`], which the controller keeps behind a single mutex.
//! Holding that one lock while checking or flipping `running` is what
//! keeps a second processing loop from ever starting.

use std::collections::VecDeque;

use crate::job::{Job, JobStatus, JobSummary};

#[derive(Debug, Default)]
pub struct DispatchQueue {
    jobs: VecDeque<Job>,
    running: bool,
    in_flight: Option<JobSummary>,
    awaiting_retry: usize,
}

impl DispatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn awaiting_retry(&self) -> usize {
        self.awaiting_retry
    }

    pub fn in_flight(&self) -> Option<&JobSummary> {
        self.in_flight.as_ref()
    }

    /// Append a queued job at the tail.
    pub fn push(&mut self, job: Job) {
        debug_assert_eq!(job.status(), JobStatus::Queued);
        self.jobs.push_back(job);
    }

    /// Pop the front job and mark its attempt as started.
    pub fn pop_for_attempt(&mut self) -> Option<Job> {
        debug_assert!(self.running, "pop outside of the processing loop");
        let mut job = self.jobs.pop_front()?;
        job.begin_attempt();
        self.in_flight = Some(job.summary());
        Some(job)
    }

    /// The attempt for the current in-flight job has finished.
    pub fn finish_attempt(&mut self) {
        self.in_flight = None;
    }

    /// Claim the right to run the processing loop.
    ///
    /// Returns `true` exactly when the caller must spawn a loop.
    pub fn try_start(&mut self) -> bool {
        if self.running {
            return false;
        }
        self.running = true;
        true
    }

    /// Release the loop if there is nothing left to pop.
    ///
    /// Returns `true` when the loop should exit. Called with the lock held so
    /// a concurrent push either lands before this check or finds `running`
    /// cleared and starts a new loop.
    pub fn try_stop(&mut self) -> bool {
        if !self.jobs.is_empty() {
            return false;
        }
        self.running = false;
        true
    }

    pub fn retry_armed(&mut self) {
        self.awaiting_retry += 1;
    }

    pub fn retry_fired(&mut self) {
        debug_assert!(self.awaiting_retry > 0);
        self.awaiting_retry = self.awaiting_retry.saturating_sub(1);
    }

    /// Drop every job that has not been popped yet.
    pub fn clear(&mut self) -> usize {
        let removed = self.jobs.len();
        self.jobs.clear();
        removed
    }

    /// Nothing queued, in flight, or waiting on a backoff timer.
    pub fn is_settled(&self) -> bool {
        !self.running && self.jobs.is_empty() && self.awaiting_retry == 0
    }

    pub fn summaries(&self) -> Vec<JobSummary> {
        self.jobs.iter().map(Job::summary).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fifo_ordering() {
        let mut queue = DispatchQueue::new();
        let first = Job::new(json!({ "n": 1 }), 1);
        let second = Job::new(json!({ "n": 2 }), 1);
        let (id1, id2) = (first.id(), second.id());

        queue.push(first);
        queue.push(second);
        assert!(queue.try_start());

        let job1 = queue.pop_for_attempt().unwrap();
        assert_eq!(job1.id(), id1);
        assert_eq!(job1.status(), JobStatus::InFlight);
        assert_eq!(job1.attempt(), 1);
        assert_eq!(queue.in_flight().map(|s| s.id), Some(id1));

        queue.finish_attempt();
        let job2 = queue.pop_for_attempt().unwrap();
        assert_eq!(job2.id(), id2);
        assert!(queue.pop_for_attempt().is_none());
    }

    #[test]
    fn test_start_is_exclusive() {
        let mut queue = DispatchQueue::new();
        assert!(queue.try_start());
        assert!(!queue.try_start());
        assert!(queue.is_running());
    }

    #[test]
    fn test_stop_refused_while_jobs_remain() {
        let mut queue = DispatchQueue::new();
        queue.try_start();
        queue.push(Job::new(json!({}), 1));

        assert!(!queue.try_stop());
        assert!(queue.is_running());

        queue.pop_for_attempt();
        assert!(queue.try_stop());
        assert!(!queue.is_running());
        assert!(queue.try_start());
    }

    #[test]
    fn test_clear_counts_only_queued() {
        let mut queue = DispatchQueue::new();
        queue.try_start();
        for _ in 0..3 {
            queue.push(Job::new(json!({}), 1));
        }
        let _in_flight = queue.pop_for_attempt();
        queue.retry_armed();

        assert_eq!(queue.clear(), 2);
        assert_eq!(queue.len(), 0);
        assert!(queue.in_flight().is_some());
        assert_eq!(queue.awaiting_retry(), 1);
    }

    #[test]
    fn test_settled() {
        let mut queue = DispatchQueue::new();
        assert!(queue.is_settled());

        queue.retry_armed();
        assert!(!queue.is_settled());
        queue.retry_fired();
        assert!(queue.is_settled());

        queue.try_start();
        assert!(!queue.is_settled());
        assert!(queue.try_stop());
        assert!(queue.is_settled());
    }
}
