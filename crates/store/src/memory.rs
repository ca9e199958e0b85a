// SPDX-License-Identifier: MIT

//! In-memory fake `Store`, used for unit tests that exercise claim races,
//! backoff math, and stale recovery without a live Postgres instance.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use sf_core::{
    Artifact, ArtifactId, Attempt, AttemptId, Clarification, ClarificationId, Clock, Job, JobId,
    JobStatus, JobType, Signal, SignalId, SignalState, SystemClock,
};

use crate::error::{Result, StoreError};
use crate::store::{NewClarification, SignalUpsert, Store};

#[derive(Default)]
struct Inner {
    signals: HashMap<SignalId, Signal>,
    signals_by_key: HashMap<(String, i64), SignalId>,
    attempts: HashMap<AttemptId, Attempt>,
    attempt_numbers: HashMap<SignalId, i32>,
    clarifications: HashMap<ClarificationId, Clarification>,
    jobs: HashMap<JobId, Job>,
    artifacts: HashMap<AttemptId, Vec<Artifact>>,
}

pub struct InMemoryStore<C: Clock = SystemClock> {
    clock: C,
    inner: Mutex<Inner>,
}

impl InMemoryStore<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for InMemoryStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> InMemoryStore<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    #[cfg(test)]
    fn get_job_for_test(&self, id: JobId) -> Job {
        self.inner.lock().jobs.get(&id).cloned().expect("job exists")
    }
}

#[async_trait]
impl<C: Clock> Store for InMemoryStore<C> {
    async fn enqueue(
        &self,
        job_type: JobType,
        payload: Value,
        priority: i32,
        max_retries: i32,
        scheduled_for: Option<DateTime<Utc>>,
        attempt_id: Option<AttemptId>,
    ) -> Result<Job> {
        let now = self.now();
        let job = Job::new(
            JobId::new(),
            job_type,
            payload,
            priority,
            max_retries,
            scheduled_for.unwrap_or(now),
            attempt_id,
            now,
        );
        self.inner.lock().jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn claim(&self, types: &[JobType], worker_id: &str) -> Result<Option<Job>> {
        let now = self.now();
        let mut inner = self.inner.lock();
        let best_id = inner
            .jobs
            .values()
            .filter(|j| {
                j.status == JobStatus::Pending
                    && j.scheduled_for <= now
                    && j.retry_count < j.max_retries
                    && (types.is_empty() || types.contains(&j.job_type))
            })
            .min_by(|a, b| {
                b.priority
                    .cmp(&a.priority)
                    .then(a.scheduled_for.cmp(&b.scheduled_for))
            })
            .map(|j| j.id);

        let Some(id) = best_id else {
            return Ok(None);
        };
        let job = inner.jobs.get_mut(&id).ok_or_else(|| {
            StoreError::NotFound(format!("job {id} vanished under lock"))
        })?;
        job.status = JobStatus::Claimed;
        job.worker_id = Some(worker_id.to_string());
        job.claimed_at = Some(now);
        job.heartbeat_at = Some(now);
        job.updated_at = now;
        Ok(Some(job.clone()))
    }

    async fn start(&self, job_id: JobId) -> Result<bool> {
        let now = self.now();
        let mut inner = self.inner.lock();
        let Some(job) = inner.jobs.get_mut(&job_id) else {
            return Ok(false);
        };
        if job.status != JobStatus::Claimed {
            return Ok(false);
        }
        job.status = JobStatus::Running;
        job.heartbeat_at = Some(now);
        job.updated_at = now;
        Ok(true)
    }

    async fn complete(&self, job_id: JobId, result: Option<Value>) -> Result<bool> {
        let now = self.now();
        let mut inner = self.inner.lock();
        let Some(job) = inner.jobs.get_mut(&job_id) else {
            return Ok(false);
        };
        if !matches!(job.status, JobStatus::Claimed | JobStatus::Running) {
            return Ok(false);
        }
        job.status = JobStatus::Completed;
        job.completed_at = Some(now);
        job.result = result;
        job.updated_at = now;
        Ok(true)
    }

    async fn fail(&self, job_id: JobId, error: &str, retry_delay_seconds: i64) -> Result<bool> {
        let now = self.now();
        let mut inner = self.inner.lock();
        let Some(job) = inner.jobs.get_mut(&job_id) else {
            return Ok(false);
        };
        if !matches!(job.status, JobStatus::Claimed | JobStatus::Running) {
            return Ok(false);
        }
        let old_retry_count = job.retry_count;
        job.retry_count += 1;
        job.error = Some(error.to_string());
        job.updated_at = now;
        if job.retry_count < job.max_retries {
            let shift = (old_retry_count.max(0) as u32).min(62);
            let backoff = retry_delay_seconds.saturating_mul(1i64 << shift);
            job.status = JobStatus::Pending;
            job.scheduled_for = now + chrono::Duration::seconds(backoff);
            job.worker_id = None;
            job.claimed_at = None;
            job.heartbeat_at = None;
        } else {
            job.status = JobStatus::Dead;
            job.completed_at = Some(now);
        }
        Ok(true)
    }

    async fn heartbeat(&self, job_id: JobId) -> Result<bool> {
        let now = self.now();
        let mut inner = self.inner.lock();
        let Some(job) = inner.jobs.get_mut(&job_id) else {
            return Ok(false);
        };
        if !matches!(job.status, JobStatus::Claimed | JobStatus::Running) {
            return Ok(false);
        }
        job.heartbeat_at = Some(now);
        job.updated_at = now;
        Ok(true)
    }

    async fn recover_stale(&self, threshold_seconds: i64) -> Result<u64> {
        let now = self.now();
        let threshold = now - chrono::Duration::seconds(threshold_seconds);
        let mut inner = self.inner.lock();
        let mut recovered = 0u64;
        for job in inner.jobs.values_mut() {
            if !matches!(job.status, JobStatus::Claimed | JobStatus::Running) {
                continue;
            }
            let stale = job.heartbeat_at.map(|hb| hb < threshold).unwrap_or(false);
            if !stale || job.retry_count >= job.max_retries {
                continue;
            }
            job.status = JobStatus::Pending;
            job.error = Some("Recovered from stale worker".to_string());
            job.retry_count += 1;
            job.worker_id = None;
            job.claimed_at = None;
            job.heartbeat_at = None;
            job.updated_at = now;
            recovered += 1;
        }
        Ok(recovered)
    }

    async fn upsert_signal(&self, fields: SignalUpsert) -> Result<Signal> {
        let now = self.now();
        let mut inner = self.inner.lock();
        let key = (fields.repo.clone(), fields.issue_number);
        if let Some(id) = inner.signals_by_key.get(&key).copied() {
            let signal = inner
                .signals
                .get_mut(&id)
                .ok_or_else(|| StoreError::NotFound(format!("signal {id}")))?;
            signal.source = fields.source;
            signal.external_id = fields.external_id;
            signal.title = fields.title;
            signal.body = fields.body;
            signal.metadata = fields.metadata;
            signal.project_fields = fields.project_fields;
            signal.priority = fields.priority;
            signal.updated_at = now;
            return Ok(signal.clone());
        }
        let signal = Signal {
            id: SignalId::new(),
            source: fields.source,
            repo: fields.repo,
            issue_number: fields.issue_number,
            external_id: fields.external_id,
            title: fields.title,
            body: fields.body,
            metadata: fields.metadata,
            project_fields: fields.project_fields,
            priority: fields.priority,
            state: SignalState::Pending,
            created_at: now,
            updated_at: now,
        };
        inner.signals_by_key.insert(key, signal.id);
        inner.signals.insert(signal.id, signal.clone());
        Ok(signal)
    }

    async fn get_signal(&self, id: SignalId) -> Result<Option<Signal>> {
        Ok(self.inner.lock().signals.get(&id).cloned())
    }

    async fn set_signal_state(&self, id: SignalId, state: SignalState) -> Result<()> {
        let now = self.now();
        let mut inner = self.inner.lock();
        let signal = inner
            .signals
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("signal {id}")))?;
        signal.state = state;
        signal.updated_at = now;
        Ok(())
    }

    async fn create_attempt(&self, signal_id: SignalId) -> Result<Attempt> {
        let now = self.now();
        let mut inner = self.inner.lock();
        let next = inner
            .attempt_numbers
            .entry(signal_id)
            .and_modify(|n| *n += 1)
            .or_insert(1);
        let attempt = Attempt::new(AttemptId::new(), signal_id, *next, now);
        inner.attempts.insert(attempt.id, attempt.clone());
        Ok(attempt)
    }

    async fn get_attempt(&self, id: AttemptId) -> Result<Option<Attempt>> {
        Ok(self.inner.lock().attempts.get(&id).cloned())
    }

    async fn update_attempt(&self, attempt: &Attempt) -> Result<()> {
        self.inner.lock().attempts.insert(attempt.id, attempt.clone());
        Ok(())
    }

    async fn create_clarification(&self, new: NewClarification) -> Result<Clarification> {
        let now = self.now();
        let clarification = Clarification {
            id: ClarificationId::new(),
            attempt_id: new.attempt_id,
            question_id: new.question_id,
            question_text: new.question_text,
            question_context: new.question_context,
            default_answer: new.default_answer,
            accepted_default: false,
            answer_text: None,
            answered_at: None,
            answered_by: None,
            anchors: new.anchors,
            created_at: now,
            updated_at: now,
        };
        self.inner
            .lock()
            .clarifications
            .insert(clarification.id, clarification.clone());
        Ok(clarification)
    }

    async fn get_clarifications(&self, ids: &[ClarificationId]) -> Result<Vec<Clarification>> {
        let inner = self.inner.lock();
        Ok(ids
            .iter()
            .filter_map(|id| inner.clarifications.get(id).cloned())
            .collect())
    }

    async fn answer_clarification(
        &self,
        id: ClarificationId,
        answer_text: Option<String>,
        accepted_default: bool,
        answered_by: Option<String>,
    ) -> Result<bool> {
        let now = self.now();
        let mut inner = self.inner.lock();
        let Some(c) = inner.clarifications.get_mut(&id) else {
            return Ok(false);
        };
        c.answer_text = answer_text;
        c.accepted_default = accepted_default;
        c.answered_by = answered_by;
        c.answered_at = Some(now);
        c.updated_at = now;
        Ok(true)
    }

    async fn append_log(
        &self,
        attempt_id: AttemptId,
        text: String,
        is_final: bool,
    ) -> Result<Artifact> {
        let now = self.now();
        let mut inner = self.inner.lock();
        let entries = inner.artifacts.entry(attempt_id).or_default();
        let next_seq = entries
            .iter()
            .filter(|a| a.artifact_type == sf_core::ArtifactType::Log)
            .filter_map(|a| a.sequence_num)
            .max()
            .map(|n| n + 1)
            .unwrap_or(0);
        let artifact = Artifact::log_entry(ArtifactId::new(), attempt_id, next_seq, text, is_final, now);
        entries.push(artifact.clone());
        Ok(artifact)
    }

    async fn append_artifact(&self, artifact: Artifact) -> Result<()> {
        self.inner
            .lock()
            .artifacts
            .entry(artifact.attempt_id)
            .or_default()
            .push(artifact);
        Ok(())
    }

    async fn list_artifacts(
        &self,
        attempt_id: AttemptId,
        after_seq: Option<i64>,
    ) -> Result<Vec<Artifact>> {
        let inner = self.inner.lock();
        let mut entries: Vec<Artifact> = inner
            .artifacts
            .get(&attempt_id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|a| match (after_seq, a.sequence_num) {
                (Some(after), Some(seq)) => seq > after,
                _ => true,
            })
            .collect();
        entries.sort_by_key(|a| a.sequence_num.unwrap_or(i64::MAX));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sf_core::FakeClock;
    use std::sync::Arc;

    #[tokio::test]
    async fn claim_race_exactly_one_winner() {
        let store = Arc::new(InMemoryStore::new());
        let job = store
            .enqueue(JobType::RunAttempt, Value::Null, 5, 3, None, None)
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.claim(&[], &format!("worker-{i}")).await.unwrap()
            }));
        }
        let mut winners = 0;
        let mut winner_id = None;
        for h in handles {
            if let Some(claimed) = h.await.unwrap() {
                winners += 1;
                winner_id = Some(claimed.worker_id.clone());
            }
        }
        assert_eq!(winners, 1);
        let stored = store.get_job_for_test(job.id);
        assert_eq!(stored.status, JobStatus::Claimed);
        assert_eq!(stored.worker_id, winner_id.flatten());
    }

    #[tokio::test]
    async fn backoff_math_matches_spec_scenario() {
        let clock = FakeClock::new(Utc::now());
        let store = InMemoryStore::with_clock(clock.clone());
        let job = store
            .enqueue(JobType::RunAttempt, Value::Null, 0, 3, None, None)
            .await
            .unwrap();
        let t0 = clock.now();

        store.claim(&[], "w1").await.unwrap();
        store.fail(job.id, "boom", 10).await.unwrap();
        let after_first = store.get_job_for_test(job.id);
        assert_eq!(after_first.status, JobStatus::Pending);
        assert_eq!(after_first.retry_count, 1);
        assert_eq!(after_first.scheduled_for, t0 + chrono::Duration::seconds(10));

        clock.set(after_first.scheduled_for);
        store.claim(&[], "w1").await.unwrap();
        store.fail(job.id, "boom", 10).await.unwrap();
        let after_second = store.get_job_for_test(job.id);
        assert_eq!(after_second.retry_count, 2);
        assert_eq!(
            after_second.scheduled_for,
            after_first.scheduled_for + chrono::Duration::seconds(20)
        );

        clock.set(after_second.scheduled_for);
        store.claim(&[], "w1").await.unwrap();
        store.fail(job.id, "boom", 10).await.unwrap();
        let after_third = store.get_job_for_test(job.id);
        assert_eq!(after_third.status, JobStatus::Dead);
        assert_eq!(after_third.retry_count, 3);
        assert!(after_third.completed_at.is_some());
    }

    #[tokio::test]
    async fn stale_recovery_is_idempotent() {
        let clock = FakeClock::new(Utc::now());
        let store = InMemoryStore::with_clock(clock.clone());
        let job = store
            .enqueue(JobType::RunAttempt, Value::Null, 0, 3, None, None)
            .await
            .unwrap();
        store.claim(&[], "w1").await.unwrap();
        clock.advance(chrono::Duration::seconds(301));

        let recovered = store.recover_stale(300).await.unwrap();
        assert_eq!(recovered, 1);
        let after = store.get_job_for_test(job.id);
        assert_eq!(after.status, JobStatus::Pending);
        assert_eq!(after.retry_count, 1);
        assert_eq!(after.error.as_deref(), Some("Recovered from stale worker"));

        let recovered_again = store.recover_stale(300).await.unwrap();
        assert_eq!(recovered_again, 0);
    }
}
