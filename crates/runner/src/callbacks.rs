use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use sf_core::{AskedQuestions, AttemptId, ClarificationId};
use sf_driver::DriverCallbacks;
use sf_store::{NewClarification, Store};

/// Persists ask-user questions as Clarification rows and polls the store
/// for their answers, keyed the same way the driver formats answer lookups:
/// `"{auq_id}_{index}"`.
pub struct StoreDriverCallbacks {
    store: Arc<dyn Store>,
    attempt_id: AttemptId,
    raised: Mutex<Vec<(String, ClarificationId)>>,
}

impl StoreDriverCallbacks {
    pub fn new(store: Arc<dyn Store>, attempt_id: AttemptId) -> Self {
        Self {
            store,
            attempt_id,
            raised: Mutex::new(Vec::new()),
        }
    }

    /// The `(question_id, clarification_id)` pairs persisted so far, in
    /// raise order. Lets a caller resolve the id a `Clarification` row was
    /// stored under without guessing at `create_clarification`'s internals.
    pub fn raised_clarification_ids(&self) -> Vec<(String, ClarificationId)> {
        self.raised.lock().clone()
    }
}

#[async_trait]
impl DriverCallbacks for StoreDriverCallbacks {
    async fn on_questions_asked(
        &self,
        questions: Vec<AskedQuestions>,
    ) -> HashMap<String, Vec<ClarificationId>> {
        let mut result = HashMap::new();
        for asked in questions {
            let mut ids = Vec::new();
            for (i, question) in asked.questions.iter().enumerate() {
                let question_id = format!("{}_{i}", asked.id);
                let clarification = match self
                    .store
                    .create_clarification(NewClarification {
                        attempt_id: self.attempt_id,
                        question_id: question_id.clone(),
                        question_text: question.question.clone(),
                        question_context: question.header.clone(),
                        default_answer: None,
                        anchors: json!({
                            "options": question.options,
                            "multi_select": question.multi_select,
                        }),
                    })
                    .await
                {
                    Ok(c) => c,
                    Err(err) => {
                        tracing::error!(attempt_id = %self.attempt_id, %question_id, %err, "failed to persist clarification");
                        continue;
                    }
                };
                self.raised.lock().push((question_id, clarification.id));
                ids.push(clarification.id);
            }
            result.insert(asked.id, ids);
        }
        result
    }

    async fn poll_for_answers(&self) -> Option<HashMap<String, String>> {
        let raised = self.raised.lock().clone();
        if raised.is_empty() {
            return None;
        }

        let ids: Vec<ClarificationId> = raised.iter().map(|(_, id)| *id).collect();
        let clarifications = match self.store.get_clarifications(&ids).await {
            Ok(c) => c,
            Err(err) => {
                tracing::error!(attempt_id = %self.attempt_id, %err, "failed to poll clarifications");
                return None;
            }
        };

        if clarifications.len() != ids.len() || !clarifications.iter().all(|c| c.is_answered()) {
            return None;
        }

        let mut answers = HashMap::new();
        for (question_id, clarification_id) in &raised {
            if let Some(c) = clarifications.iter().find(|c| c.id == *clarification_id) {
                answers.insert(question_id.clone(), c.effective_answer().unwrap_or("").to_string());
            }
        }
        Some(answers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sf_core::{AskedQuestions, QuestionEntry};
    use sf_store::InMemoryStore;

    fn question(text: &str) -> QuestionEntry {
        QuestionEntry {
            question: text.to_string(),
            header: Some("header".to_string()),
            options: Vec::new(),
            multi_select: false,
        }
    }

    #[tokio::test]
    async fn poll_returns_none_until_every_raised_clarification_is_answered() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let attempt_id = AttemptId::new();
        let callbacks = StoreDriverCallbacks::new(store.clone(), attempt_id);

        let ids = callbacks
            .on_questions_asked(vec![AskedQuestions {
                id: "auq_0".to_string(),
                questions: vec![question("Which database?"), question("Which cache?")],
            }])
            .await;
        let clarification_ids = ids.get("auq_0").expect("tool id present").clone();
        assert_eq!(clarification_ids.len(), 2);

        assert!(callbacks.poll_for_answers().await.is_none());

        store
            .answer_clarification(clarification_ids[0], Some("PostgreSQL".to_string()), false, None)
            .await
            .expect("answer first");
        assert!(callbacks.poll_for_answers().await.is_none());

        store
            .answer_clarification(clarification_ids[1], Some("Redis".to_string()), false, None)
            .await
            .expect("answer second");

        let answers = callbacks.poll_for_answers().await.expect("all answered");
        assert_eq!(answers.get("auq_0_0"), Some(&"PostgreSQL".to_string()));
        assert_eq!(answers.get("auq_0_1"), Some(&"Redis".to_string()));
    }

    #[tokio::test]
    async fn poll_returns_none_before_any_question_is_raised() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let callbacks = StoreDriverCallbacks::new(store, AttemptId::new());
        assert!(callbacks.poll_for_answers().await.is_none());
    }
}
