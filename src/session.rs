use crate::mock::WidgetBackend;
use crate::store::{WidgetSnapshot, WidgetStore};
use crate::types::{Answer, Feedback, FeedbackPatch, MockApiResponse, WidgetConfig};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One widget instance: its store plus the backend its mock calls go to.
///
/// The store lock is never held across a backend wait, so concurrent
/// saves for different questions interleave freely.
pub struct WidgetSession {
    id: Uuid,
    store: RwLock<WidgetStore>,
    backend: Arc<dyn WidgetBackend>,
    last_seen: std::sync::Mutex<DateTime<Utc>>,
}

impl WidgetSession {
    pub fn new(config: WidgetConfig, backend: Arc<dyn WidgetBackend>) -> Self {
        Self {
            id: Uuid::new_v4(),
            store: RwLock::new(WidgetStore::new(config)),
            backend,
            last_seen: std::sync::Mutex::new(Utc::now()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn snapshot(&self) -> WidgetSnapshot {
        self.store.read().await.snapshot()
    }

    /// Run a synchronous mutation and return the resulting snapshot.
    pub async fn update<F>(&self, f: F) -> WidgetSnapshot
    where
        F: FnOnce(&mut WidgetStore),
    {
        let mut store = self.store.write().await;
        f(&mut store);
        store.snapshot()
    }

    pub async fn read<T>(&self, f: impl FnOnce(&WidgetStore) -> T) -> T {
        f(&*self.store.read().await)
    }

    /// Ask the backend for the next question set given the answers so far.
    /// Does not touch the store.
    pub async fn fetch_next_questions(&self) -> MockApiResponse {
        let answers = self.store.read().await.answers().to_vec();
        self.backend.next_questions(&answers).await
    }

    pub async fn save_answer(&self, answer: Answer) {
        self.backend.store_answer(&answer).await;
        self.store.write().await.add_answer(answer);
    }

    pub async fn save_feedback(&self, feedback: Feedback) {
        self.backend.store_feedback(&feedback).await;
        self.store
            .write()
            .await
            .set_feedback(FeedbackPatch::from(feedback));
    }

    fn touch(&self) {
        if let Ok(mut seen) = self.last_seen.lock() {
            *seen = Utc::now();
        }
    }

    fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        let seen = self.last_seen.lock().map(|s| *s).unwrap_or(now);
        (now - seen).to_std().unwrap_or(Duration::ZERO)
    }
}

pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

/// In-memory sessions keyed by id. Nothing survives a restart.
///
/// At most `max_sessions` live at once; creating one more drops the
/// session that was used least recently.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, Arc<WidgetSession>>>>,
    backend: Arc<dyn WidgetBackend>,
    ttl: Duration,
    max_sessions: usize,
}

impl SessionRegistry {
    /// `ttl` of zero keeps sessions until they are deleted.
    pub fn new(backend: Arc<dyn WidgetBackend>, ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            backend,
            ttl,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }

    /// Cap on live sessions; values below 1 are treated as 1.
    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions.max(1);
        self
    }

    pub async fn create(&self, config: WidgetConfig) -> Arc<WidgetSession> {
        self.evict_idle().await;
        let session = Arc::new(WidgetSession::new(config, self.backend.clone()));
        let mut sessions = self.sessions.write().await;
        let now = Utc::now();
        while sessions.len() >= self.max_sessions {
            let Some(oldest) = sessions
                .iter()
                .max_by_key(|(_, s)| s.idle_for(now))
                .map(|(id, _)| *id)
            else {
                break;
            };
            sessions.remove(&oldest);
            warn!(
                session_id = %oldest,
                max = self.max_sessions,
                "session limit reached, dropping least recently used"
            );
        }
        sessions.insert(session.id(), session.clone());
        info!(session_id = %session.id(), "widget session created");
        session
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<WidgetSession>> {
        self.evict_idle().await;
        let session = self.sessions.read().await.get(&id).cloned()?;
        session.touch();
        Some(session)
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            info!(session_id = %id, "widget session closed");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    async fn evict_idle(&self) {
        if self.ttl.is_zero() {
            return;
        }
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        sessions.retain(|id, session| {
            let keep = session.idle_for(now) < self.ttl;
            if !keep {
                debug!(session_id = %id, "evicting idle widget session");
            }
            keep
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Latency, MockBackend, MockDataset};
    use crate::types::Priority;

    fn backend() -> Arc<dyn WidgetBackend> {
        Arc::new(MockBackend::new(MockDataset::policy(), Latency::none()))
    }

    #[tokio::test]
    async fn refund_inquiry_with_critical_urgency() {
        let session = WidgetSession::new(WidgetConfig::default(), backend());
        session
            .save_answer(Answer::new("urgency", "critical", None))
            .await;
        session
            .save_answer(Answer::new("policy-inquiry", "refund-policy", None))
            .await;

        let response = session.fetch_next_questions().await;
        assert!(response.solution_ready);
        let solution = response.solution.expect("solution");
        assert_eq!(solution.priority, Priority::Critical);
        assert_eq!(solution.title, "Refund Policy Information");
    }

    #[tokio::test]
    async fn single_answer_is_not_enough() {
        let session = WidgetSession::new(WidgetConfig::default(), backend());
        session
            .save_answer(Answer::new("urgency", "critical", None))
            .await;
        let response = session.fetch_next_questions().await;
        assert!(!response.solution_ready);
        assert_eq!(response.solution, None);
        assert_eq!(response.questions.len(), 5);
        // fetching does not install questions by itself
        assert!(session.snapshot().await.state.current_questions.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_saves_for_different_questions_all_land() {
        let backend: Arc<dyn WidgetBackend> =
            Arc::new(MockBackend::new(MockDataset::policy(), Latency::default()));
        let session = Arc::new(WidgetSession::new(WidgetConfig::default(), backend));
        let mut handles = Vec::new();
        for id in ["service-type", "issue-category", "urgency"] {
            let session = session.clone();
            handles.push(tokio::spawn(async move {
                session.save_answer(Answer::new(id, "x", None)).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.state.answers.len(), 3);
        assert!(snapshot.can_show_solution);
    }

    #[tokio::test]
    async fn save_feedback_merges() {
        let session = WidgetSession::new(WidgetConfig::default(), backend());
        session
            .update(|store| {
                store.set_feedback(FeedbackPatch {
                    comment: Some("first".into()),
                    ..Default::default()
                })
            })
            .await;
        session
            .save_feedback(Feedback {
                helpful: Some(true),
                rating: Some(5),
                comment: None,
            })
            .await;
        let feedback = session.snapshot().await.state.feedback;
        assert_eq!(feedback.helpful, Some(true));
        assert_eq!(feedback.rating, Some(5));
        assert_eq!(feedback.comment.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn registry_creates_and_removes() {
        let registry = SessionRegistry::new(backend(), Duration::ZERO);
        let session = registry.create(WidgetConfig::default()).await;
        assert!(registry.get(session.id()).await.is_some());
        assert_eq!(registry.len().await, 1);
        assert!(registry.remove(session.id()).await);
        assert!(!registry.remove(session.id()).await);
        assert!(registry.get(session.id()).await.is_none());
    }

    #[tokio::test]
    async fn registry_drops_least_recently_used_at_capacity() {
        let registry = SessionRegistry::new(backend(), Duration::ZERO).with_max_sessions(2);
        let first = registry.create(WidgetConfig::default()).await;
        std::thread::sleep(Duration::from_millis(5));
        let second = registry.create(WidgetConfig::default()).await;
        std::thread::sleep(Duration::from_millis(5));
        assert!(registry.get(first.id()).await.is_some());
        std::thread::sleep(Duration::from_millis(5));

        let third = registry.create(WidgetConfig::default()).await;
        assert_eq!(registry.len().await, 2);
        assert!(registry.get(second.id()).await.is_none());
        assert!(registry.get(first.id()).await.is_some());
        assert!(registry.get(third.id()).await.is_some());
    }

    #[tokio::test]
    async fn registry_evicts_idle_sessions() {
        let registry = SessionRegistry::new(backend(), Duration::from_millis(20));
        let session = registry.create(WidgetConfig::default()).await;
        // wall clock based; chrono is not affected by tokio's paused clock
        std::thread::sleep(Duration::from_millis(40));
        assert!(registry.get(session.id()).await.is_none());
        assert_eq!(registry.len().await, 0);
    }
}
