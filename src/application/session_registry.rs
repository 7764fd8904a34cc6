// Session registry - one dashboard session per visitor
use crate::application::dashboard_session::DashboardSession;
use crate::application::feature_repository::FeatureRepository;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct SessionRegistry {
    repository: Arc<dyn FeatureRepository>,
    sessions: Arc<RwLock<HashMap<Uuid, DashboardSession>>>,
}

impl SessionRegistry {
    pub fn new(repository: Arc<dyn FeatureRepository>) -> Self {
        Self {
            repository,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a session and start loading its feature list in the background.
    ///
    /// Sessions are never evicted: every visit to `/` adds one and costs one
    /// warehouse query, so memory grows with the number of page loads for the
    /// life of the process.
    pub fn mount(&self) -> (Uuid, DashboardSession) {
        let id = Uuid::new_v4();
        let session = DashboardSession::new(self.repository.clone());
        self.sessions.write().insert(id, session.clone());

        let loader = session.clone();
        tokio::spawn(async move {
            loader.load_features().await;
        });

        tracing::info!("Mounted dashboard session {} ({} active)", id, self.len());
        (id, session)
    }

    pub fn get(&self, id: &Uuid) -> Option<DashboardSession> {
        self.sessions.read().get(id).cloned()
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }
}
