pub mod api;
pub mod captioner;
pub mod config;
pub mod db;
pub mod notifications;
pub mod workflow;

pub use db::DbPool;

use dashmap::DashMap;
use std::sync::Arc;

use crate::captioner::CaptionService;
use crate::config::Config;
use crate::db::UserStore;
use crate::notifications::VerificationMailer;
use crate::workflow::{CaptionSet, WorkflowEngine};

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub store: UserStore,
    pub mailer: Arc<dyn VerificationMailer>,
    pub workflow: WorkflowEngine,
    /// Per-user transient workflow state. Racing requests resolve
    /// last-write-wins; nothing here survives a restart.
    pub caption_sets: DashMap<String, CaptionSet>,
    /// Reusable client for outbound calls made directly by handlers.
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(
        config: Config,
        db: DbPool,
        captioner: Arc<dyn CaptionService>,
        mailer: Arc<dyn VerificationMailer>,
    ) -> Self {
        let store = UserStore::new(db.clone());
        Self {
            config,
            db,
            store,
            mailer,
            workflow: WorkflowEngine::new(captioner),
            caption_sets: DashMap::new(),
            http: reqwest::Client::new(),
        }
    }
}
