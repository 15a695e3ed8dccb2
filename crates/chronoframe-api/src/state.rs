//! Application state shared by all handlers.

use crate::auth::SessionVerifier;
use chronoframe_core::Config;
use chronoframe_db::PhotoIndex;
use chronoframe_processing::UploadPipeline;
use chronoframe_storage::Storage;
use std::sync::Arc;

pub struct AppState {
    pub config: Arc<Config>,
    pub storage: Arc<dyn Storage>,
    pub pipeline: UploadPipeline,
    pub sessions: SessionVerifier,
}

impl AppState {
    pub fn new(config: Config, storage: Arc<dyn Storage>, index: Arc<dyn PhotoIndex>) -> Self {
        let pipeline = UploadPipeline::new(storage.clone(), index, &config.upload);
        let sessions = SessionVerifier::new(
            &config.base.session_secret,
            config.base.session_cookie_name.clone(),
        );

        Self {
            config: Arc::new(config),
            storage,
            pipeline,
            sessions,
        }
    }
}
