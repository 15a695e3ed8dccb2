//! Test helpers: build AppState and router for integration tests.
//!
//! Each app gets its own temp directory as local storage and an in-memory
//! photo index, so tests run in parallel without shared state.

pub mod auth;

use axum_test::TestServer;
use chronoframe_api::setup::{routes, storage};
use chronoframe_api::AppState;
use chronoframe_core::Config;
use chronoframe_db::InMemoryPhotoIndex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

pub const UPLOAD_PATH: &str = "/api/photos/upload";

/// Test application: server and owned resources.
pub struct TestApp {
    pub server: TestServer,
    pub temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub fn storage_root(&self) -> &Path {
        self.temp_dir.path()
    }
}

/// Setup a test app on local storage; `vars` override the environment defaults.
pub async fn setup_test_app(vars: &[(&str, &str)]) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

    let mut env: HashMap<String, String> = HashMap::new();
    env.insert("SESSION_SECRET".into(), auth::TEST_SESSION_SECRET.into());
    env.insert("STORAGE_PROVIDER".into(), "local".into());
    env.insert(
        "LOCAL_STORAGE_PATH".into(),
        temp_dir.path().to_string_lossy().to_string(),
    );
    for (name, value) in vars {
        env.insert(name.to_string(), value.to_string());
    }

    let config = Config::from_lookup(|name| env.get(name).cloned()).expect("Invalid test config");
    let storage = storage::setup_storage(&config)
        .await
        .expect("Failed to setup storage");
    let state = Arc::new(AppState::new(
        config,
        storage,
        Arc::new(InMemoryPhotoIndex::new()),
    ));

    let server = TestServer::new(routes::setup_routes(state)).expect("Failed to start test server");

    TestApp { server, temp_dir }
}
