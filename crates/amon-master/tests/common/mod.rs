#![allow(dead_code)]

use amon_master::app;
use amon_master::collaborators::{MemServerInventory, MemVmMetadata, Vm};
use amon_master::config::{CollaboratorConfig, DirectoryConfig, MasterConfig};
use amon_master::model::{operators_dn, user_dn};
use amon_master::state::AppState;
use amon_notify::plugin::PluginRegistry;
use amon_notify::NotificationPlugin;
use amon_storage::{Directory, Entry, MemDirectory, MemKv};
use anyhow::Result;
use async_trait::async_trait;
use axum::body::{to_bytes, Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt;
use uuid::Uuid;

/// A notification plugin that records instead of delivering.
pub struct RecorderPlugin {
    media: Vec<String>,
    pub sent: Mutex<Vec<SentNotification>>,
}

#[derive(Debug, Clone)]
pub struct SentNotification {
    pub probe: String,
    pub address: String,
    pub message: String,
}

impl RecorderPlugin {
    pub fn new(media: &[&str]) -> Self {
        Self {
            media: media.iter().map(|m| m.to_string()).collect(),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl NotificationPlugin for RecorderPlugin {
    fn name(&self) -> &str {
        "recorder"
    }

    fn accepts_medium(&self, attr_name: &str) -> bool {
        self.media.iter().any(|m| m == attr_name)
    }

    async fn notify(&self, probe_name: &str, address: &str, message: &str) -> Result<()> {
        self.sent.lock().unwrap().push(SentNotification {
            probe: probe_name.to_string(),
            address: address.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}

pub struct TestContext {
    pub app: axum::Router,
    pub state: AppState,
    pub dir: Arc<MemDirectory>,
    pub kv: Arc<MemKv>,
    pub vm_metadata: Arc<MemVmMetadata>,
    pub inventory: Arc<MemServerInventory>,
    pub recorder: Arc<RecorderPlugin>,
    pub admin: Uuid,
}

fn test_config(admin: Uuid) -> MasterConfig {
    MasterConfig {
        http_port: 8080,
        admin_uuid: Some(admin),
        directory: DirectoryConfig {
            url: "mem://".to_string(),
            bind_dn: String::new(),
            bind_password: String::new(),
            base_dn: "o=smartdc".to_string(),
        },
        kv: Default::default(),
        cache: Default::default(),
        vm_metadata: CollaboratorConfig {
            url: "mem://".to_string(),
        },
        server_inventory: CollaboratorConfig {
            url: "mem://".to_string(),
        },
        plugins: vec![],
    }
}

pub fn build_test_context() -> TestContext {
    let dir = Arc::new(MemDirectory::new());
    let kv = Arc::new(MemKv::new());
    let vm_metadata = Arc::new(MemVmMetadata::new());
    let inventory = Arc::new(MemServerInventory::new());
    let recorder = Arc::new(RecorderPlugin::new(&["email", "phone"]));

    let mut plugins = PluginRegistry::new();
    plugins.register(recorder.clone());

    let admin = Uuid::new_v4();
    let state = AppState::assemble(
        test_config(admin),
        dir.clone(),
        kv.clone(),
        vm_metadata.clone(),
        inventory.clone(),
        Arc::new(plugins),
    );
    let app = app::build_http_app(state.clone());

    TestContext {
        app,
        state,
        dir,
        kv,
        vm_metadata,
        inventory,
        recorder,
        admin,
    }
}

impl TestContext {
    /// Seed an `sdcperson` entry with email and phone attributes.
    pub async fn seed_user(&self, login: &str) -> Uuid {
        let uuid = Uuid::new_v4();
        let entry = Entry::new(user_dn("o=smartdc", uuid))
            .with_attr("objectclass", vec!["sdcperson".into()])
            .with_attr("uuid", vec![uuid.to_string()])
            .with_attr("login", vec![login.into()])
            .with_attr("email", vec![format!("{login}@example.com")])
            .with_attr("phone", vec!["+15550100".into()]);
        self.dir.put(&entry).await.unwrap();
        uuid
    }

    /// Seed a user without the `phone` attribute (for config alarms).
    pub async fn seed_user_email_only(&self, login: &str) -> Uuid {
        let uuid = Uuid::new_v4();
        let entry = Entry::new(user_dn("o=smartdc", uuid))
            .with_attr("objectclass", vec!["sdcperson".into()])
            .with_attr("uuid", vec![uuid.to_string()])
            .with_attr("login", vec![login.into()])
            .with_attr("email", vec![format!("{login}@example.com")]);
        self.dir.put(&entry).await.unwrap();
        uuid
    }

    /// Add the user to the privileged operators group.
    pub async fn make_operator(&self, user: Uuid) {
        let dn = operators_dn("o=smartdc");
        let mut members = match self.dir.get(&dn).await.unwrap() {
            Some(group) => group.values("uniquemember").to_vec(),
            None => vec![],
        };
        members.push(user_dn("o=smartdc", user));
        let entry = Entry::new(dn)
            .with_attr("objectclass", vec!["groupofuniquenames".into()])
            .with_attr("uniquemember", members);
        self.dir.put(&entry).await.unwrap();
    }

    /// Register a VM owned by `owner` and return it.
    pub fn seed_vm(&self, owner: Uuid) -> Vm {
        let vm = Vm {
            uuid: Uuid::new_v4(),
            owner_uuid: owner,
            server_uuid: Uuid::new_v4(),
        };
        self.vm_metadata.add_vm(vm.clone());
        vm
    }
}

pub async fn request_json(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let (status, _headers, bytes) = request_raw(app, method, uri, body).await;
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };
    (status, json)
}

pub async fn request_raw(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, HeaderMap, Bytes) {
    let mut builder = Request::builder().method(method).uri(uri);
    let req_body = match body {
        Some(v) => {
            builder = builder.header("Content-Type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let req = builder.body(req_body).expect("request should build");

    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    (status, headers, bytes)
}
