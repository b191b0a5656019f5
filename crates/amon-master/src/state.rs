use crate::collaborators::{ServerInventory, VmMetadata};
use crate::config::MasterConfig;
use crate::maint::MaintenanceEngine;
use crate::model::contact::ContactResolver;
use crate::model::probe::ProbeModel;
use crate::model::probe_group::ProbeGroupModel;
use crate::model::user::UserResolver;
use crate::model::Caches;
use crate::router::EventRouter;
use amon_notify::plugin::PluginRegistry;
use amon_probe::KindRegistry;
use amon_storage::{Directory, Kv};
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<MasterConfig>,
    pub dir: Arc<dyn Directory>,
    pub kv: Arc<dyn Kv>,
    pub caches: Arc<Caches>,
    pub users: Arc<UserResolver>,
    pub probes: Arc<ProbeModel>,
    pub groups: Arc<ProbeGroupModel>,
    pub maintenance: Arc<MaintenanceEngine>,
    pub router: Arc<EventRouter>,
    pub plugins: Arc<PluginRegistry>,
    pub start_time: DateTime<Utc>,
}

impl AppState {
    /// Wire the full component graph over the given backends. Used by
    /// `main` with LDAP/Redis/HTTP backends and by tests with the
    /// in-memory ones.
    pub fn assemble(
        config: MasterConfig,
        dir: Arc<dyn Directory>,
        kv: Arc<dyn Kv>,
        vm_metadata: Arc<dyn VmMetadata>,
        inventory: Arc<dyn ServerInventory>,
        plugins: Arc<PluginRegistry>,
    ) -> AppState {
        let base_dn = config.directory.base_dn.clone();
        let caches = Arc::new(Caches::new(&config.cache));

        let users = Arc::new(UserResolver::new(dir.clone(), caches.clone(), &base_dn));
        let groups = Arc::new(ProbeGroupModel::new(dir.clone(), caches.clone(), &base_dn));
        let probes = Arc::new(ProbeModel::new(
            dir.clone(),
            caches.clone(),
            Arc::new(KindRegistry::default()),
            vm_metadata,
            inventory,
            groups.clone(),
            config.admin_uuid,
            &base_dn,
        ));
        let maintenance = Arc::new(MaintenanceEngine::new(kv.clone()));
        let router = Arc::new(EventRouter::new(
            users.clone(),
            probes.clone(),
            groups.clone(),
            ContactResolver::new(plugins.clone()),
            maintenance.clone(),
        ));
        maintenance.set_end_handler(router.clone());

        AppState {
            config: Arc::new(config),
            dir,
            kv,
            caches,
            users,
            probes,
            groups,
            maintenance,
            router,
            plugins,
            start_time: Utc::now(),
        }
    }
}
