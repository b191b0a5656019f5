//! The event router: probe events in, notifications out.
//!
//! Each event resolves to its probe, the probe's group (if any), and the
//! owner's contacts. An active maintenance window covering the event
//! suppresses it entirely. Otherwise every contact URN on the probe and
//! its group is resolved and handed to the accepting notification
//! plugin. Plugin failures are logged and absorbed; only a failure to
//! resolve the probe or its group fails the event.

use crate::maint::{MaintenanceEndHandler, MaintenanceEngine};
use crate::model::contact::ContactResolver;
use crate::model::probe::{Probe, ProbeModel};
use crate::model::probe_group::ProbeGroupModel;
use crate::model::user::{User, UserResolver};
use amon_common::error::MasterError;
use amon_common::types::Event;
use std::sync::Arc;
use uuid::Uuid;

pub struct EventRouter {
    users: Arc<UserResolver>,
    probes: Arc<ProbeModel>,
    groups: Arc<ProbeGroupModel>,
    contacts: ContactResolver,
    maintenance: Arc<MaintenanceEngine>,
}

impl EventRouter {
    pub fn new(
        users: Arc<UserResolver>,
        probes: Arc<ProbeModel>,
        groups: Arc<ProbeGroupModel>,
        contacts: ContactResolver,
        maintenance: Arc<MaintenanceEngine>,
    ) -> Self {
        Self {
            users,
            probes,
            groups,
            contacts,
            maintenance,
        }
    }

    /// Process a batch. Events are independent: a failure is collected
    /// and the remaining events still run. The batch succeeds iff every
    /// event did.
    pub async fn route(&self, events: &[Event]) -> Result<(), MasterError> {
        let mut failures = Vec::new();
        for event in events {
            if let Err(e) = self.route_one(event).await {
                tracing::warn!(event = %event.uuid, error = %e, "event failed");
                failures.push(e);
            }
        }
        match MasterError::aggregate(failures) {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }

    async fn route_one(&self, event: &Event) -> Result<(), MasterError> {
        event.validate()?;
        let user_uuid = event.user();
        let probe_uuid = event.probe_uuid.unwrap_or_default();

        let user = self
            .users
            .resolve(&user_uuid.to_string())
            .await?
            .ok_or_else(|| {
                MasterError::ResourceNotFound(format!("no such user: {user_uuid}"))
            })?;

        let probe = self
            .probes
            .get(user_uuid, probe_uuid)
            .await?
            .ok_or_else(|| {
                MasterError::ResourceNotFound(format!("no such probe: {probe_uuid}"))
            })?;

        let group = match probe.group {
            Some(group_uuid) => self.groups.get(user_uuid, group_uuid).await?,
            None => None,
        };

        if let Some(window) = self
            .maintenance
            .event_in_maintenance(event, group.as_ref().map(|g| g.uuid))
            .await?
        {
            tracing::info!(
                event = %event.uuid,
                probe = %probe_uuid,
                user = %user_uuid,
                maintenance = window.id,
                "event suppressed by maintenance window"
            );
            return Ok(());
        }

        // Probe contacts plus group contacts, de-duplicated by URN.
        let mut urns: Vec<&String> = probe.contacts.iter().collect();
        if let Some(group) = &group {
            urns.extend(group.contacts.iter());
        }
        let mut seen = std::collections::HashSet::new();
        urns.retain(|urn| seen.insert(urn.as_str()));

        let message = render_message(&probe, event);
        let probe_label = probe.name.clone().unwrap_or_else(|| probe.uuid.to_string());

        for urn in urns {
            match self.contacts.resolve(&user, urn) {
                Ok(contact) => match contact.address {
                    Some(address) => {
                        if let Err(e) = contact
                            .plugin
                            .notify(&probe_label, &address, &message)
                            .await
                        {
                            tracing::error!(
                                plugin = contact.plugin.name(),
                                urn = %urn,
                                error = %e,
                                "notification failed"
                            );
                        }
                    }
                    None => self.config_alarm(&user, &probe, urn).await,
                },
                Err(e) => {
                    tracing::warn!(urn = %urn, user = %user_uuid, error = %e, "unresolvable contact urn");
                }
            }
        }

        Ok(())
    }

    /// A contact URN named an attribute the owner's record does not
    /// carry. Tell the owner their monitoring config is broken — over
    /// email, the one medium we can still hope resolves.
    async fn config_alarm(&self, owner: &User, probe: &Probe, urn: &str) {
        tracing::warn!(
            user = %owner.uuid,
            probe = %probe.uuid,
            urn = %urn,
            "config alarm: contact has no address on the user record"
        );

        let Ok(contact) = self.contacts.resolve(owner, "email") else {
            return;
        };
        let Some(address) = contact.address else {
            return;
        };
        let probe_label = probe.name.clone().unwrap_or_else(|| probe.uuid.to_string());
        let message = format!(
            "Probe \"{probe_label}\" lists contact \"{urn}\", but your account has no \
             \"{urn}\" address. Notifications for this contact are being dropped."
        );
        if let Err(e) = contact.plugin.notify(&probe_label, &address, &message).await {
            tracing::error!(user = %owner.uuid, error = %e, "config alarm delivery failed");
        }
    }
}

fn render_message(probe: &Probe, event: &Event) -> String {
    let status = event
        .status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let mut message = match &probe.name {
        Some(name) => format!("Probe \"{name}\" on machine {} is {status}.", probe.machine),
        None => format!(
            "Probe {} on machine {} is {status}.",
            probe.uuid, probe.machine
        ),
    };
    if let Some(value) = &event.value {
        message.push_str(&format!(" Value: {value}."));
    }
    if let Some(data) = &event.data {
        message.push_str(&format!(" Data: {data}."));
    }
    message
}

impl MaintenanceEndHandler for EventRouter {
    fn maintenance_ended(&self, user: Uuid, id: u64) {
        // TODO: re-notify alarms that fired into this window once alarm
        // state is tracked; today ending a window only stops suppression
        // of new events.
        tracing::info!(user = %user, maintenance = id, "maintenance window ended");
    }
}
