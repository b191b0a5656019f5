//! Contact URNs.
//!
//! A contact is a string of the form `<medium>` or `<medium>:<sub-key>`,
//! e.g. `email`, `phone`, `sms:oncall`. The medium part names an
//! attribute on the owner's directory entry; the attribute value is the
//! deliverable address. Which notification plugin handles the medium is
//! decided by asking each registered plugin `accepts_medium(attr)` in
//! registration order — the first acceptor wins.

use crate::model::user::User;
use amon_common::error::MasterError;
use amon_notify::plugin::PluginRegistry;
use amon_notify::NotificationPlugin;
use std::sync::Arc;

/// Split a contact URN into `(attr_name, sub_key)`.
pub fn parse_urn(urn: &str) -> Result<(&str, Option<&str>), MasterError> {
    let (attr, sub) = match urn.split_once(':') {
        Some((attr, sub)) => (attr, Some(sub)),
        None => (urn, None),
    };
    let attr_ok = !attr.is_empty()
        && attr
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !attr_ok || sub == Some("") {
        return Err(MasterError::invalid(format!("invalid contact urn: \"{urn}\"")));
    }
    Ok((attr, sub))
}

/// A resolved contact: the plugin for the medium and, when the user
/// record carries the attribute, the address to deliver to. A `None`
/// address means the caller raises a config alarm to the probe owner.
pub struct ResolvedContact {
    pub urn: String,
    pub attr: String,
    pub plugin: Arc<dyn NotificationPlugin>,
    pub address: Option<String>,
}

pub struct ContactResolver {
    plugins: Arc<PluginRegistry>,
}

impl ContactResolver {
    pub fn new(plugins: Arc<PluginRegistry>) -> Self {
        Self { plugins }
    }

    pub fn resolve(&self, user: &User, urn: &str) -> Result<ResolvedContact, MasterError> {
        let (attr, sub) = parse_urn(urn)?;
        let plugin = self.plugins.plugin_for_medium(attr).ok_or_else(|| {
            MasterError::invalid(format!(
                "no notification plugin accepts medium \"{attr}\""
            ))
        })?;

        let address = pick_address(user.attrs.get(attr).map(Vec::as_slice), sub);
        Ok(ResolvedContact {
            urn: urn.to_string(),
            attr: attr.to_string(),
            plugin,
            address,
        })
    }
}

/// Select the address among an attribute's values. With a sub-key, a
/// `sub=value` entry wins; otherwise (and as fallback) the first value.
fn pick_address(values: Option<&[String]>, sub: Option<&str>) -> Option<String> {
    let values = values?;
    if let Some(sub) = sub {
        let prefix = format!("{sub}=");
        if let Some(tagged) = values.iter().find_map(|v| v.strip_prefix(&prefix)) {
            return Some(tagged.to_string());
        }
    }
    values.first().cloned()
}
