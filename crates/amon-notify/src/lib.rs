//! Notification delivery framework with pluggable medium support.
//!
//! The master resolves a contact URN to a user attribute (say `email` or
//! `phone`) and asks each registered [`NotificationPlugin`] whether it
//! accepts that attribute as a deliverable medium; the first acceptor
//! wins and delivers the rendered message. Built-in plugins cover email
//! (SMTP), an HTTP SMS gateway, and webhooks.

pub mod channels;
pub mod plugin;

#[cfg(test)]
mod tests;

use anyhow::Result;
use async_trait::async_trait;

/// A notification medium.
///
/// Plugins are instantiated once at startup from configuration, live for
/// the process, and must be safe to call from any handler concurrently.
///
/// `accepts_medium` decides whether a user-record attribute name (e.g.
/// `email`, `phone`, `webhookurl`) names an address this plugin can
/// deliver to. Given a fixed registry, the attribute → plugin mapping is
/// deterministic because registration order is configuration order and
/// the first acceptor wins.
#[async_trait]
pub trait NotificationPlugin: Send + Sync {
    /// The configured instance name (e.g. `"email"`).
    fn name(&self) -> &str;

    fn accepts_medium(&self, attr_name: &str) -> bool;

    /// Deliver `message` for `probe_name` to `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery fails after retries (if applicable).
    /// Callers log and absorb these; a failed notification never fails
    /// the event that triggered it.
    async fn notify(&self, probe_name: &str, address: &str, message: &str) -> Result<()>;
}
