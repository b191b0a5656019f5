//! User records and the UUID-or-login resolver.
//!
//! Users live in the external directory (`sdcperson` entries) and are
//! never created or mutated by the master. A user is an operator iff
//! their DN appears on the `cn=operators` group entry.

use crate::model::{operators_dn, user_dn, users_base, Caches};
use amon_common::error::MasterError;
use amon_storage::{Directory, Entry, SearchScope};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct User {
    pub uuid: Uuid,
    pub login: String,
    pub email: Option<String>,
    /// Member of the privileged operators group.
    pub operator: bool,
    /// Raw directory attributes; contact URNs resolve against these.
    pub attrs: HashMap<String, Vec<String>>,
}

impl User {
    fn from_entry(entry: &Entry, operator: bool) -> Result<User, MasterError> {
        let uuid = entry
            .first("uuid")
            .and_then(|v| Uuid::parse_str(v).ok())
            .ok_or_else(|| {
                tracing::error!(dn = %entry.dn, "user entry has no usable uuid");
                MasterError::internal("bad user entry in directory")
            })?;
        let login = entry
            .first("login")
            .ok_or_else(|| {
                tracing::error!(dn = %entry.dn, "user entry has no login");
                MasterError::internal("bad user entry in directory")
            })?
            .to_string();
        Ok(User {
            uuid,
            login,
            email: entry.first("email").map(str::to_string),
            operator,
            attrs: entry.attrs.clone(),
        })
    }

    /// Public profile shape for `GET /pub/{user}`.
    pub fn public_json(&self) -> Value {
        serde_json::json!({
            "uuid": self.uuid,
            "login": self.login,
            "email": self.email,
        })
    }
}

/// Outcome of one resolver lookup; all three states are cached so a
/// burst of lookups for a broken key cannot stampede the directory.
#[derive(Clone)]
pub enum UserLookup {
    Found(User),
    Missing,
    Failed(String),
}

/// Login syntax: a letter, then letters/digits/`_.@`, total length >= 2.
/// Anything else is rejected without a directory round-trip.
pub fn valid_login(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    let mut rest = 0usize;
    for c in chars {
        if !(c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '@') {
            return false;
        }
        rest += 1;
    }
    rest >= 1
}

pub struct UserResolver {
    dir: Arc<dyn Directory>,
    caches: Arc<Caches>,
    base_dn: String,
}

impl UserResolver {
    pub fn new(dir: Arc<dyn Directory>, caches: Arc<Caches>, base_dn: &str) -> Self {
        Self {
            dir,
            caches,
            base_dn: base_dn.to_string(),
        }
    }

    /// Resolve `key` (a UUID or a login) to a user.
    ///
    /// Returns `Ok(Some(user))`, `Ok(None)` for "no such user", and
    /// `Err(_)` for a lookup failure. A successful lookup is cached under
    /// both the UUID and the login; negative and failed lookups only
    /// under the supplied key.
    pub async fn resolve(&self, key: &str) -> Result<Option<User>, MasterError> {
        if let Some(outcome) = self.caches.user_get.get(key) {
            return match outcome {
                UserLookup::Found(user) => Ok(Some(user)),
                UserLookup::Missing => Ok(None),
                UserLookup::Failed(msg) => Err(MasterError::internal(msg)),
            };
        }

        let looked_up = match Uuid::parse_str(key) {
            Ok(uuid) => self.lookup_by_uuid(uuid).await,
            Err(_) if valid_login(key) => self.lookup_by_login(key).await,
            // Not a UUID and not plausible login syntax: no lookup.
            Err(_) => Ok(None),
        };

        match looked_up {
            Ok(Some(entry)) => {
                let operator = match self.is_operator(&entry.dn).await {
                    Ok(operator) => operator,
                    Err(e) => {
                        self.caches.user_get.set(key, UserLookup::Failed(e.to_string()));
                        return Err(e);
                    }
                };
                let user = User::from_entry(&entry, operator)?;
                self.caches
                    .user_get
                    .set(&user.uuid.to_string(), UserLookup::Found(user.clone()));
                self.caches
                    .user_get
                    .set(&user.login, UserLookup::Found(user.clone()));
                Ok(Some(user))
            }
            Ok(None) => {
                self.caches.user_get.set(key, UserLookup::Missing);
                Ok(None)
            }
            Err(e) => {
                let msg = e.to_string();
                tracing::error!(key = %key, error = %msg, "user lookup failed");
                self.caches.user_get.set(key, UserLookup::Failed(msg));
                Err(MasterError::internal("user lookup failed"))
            }
        }
    }

    async fn lookup_by_uuid(&self, uuid: Uuid) -> Result<Option<Entry>, amon_storage::StorageError> {
        self.dir.get(&user_dn(&self.base_dn, uuid)).await
    }

    async fn lookup_by_login(
        &self,
        login: &str,
    ) -> Result<Option<Entry>, amon_storage::StorageError> {
        let filter = format!("(&(objectclass=sdcperson)(login={login}))");
        let mut entries = self
            .dir
            .search(&users_base(&self.base_dn), SearchScope::One, &filter)
            .await?;
        Ok(entries.pop())
    }

    async fn is_operator(&self, member_dn: &str) -> Result<bool, MasterError> {
        match self.dir.get(&operators_dn(&self.base_dn)).await {
            Ok(Some(group)) => Ok(group.values("uniquemember").iter().any(|m| m == member_dn)),
            Ok(None) => Ok(false),
            Err(e) => {
                tracing::error!(error = %e, "operators group lookup failed");
                Err(MasterError::internal("operators group lookup failed"))
            }
        }
    }
}
