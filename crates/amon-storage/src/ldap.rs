//! LDAP backend for the [`Directory`] trait.
//!
//! One connection is opened and bound with administrative credentials at
//! startup; `ldap3` multiplexes concurrent operations over it. On an
//! authentication failure (e.g. the server dropped the bind) the client
//! re-binds once and retries the operation.

use crate::directory::{Directory, Entry, SearchScope};
use crate::error::{Result, StorageError};
use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapError, Mod, Scope, SearchEntry};
use std::collections::HashSet;
use tokio::sync::Mutex;

/// LDAP result code: invalid credentials / not bound.
const RC_INVALID_CREDENTIALS: u32 = 49;
/// LDAP result code: entry already exists.
const RC_ENTRY_EXISTS: u32 = 68;
/// LDAP result code: no such object.
const RC_NO_SUCH_OBJECT: u32 = 32;

pub struct LdapDirectory {
    handle: Mutex<Ldap>,
    url: String,
    bind_dn: String,
    bind_password: String,
}

impl LdapDirectory {
    /// Connect and bind with administrative credentials.
    pub async fn connect(url: &str, bind_dn: &str, bind_password: &str) -> Result<Self> {
        let ldap = Self::open(url, bind_dn, bind_password).await?;
        tracing::info!(url = %url, bind_dn = %bind_dn, "Directory bound");
        Ok(Self {
            handle: Mutex::new(ldap),
            url: url.to_string(),
            bind_dn: bind_dn.to_string(),
            bind_password: bind_password.to_string(),
        })
    }

    async fn open(url: &str, bind_dn: &str, bind_password: &str) -> Result<Ldap> {
        let (conn, mut ldap) = LdapConnAsync::new(url).await?;
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                tracing::warn!(error = %e, "directory connection error");
            }
        });
        ldap.simple_bind(bind_dn, bind_password).await?.success()?;
        Ok(ldap)
    }

    /// A clone of the shared handle; cheap, and operations on clones are
    /// multiplexed over the one underlying connection.
    async fn ldap(&self) -> Ldap {
        self.handle.lock().await.clone()
    }

    /// Replace the shared handle with a freshly bound connection.
    async fn rebind(&self) -> Result<()> {
        tracing::warn!(url = %self.url, "Directory bind lost, re-binding");
        let fresh = Self::open(&self.url, &self.bind_dn, &self.bind_password).await?;
        *self.handle.lock().await = fresh;
        Ok(())
    }

    fn is_auth_failure(err: &LdapError) -> bool {
        matches!(err, LdapError::LdapResult { result } if result.rc == RC_INVALID_CREDENTIALS)
    }

    async fn search_once(
        &self,
        base_dn: &str,
        scope: Scope,
        filter: &str,
    ) -> std::result::Result<Vec<Entry>, LdapError> {
        let mut ldap = self.ldap().await;
        let (entries, _res) = ldap
            .search(base_dn, scope, filter, vec!["*"])
            .await?
            .success()?;
        Ok(entries
            .into_iter()
            .map(|re| {
                let se = SearchEntry::construct(re);
                Entry {
                    dn: se.dn,
                    attrs: se.attrs,
                }
            })
            .collect())
    }

    async fn put_once(&self, entry: &Entry) -> std::result::Result<(), LdapError> {
        let mut ldap = self.ldap().await;
        let attrs: Vec<(String, HashSet<String>)> = entry
            .attrs
            .iter()
            .map(|(k, vs)| (k.clone(), vs.iter().cloned().collect()))
            .collect();

        match ldap.add(&entry.dn, attrs).await?.success() {
            Ok(_) => Ok(()),
            Err(LdapError::LdapResult { result }) if result.rc == RC_ENTRY_EXISTS => {
                // Replace attributes on the existing entry.
                let mods: Vec<Mod<String>> = entry
                    .attrs
                    .iter()
                    .map(|(k, vs)| Mod::Replace(k.clone(), vs.iter().cloned().collect()))
                    .collect();
                ldap.modify(&entry.dn, mods).await?.success()?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl Directory for LdapDirectory {
    async fn get(&self, dn: &str) -> Result<Option<Entry>> {
        match self.search_once(dn, Scope::Base, "(objectclass=*)").await {
            Ok(mut entries) => Ok(entries.pop()),
            Err(LdapError::LdapResult { result }) if result.rc == RC_NO_SUCH_OBJECT => Ok(None),
            Err(e) if Self::is_auth_failure(&e) => {
                self.rebind().await?;
                let mut entries = self.search_once(dn, Scope::Base, "(objectclass=*)").await?;
                Ok(entries.pop())
            }
            Err(e) => Err(StorageError::Ldap(e)),
        }
    }

    async fn search(&self, base_dn: &str, scope: SearchScope, filter: &str) -> Result<Vec<Entry>> {
        let scope = match scope {
            SearchScope::Base => Scope::Base,
            SearchScope::One => Scope::OneLevel,
            SearchScope::Sub => Scope::Subtree,
        };
        match self.search_once(base_dn, scope, filter).await {
            Ok(entries) => Ok(entries),
            Err(LdapError::LdapResult { result }) if result.rc == RC_NO_SUCH_OBJECT => Ok(vec![]),
            Err(e) if Self::is_auth_failure(&e) => {
                self.rebind().await?;
                Ok(self.search_once(base_dn, scope, filter).await?)
            }
            Err(e) => Err(StorageError::Ldap(e)),
        }
    }

    async fn put(&self, entry: &Entry) -> Result<()> {
        match self.put_once(entry).await {
            Ok(()) => Ok(()),
            Err(e) if Self::is_auth_failure(&e) => {
                self.rebind().await?;
                Ok(self.put_once(entry).await?)
            }
            Err(e) => Err(StorageError::Ldap(e)),
        }
    }

    async fn del(&self, dn: &str) -> Result<()> {
        let mut ldap = self.ldap().await;
        match ldap.delete(dn).await.and_then(|r| r.success()) {
            Ok(_) => Ok(()),
            // Deleting an absent entry is not an error for callers.
            Err(LdapError::LdapResult { result }) if result.rc == RC_NO_SUCH_OBJECT => Ok(()),
            Err(e) if Self::is_auth_failure(&e) => {
                self.rebind().await?;
                let mut ldap = self.ldap().await;
                ldap.delete(dn).await?.success()?;
                Ok(())
            }
            Err(e) => Err(StorageError::Ldap(e)),
        }
    }
}
