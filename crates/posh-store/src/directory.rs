//! Role directory: maps externally-verified identity subjects to local
//! profiles and roles. Token verification itself lives with the identity
//! provider at the HTTP layer; this is only the role side.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use posh_schemas::Role;

use crate::error::StoreError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub subject: String,
    pub email: Option<String>,
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

pub struct Directory {
    users: RwLock<HashMap<String, UserProfile>>,
}

impl Directory {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
        }
    }

    /// Upsert on login sync: first sight creates a customer profile, a
    /// changed display name is updated in place, the role is never touched
    /// here.
    pub async fn sync(
        &self,
        subject: &str,
        name: &str,
        email: Option<&str>,
    ) -> UserProfile {
        let mut guard = self.users.write().await;
        match guard.get_mut(subject) {
            Some(profile) => {
                if !name.is_empty() && profile.name != name {
                    profile.name = name.to_string();
                }
                profile.clone()
            }
            None => {
                let profile = UserProfile {
                    subject: subject.to_string(),
                    email: email.map(str::to_string),
                    name: name.to_string(),
                    role: Role::Customer,
                    created_at: Utc::now(),
                };
                guard.insert(subject.to_string(), profile.clone());
                profile
            }
        }
    }

    pub async fn get(&self, subject: &str) -> Option<UserProfile> {
        self.users.read().await.get(subject).cloned()
    }

    /// Role lookup with the customer default for unknown subjects: an
    /// identity the provider vouches for but we have not synced yet is
    /// still a customer.
    pub async fn role(&self, subject: &str) -> Role {
        self.users
            .read()
            .await
            .get(subject)
            .map(|p| p.role)
            .unwrap_or(Role::Customer)
    }

    /// Promote an existing profile to admin. The caller gates this behind
    /// the bootstrap secret.
    pub async fn make_admin(&self, subject: &str) -> Result<UserProfile, StoreError> {
        let mut guard = self.users.write().await;
        let profile = guard.get_mut(subject).ok_or(StoreError::NotFound)?;
        profile.role = Role::Admin;
        Ok(profile.clone())
    }
}

impl Default for Directory {
    fn default() -> Self {
        Self::new()
    }
}
