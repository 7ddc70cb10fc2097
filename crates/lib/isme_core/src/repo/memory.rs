//! In-memory repositories.
//!
//! Row writes are atomic per row (each row sits behind one map shard lock).
//! Lookups copy index values out before touching the primary map so no
//! thread ever holds two shard guards in opposite order.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{AppRegistryRepository, IdentityRepository, RepoError, RepoResult, SessionRepository};
use crate::auth::password::hash_password;
use crate::ids::new_id;
use crate::models::app::{AppService, AppStatus, NewAppService};
use crate::models::auth::{
    NewSession, RotateSession, Session, SessionStatus, User, UserStatus,
};

/// In-memory user store keyed by id, with a unique email index.
#[derive(Debug, Default)]
pub struct MemoryIdentityRepository {
    users: DashMap<String, User>,
    by_email: DashMap<String, String>,
}

impl MemoryIdentityRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Change a user's status (suspension is managed outside the core).
    pub fn set_status(&self, id: &str, status: UserStatus) -> RepoResult<()> {
        let mut user = self
            .users
            .get_mut(id)
            .ok_or_else(|| RepoError::NotFound(format!("user {id}")))?;
        user.status = status;
        Ok(())
    }

    /// Claims the email and inserts the row while holding the index slot.
    fn insert_user(&self, name: &str, email: &str, password_hash: String) -> RepoResult<String> {
        match self.by_email.entry(email.to_string()) {
            Entry::Occupied(_) => Err(RepoError::Conflict(format!("email {email}"))),
            Entry::Vacant(slot) => {
                let id = new_id();
                self.users.insert(
                    id.clone(),
                    User {
                        id: id.clone(),
                        name: name.to_string(),
                        email: email.to_string(),
                        password_hash,
                        status: UserStatus::Active,
                        is_admin: false,
                        last_login_at: None,
                    },
                );
                slot.insert(id.clone());
                Ok(id)
            }
        }
    }

    fn id_for_email(&self, email: &str) -> Option<String> {
        self.by_email.get(email).map(|id| id.value().clone())
    }
}

#[async_trait]
impl IdentityRepository for MemoryIdentityRepository {
    async fn create(&self, name: &str, email: &str) -> RepoResult<String> {
        self.insert_user(name, email, String::new())
    }

    async fn create_with_password(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> RepoResult<String> {
        let hash = hash_password(password)?;
        self.insert_user(name, email, hash)
    }

    async fn get_by_id(&self, id: &str) -> RepoResult<Option<User>> {
        Ok(self.users.get(id).map(|u| u.value().clone()))
    }

    async fn get_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let Some(id) = self.id_for_email(email) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    async fn set_password(&self, id: &str, password: &str) -> RepoResult<()> {
        let hash = hash_password(password)?;
        let mut user = self
            .users
            .get_mut(id)
            .ok_or_else(|| RepoError::NotFound(format!("user {id}")))?;
        user.password_hash = hash;
        Ok(())
    }

    async fn update_last_login(&self, id: &str) -> RepoResult<()> {
        let mut user = self
            .users
            .get_mut(id)
            .ok_or_else(|| RepoError::NotFound(format!("user {id}")))?;
        user.last_login_at = Some(Utc::now());
        Ok(())
    }

    async fn is_admin(&self, id: &str) -> RepoResult<bool> {
        Ok(self.users.get(id).is_some_and(|u| u.is_admin))
    }

    async fn promote_admin(&self, id: &str) -> RepoResult<()> {
        let mut user = self
            .users
            .get_mut(id)
            .ok_or_else(|| RepoError::NotFound(format!("user {id}")))?;
        user.is_admin = true;
        Ok(())
    }
}

/// In-memory session store keyed by session id.
#[derive(Debug, Default)]
pub struct MemorySessionRepository {
    sessions: DashMap<String, Session>,
}

impl MemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn find_by(&self, pred: impl Fn(&Session) -> bool) -> Option<Session> {
        self.sessions
            .iter()
            .find(|s| pred(s.value()))
            .map(|s| s.value().clone())
    }
}

#[async_trait]
impl SessionRepository for MemorySessionRepository {
    async fn create(&self, new: NewSession) -> RepoResult<Session> {
        let now = Utc::now();
        let session = Session {
            id: new_id(),
            user_id: new.user_id,
            email: new.email,
            token_id: new.token_id,
            refresh_token_hash: new.refresh_token_hash,
            expires_at: new.expires_at,
            last_login_at: now,
            status: SessionStatus::Active,
            client_ip: new.client_ip,
            user_agent: new.user_agent,
            created_at: now,
        };
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn rotate(
        &self,
        rotation: RotateSession,
        previous_refresh_token_hash: &str,
    ) -> RepoResult<bool> {
        let Some(mut session) = self.sessions.get_mut(&rotation.session_id) else {
            return Err(RepoError::NotFound(format!(
                "session {}",
                rotation.session_id
            )));
        };
        if !session.is_active() || session.refresh_token_hash != previous_refresh_token_hash {
            return Ok(false);
        }
        session.token_id = rotation.token_id;
        session.refresh_token_hash = rotation.refresh_token_hash;
        session.expires_at = rotation.expires_at;
        session.client_ip = rotation.client_ip;
        session.user_agent = rotation.user_agent;
        session.last_login_at = Utc::now();
        Ok(true)
    }

    async fn inactivate_all_for_user(&self, user_id: &str) -> RepoResult<()> {
        for mut session in self.sessions.iter_mut() {
            if session.user_id == user_id {
                session.status = SessionStatus::Inactive;
            }
        }
        Ok(())
    }

    async fn inactivate_by_token_id(&self, token_id: &str) -> RepoResult<()> {
        for mut session in self.sessions.iter_mut() {
            if session.token_id == token_id {
                session.status = SessionStatus::Inactive;
            }
        }
        Ok(())
    }

    async fn find_by_refresh_token_hash(&self, hash: &str) -> RepoResult<Option<Session>> {
        Ok(self.find_by(|s| s.refresh_token_hash == hash))
    }

    async fn find_by_token_id(&self, token_id: &str) -> RepoResult<Option<Session>> {
        Ok(self.find_by(|s| s.token_id == token_id))
    }

    async fn list_active_by_user(&self, user_id: &str) -> RepoResult<Vec<Session>> {
        let mut sessions: Vec<Session> = self
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id && s.is_active())
            .map(|s| s.value().clone())
            .collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(sessions)
    }
}

/// In-memory application registry keyed by id, with a unique code index.
#[derive(Debug, Default)]
pub struct MemoryAppRegistryRepository {
    apps: DashMap<String, AppService>,
    by_code: DashMap<String, String>,
}

impl MemoryAppRegistryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, id: &str, status: AppStatus) -> RepoResult<()> {
        let mut app = self
            .apps
            .get_mut(id)
            .ok_or_else(|| RepoError::NotFound(format!("app service {id}")))?;
        app.status = status;
        Ok(())
    }
}

#[async_trait]
impl AppRegistryRepository for MemoryAppRegistryRepository {
    async fn create(&self, new: NewAppService) -> RepoResult<String> {
        match self.by_code.entry(new.code.clone()) {
            Entry::Occupied(_) => Err(RepoError::Conflict(format!("app_code {}", new.code))),
            Entry::Vacant(slot) => {
                let id = new_id();
                self.apps.insert(
                    id.clone(),
                    AppService {
                        id: id.clone(),
                        code: new.code,
                        name: new.name,
                        secret_ciphertext: new.secret_ciphertext,
                        redirect_url: new.redirect_url,
                        ctx_info: new.ctx_info,
                        status: AppStatus::Active,
                    },
                );
                slot.insert(id.clone());
                Ok(id)
            }
        }
    }

    async fn get_by_code(&self, code: &str) -> RepoResult<Option<AppService>> {
        let Some(id) = self.by_code.get(code).map(|id| id.value().clone()) else {
            return Ok(None);
        };
        Ok(self.apps.get(&id).map(|a| a.value().clone()))
    }

    async fn get_by_id(&self, id: &str) -> RepoResult<Option<AppService>> {
        Ok(self.apps.get(id).map(|a| a.value().clone()))
    }

    async fn update_secret(&self, id: &str, secret_ciphertext: &str) -> RepoResult<()> {
        let mut app = self
            .apps
            .get_mut(id)
            .ok_or_else(|| RepoError::NotFound(format!("app service {id}")))?;
        app.secret_ciphertext = secret_ciphertext.to_string();
        Ok(())
    }
}
