use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};
use sled::Db;
use thiserror::Error;

use crate::models::{Identity, Plan, UsageProfile, User};
use crate::quota::window_rolled_over;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("no usage profile for user {0}")]
    NotFound(String),
    #[error("profile store error: {0}")]
    Store(#[from] sled::Error),
    #[error("corrupt profile record: {0}")]
    Codec(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("an account already exists for {0}")]
    DuplicateUser(String),
    #[error("storage error: {0}")]
    Sled(#[from] sled::Error),
    #[error("corrupt record: {0}")]
    Codec(#[from] serde_json::Error),
    #[error(transparent)]
    Profile(#[from] ProfileError),
}

/// A usage mutation applied atomically to one stored profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageChange {
    /// Start a new window at `at` with zero usage. A no-op if the stored window
    /// already covers `at`'s month.
    ResetWindow { at: DateTime<Utc> },
    /// Count one successful generation against the stored window.
    Increment,
}

impl UsageChange {
    fn apply(&self, profile: &mut UsageProfile) {
        match *self {
            UsageChange::ResetWindow { at } => {
                if window_rolled_over(at, profile.generation_reset_date) {
                    profile.generations_used = 0;
                    profile.generation_reset_date = at;
                }
            }
            UsageChange::Increment => {
                profile.generations_used = profile.generations_used.saturating_add(1);
            }
        }
    }
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn load_profile(&self, identity: &Identity) -> Result<UsageProfile, ProfileError>;

    /// Applies `change` to the stored profile and returns the stored result.
    async fn persist_usage(
        &self,
        identity: &Identity,
        change: UsageChange,
    ) -> Result<UsageProfile, ProfileError>;
}

#[derive(Clone)]  // sled handles are cheap to clone and shared across handlers
pub struct Storage {
    db: Db,
    // users: email -> User, profiles: user id -> UsageProfile (both JSON)
    users_tree: sled::Tree,
    profiles_tree: sled::Tree,
}

impl Storage {
    /// Open or create the sled database at the given path
    pub fn open(path: &str) -> Result<Self, StorageError> {
        Self::from_db(sled::open(path)?)
    }

    /// In-memory database removed on drop.
    pub fn temporary() -> Result<Self, StorageError> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: Db) -> Result<Self, StorageError> {
        let users_tree = db.open_tree("users")?;
        let profiles_tree = db.open_tree("profiles")?;
        Ok(Self {
            db,
            users_tree,
            profiles_tree,
        })
    }

    /// Creates the account and its usage profile in one transaction. Fails if
    /// the email is taken, in which case neither record is written.
    pub fn create_user(&self, user: &User, profile: &UsageProfile) -> Result<(), StorageError> {
        let user_bytes = serde_json::to_vec(user)?;
        let profile_bytes = serde_json::to_vec(profile)?;

        let created: Result<(), TransactionError<()>> = (&self.users_tree, &self.profiles_tree)
            .transaction(|(users, profiles)| {
                if users.get(user.email.as_bytes())?.is_some() {
                    return Err(ConflictableTransactionError::Abort(()));
                }
                users.insert(user.email.as_bytes(), user_bytes.as_slice())?;
                profiles.insert(profile.id.as_bytes(), profile_bytes.as_slice())?;
                Ok(())
            });
        match created {
            Ok(()) => Ok(()),
            Err(TransactionError::Abort(())) => Err(StorageError::DuplicateUser(user.email.clone())),
            Err(TransactionError::Storage(e)) => Err(StorageError::Sled(e)),
        }
    }

    pub fn get_user(&self, email: &str) -> Result<Option<User>, StorageError> {
        match self.users_tree.get(email.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn get_profile(&self, user_id: &str) -> Result<UsageProfile, ProfileError> {
        let bytes = self
            .profiles_tree
            .get(user_id.as_bytes())?
            .ok_or_else(|| ProfileError::NotFound(user_id.to_string()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn set_plan(&self, user_id: &str, plan: Plan) -> Result<UsageProfile, ProfileError> {
        self.update_profile(user_id, |profile| profile.plan = plan)
    }

    pub fn apply_usage(&self, user_id: &str, change: UsageChange) -> Result<UsageProfile, ProfileError> {
        self.update_profile(user_id, |profile| change.apply(profile))
    }

    /// Read-modify-write guarded by compare-and-swap on the stored bytes; a
    /// concurrent writer forces a re-read so no update is lost.
    fn update_profile<F>(&self, user_id: &str, mut modify: F) -> Result<UsageProfile, ProfileError>
    where
        F: FnMut(&mut UsageProfile),
    {
        loop {
            let current = self
                .profiles_tree
                .get(user_id.as_bytes())?
                .ok_or_else(|| ProfileError::NotFound(user_id.to_string()))?;
            let mut profile: UsageProfile = serde_json::from_slice(&current)?;
            modify(&mut profile);
            let next = serde_json::to_vec(&profile)?;

            match self
                .profiles_tree
                .compare_and_swap(user_id.as_bytes(), Some(&current), Some(next))?
            {
                Ok(()) => return Ok(profile),
                Err(_) => {
                    tracing::debug!(user_id, "profile changed concurrently, retrying update");
                }
            }
        }
    }

    pub async fn flush(&self) -> Result<(), sled::Error> {
        self.db.flush_async().await?;
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for Storage {
    async fn load_profile(&self, identity: &Identity) -> Result<UsageProfile, ProfileError> {
        self.get_profile(&identity.user_id)
    }

    async fn persist_usage(
        &self,
        identity: &Identity,
        change: UsageChange,
    ) -> Result<UsageProfile, ProfileError> {
        let profile = self.apply_usage(&identity.user_id, change)?;
        self.flush().await?;
        Ok(profile)
    }
}
