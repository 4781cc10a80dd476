//! Member profiles, keyed by account id rather than by group.

use std::path::Path;

use serde_json::{Map, Value};
use tracing::info;

use tutti_shared::paths;
use tutti_shared::{User, UserProfile};

use crate::error::{Result, StoreError};
use crate::store::Store;
use crate::stream::TypedStream;

impl Store {
    /// Every member profile, in snapshot order.
    pub fn watch_members(&self) -> TypedStream<Vec<User>> {
        self.watch_collection(paths::users())
    }

    pub async fn get_user(&self, user_id: &str) -> Result<User> {
        self.fetch_key(user_id, paths::user(user_id)).await
    }

    /// Profile of the signed-in account.
    pub async fn current_user(&self) -> Result<User> {
        let account = self.require_account()?;
        self.get_user(&account).await
    }

    /// Create or replace the signed-in member's profile.
    ///
    /// The instrument list is brought within the role rules before writing;
    /// the profile actually stored is returned. A profile submitted without
    /// an avatar keeps the one already uploaded.
    pub async fn save_profile(&self, profile: UserProfile) -> Result<UserProfile> {
        let account = self.require_account()?;
        if profile.name.trim().is_empty() {
            return Err(StoreError::Validation("display name is required".into()));
        }

        let submitted = profile.instruments.len();
        let mut profile = profile.sanitized();
        if profile.avatar.is_none() {
            profile.avatar = self.stored_avatar(&account).await?;
        }
        self.write(&paths::user(&account), &profile).await?;

        info!(
            user_id = %account,
            director = profile.director,
            submitted,
            kept = profile.instruments.len(),
            "Profile saved"
        );
        Ok(profile)
    }

    /// Upload a new profile picture for the signed-in member.
    pub async fn upload_avatar(&self, local: &Path) -> Result<String> {
        let account = self.require_account()?;
        self.get_user(&account).await?;

        let locator = self.upload(&paths::avatar(&account), local).await?;

        let mut fields = Map::new();
        fields.insert("avatar".into(), Value::from(locator.as_str()));
        self.backend().update(&paths::user(&account), fields).await?;

        info!(user_id = %account, "Avatar updated");
        Ok(locator)
    }

    async fn stored_avatar(&self, account: &str) -> Result<Option<String>> {
        match self.get_user(account).await {
            Ok(user) => Ok(user.profile.avatar),
            Err(StoreError::NotFound { .. } | StoreError::Malformed { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
