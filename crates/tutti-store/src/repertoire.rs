//! Repertoire operations: the shared listing of pieces and their
//! per-instrument sheet files.

use std::path::PathBuf;

use futures::future::try_join_all;
use indexmap::IndexMap;
use tracing::info;

use tutti_shared::ordering::sort_repertoire;
use tutti_shared::paths;
use tutti_shared::RepertoireItem;

use crate::error::{Result, StoreError};
use crate::store::{checked_id, Store};
use crate::stream::TypedStream;

/// Input for adding a piece to the repertoire.
#[derive(Debug, Clone, Default)]
pub struct RepertoireDraft {
    pub title: String,
    pub composer: String,
    pub video: Option<String>,
    /// Instrument name -> local sheet file to upload.
    pub files: Vec<(String, PathBuf)>,
}

impl Store {
    /// The group's repertoire, most recently saved first.
    pub fn watch_repertoire(&self) -> TypedStream<Vec<RepertoireItem>> {
        self.watch_collection(paths::repertoire(self.group_id()))
            .map_each(sort_repertoire)
    }

    pub async fn get_repertoire_item(&self, item_id: &str) -> Result<RepertoireItem> {
        self.fetch_key(item_id, paths::repertoire_item(self.group_id(), item_id))
            .await
    }

    /// Upload the draft's sheet files and save the piece. Returns its id.
    pub async fn create_repertoire_item(&self, draft: RepertoireDraft) -> Result<String> {
        self.require_account()?;
        validate_draft(&draft)?;

        let group = self.group_id();
        let id = self.backend().push(&paths::repertoire(group)).await?;

        let uploads = draft.files.iter().map(|(instrument, local)| {
            let remote = paths::sheet_file(group, &id, instrument);
            async move {
                let locator = self.upload(&remote, local).await?;
                Ok::<_, StoreError>((instrument.clone(), locator))
            }
        });
        let files: IndexMap<String, String> = try_join_all(uploads).await?.into_iter().collect();

        let item = RepertoireItem {
            id: id.clone(),
            title: draft.title.trim().to_string(),
            composer: draft.composer.trim().to_string(),
            video: draft.video.filter(|v| !v.trim().is_empty()),
            files,
            saved_at: chrono::Utc::now().timestamp_millis(),
        };
        self.write(&paths::repertoire_item(group, &id), &item).await?;

        info!(item_id = %id, title = %item.title, files = item.files.len(), "Repertoire item saved");
        Ok(id)
    }

    /// Remove a piece. Events that still reference it simply stop listing it.
    pub async fn delete_repertoire_item(&self, item_id: &str) -> Result<()> {
        self.require_account()?;
        let item_id = checked_id("repertoire item", item_id)?;
        self.backend()
            .remove(&paths::repertoire_item(self.group_id(), item_id))
            .await?;
        info!(item_id, "Repertoire item deleted");
        Ok(())
    }
}

fn validate_draft(draft: &RepertoireDraft) -> Result<()> {
    if draft.title.trim().is_empty() {
        return Err(StoreError::Validation("repertoire title is required".into()));
    }
    for (instrument, _) in &draft.files {
        if instrument.trim().is_empty() || instrument.contains('/') {
            return Err(StoreError::Validation(format!(
                "invalid instrument name '{instrument}'"
            )));
        }
    }
    Ok(())
}
