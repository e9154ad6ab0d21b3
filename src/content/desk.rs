//! Content back office
//!
//! Reads are public; every mutation is checked against the actor's grant.

use super::types::{ContentBody, ContentEntry, ContentKind};
use crate::auth::{require, AccessError, AccessResult, Principal};
use crate::storage::StorageBackend;
use serde::Deserialize;
use std::cmp::Reverse;
use std::sync::Arc;

/// Listing filter
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ContentFilter {
    /// News only: list archived (`true`) or current (`false`, the default) items
    #[serde(default, alias = "archive")]
    pub archived: Option<bool>,
}

/// CRUD over portal content, gated by the access service's permissions
pub struct ContentDesk {
    storage: Arc<dyn StorageBackend>,
}

impl ContentDesk {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// List entries of one kind in page order
    pub async fn list(
        &self,
        kind: ContentKind,
        filter: ContentFilter,
    ) -> AccessResult<Vec<ContentEntry>> {
        let mut entries = self.storage.list_content(kind).await?;

        match kind {
            ContentKind::News => {
                let archived = filter.archived.unwrap_or(false);
                entries.retain(|e| matches!(&e.body, ContentBody::News(n) if n.is_archive == archived));
                entries.sort_by_key(|e| Reverse(e.created_at));
            }
            ContentKind::Amendment => entries.sort_by_key(|e| Reverse(e.created_at)),
            ContentKind::Leader => entries.sort_by_key(|e| (leader_order(e), e.created_at)),
            ContentKind::Ministry => entries.sort_by_key(|e| e.created_at),
        }

        Ok(entries)
    }

    pub async fn get(&self, kind: ContentKind, id: &str) -> AccessResult<ContentEntry> {
        self.storage
            .get_content(kind, id)
            .await?
            .ok_or_else(|| AccessError::NotFound(format!("{} {}", kind, id)))
    }

    /// Create an entry; requires the kind's managing permission
    pub async fn create(&self, actor: &Principal, body: ContentBody) -> AccessResult<ContentEntry> {
        let kind = body.kind();
        require(actor, kind.managing_permission())?;
        validate(&body)?;

        let entry = ContentEntry::new(body);
        self.storage.insert_content(&entry).await?;

        tracing::info!(kind = %kind, id = %entry.id, by = %actor.user.id, "Content created");
        Ok(entry)
    }

    /// Replace the body of an existing entry
    pub async fn update(
        &self,
        actor: &Principal,
        kind: ContentKind,
        id: &str,
        body: ContentBody,
    ) -> AccessResult<ContentEntry> {
        require(actor, kind.managing_permission())?;
        if body.kind() != kind {
            return Err(AccessError::Invalid(format!(
                "expected a {} body, got {}",
                kind,
                body.kind()
            )));
        }
        validate(&body)?;

        let entry = self.storage.update_content(id, &body).await?;
        tracing::info!(kind = %kind, id = %id, by = %actor.user.id, "Content updated");
        Ok(entry)
    }

    /// Remove an entry; requires `delete`
    pub async fn delete(&self, actor: &Principal, kind: ContentKind, id: &str) -> AccessResult<()> {
        require(actor, kind.deleting_permission())?;

        self.storage.delete_content(kind, id).await?;
        tracing::info!(kind = %kind, id = %id, by = %actor.user.id, "Content deleted");
        Ok(())
    }
}

fn leader_order(entry: &ContentEntry) -> i32 {
    match &entry.body {
        ContentBody::Leader(l) => l.order,
        _ => i32::MAX,
    }
}

fn validate(body: &ContentBody) -> AccessResult<()> {
    match body.missing_field() {
        Some(field) => Err(AccessError::Invalid(format!("{} is required", field))),
        None => Ok(()),
    }
}
