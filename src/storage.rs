//! Conversation storage: analysis records and chat history per conversation.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::AnalysisError;
use crate::models::{ChatMessage, TokenSnapshot};

/// A snapshot persisted after an analysis, keyed by conversation and token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub conversation_id: String,
    pub address: String,
    pub snapshot: TokenSnapshot,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn append_analysis_record(&self, record: &AnalysisRecord) -> Result<(), AnalysisError>;

    async fn read_analysis_record(
        &self,
        conversation_id: &str,
        address: &str,
    ) -> Result<Option<AnalysisRecord>, AnalysisError>;

    /// Most recent messages in chronological order, at most `limit`.
    async fn recent_messages(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, AnalysisError>;

    async fn append_message(
        &self,
        conversation_id: &str,
        message: &ChatMessage,
    ) -> Result<(), AnalysisError>;

    async fn delete_conversation(&self, conversation_id: &str) -> Result<(), AnalysisError>;
}

/// sled-backed store. Values are JSON; message keys sort by creation time.
pub struct SledConversationStore {
    db: sled::Db,
}

/// Length-prefixed so that no conversation's key range contains another's,
/// whatever characters the id holds.
fn conversation_segment(conversation_id: &str) -> String {
    format!("{}:{}/", conversation_id.len(), conversation_id)
}

fn analysis_prefix(conversation_id: &str) -> String {
    format!("analysis/{}", conversation_segment(conversation_id))
}

fn analysis_key(conversation_id: &str, address: &str) -> String {
    format!("{}{}", analysis_prefix(conversation_id), address)
}

fn message_prefix(conversation_id: &str) -> String {
    format!("message/{}", conversation_segment(conversation_id))
}

impl SledConversationStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AnalysisError> {
        let path = path.as_ref();
        info!("Opening conversation store at {}", path.display());
        Ok(Self {
            db: sled::open(path)?,
        })
    }

    pub fn from_db(db: sled::Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ConversationStore for SledConversationStore {
    async fn append_analysis_record(&self, record: &AnalysisRecord) -> Result<(), AnalysisError> {
        let key = analysis_key(&record.conversation_id, &record.address);
        debug!("Storing analysis record {}", key);
        self.db.insert(key.as_bytes(), serde_json::to_vec(record)?)?;
        self.db.flush_async().await?;
        Ok(())
    }

    async fn read_analysis_record(
        &self,
        conversation_id: &str,
        address: &str,
    ) -> Result<Option<AnalysisRecord>, AnalysisError> {
        match self.db.get(analysis_key(conversation_id, address).as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn recent_messages(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, AnalysisError> {
        let mut messages = Vec::new();
        for entry in self.db.scan_prefix(message_prefix(conversation_id).as_bytes()).rev() {
            if messages.len() >= limit {
                break;
            }
            let (_, value) = entry?;
            messages.push(serde_json::from_slice::<ChatMessage>(&value)?);
        }
        messages.reverse();
        Ok(messages)
    }

    async fn append_message(
        &self,
        conversation_id: &str,
        message: &ChatMessage,
    ) -> Result<(), AnalysisError> {
        // Zero-padded micros keep lexicographic order equal to time order
        let key = format!(
            "{}{:020}-{}",
            message_prefix(conversation_id),
            message.created_at.timestamp_micros().max(0),
            Uuid::new_v4()
        );
        self.db.insert(key.as_bytes(), serde_json::to_vec(message)?)?;
        Ok(())
    }

    async fn delete_conversation(&self, conversation_id: &str) -> Result<(), AnalysisError> {
        let mut batch = sled::Batch::default();
        let mut removed = 0usize;
        for prefix in [analysis_prefix(conversation_id), message_prefix(conversation_id)] {
            for key in self.db.scan_prefix(prefix.as_bytes()).keys() {
                batch.remove(key?);
                removed += 1;
            }
        }
        self.db.apply_batch(batch)?;
        self.db.flush_async().await?;
        info!("Deleted {} stored entries for conversation {}", removed, conversation_id);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::analysis::aggregator::tests::{wrapped_sol, TOKEN};
    use crate::analysis::aggregator::{reconcile, MetadataSources, Sourced};
    use crate::error::ProviderError;
    use crate::models::ChatRole;
    use chrono::Duration;

    pub fn temporary_store() -> SledConversationStore {
        let db = sled::Config::new().temporary(true).open().unwrap();
        SledConversationStore::from_db(db)
    }

    fn record(conversation_id: &str, name: &str) -> AnalysisRecord {
        let mut snapshot = reconcile(
            TOKEN,
            &MetadataSources::PrimaryOnly(wrapped_sol()),
            Sourced::Absent(ProviderError::NotFound),
            Sourced::Absent(ProviderError::NotFound),
            Sourced::Absent(ProviderError::NotFound),
            Sourced::Absent(ProviderError::NotFound),
        );
        snapshot.metadata.name = name.to_string();
        AnalysisRecord {
            conversation_id: conversation_id.to_string(),
            address: snapshot.address.clone(),
            snapshot,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_analysis_record_roundtrip_per_conversation() {
        let store = temporary_store();
        let stored = record("conv-1", "Wrapped SOL");
        store.append_analysis_record(&stored).await.unwrap();

        let read = store
            .read_analysis_record("conv-1", &stored.address)
            .await
            .unwrap();
        assert_eq!(read, Some(stored.clone()));
        assert!(store
            .read_analysis_record("conv-2", &stored.address)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_recent_messages_are_chronological_and_limited() {
        let store = temporary_store();
        let start = Utc::now();
        for i in 0..5 {
            let mut message = ChatMessage::new(ChatRole::User, format!("message {}", i));
            message.created_at = start + Duration::seconds(i);
            store.append_message("conv-1", &message).await.unwrap();
        }
        store
            .append_message("conv-10", &ChatMessage::new(ChatRole::User, "other"))
            .await
            .unwrap();

        let recent = store.recent_messages("conv-1", 3).await.unwrap();
        let contents: Vec<&str> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["message 2", "message 3", "message 4"]);
    }

    #[tokio::test]
    async fn test_nested_conversation_ids_do_not_share_keys() {
        let store = temporary_store();
        store
            .append_message("conv", &ChatMessage::new(ChatRole::User, "mine"))
            .await
            .unwrap();
        store
            .append_message("conv/other", &ChatMessage::new(ChatRole::User, "theirs"))
            .await
            .unwrap();
        let theirs = record("conv/other", "Theirs");
        store.append_analysis_record(&theirs).await.unwrap();

        let recent = store.recent_messages("conv", 10).await.unwrap();
        let contents: Vec<&str> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["mine"]);

        store.delete_conversation("conv").await.unwrap();
        assert_eq!(store.recent_messages("conv/other", 10).await.unwrap().len(), 1);
        assert_eq!(
            store.read_analysis_record("conv/other", &theirs.address).await.unwrap(),
            Some(theirs)
        );
    }

    #[tokio::test]
    async fn test_delete_conversation_leaves_others() {
        let store = temporary_store();
        let kept = record("conv-2", "Kept");
        store.append_analysis_record(&record("conv-1", "Gone")).await.unwrap();
        store.append_analysis_record(&kept).await.unwrap();
        store
            .append_message("conv-1", &ChatMessage::new(ChatRole::User, "hi"))
            .await
            .unwrap();

        store.delete_conversation("conv-1").await.unwrap();

        assert!(store.read_analysis_record("conv-1", &kept.address).await.unwrap().is_none());
        assert!(store.recent_messages("conv-1", 10).await.unwrap().is_empty());
        assert_eq!(
            store.read_analysis_record("conv-2", &kept.address).await.unwrap(),
            Some(kept)
        );
    }
}
