//! Per-conversation analysis cache.
//!
//! Each (conversation, token) key owns a `OnceCell`, so concurrent callers
//! for the same key wait on one aggregation instead of each fanning out.
//! A failed computation leaves the cell empty and the next caller retries.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OnceCell, RwLock};
use tracing::{info, warn};

use super::aggregator::Aggregator;
use super::scorer::Scorer;
use crate::error::AnalysisError;
use crate::models::{NewsArticle, RiskAssessment, TokenSnapshot};
use crate::storage::{AnalysisRecord, ConversationStore};

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisEntry {
    pub snapshot: TokenSnapshot,
    pub assessment: RiskAssessment,
    pub timestamp: DateTime<Utc>,
}

type CacheKey = (String, String);
type Slot = Arc<OnceCell<Arc<AnalysisEntry>>>;

pub struct AnalysisCache {
    aggregator: Arc<Aggregator>,
    scorer: Scorer,
    store: Arc<dyn ConversationStore>,
    news: Vec<NewsArticle>,
    entries: RwLock<HashMap<CacheKey, Slot>>,
    /// In-flight forced re-analyses, shared by concurrent callers
    refreshing: Mutex<HashMap<CacheKey, Slot>>,
    /// Bumped when a conversation is evicted; a computation that started
    /// under an older generation must not write back
    generations: RwLock<HashMap<String, u64>>,
}

impl AnalysisCache {
    pub fn new(
        aggregator: Arc<Aggregator>,
        scorer: Scorer,
        store: Arc<dyn ConversationStore>,
        news: Vec<NewsArticle>,
    ) -> Self {
        Self {
            aggregator,
            scorer,
            store,
            news,
            entries: RwLock::new(HashMap::new()),
            refreshing: Mutex::new(HashMap::new()),
            generations: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get_or_compute(
        &self,
        conversation_id: &str,
        address: &str,
    ) -> Result<Arc<AnalysisEntry>, AnalysisError> {
        let key = (conversation_id.to_string(), address.to_string());
        let generation = self.generation(conversation_id).await;

        let existing = self.entries.read().await.get(&key).cloned();
        let slot = match existing {
            Some(slot) => slot,
            None => {
                let mut entries = self.entries.write().await;
                entries
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(OnceCell::new()))
                    .clone()
            }
        };

        match slot
            .get_or_try_init(|| self.compute(conversation_id, address, true, generation))
            .await
        {
            Ok(entry) => Ok(entry.clone()),
            Err(e) => {
                let mut entries = self.entries.write().await;
                if entries
                    .get(&key)
                    .is_some_and(|s| Arc::ptr_eq(s, &slot) && !s.initialized())
                {
                    entries.remove(&key);
                }
                Err(e)
            }
        }
    }

    /// Re-aggregates the token, ignoring any stored record, and replaces the
    /// cached entry on success. On failure the previous entry is kept.
    /// Concurrent calls for the same key share one aggregation.
    pub async fn reanalyze(
        &self,
        conversation_id: &str,
        address: &str,
    ) -> Result<Arc<AnalysisEntry>, AnalysisError> {
        let key = (conversation_id.to_string(), address.to_string());
        let generation = self.generation(conversation_id).await;

        let slot = self
            .refreshing
            .lock()
            .await
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();
        let result = slot
            .get_or_try_init(|| self.compute(conversation_id, address, false, generation))
            .await
            .cloned();

        {
            let mut refreshing = self.refreshing.lock().await;
            if refreshing.get(&key).is_some_and(|s| Arc::ptr_eq(s, &slot)) {
                refreshing.remove(&key);
            }
        }
        let entry = result?;

        let generations = self.generations.read().await;
        if generations.get(conversation_id).copied().unwrap_or(0) == generation {
            self.entries.write().await.insert(key, slot);
        }
        Ok(entry)
    }

    /// Drops one entry so the next request re-analyzes the token.
    pub async fn invalidate(&self, conversation_id: &str, address: &str) {
        let key = (conversation_id.to_string(), address.to_string());
        self.entries.write().await.remove(&key);
    }

    pub async fn evict_conversation(&self, conversation_id: &str) {
        let mut generations = self.generations.write().await;
        *generations.entry(conversation_id.to_string()).or_insert(0) += 1;

        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|(conversation, _), _| conversation != conversation_id);
        info!(
            "Evicted {} cached analyses for conversation {}",
            before - entries.len(),
            conversation_id
        );
    }

    pub async fn len(&self) -> usize {
        let entries = self.entries.read().await;
        entries.values().filter(|slot| slot.initialized()).count()
    }

    async fn generation(&self, conversation_id: &str) -> u64 {
        self.generations
            .read()
            .await
            .get(conversation_id)
            .copied()
            .unwrap_or(0)
    }

    async fn compute(
        &self,
        conversation_id: &str,
        address: &str,
        use_stored: bool,
        generation: u64,
    ) -> Result<Arc<AnalysisEntry>, AnalysisError> {
        let stored = if use_stored {
            self.store.read_analysis_record(conversation_id, address).await
        } else {
            Ok(None)
        };
        match stored {
            Ok(Some(record)) => {
                info!("Restored stored analysis of {} for {}", address, conversation_id);
                let assessment =
                    self.scorer
                        .score(&record.snapshot, &self.news, record.timestamp.date_naive());
                return Ok(Arc::new(AnalysisEntry {
                    snapshot: record.snapshot,
                    assessment,
                    timestamp: record.timestamp,
                }));
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to read stored analysis of {}: {}", address, e),
        }

        let snapshot = self.aggregator.aggregate(address).await?;
        let timestamp = Utc::now();
        let assessment = self.scorer.score(&snapshot, &self.news, timestamp.date_naive());
        info!(
            "Analyzed {} ({}) for {}: ForgeScore {}",
            snapshot.metadata.symbol, address, conversation_id, assessment.score
        );

        let record = AnalysisRecord {
            conversation_id: conversation_id.to_string(),
            address: address.to_string(),
            snapshot: snapshot.clone(),
            timestamp,
        };
        // Held across the append so an eviction cannot slip in between
        let generations = self.generations.read().await;
        if generations.get(conversation_id).copied().unwrap_or(0) != generation {
            info!(
                "Conversation {} was deleted while analyzing {}; not storing",
                conversation_id, address
            );
        } else if let Err(e) = self.store.append_analysis_record(&record).await {
            warn!("Failed to store analysis record for {}: {}", address, e);
        }
        drop(generations);

        Ok(Arc::new(AnalysisEntry {
            snapshot,
            assessment,
            timestamp,
        }))
    }
}
