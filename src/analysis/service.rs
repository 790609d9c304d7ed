//! Entry point for token analysis requests.
//!
//! Validates the request, resolves the analysis through the cache, grounds
//! the system prompt in the assessment and current market prices, and
//! records the exchange in the conversation store.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use super::cache::AnalysisCache;
use super::narrative;
use crate::api::ReplyGenerator;
use crate::config::{Config, DEFAULT_SUPPORTED_NETWORK};
use crate::error::AnalysisError;
use crate::market::MarketCache;
use crate::models::{ChatMessage, ChatRole, RiskAssessment, TokenSnapshot};
use crate::storage::ConversationStore;

const ADDRESS_LEN: usize = 32;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReply {
    pub snapshot: TokenSnapshot,
    pub assessment: RiskAssessment,
    pub reply: String,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub supported_network: String,
    pub history_limit: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            supported_network: DEFAULT_SUPPORTED_NETWORK.to_string(),
            history_limit: 20,
        }
    }
}

impl From<&Config> for ServiceConfig {
    fn from(config: &Config) -> Self {
        Self {
            supported_network: config.supported_network.clone(),
            history_limit: config.history_limit,
        }
    }
}

pub fn validate_conversation_id(conversation_id: &str) -> Result<(), AnalysisError> {
    if conversation_id.trim().is_empty() {
        return Err(AnalysisError::MissingConversation);
    }
    Ok(())
}

/// A Solana address is the base58 encoding of 32 bytes.
pub fn validate_address(address: &str) -> Result<(), AnalysisError> {
    match bs58::decode(address).into_vec() {
        Ok(bytes) if bytes.len() == ADDRESS_LEN => Ok(()),
        _ => Err(AnalysisError::InvalidAddress(address.to_string())),
    }
}

pub struct AnalysisService {
    cache: Arc<AnalysisCache>,
    market: Arc<MarketCache>,
    store: Arc<dyn ConversationStore>,
    replies: Arc<dyn ReplyGenerator>,
    config: ServiceConfig,
}

impl AnalysisService {
    pub fn new(
        cache: Arc<AnalysisCache>,
        market: Arc<MarketCache>,
        store: Arc<dyn ConversationStore>,
        replies: Arc<dyn ReplyGenerator>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            cache,
            market,
            store,
            replies,
            config,
        }
    }

    pub async fn request_token_analysis(
        &self,
        address: &str,
        network: &str,
        conversation_id: &str,
    ) -> Result<AnalysisReply, AnalysisError> {
        self.analyze(address, network, conversation_id, false).await
    }

    /// Same as [`Self::request_token_analysis`], but re-aggregates instead
    /// of reusing this conversation's earlier analysis.
    pub async fn reanalyze_token(
        &self,
        address: &str,
        network: &str,
        conversation_id: &str,
    ) -> Result<AnalysisReply, AnalysisError> {
        self.analyze(address, network, conversation_id, true).await
    }

    async fn analyze(
        &self,
        address: &str,
        network: &str,
        conversation_id: &str,
        force: bool,
    ) -> Result<AnalysisReply, AnalysisError> {
        validate_conversation_id(conversation_id)?;
        let address = address.trim();
        let network = network.trim();
        if !network.eq_ignore_ascii_case(&self.config.supported_network) {
            return Err(AnalysisError::UnsupportedNetwork(network.to_string()));
        }
        validate_address(address)?;

        info!("Token analysis requested for {} in {}", address, conversation_id);
        let entry = if force {
            self.cache.reanalyze(conversation_id, address).await?
        } else {
            self.cache.get_or_compute(conversation_id, address).await?
        };

        let mut history = match self
            .store
            .recent_messages(conversation_id, self.config.history_limit)
            .await
        {
            Ok(history) => history,
            Err(e) => {
                warn!("Failed to load history for {}: {}", conversation_id, e);
                Vec::new()
            }
        };
        let request = ChatMessage::new(
            ChatRole::User,
            format!("Analyze the token {} on the {} network", address, network),
        );
        history.push(request.clone());

        let market_status = self.market.market_status_text().await;
        let system_prompt =
            narrative::system_prompt(&entry.assessment, &market_status, Utc::now().date_naive());

        let reply = self
            .replies
            .generate_reply(&system_prompt, &history)
            .await
            .map_err(|e| {
                warn!("Reply generation failed for {}: {}", address, e);
                AnalysisError::ReplyUnavailable(e.to_string())
            })?;

        for message in [request, ChatMessage::new(ChatRole::Assistant, reply.clone())] {
            if let Err(e) = self.store.append_message(conversation_id, &message).await {
                warn!("Failed to store message for {}: {}", conversation_id, e);
            }
        }

        Ok(AnalysisReply {
            snapshot: entry.snapshot.clone(),
            assessment: entry.assessment.clone(),
            reply,
        })
    }

    pub async fn market_status_text(&self) -> String {
        self.market.market_status_text().await
    }

    /// Forgets every analysis and message of a conversation.
    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<(), AnalysisError> {
        validate_conversation_id(conversation_id)?;
        self.cache.evict_conversation(conversation_id).await;
        self.store.delete_conversation(conversation_id).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::analysis::aggregator::tests::{wrapped_sol, MockProviders, TOKEN};
    use crate::analysis::scorer::Scorer;
    use crate::api::alchemy::{QuotedPrice, SymbolPrice};
    use crate::api::SymbolPriceProvider;
    use crate::error::{FailureKind, ProviderError};
    use crate::market::MarketCacheConfig;
    use crate::storage::tests::temporary_store;
    use crate::storage::AnalysisRecord;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::Mutex;

    pub struct StaticPrices;

    #[async_trait]
    impl SymbolPriceProvider for StaticPrices {
        async fn symbol_prices(&self, symbols: &[String]) -> Result<Vec<SymbolPrice>, ProviderError> {
            Ok(symbols
                .iter()
                .map(|symbol| SymbolPrice {
                    symbol: symbol.clone(),
                    prices: vec![QuotedPrice {
                        currency: "usd".to_string(),
                        value: 100.0,
                        last_updated_at: Utc::now(),
                    }],
                    error: None,
                })
                .collect())
        }
    }

    /// Records every prompt it is given and answers with a fixed reply.
    #[derive(Default)]
    pub struct RecordingReplies {
        pub prompts: Mutex<Vec<(String, Vec<ChatMessage>)>>,
        pub failing: bool,
    }

    #[async_trait]
    impl ReplyGenerator for RecordingReplies {
        async fn generate_reply(
            &self,
            system_prompt: &str,
            history: &[ChatMessage],
        ) -> anyhow::Result<String> {
            self.prompts
                .lock()
                .unwrap()
                .push((system_prompt.to_string(), history.to_vec()));
            if self.failing {
                anyhow::bail!("completion backend returned 503");
            }
            Ok("Wrapped SOL looks healthy.".to_string())
        }
    }

    pub fn service_with(
        mock: MockProviders,
        replies: Arc<RecordingReplies>,
    ) -> (AnalysisService, Arc<MockProviders>, Arc<dyn ConversationStore>) {
        let (aggregator, mock) = mock.into_aggregator();
        let store: Arc<dyn ConversationStore> = Arc::new(temporary_store());
        let cache = Arc::new(AnalysisCache::new(
            Arc::new(aggregator),
            Scorer::default(),
            store.clone(),
            Vec::new(),
        ));
        let market = Arc::new(MarketCache::new(Arc::new(StaticPrices), MarketCacheConfig::default()));
        let service = AnalysisService::new(cache, market, store.clone(), replies, ServiceConfig::default());
        (service, mock, store)
    }

    fn known_token() -> MockProviders {
        MockProviders {
            primary: Some(wrapped_sol()),
            ..MockProviders::default()
        }
    }

    #[test]
    fn test_validate_address() {
        assert!(validate_address(TOKEN).is_ok());
        assert!(validate_address("DrYycgh9zji24sT39tpWWtKw99CFQFEV8M9Tx5scpump").is_ok());
        assert!(validate_address("0xdeadbeef").is_err());
        assert!(validate_address("abc").is_err());
        assert!(validate_address("").is_err());
    }

    #[tokio::test]
    async fn test_unsupported_network_makes_no_provider_calls() {
        let (service, mock, _) = service_with(known_token(), Arc::new(RecordingReplies::default()));

        let err = service
            .request_token_analysis(TOKEN, "eth-mainnet", "conv-1")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::UnsupportedNetwork);
        assert_eq!(mock.calls(), 0);

        let err = service
            .request_token_analysis("not-an-address", "solana-mainnet", "conv-1")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::InvalidToken);
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_analysis_grounds_prompt_and_records_exchange() {
        let replies = Arc::new(RecordingReplies::default());
        let (service, mock, store) = service_with(known_token(), replies.clone());

        let reply = service
            .request_token_analysis(TOKEN, "Solana-Mainnet", "conv-1")
            .await
            .unwrap();
        assert_eq!(reply.snapshot.metadata.name, "Wrapped SOL");
        assert_eq!(reply.reply, "Wrapped SOL looks healthy.");

        let prompts = replies.prompts.lock().unwrap().clone();
        let (prompt, history) = &prompts[0];
        assert!(prompt.contains(&format!("ForgeScore of {}", reply.assessment.score)));
        assert!(prompt.contains("- BTC: 100.00 USD"));
        assert_eq!(
            history.last().unwrap().content,
            format!("Analyze the token {} on the Solana-Mainnet network", TOKEN)
        );

        let stored = store.recent_messages("conv-1", 10).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].role, ChatRole::Assistant);

        // The second request reuses the cached analysis and sees the history
        service
            .request_token_analysis(TOKEN, "solana-mainnet", "conv-1")
            .await
            .unwrap();
        assert_eq!(mock.calls(), 6);
        assert_eq!(replies.prompts.lock().unwrap()[1].1.len(), 3);
    }

    #[tokio::test]
    async fn test_blank_conversation_id_is_rejected() {
        let (service, mock, _) = service_with(known_token(), Arc::new(RecordingReplies::default()));

        let err = service
            .request_token_analysis(TOKEN, "solana-mainnet", "")
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::MissingConversation));
        assert_eq!(err.kind(), FailureKind::InvalidRequest);
        assert!(service.delete_conversation(" ").await.is_err());
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_restored_analysis_prompt_uses_current_date() {
        let replies = Arc::new(RecordingReplies::default());
        let (service, mock, store) = service_with(known_token(), replies.clone());

        let first = service
            .request_token_analysis(TOKEN, "solana-mainnet", "conv-1")
            .await
            .unwrap();
        let month_ago = Utc::now() - Duration::days(30);
        store
            .append_analysis_record(&AnalysisRecord {
                conversation_id: "conv-2".to_string(),
                address: TOKEN.to_string(),
                snapshot: first.snapshot,
                timestamp: month_ago,
            })
            .await
            .unwrap();

        let restored = service
            .request_token_analysis(TOKEN, "solana-mainnet", "conv-2")
            .await
            .unwrap();
        assert_eq!(restored.assessment.as_of, month_ago.date_naive());
        assert_eq!(mock.calls(), 6);

        let prompts = replies.prompts.lock().unwrap().clone();
        let today = Utc::now().date_naive().format("%B %-d, %Y").to_string();
        assert!(prompts[1].0.starts_with(&format!("Today is {}.", today)));
    }

    #[tokio::test]
    async fn test_reply_failure_is_reported() {
        let replies = Arc::new(RecordingReplies {
            failing: true,
            ..RecordingReplies::default()
        });
        let (service, _, store) = service_with(known_token(), replies);

        let err = service
            .request_token_analysis(TOKEN, "solana-mainnet", "conv-1")
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::ReplyUnavailable(_)));
        assert!(store.recent_messages("conv-1", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_conversation_forces_fresh_analysis() {
        let (service, mock, _) = service_with(known_token(), Arc::new(RecordingReplies::default()));

        service
            .request_token_analysis(TOKEN, "solana-mainnet", "conv-1")
            .await
            .unwrap();
        service.delete_conversation("conv-1").await.unwrap();
        service
            .request_token_analysis(TOKEN, "solana-mainnet", "conv-1")
            .await
            .unwrap();

        assert_eq!(mock.calls(), 12);
    }
}
