//! Fan-out to every provider and reconciliation into one [`TokenSnapshot`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::api::moralis::{
    BondingStatus, HolderChangeEntry, MoralisPairStats, MoralisTokenAnalytics, MoralisTokenHolders,
};
use crate::api::solanafm::SolanaFmTokenInfo;
use crate::api::solscan::SolscanTokenInfo;
use crate::api::{
    AnalyticsProvider, BondingStatusProvider, HolderProvider, PairStatsProvider,
    PrimaryMetadataProvider, SecondaryMetadataProvider,
};
use crate::error::{AnalysisError, ProviderError};
use crate::models::{
    ActivityMetrics, DataGap, DexInfo, HolderAcquisition, HolderChange, HolderChanges,
    HolderDistribution, HolderMetrics, MarketData, OnChainMetrics, SecurityInfo, SocialLinks,
    TokenMetadata, TokenSnapshot, VolumeSources,
};

pub const PRIMARY_METADATA: &str = "solscan";
pub const SECONDARY_METADATA: &str = "solanafm";
pub const HOLDERS: &str = "moralis-holders";
pub const ANALYTICS: &str = "moralis-analytics";
pub const PAIR_STATS: &str = "moralis-pair-stats";
pub const BONDING_STATUS: &str = "moralis-bonding-status";

/// Outcome of one provider call once its failure has been absorbed.
#[derive(Debug, Clone, PartialEq)]
pub enum Sourced<T> {
    Present(T),
    Absent(ProviderError),
}

impl<T> Sourced<T> {
    pub fn present(&self) -> Option<&T> {
        match self {
            Sourced::Present(value) => Some(value),
            Sourced::Absent(_) => None,
        }
    }

    pub fn absence(&self) -> Option<&ProviderError> {
        match self {
            Sourced::Present(_) => None,
            Sourced::Absent(reason) => Some(reason),
        }
    }
}

impl<T: Default> Sourced<T> {
    /// Present value, or the zeroed default when the provider failed.
    pub fn or_default(self) -> T {
        match self {
            Sourced::Present(value) => value,
            Sourced::Absent(_) => T::default(),
        }
    }
}

/// Which metadata providers answered. There is no variant for neither:
/// that case is `InsufficientData`.
#[derive(Debug, Clone)]
pub enum MetadataSources {
    Both(SolscanTokenInfo, SolanaFmTokenInfo),
    PrimaryOnly(SolscanTokenInfo),
    SecondaryOnly(SolanaFmTokenInfo),
}

impl MetadataSources {
    pub fn resolve(
        primary: Sourced<SolscanTokenInfo>,
        secondary: Sourced<SolanaFmTokenInfo>,
    ) -> Result<Self, AnalysisError> {
        match (primary, secondary) {
            (Sourced::Present(a), Sourced::Present(b)) => Ok(MetadataSources::Both(a, b)),
            (Sourced::Present(a), Sourced::Absent(_)) => Ok(MetadataSources::PrimaryOnly(a)),
            (Sourced::Absent(_), Sourced::Present(b)) => Ok(MetadataSources::SecondaryOnly(b)),
            (Sourced::Absent(primary), Sourced::Absent(secondary)) => {
                Err(AnalysisError::InsufficientData { primary, secondary })
            }
        }
    }

    pub fn primary(&self) -> Option<&SolscanTokenInfo> {
        match self {
            MetadataSources::Both(a, _) | MetadataSources::PrimaryOnly(a) => Some(a),
            MetadataSources::SecondaryOnly(_) => None,
        }
    }

    pub fn secondary(&self) -> Option<&SolanaFmTokenInfo> {
        match self {
            MetadataSources::Both(_, b) | MetadataSources::SecondaryOnly(b) => Some(b),
            MetadataSources::PrimaryOnly(_) => None,
        }
    }
}

/// Every capability the aggregator fans out to.
#[derive(Clone)]
pub struct ProviderSet {
    pub primary_metadata: Arc<dyn PrimaryMetadataProvider>,
    pub secondary_metadata: Arc<dyn SecondaryMetadataProvider>,
    pub holders: Arc<dyn HolderProvider>,
    pub analytics: Arc<dyn AnalyticsProvider>,
    pub pair_stats: Arc<dyn PairStatsProvider>,
    pub bonding_status: Arc<dyn BondingStatusProvider>,
}

#[derive(Debug, Clone, Copy)]
pub struct AggregatorConfig {
    pub call_timeout: Duration,
    pub bonding_timeout: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(10),
            bonding_timeout: Duration::from_secs(5),
        }
    }
}

pub struct Aggregator {
    providers: ProviderSet,
    config: AggregatorConfig,
}

impl Aggregator {
    pub fn new(providers: ProviderSet, config: AggregatorConfig) -> Self {
        Self { providers, config }
    }

    /// Queries all providers concurrently and reconciles the answers.
    /// Fails only when neither metadata provider knows the token.
    pub async fn aggregate(&self, address: &str) -> Result<TokenSnapshot, AnalysisError> {
        info!("Aggregating token data for {}", address);
        let call_timeout = self.config.call_timeout;
        let p = &self.providers;

        let (primary, secondary, holders, analytics, pair_stats, bonding) = tokio::join!(
            sourced(PRIMARY_METADATA, call_timeout, async {
                p.primary_metadata
                    .token_info(address)
                    .await
                    .and_then(|info| info.ok_or(ProviderError::NotFound))
            }),
            sourced(SECONDARY_METADATA, call_timeout, async {
                p.secondary_metadata
                    .token_info(address)
                    .await
                    .and_then(|info| info.ok_or(ProviderError::NotFound))
            }),
            sourced(HOLDERS, call_timeout, p.holders.holders(address)),
            sourced(ANALYTICS, call_timeout, p.analytics.analytics(address)),
            sourced(PAIR_STATS, call_timeout, p.pair_stats.pair_stats(address)),
            sourced(
                BONDING_STATUS,
                self.config.bonding_timeout,
                p.bonding_status.bonding_status(address)
            ),
        );

        let mut data_gaps = Vec::new();
        for (provider, reason) in [
            (PRIMARY_METADATA, primary.absence()),
            (SECONDARY_METADATA, secondary.absence()),
            (HOLDERS, holders.absence()),
            (ANALYTICS, analytics.absence()),
            (PAIR_STATS, pair_stats.absence()),
            (BONDING_STATUS, bonding.absence()),
        ] {
            if let Some(reason) = reason {
                data_gaps.push(DataGap::new(provider, reason));
            }
        }

        let metadata = MetadataSources::resolve(primary, secondary).map_err(|e| {
            warn!("No metadata provider knows {}: {}", address, e);
            e
        })?;

        let mut snapshot = reconcile(address, &metadata, holders, analytics, pair_stats, bonding);
        snapshot.data_gaps = data_gaps;
        Ok(snapshot)
    }
}

async fn sourced<T, F>(provider: &str, limit: Duration, call: F) -> Sourced<T>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    match timeout(limit, call).await {
        Ok(Ok(value)) => Sourced::Present(value),
        Ok(Err(ProviderError::NotFound)) => {
            debug!("{} has no data for this token", provider);
            Sourced::Absent(ProviderError::NotFound)
        }
        Ok(Err(e)) => {
            warn!("{} call failed, continuing without it: {}", provider, e);
            Sourced::Absent(e)
        }
        Err(_) => {
            warn!("{} call timed out after {:?}", provider, limit);
            Sourced::Absent(ProviderError::Timeout)
        }
    }
}

fn non_empty(value: Option<&String>) -> Option<&String> {
    value.filter(|s| !s.trim().is_empty())
}

fn change_or_zero(entry: Option<HolderChangeEntry>) -> HolderChange {
    entry
        .map(|e| HolderChange { change: e.change, change_percent: e.change_percent })
        .unwrap_or_default()
}

fn first_non_zero(primary: f64, fallback: f64) -> f64 {
    if primary > 0.0 {
        primary
    } else {
        fallback
    }
}

fn count(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.round() as u64
    } else {
        0
    }
}

/// Pure reconciliation of the provider answers. `data_gaps` is left empty.
pub fn reconcile(
    address: &str,
    metadata: &MetadataSources,
    holders: Sourced<MoralisTokenHolders>,
    analytics: Sourced<MoralisTokenAnalytics>,
    pair_stats: Sourced<MoralisPairStats>,
    bonding: Sourced<BondingStatus>,
) -> TokenSnapshot {
    let a = metadata.primary();
    let b = metadata.secondary();

    let bonding_progress = bonding.present().and_then(BondingStatus::effective_progress);
    let holders = holders.or_default();
    let analytics = analytics.or_default();
    let pair_stats = pair_stats.or_default();

    // Mint authority is only known from the primary provider.
    let mint_authority_revoked = a.map(|info| info.mint_authority.is_revoked()).unwrap_or(false);
    let verified = mint_authority_revoked || b.map(|info| info.verified).unwrap_or(false);

    let name = non_empty(a.and_then(|i| i.name.as_ref()))
        .or_else(|| non_empty(b.and_then(|i| i.token_name.as_ref())))
        .cloned()
        .unwrap_or_default();
    let symbol = non_empty(a.and_then(|i| i.symbol.as_ref()))
        .or_else(|| non_empty(b.and_then(|i| i.symbol.as_ref())))
        .cloned()
        .unwrap_or_default();
    let decimals = a
        .and_then(|i| i.decimals)
        .filter(|d| *d > 0)
        .or_else(|| b.and_then(|i| i.decimals))
        .unwrap_or(0);

    let extra = a.and_then(|i| i.metadata.as_ref());
    let metadata = TokenMetadata {
        name,
        symbol,
        decimals,
        total_supply: a.and_then(|i| i.supply.clone()).unwrap_or_else(|| "0".to_string()),
        creator: a.and_then(|i| i.creator.clone()),
        description: extra.and_then(|m| m.description.clone()),
        logo: a.and_then(|i| i.icon.clone()),
        tags: Vec::new(),
        verified,
        social: SocialLinks {
            twitter: non_empty(extra.and_then(|m| m.twitter.as_ref())).cloned(),
            website: non_empty(extra.and_then(|m| m.website.as_ref())).cloned(),
        },
    };

    let volume_sources = VolumeSources {
        primary: a.and_then(|i| i.volume_24h).unwrap_or(0.0),
        analytics: analytics.volume_24h(),
        pair_stats: pair_stats.total_volume.h24,
    };

    let market_data = MarketData {
        price: a.and_then(|i| i.price).unwrap_or(0.0),
        price_change_24h: a.and_then(|i| i.price_change_24h).unwrap_or(0.0),
        high_24h: 0.0,
        low_24h: 0.0,
        volume_24h: volume_sources.max(),
        buy_volume_24h: first_non_zero(
            pair_stats.total_buy_volume.h24,
            analytics.total_buy_volume.h24,
        ),
        sell_volume_24h: first_non_zero(
            pair_stats.total_sell_volume.h24,
            analytics.total_sell_volume.h24,
        ),
        total_buys_24h: count(first_non_zero(analytics.total_buys.h24, pair_stats.total_swaps.h24)),
        total_sells_24h: count(first_non_zero(analytics.total_sells.h24, pair_stats.total_swaps.h24)),
        unique_buyers_24h: count(first_non_zero(
            analytics.total_buyers.h24,
            pair_stats.total_buyers.h24,
        )),
        unique_sellers_24h: count(first_non_zero(
            analytics.total_sellers.h24,
            pair_stats.total_sellers.h24,
        )),
        liquidity_usd: first_non_zero(pair_stats.total_liquidity_usd, analytics.liquidity_usd()),
        fully_diluted_valuation: first_non_zero(
            a.and_then(|i| i.market_cap).unwrap_or(0.0),
            analytics.fully_diluted_valuation(),
        ),
        market_cap_rank: a.and_then(|i| i.market_cap_rank).filter(|rank| *rank > 0),
        bonding_progress,
        dex: DexInfo {
            active_pairs: pair_stats.total_active_pairs,
            active_dexes: pair_stats.total_active_dexes,
        },
        volume_sources,
    };

    let change = holders.holder_change.unwrap_or_default();
    let distribution = holders.holder_distribution.unwrap_or_default();
    let acquisition = holders.holders_by_acquisition.unwrap_or_default();
    let supply = holders.holder_supply.unwrap_or_default();

    let holder_metrics = HolderMetrics {
        total: holders.total_holders.unwrap_or(0),
        top10_percent: supply.top10.map(|s| s.supply_percent).unwrap_or(0.0),
        top50_percent: supply.top50.map(|s| s.supply_percent).unwrap_or(0.0),
        distribution: HolderDistribution {
            whales: distribution.whales,
            sharks: distribution.sharks,
            dolphins: distribution.dolphins,
            fish: distribution.fish,
            octopus: distribution.octopus,
            crabs: distribution.crabs,
            shrimps: distribution.shrimps,
        },
        acquisition: HolderAcquisition {
            swap: acquisition.swap,
            transfer: acquisition.transfer,
            airdrop: acquisition.airdrop,
        },
        change: HolderChanges {
            m5: change_or_zero(change.m5),
            h1: change_or_zero(change.h1),
            h6: change_or_zero(change.h6),
            h24: change_or_zero(change.h24),
        },
    };

    let mut warnings = Vec::new();
    if let Some(authority) = a.and_then(|i| i.mint_authority.active()) {
        warnings.push(format!("Mint authority is still active ({})", authority));
    }
    if !verified {
        warnings.push("Creator could not be verified".to_string());
    }

    TokenSnapshot {
        address: address.to_string(),
        metadata,
        market_data,
        on_chain_metrics: OnChainMetrics {
            activity: ActivityMetrics {
                transactions_24h: count(pair_stats.total_swaps.h24),
                large_transactions_24h: 0,
                new_holders_24h: holder_metrics.change.h24.change,
            },
            holders: holder_metrics,
        },
        security: SecurityInfo {
            verified_creator: verified,
            contract_verified: true,
            mint_authority_revoked,
            warnings,
        },
        data_gaps: Vec::new(),
    }
}
