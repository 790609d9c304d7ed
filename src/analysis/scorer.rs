//! ForgeScore computation.
//!
//! Four additive categories (technical, market health, holder metrics,
//! social) give a base score, then risk multipliers shrink it toward zero.
//! The result is clamped to -100..=100. Scoring is pure: the same snapshot,
//! news and date always produce the same assessment.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::narrative;
use crate::models::{
    CategoryBreakdown, CategoryScore, NewsArticle, RiskAssessment, RiskFlag, RiskFlagKind,
    SubPoint, TokenSnapshot,
};

pub const MIN_SCORE: i32 = -100;
pub const MAX_SCORE: i32 = 100;

/// Thresholds and multipliers for the scoring rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskRules {
    // Liquidity depth
    pub shallow_liquidity_usd: f64,
    pub deep_liquidity_usd: f64,

    // Volume consistency, as relative spread between sources
    pub consistent_volume_divergence: f64,
    pub max_volume_divergence: f64,

    // Buy/sell balance, as smaller side over larger side
    pub balanced_trade_ratio: f64,
    pub fair_trade_ratio: f64,

    // Holder growth: points per percent of 24h holder growth
    pub growth_points_per_percent: f64,

    // Multipliers
    pub concentration_threshold: f64,
    pub concentration_multiplier: f64,
    pub low_liquidity_multiplier: f64,
    pub volume_divergence_multiplier: f64,
    pub bonding_concentration_threshold: f64,
    pub bonding_min_holders: u64,
    pub bonding_multiplier: f64,
}

impl Default for RiskRules {
    fn default() -> Self {
        Self {
            shallow_liquidity_usd: 10_000.0,
            deep_liquidity_usd: 100_000.0,
            consistent_volume_divergence: 0.2,
            max_volume_divergence: 0.5,
            balanced_trade_ratio: 0.5,
            fair_trade_ratio: 0.25,
            growth_points_per_percent: 1.0,
            concentration_threshold: 80.0,
            concentration_multiplier: 0.7,
            low_liquidity_multiplier: 0.6,
            volume_divergence_multiplier: 0.5,
            bonding_concentration_threshold: 50.0,
            bonding_min_holders: 100,
            bonding_multiplier: 0.8,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Scorer {
    rules: RiskRules,
}

impl Scorer {
    pub fn new(rules: RiskRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RiskRules {
        &self.rules
    }

    pub fn score(
        &self,
        snapshot: &TokenSnapshot,
        news: &[NewsArticle],
        as_of: NaiveDate,
    ) -> RiskAssessment {
        let category_breakdown = CategoryBreakdown {
            technical: self.technical(snapshot),
            market_health: self.market_health(snapshot),
            holder_metrics: self.holder_metrics(snapshot),
            social: self.social(snapshot),
        };
        let base_score = category_breakdown.total();
        let risk_flags = self.risk_flags(snapshot);

        let multiplier: f64 = risk_flags.iter().map(|f| f.multiplier).product();
        let score = clamp_score(base_score * multiplier);
        debug!(
            "Scored {}: base {:.1}, multiplier {:.3}, final {}",
            snapshot.address, base_score, multiplier, score
        );

        let mut assessment = RiskAssessment {
            score,
            base_score,
            category_breakdown,
            risk_flags,
            narrative_sections: Vec::new(),
            as_of,
        };
        assessment.narrative_sections = narrative::sections(snapshot, &assessment, news);
        assessment
    }

    fn technical(&self, snapshot: &TokenSnapshot) -> CategoryScore {
        let security = &snapshot.security;
        CategoryScore::new(
            40.0,
            vec![
                sub_point("Contract verification", if security.contract_verified { 20.0 } else { 0.0 }, 20.0),
                sub_point("Creator verification", if security.verified_creator { 10.0 } else { 0.0 }, 10.0),
                sub_point(
                    "Mint authority revoked",
                    if security.mint_authority_revoked { 10.0 } else { 0.0 },
                    10.0,
                ),
            ],
        )
    }

    fn market_health(&self, snapshot: &TokenSnapshot) -> CategoryScore {
        let market = &snapshot.market_data;
        let rules = &self.rules;

        let liquidity = if market.liquidity_usd >= rules.deep_liquidity_usd {
            10.0
        } else if market.liquidity_usd >= rules.shallow_liquidity_usd {
            5.0
        } else {
            0.0
        };

        // A single reporting source cannot be cross-checked
        let reporting = [
            market.volume_sources.primary,
            market.volume_sources.analytics,
            market.volume_sources.pair_stats,
        ]
        .iter()
        .filter(|v| **v > 0.0)
        .count();
        let divergence = market.volume_sources.divergence();
        let consistency = match reporting {
            0 => 0.0,
            1 => 5.0,
            _ if divergence <= rules.consistent_volume_divergence => 10.0,
            _ if divergence <= rules.max_volume_divergence => 5.0,
            _ => 0.0,
        };

        let larger = market.buy_volume_24h.max(market.sell_volume_24h);
        let ratio = if larger > 0.0 {
            market.buy_volume_24h.min(market.sell_volume_24h) / larger
        } else {
            0.0
        };
        let balance = if larger <= 0.0 {
            0.0
        } else if ratio >= rules.balanced_trade_ratio {
            10.0
        } else if ratio >= rules.fair_trade_ratio {
            5.0
        } else {
            0.0
        };

        CategoryScore::new(
            30.0,
            vec![
                sub_point("Liquidity depth", liquidity, 10.0),
                sub_point("Volume consistency across sources", consistency, 10.0),
                sub_point("Buy/sell ratio balance", balance, 10.0),
            ],
        )
    }

    fn holder_metrics(&self, snapshot: &TokenSnapshot) -> CategoryScore {
        let holders = &snapshot.on_chain_metrics.holders;

        // No holder data at all scores neutral rather than as perfectly spread
        let concentration = if holders.total == 0 {
            0.0
        } else {
            let top10 = holders.top10_percent.clamp(0.0, 100.0);
            (10.0 - top10 / 5.0).clamp(-10.0, 10.0)
        };

        let growth_percent = holders.change.h24.change_percent;
        let growth = if growth_percent > 0.0 {
            (growth_percent * self.rules.growth_points_per_percent).min(10.0)
        } else {
            0.0
        };

        CategoryScore::new(
            20.0,
            vec![
                sub_point("Top 10 holder concentration", round_points(concentration), 10.0),
                sub_point("Holder growth rate", round_points(growth), 10.0),
            ],
        )
    }

    fn social(&self, snapshot: &TokenSnapshot) -> CategoryScore {
        let social = &snapshot.metadata.social;
        CategoryScore::new(
            10.0,
            vec![
                sub_point("Social media presence", if social.twitter.is_some() { 5.0 } else { 0.0 }, 5.0),
                sub_point("Website", if social.website.is_some() { 5.0 } else { 0.0 }, 5.0),
            ],
        )
    }

    /// Multipliers in application order.
    fn risk_flags(&self, snapshot: &TokenSnapshot) -> Vec<RiskFlag> {
        let rules = &self.rules;
        let market = &snapshot.market_data;
        let holders = &snapshot.on_chain_metrics.holders;
        let mut flags = Vec::new();

        if holders.top10_percent > rules.concentration_threshold {
            flags.push(RiskFlag {
                kind: RiskFlagKind::HolderConcentration,
                multiplier: rules.concentration_multiplier,
                reason: format!(
                    "Top 10 holders own {:.2}% of supply (above {}%)",
                    holders.top10_percent, rules.concentration_threshold
                ),
            });
        }

        if market.liquidity_usd < rules.shallow_liquidity_usd {
            flags.push(RiskFlag {
                kind: RiskFlagKind::LowLiquidity,
                multiplier: rules.low_liquidity_multiplier,
                reason: format!(
                    "Liquidity of ${} is below ${}",
                    narrative::format_number(market.liquidity_usd),
                    narrative::format_number(rules.shallow_liquidity_usd)
                ),
            });
        }

        let divergence = market.volume_sources.divergence();
        if divergence > rules.max_volume_divergence {
            flags.push(RiskFlag {
                kind: RiskFlagKind::VolumeDivergence,
                multiplier: rules.volume_divergence_multiplier,
                reason: format!(
                    "Reported 24h volumes differ by {:.0}% across sources",
                    divergence * 100.0
                ),
            });
        }

        if let Some(progress) = market.bonding_progress {
            let still_bonding = progress > 0.0 && progress < 100.0;
            let concentrated = holders.top10_percent > rules.bonding_concentration_threshold;
            let thin = holders.total < rules.bonding_min_holders;
            if still_bonding && (concentrated || thin) {
                flags.push(RiskFlag {
                    kind: RiskFlagKind::SuspiciousBondingCurve,
                    multiplier: rules.bonding_multiplier,
                    reason: format!(
                        "Pump.fun bonding curve at {:.2}% with {} holders and {:.2}% held by top 10",
                        progress, holders.total, holders.top10_percent
                    ),
                });
            }
        }

        flags
    }
}

fn sub_point(label: &str, points: f64, max_points: f64) -> SubPoint {
    SubPoint {
        label: label.to_string(),
        points,
        max_points,
    }
}

fn round_points(points: f64) -> f64 {
    (points * 100.0).round() / 100.0
}

fn clamp_score(raw: f64) -> i32 {
    if !raw.is_finite() {
        return 0;
    }
    (raw.round() as i32).clamp(MIN_SCORE, MAX_SCORE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        HolderChange, HolderMetrics, MarketData, OnChainMetrics, SecurityInfo, SocialLinks,
        TokenMetadata, VolumeSources,
    };

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, 11).unwrap()
    }

    fn healthy_token() -> TokenSnapshot {
        TokenSnapshot {
            address: "So11111111111111111111111111111111111111112".to_string(),
            metadata: TokenMetadata {
                name: "Wrapped SOL".to_string(),
                symbol: "SOL".to_string(),
                decimals: 9,
                total_supply: "1000000".to_string(),
                verified: true,
                social: SocialLinks {
                    twitter: Some("https://x.com/solana".to_string()),
                    website: Some("https://solana.com".to_string()),
                },
                ..TokenMetadata::default()
            },
            market_data: MarketData {
                price: 150.0,
                volume_24h: 1_000_000.0,
                buy_volume_24h: 500_000.0,
                sell_volume_24h: 450_000.0,
                liquidity_usd: 5_000_000.0,
                volume_sources: VolumeSources {
                    primary: 1_000_000.0,
                    analytics: 950_000.0,
                    pair_stats: 900_000.0,
                },
                ..MarketData::default()
            },
            on_chain_metrics: OnChainMetrics {
                holders: HolderMetrics {
                    total: 50_000,
                    top10_percent: 20.0,
                    top50_percent: 35.0,
                    change: crate::models::HolderChanges {
                        h24: HolderChange { change: 500, change_percent: 1.0 },
                        ..Default::default()
                    },
                    ..HolderMetrics::default()
                },
                ..OnChainMetrics::default()
            },
            security: SecurityInfo {
                verified_creator: true,
                contract_verified: true,
                mint_authority_revoked: true,
                warnings: Vec::new(),
            },
            data_gaps: Vec::new(),
        }
    }

    #[test]
    fn test_healthy_token_breakdown() {
        let assessment = Scorer::default().score(&healthy_token(), &[], as_of());

        assert_eq!(assessment.category_breakdown.technical.points, 40.0);
        assert_eq!(assessment.category_breakdown.market_health.points, 30.0);
        // 10 - 20/5 = 6 for concentration, 1 for growth
        assert_eq!(assessment.category_breakdown.holder_metrics.points, 7.0);
        assert_eq!(assessment.category_breakdown.social.points, 10.0);
        assert!(assessment.risk_flags.is_empty());
        assert_eq!(assessment.score, 87);
        assert_eq!(assessment.base_score, 87.0);
    }

    #[test]
    fn test_high_concentration_triggers_multiplier() {
        let mut token = healthy_token();
        token.on_chain_metrics.holders.top10_percent = 85.0;

        let assessment = Scorer::default().score(&token, &[], as_of());
        let flag = assessment
            .risk_flags
            .iter()
            .find(|f| f.kind == RiskFlagKind::HolderConcentration)
            .unwrap();
        assert_eq!(flag.multiplier, 0.7);
        // base: 40 + 30 + (10 - 17 + 1) + 10 = 74, 74 * 0.7 = 51.8
        assert_eq!(assessment.score, 52);
    }

    #[test]
    fn test_compounding_multipliers_stay_in_range() {
        let mut token = healthy_token();
        token.on_chain_metrics.holders.top10_percent = 99.0;
        token.on_chain_metrics.holders.total = 10;
        token.market_data.liquidity_usd = 500.0;
        token.market_data.bonding_progress = Some(30.0);
        token.market_data.volume_sources = VolumeSources {
            primary: 100.0,
            analytics: 0.0,
            pair_stats: 10_000.0,
        };

        let assessment = Scorer::default().score(&token, &[], as_of());
        assert_eq!(assessment.risk_flags.len(), 4);
        assert!(assessment.has_flag(RiskFlagKind::SuspiciousBondingCurve));
        assert!((MIN_SCORE..=MAX_SCORE).contains(&assessment.score));

        let expected = (assessment.base_score * 0.7 * 0.6 * 0.5 * 0.8).round() as i32;
        assert_eq!(assessment.score, expected);
    }

    #[test]
    fn test_score_is_clamped_under_extreme_rules() {
        let rules = RiskRules {
            concentration_multiplier: 50.0,
            ..RiskRules::default()
        };
        let mut token = healthy_token();
        token.on_chain_metrics.holders.top10_percent = 90.0;

        let assessment = Scorer::new(rules).score(&token, &[], as_of());
        assert_eq!(assessment.score, MAX_SCORE);

        let rules = RiskRules {
            low_liquidity_multiplier: -50.0,
            ..RiskRules::default()
        };
        let mut token = healthy_token();
        token.market_data.liquidity_usd = 0.0;
        let assessment = Scorer::new(rules).score(&token, &[], as_of());
        assert_eq!(assessment.score, MIN_SCORE);
    }

    #[test]
    fn test_graduated_bonding_curve_is_not_suspicious() {
        let mut token = healthy_token();
        token.market_data.bonding_progress = Some(100.0);
        token.on_chain_metrics.holders.total = 5;

        let assessment = Scorer::default().score(&token, &[], as_of());
        assert!(!assessment.has_flag(RiskFlagKind::SuspiciousBondingCurve));
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let token = healthy_token();
        let news = vec![NewsArticle {
            title: "SOL rallies".to_string(),
            content: "Solana rallied today.".to_string(),
            link: "https://example.com/sol".to_string(),
            updated_at: "2025-02-11".to_string(),
        }];

        let scorer = Scorer::default();
        assert_eq!(scorer.score(&token, &news, as_of()), scorer.score(&token, &news, as_of()));
    }
}
