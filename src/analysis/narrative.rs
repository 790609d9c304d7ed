//! Templated text built from a scored snapshot: the narrative sections of a
//! [`RiskAssessment`] and the system prompt handed to the reply generator.
//! Everything here is deterministic given its inputs.

use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::{CategoryScore, NarrativeSection, NewsArticle, RiskAssessment, TokenSnapshot};

pub const OVERVIEW: &str = "Overview";
pub const KEY_METRICS: &str = "Key Metrics";
pub const RISK_MATRIX: &str = "Risk Matrix";
pub const SOCIAL_PRESENCE: &str = "Social Presence";
pub const DEPLOYMENT_METHOD: &str = "Deployment Method";
pub const MARKET_CONTEXT: &str = "Market Context";

/// Formats large numbers with M/K suffixes and two decimals.
pub fn format_number(num: f64) -> String {
    if num >= 1_000_000.0 {
        format!("{:.2}M", num / 1_000_000.0)
    } else if num >= 1_000.0 {
        format!("{:.2}K", num / 1_000.0)
    } else {
        format!("{:.2}", num)
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

fn signed(value: f64) -> String {
    if value > 0.0 {
        format!("+{:.2}", value)
    } else {
        format!("{:.2}", value)
    }
}

pub fn sections(
    snapshot: &TokenSnapshot,
    assessment: &RiskAssessment,
    news: &[NewsArticle],
) -> Vec<NarrativeSection> {
    let mut sections = vec![
        section(OVERVIEW, overview(snapshot, assessment)),
        section(KEY_METRICS, key_metrics(snapshot)),
        section(RISK_MATRIX, risk_matrix(snapshot, assessment)),
        section(SOCIAL_PRESENCE, social_presence(snapshot)),
        section(DEPLOYMENT_METHOD, deployment_method(snapshot)),
    ];
    if !news.is_empty() {
        sections.push(section(MARKET_CONTEXT, market_context(news)));
    }
    sections
}

fn section(title: &str, body: String) -> NarrativeSection {
    NarrativeSection {
        title: title.to_string(),
        body,
    }
}

fn overview(snapshot: &TokenSnapshot, assessment: &RiskAssessment) -> String {
    let metadata = &snapshot.metadata;
    let mut body = format!(
        "{} ({}) has a ForgeScore of {} ({}) as of {}.\nAddress: {}",
        metadata.name,
        metadata.symbol,
        assessment.score,
        assessment.rating(),
        format_date(assessment.as_of),
        snapshot.address
    );
    if let Some(description) = &metadata.description {
        let _ = write!(body, "\nDescription: {}", description);
    }
    if let Some(creator) = &metadata.creator {
        let _ = write!(body, "\nCreator: {}", creator);
    }
    if !snapshot.data_gaps.is_empty() {
        let missing: Vec<&str> = snapshot.data_gaps.iter().map(|g| g.provider.as_str()).collect();
        let _ = write!(body, "\nData unavailable from: {}", missing.join(", "));
    }
    body
}

fn key_metrics(snapshot: &TokenSnapshot) -> String {
    let market = &snapshot.market_data;
    let holders = &snapshot.on_chain_metrics.holders;
    let activity = &snapshot.on_chain_metrics.activity;

    let mut lines = vec![
        format!("- Decimals: {}", snapshot.metadata.decimals),
        format!("- Total Supply: {}", snapshot.metadata.total_supply),
        format!("- Price: ${:.6}", market.price),
        format!("- 24h Change: {}%", signed(market.price_change_24h)),
        format!("- Volume (24h): ${}", format_number(market.volume_24h)),
        format!("- Buy Volume (24h): ${}", format_number(market.buy_volume_24h)),
        format!("- Sell Volume (24h): ${}", format_number(market.sell_volume_24h)),
        format!(
            "- Trades (24h): {} buys / {} sells",
            market.total_buys_24h, market.total_sells_24h
        ),
        format!(
            "- Unique Traders (24h): {} buyers / {} sellers",
            market.unique_buyers_24h, market.unique_sellers_24h
        ),
        format!("- Liquidity: ${}", format_number(market.liquidity_usd)),
        format!("- FDV: ${}", format_number(market.fully_diluted_valuation)),
    ];
    if let Some(rank) = market.market_cap_rank {
        lines.push(format!("- Market Cap Rank: #{}", rank));
    }
    lines.push(format!(
        "- Active Pairs: {} across {} DEXes",
        market.dex.active_pairs, market.dex.active_dexes
    ));
    lines.push(format!(
        "- Volume by Source (24h): Solscan ${}, Moralis ${}, Pair Stats ${}",
        format_number(market.volume_sources.primary),
        format_number(market.volume_sources.analytics),
        format_number(market.volume_sources.pair_stats)
    ));
    lines.push(format!("- Total Holders: {}", holders.total));
    lines.push(format!(
        "- Top 10 / Top 50 Holders: {:.2}% / {:.2}% of supply",
        holders.top10_percent, holders.top50_percent
    ));
    let change = &holders.change;
    lines.push(format!(
        "- Holder Change: 5m {} ({}%), 1h {} ({}%), 6h {} ({}%), 24h {} ({}%)",
        change.m5.change,
        signed(change.m5.change_percent),
        change.h1.change,
        signed(change.h1.change_percent),
        change.h6.change,
        signed(change.h6.change_percent),
        change.h24.change,
        signed(change.h24.change_percent)
    ));
    let d = &holders.distribution;
    lines.push(format!(
        "- Distribution: {} whales, {} sharks, {} dolphins, {} fish, {} octopus, {} crabs, {} shrimps",
        d.whales, d.sharks, d.dolphins, d.fish, d.octopus, d.crabs, d.shrimps
    ));
    let a = &holders.acquisition;
    lines.push(format!(
        "- Holder Acquisition: {} via swap, {} via transfer, {} via airdrop",
        a.swap, a.transfer, a.airdrop
    ));
    lines.push(format!("- Transactions (24h): {}", activity.transactions_24h));
    lines.push(format!("- New Holders (24h): {}", activity.new_holders_24h));

    lines.join("\n")
}

fn category_line(name: &str, category: &CategoryScore) -> String {
    let mut line = format!("{}: {:.2}/{:.0}", name, category.points, category.max_points);
    for sub in &category.sub_points {
        let _ = write!(line, "\n  - {}: {:.2}/{:.0}", sub.label, sub.points, sub.max_points);
    }
    line
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn risk_matrix(snapshot: &TokenSnapshot, assessment: &RiskAssessment) -> String {
    let breakdown = &assessment.category_breakdown;
    let mut lines = vec![
        category_line("Technical", &breakdown.technical),
        category_line("Market Health", &breakdown.market_health),
        category_line("Holder Metrics", &breakdown.holder_metrics),
        category_line("Social & Community", &breakdown.social),
        format!("Base score: {:.2}", assessment.base_score),
    ];

    if assessment.risk_flags.is_empty() {
        lines.push("Risk multipliers: none triggered".to_string());
    } else {
        lines.push("Risk multipliers:".to_string());
        for flag in &assessment.risk_flags {
            lines.push(format!("  - x{} {}", flag.multiplier, flag.reason));
        }
    }

    let security = &snapshot.security;
    lines.push(format!(
        "Contract verified: {}. Creator verified: {}. Mint authority revoked: {}.",
        yes_no(security.contract_verified),
        yes_no(security.verified_creator),
        yes_no(security.mint_authority_revoked)
    ));
    for warning in &security.warnings {
        lines.push(format!("Warning: {}", warning));
    }

    lines.join("\n")
}

fn social_presence(snapshot: &TokenSnapshot) -> String {
    let social = &snapshot.metadata.social;
    if social.is_empty() {
        return "No Twitter account or website is linked in the token metadata.".to_string();
    }

    let mut lines = Vec::new();
    match &social.twitter {
        Some(twitter) => lines.push(format!("- Twitter: {}", twitter)),
        None => lines.push("- Twitter: not linked".to_string()),
    }
    match &social.website {
        Some(website) => lines.push(format!("- Website: {}", website)),
        None => lines.push("- Website: not linked".to_string()),
    }
    lines.join("\n")
}

fn deployment_method(snapshot: &TokenSnapshot) -> String {
    match snapshot.market_data.bonding_progress {
        Some(progress) if progress >= 100.0 => {
            "Deployed via pump.fun and graduated from the bonding curve (100.00%).".to_string()
        }
        Some(progress) if progress > 0.0 => format!(
            "Deployed via pump.fun. Bonding curve progress: {:.2}%.",
            progress
        ),
        Some(_) => "A pump.fun bonding curve exists but has not progressed (0.00%).".to_string(),
        None => "No bonding curve found. The token was not deployed via pump.fun, or its status is unknown."
            .to_string(),
    }
}

fn market_context(news: &[NewsArticle]) -> String {
    news.iter()
        .map(|article| {
            format!(
                "- {} ({})\n  {}\n  Source: {}",
                article.title, article.updated_at, article.content, article.link
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// System prompt grounding the reply: the assessment narrative plus the
/// current market status text. `today` is the date the reply is generated,
/// which differs from `assessment.as_of` for cached or restored analyses.
pub fn system_prompt(assessment: &RiskAssessment, market_status: &str, today: NaiveDate) -> String {
    let mut prompt = format!(
        "Today is {}.\n\
         You are a Solana SPL token analysis expert. Using only the data below, explain the \
         token's technical profile, liquidity and market health, holder concentration (a single \
         contract, bridge or exchange wallet can legitimately hold most of a supply), security \
         and trading considerations.\n\
         Start with a one-sentence overview, then cover the key metrics in bullet points and the \
         two or three most important findings. State the ForgeScore exactly as given without \
         recalculating it. Mention that the answer is AI-generated and is not financial advice.\n",
        format_date(today)
    );

    for section in &assessment.narrative_sections {
        let _ = write!(prompt, "\n**{}**:\n{}\n", section.title, section.body);
    }

    let _ = write!(prompt, "\n**Current Market Prices**:\n{}\n", market_status);
    prompt
}
