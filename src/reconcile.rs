use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use ethers::types::U256;
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, warn};

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::chain::MarketGateway;
use crate::config::{POLL_INTERVAL_SECS, TOKEN_DECIMALS};
use crate::state::CardStore;
use crate::types::{ChainMarket, MarketCard, MarketPhase, Question};

const PLACEHOLDER_IMAGE: &str = "https://placehold.co/600x400/png?text=No+Image";

// ---------------------------------------------------------------------------
// Pure merge — same inputs, same cards
// ---------------------------------------------------------------------------

/// Derived lifecycle phase. A question with no chain result is always
/// Upcoming, whether it was never deployed or its read failed this poll.
pub fn derive_phase(chain: Option<&ChainMarket>, now_secs: u64) -> MarketPhase {
    match chain {
        None => MarketPhase::Upcoming,
        Some(m) if m.resolved => MarketPhase::Resolved,
        Some(m) if m.end_time < now_secs => MarketPhase::AwaitingResolution,
        Some(_) => MarketPhase::Live,
    }
}

/// Percentage split from the pools, falling back to the question's stored
/// values while the pools are empty. Sides always sum to 100.
pub fn pool_percentages(yes_pool: U256, no_pool: U256, fallback: (u8, u8)) -> (u8, u8) {
    let total = yes_pool + no_pool;
    if total.is_zero() {
        return fallback;
    }
    let yes = ((yes_pool * U256::from(100u64)) + total / U256::from(2u64)) / total;
    let yes = yes.low_u64().min(100) as u8;
    (yes, 100 - yes)
}

/// Whole-token volume display for a combined pool size in base units.
pub fn format_volume(total: U256) -> String {
    let whole = total / U256::exp10(TOKEN_DECIMALS as usize);
    format!("{whole} IDRX")
}

/// Join questions with their chain reads into the card list the UI renders.
///
/// `chain` is keyed by market id; an absent entry means the market is not
/// deployed or its read failed, and the card keeps its stored fallbacks.
pub fn merge_cards(
    questions: &[Question],
    chain: &HashMap<u64, ChainMarket>,
    now_secs: u64,
) -> Vec<MarketCard> {
    questions
        .iter()
        .map(|q| {
            let market = q.market_id.and_then(|id| chain.get(&id));
            let (yes_pool, no_pool) = market
                .map(|m| (m.yes_pool, m.no_pool))
                .unwrap_or((U256::zero(), U256::zero()));
            let total = yes_pool + no_pool;
            let (yes_pct, no_pct) =
                pool_percentages(yes_pool, no_pool, (q.yes_percentage, q.no_percentage));
            let phase = derive_phase(market, now_secs);
            let resolved = market.map(|m| m.resolved).unwrap_or(false);

            MarketCard {
                id: q.id.clone(),
                title: q.title.clone(),
                description: q
                    .description
                    .clone()
                    .unwrap_or_else(|| q.title.clone()),
                image: q
                    .photo_url
                    .clone()
                    .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string()),
                category: q.category.clone(),
                symbol: q.symbol.clone(),
                is_new: q.is_new,
                market_id: q.market_id,
                yes_pool: yes_pool.to_string(),
                no_pool: no_pool.to_string(),
                volume: if total.is_zero() {
                    q.volume.clone()
                } else {
                    format_volume(total)
                },
                resolved,
                winning_side: market.filter(|m| m.resolved).map(|m| m.winning_side),
                phase,
                yes_percentage: yes_pct,
                no_percentage: no_pct,
                end_date: q.end_date.clone(),
                end_time: q.end_time.clone(),
                created_at: q.created_at.clone(),
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Reconciler — background poll loop
// ---------------------------------------------------------------------------

/// Joins the approved question set with fresh contract reads on a fixed
/// timer. The question snapshot is loaded once at startup; only the
/// chain-derived fields are refreshed by the loop.
pub struct Reconciler<G> {
    gateway: Arc<G>,
    questions: Vec<Question>,
    cards: Arc<CardStore>,
    updates_tx: broadcast::Sender<Vec<MarketCard>>,
    latency: Arc<LatencyStats>,
    health: Arc<HealthState>,
}

impl<G: MarketGateway> Reconciler<G> {
    pub fn new(
        gateway: Arc<G>,
        questions: Vec<Question>,
        cards: Arc<CardStore>,
        updates_tx: broadcast::Sender<Vec<MarketCard>>,
        latency: Arc<LatencyStats>,
        health: Arc<HealthState>,
    ) -> Self {
        Self {
            gateway,
            questions,
            cards,
            updates_tx,
            latency,
            health,
        }
    }

    pub async fn run(self) {
        let mut ticker = interval(Duration::from_secs(POLL_INTERVAL_SECS));
        // First tick fires immediately and hydrates the store before the
        // API serves its first request.
        loop {
            ticker.tick().await;
            self.poll_once().await;
        }
    }

    async fn poll_once(&self) {
        let ids: Vec<u64> = self.questions.iter().filter_map(|q| q.market_id).collect();

        let started = Instant::now();
        let results = self.gateway.get_markets(&ids).await;
        self.latency.record(started.elapsed());

        // Results are position-aligned with ids; zipping is what keeps a
        // failed item from shifting another item's data onto the wrong card.
        let chain: HashMap<u64, ChainMarket> = ids
            .iter()
            .zip(results)
            .filter_map(|(&id, market)| market.map(|m| (id, m)))
            .collect();
        let failed = ids.len() - chain.len();
        if failed > 0 {
            warn!(failed, total = ids.len(), "Chain reads missing this poll");
        }

        let cards = merge_cards(&self.questions, &chain, now_secs());
        self.cards.replace_all(cards.clone());
        self.health.record_poll(now_ns(), failed as u64);

        // No receivers yet is fine; sessions resubscribe on connect.
        let _ = self.updates_tx.send(cards);

        debug!(
            cards = self.questions.len(),
            on_chain = chain.len(),
            "Reconcile poll complete"
        );
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QuestionStatus;

    fn question(id: &str, market_id: Option<u64>) -> Question {
        Question {
            id: id.to_string(),
            title: format!("question {id}"),
            description: None,
            end_date: "2025-01-01".to_string(),
            end_time: "12:00".to_string(),
            category: "Weather".to_string(),
            symbol: "WEATHER".to_string(),
            photo_url: None,
            status: QuestionStatus::Approved,
            yes_percentage: 50,
            no_percentage: 50,
            volume: "$0".to_string(),
            is_new: true,
            market_id,
            created_at: "2025-01-01T00:00:00Z".to_string(),
            updated_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    fn chain_market(yes: u64, no: u64, end_time: u64, resolved: bool) -> ChainMarket {
        ChainMarket {
            question: "chain copy".to_string(),
            end_time,
            yes_pool: U256::from(yes),
            no_pool: U256::from(no),
            resolved,
            winning_side: if resolved { 1 } else { 0 },
        }
    }

    #[test]
    fn percentages_follow_pools() {
        let (yes, no) = pool_percentages(U256::from(30u64), U256::from(70u64), (50, 50));
        assert_eq!((yes, no), (30, 70));
    }

    #[test]
    fn empty_pools_keep_stored_fallback() {
        let (yes, no) = pool_percentages(U256::zero(), U256::zero(), (62, 38));
        assert_eq!((yes, no), (62, 38));
    }

    #[test]
    fn percentages_always_sum_to_hundred() {
        let (yes, no) = pool_percentages(U256::from(1u64), U256::from(2u64), (50, 50));
        assert_eq!(yes + no, 100);
        assert_eq!(yes, 33);
    }

    #[test]
    fn phase_derivation() {
        let now = 1_000_000;
        assert_eq!(derive_phase(None, now), MarketPhase::Upcoming);
        let live = chain_market(0, 0, now + 100, false);
        assert_eq!(derive_phase(Some(&live), now), MarketPhase::Live);
        let ended = chain_market(0, 0, now - 100, false);
        assert_eq!(
            derive_phase(Some(&ended), now),
            MarketPhase::AwaitingResolution
        );
        let resolved = chain_market(0, 0, now - 100, true);
        assert_eq!(derive_phase(Some(&resolved), now), MarketPhase::Resolved);
    }

    #[test]
    fn undeployed_question_is_upcoming_with_fallbacks() {
        let questions = vec![question("a", None)];
        let cards = merge_cards(&questions, &HashMap::new(), 1_000);
        assert_eq!(cards[0].phase, MarketPhase::Upcoming);
        assert_eq!(cards[0].yes_percentage, 50);
        assert_eq!(cards[0].volume, "$0");
    }

    #[test]
    fn failed_chain_read_falls_back_to_upcoming() {
        // market_id present but no chain entry: read failed this poll
        let questions = vec![question("a", Some(9))];
        let cards = merge_cards(&questions, &HashMap::new(), 1_000);
        assert_eq!(cards[0].phase, MarketPhase::Upcoming);
        assert_eq!(cards[0].yes_percentage, 50);
    }

    #[test]
    fn merged_card_carries_chain_state() {
        let questions = vec![question("a", Some(3))];
        let mut chain = HashMap::new();
        chain.insert(3, chain_market(30, 70, 2_000, false));
        let cards = merge_cards(&questions, &chain, 1_000);
        assert_eq!(cards[0].phase, MarketPhase::Live);
        assert_eq!(cards[0].yes_percentage, 30);
        assert_eq!(cards[0].no_percentage, 70);
        assert_eq!(cards[0].yes_pool, "30");
    }

    #[test]
    fn partial_failure_does_not_misattribute_results() {
        // Two deployed questions; only the second one's read succeeded. The
        // surviving result must land on the card that owns its market id.
        let questions = vec![question("a", Some(1)), question("b", Some(2))];
        let mut chain = HashMap::new();
        chain.insert(2, chain_market(10, 90, 2_000, false));
        let cards = merge_cards(&questions, &chain, 1_000);

        let a = cards.iter().find(|c| c.id == "a").unwrap();
        let b = cards.iter().find(|c| c.id == "b").unwrap();
        assert_eq!(a.phase, MarketPhase::Upcoming);
        assert_eq!(a.yes_percentage, 50);
        assert_eq!(b.phase, MarketPhase::Live);
        assert_eq!(b.yes_percentage, 10);
    }

    #[test]
    fn merge_is_idempotent() {
        let questions = vec![question("a", Some(1)), question("b", None)];
        let mut chain = HashMap::new();
        chain.insert(1, chain_market(40, 60, 2_000, false));
        let first = merge_cards(&questions, &chain, 1_000);
        let second = merge_cards(&questions, &chain, 1_000);
        assert_eq!(first, second);
    }

    #[test]
    fn resolved_market_exposes_winning_side() {
        let questions = vec![question("a", Some(1))];
        let mut chain = HashMap::new();
        chain.insert(1, chain_market(40, 60, 500, true));
        let cards = merge_cards(&questions, &chain, 1_000);
        assert_eq!(cards[0].phase, MarketPhase::Resolved);
        assert_eq!(cards[0].winning_side, Some(1));
    }

    #[test]
    fn volume_formats_whole_tokens() {
        let total = U256::from(150u64) * U256::exp10(18);
        assert_eq!(format_volume(total), "150 IDRX");
    }
}
