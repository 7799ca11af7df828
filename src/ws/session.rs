use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::ws::{Message, WebSocket};
use tokio::sync::broadcast;
use tracing::debug;

use crate::api::health::HealthState;
use crate::chain::MarketGateway;
use crate::stake::{StakeOutcome, StakeWorkflow};
use crate::state::ActivityLog;
use crate::swipe::{SwipeController, SwipeEffect};
use crate::types::{MarketCard, Side, TradeAction, TransactionRecord};
use crate::ws::messages::{parse_client_frame, ClientFrame, ServerFrame, StakeStatus};

/// One connected client's walk through the card deck: a cursor over the
/// current card list, a swipe controller for the active card, and the shared
/// staking workflow for commits. Mirrors the card-stack interaction: the
/// cursor wraps, and a failed or off-chain stake advances like a skip.
pub struct DeckSession<G> {
    cards: Vec<MarketCard>,
    active: usize,
    controller: SwipeController,
    stake: Arc<StakeWorkflow<G>>,
    activity: Arc<ActivityLog>,
}

impl<G: MarketGateway> DeckSession<G> {
    pub fn new(
        cards: Vec<MarketCard>,
        stake: Arc<StakeWorkflow<G>>,
        activity: Arc<ActivityLog>,
    ) -> Self {
        Self {
            cards,
            active: 0,
            controller: SwipeController::new(),
            stake,
            activity,
        }
    }

    pub fn active_card(&self) -> Option<&MarketCard> {
        self.cards.get(self.active)
    }

    fn advance(&mut self) {
        if !self.cards.is_empty() {
            self.active = (self.active + 1) % self.cards.len();
        }
        self.controller.reset();
    }

    /// Adopt a fresh reconcile snapshot, keeping the cursor on the same
    /// question when it survived the refresh.
    pub fn apply_cards(&mut self, fresh: Vec<MarketCard>) {
        let current_id = self.active_card().map(|c| c.id.clone());
        self.cards = fresh;
        self.active = current_id
            .and_then(|id| self.cards.iter().position(|c| c.id == id))
            .unwrap_or(0);
        if self.active >= self.cards.len() {
            self.active = 0;
        }
    }

    fn snapshot(&self) -> ServerFrame {
        ServerFrame::Cards {
            cards: self.cards.clone(),
            active: self.active,
        }
    }

    /// Skip gesture: record it and move on. No chain contact.
    pub fn skip_active(&mut self) -> Option<TransactionRecord> {
        let card = self.active_card()?;
        let record = TransactionRecord {
            question_id: card.id.clone(),
            title: card.title.clone(),
            action: TradeAction::Skip,
            nominal: 0.0,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        self.activity.push(record.clone());
        self.advance();
        Some(record)
    }

    /// Run the staking workflow for the active card. Every outcome except
    /// Busy advances the deck; a failed attempt behaves as a skip.
    pub async fn stake_active(&mut self, side: Side, nominal: f64) -> StakeOutcome {
        let Some(card) = self.active_card().cloned() else {
            return StakeOutcome::SkippedOffChain;
        };
        let outcome = self.stake.place(&card, side, nominal).await;
        if !matches!(outcome, StakeOutcome::Busy) {
            self.advance();
        }
        outcome
    }

    /// Drive the session over a live socket until the client disconnects.
    pub async fn run(
        mut self,
        mut socket: WebSocket,
        mut updates: broadcast::Receiver<Vec<MarketCard>>,
        health: Arc<HealthState>,
    ) {
        health.session_opened();

        if !send(&mut socket, &self.snapshot()).await {
            health.session_closed();
            return;
        }

        loop {
            tokio::select! {
                msg = socket.recv() => {
                    let text = match msg {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => {
                            debug!("Deck socket error: {e}");
                            break;
                        }
                    };
                    let Some(frame) = parse_client_frame(&text) else {
                        continue;
                    };
                    if !self.handle_frame(&mut socket, frame).await {
                        break;
                    }
                }
                update = updates.recv() => {
                    match update {
                        Ok(cards) => {
                            self.apply_cards(cards);
                            if !send(&mut socket, &self.snapshot()).await {
                                break;
                            }
                        }
                        // Dropped a few snapshots; the next one catches up.
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }

        health.session_closed();
    }

    /// Returns false when the socket went away mid-interaction.
    async fn handle_frame(&mut self, socket: &mut WebSocket, frame: ClientFrame) -> bool {
        match frame {
            ClientFrame::Tap => {
                if self.controller.on_tap(now_ms()) == SwipeEffect::OpenDetail {
                    if let Some(card) = self.active_card().cloned() {
                        return send(socket, &ServerFrame::Detail { card }).await;
                    }
                }
                true
            }
            ClientFrame::Release { dx, dy, nominal } => {
                match self.controller.on_release(dx, dy) {
                    SwipeEffect::None => true,
                    SwipeEffect::Armed(_) | SwipeEffect::Cancelled => {
                        let state = self.controller.state();
                        send(socket, &ServerFrame::CardState { state }).await
                    }
                    SwipeEffect::OpenDetail => true,
                    SwipeEffect::Skip => {
                        let record = self.skip_active();
                        send(
                            socket,
                            &ServerFrame::StakeResult {
                                status: StakeStatus::Skipped,
                                record,
                                message: None,
                            },
                        )
                        .await
                            && send(socket, &self.snapshot()).await
                    }
                    SwipeEffect::Commit(side) => {
                        if !send(socket, &ServerFrame::Processing { active: true }).await {
                            return false;
                        }
                        let outcome = self.stake_active(side, nominal).await;
                        let result = match outcome {
                            StakeOutcome::Staked(record) => ServerFrame::StakeResult {
                                status: StakeStatus::Staked,
                                record: Some(record),
                                message: None,
                            },
                            StakeOutcome::SkippedOffChain => ServerFrame::StakeResult {
                                status: StakeStatus::Skipped,
                                record: None,
                                message: Some(
                                    "This market is not live on-chain yet".to_string(),
                                ),
                            },
                            StakeOutcome::Busy => ServerFrame::StakeResult {
                                status: StakeStatus::Skipped,
                                record: None,
                                message: Some("Another stake is in flight".to_string()),
                            },
                            StakeOutcome::Failed(reason) => ServerFrame::StakeResult {
                                status: StakeStatus::Failed,
                                record: None,
                                message: Some(reason),
                            },
                        };
                        send(socket, &ServerFrame::Processing { active: false }).await
                            && send(socket, &result).await
                            && send(socket, &self.snapshot()).await
                    }
                }
            }
        }
    }
}

async fn send(socket: &mut WebSocket, frame: &ServerFrame) -> bool {
    match serde_json::to_string(frame) {
        Ok(text) => socket.send(Message::Text(text)).await.is_ok(),
        Err(e) => {
            debug!("Frame serialization failed: {e}");
            true
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, Result};
    use crate::types::{ChainMarket, MarketPhase};
    use ethers::types::{H256, U256};
    use std::sync::Mutex;

    struct MockGateway {
        fail_stake: bool,
        stakes: Mutex<u32>,
    }

    impl MockGateway {
        fn new() -> Self {
            Self {
                fail_stake: false,
                stakes: Mutex::new(0),
            }
        }
    }

    impl MarketGateway for MockGateway {
        async fn get_markets(&self, ids: &[u64]) -> Vec<Option<ChainMarket>> {
            ids.iter().map(|_| None).collect()
        }

        async fn get_allowance(&self) -> Result<U256> {
            Ok(U256::max_value())
        }

        async fn approve_unlimited(&self) -> Result<H256> {
            Ok(H256::zero())
        }

        async fn stake(&self, _market_id: u64, _side: Side, _amount: U256) -> Result<H256> {
            *self.stakes.lock().unwrap() += 1;
            if self.fail_stake {
                return Err(AppError::TransactionFailed("reverted".to_string()));
            }
            Ok(H256::zero())
        }
    }

    fn card(id: &str, market_id: Option<u64>) -> MarketCard {
        MarketCard {
            id: id.to_string(),
            title: format!("card {id}"),
            description: String::new(),
            image: String::new(),
            category: "General".to_string(),
            symbol: "GENERAL".to_string(),
            is_new: false,
            market_id,
            yes_pool: "0".to_string(),
            no_pool: "0".to_string(),
            volume: "$0".to_string(),
            resolved: false,
            winning_side: None,
            phase: MarketPhase::Upcoming,
            yes_percentage: 50,
            no_percentage: 50,
            end_date: "2025-01-01".to_string(),
            end_time: "12:00".to_string(),
            created_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    fn session(
        cards: Vec<MarketCard>,
        gateway: MockGateway,
    ) -> (DeckSession<MockGateway>, Arc<ActivityLog>) {
        let activity = ActivityLog::new();
        let stake = Arc::new(StakeWorkflow::new(Arc::new(gateway), Arc::clone(&activity)));
        (
            DeckSession::new(cards, stake, Arc::clone(&activity)),
            activity,
        )
    }

    #[tokio::test]
    async fn successful_stake_advances_the_deck() {
        let (mut s, activity) =
            session(vec![card("a", Some(1)), card("b", Some(2))], MockGateway::new());
        let outcome = s.stake_active(Side::Yes, 10.0).await;
        assert!(matches!(outcome, StakeOutcome::Staked(_)));
        assert_eq!(s.active_card().unwrap().id, "b");
        assert_eq!(activity.len(), 1);
    }

    #[tokio::test]
    async fn failed_stake_advances_like_a_skip() {
        let mut gateway = MockGateway::new();
        gateway.fail_stake = true;
        let (mut s, activity) =
            session(vec![card("a", Some(1)), card("b", Some(2))], gateway);
        let outcome = s.stake_active(Side::No, 10.0).await;
        assert!(matches!(outcome, StakeOutcome::Failed(_)));
        assert_eq!(s.active_card().unwrap().id, "b");
        assert_eq!(activity.len(), 0);
    }

    #[tokio::test]
    async fn off_chain_card_advances_without_chain_contact() {
        let gateway = MockGateway::new();
        let (mut s, _) = session(vec![card("a", None), card("b", Some(2))], gateway);
        let outcome = s.stake_active(Side::Yes, 10.0).await;
        assert!(matches!(outcome, StakeOutcome::SkippedOffChain));
        assert_eq!(s.active_card().unwrap().id, "b");
    }

    #[tokio::test]
    async fn skip_records_and_wraps() {
        let (mut s, activity) =
            session(vec![card("a", None), card("b", None)], MockGateway::new());
        s.skip_active().unwrap();
        s.skip_active().unwrap();
        // Wrapped back to the first card.
        assert_eq!(s.active_card().unwrap().id, "a");
        let actions: Vec<_> = activity.list().iter().map(|r| r.action).collect();
        assert_eq!(actions, vec![TradeAction::Skip, TradeAction::Skip]);
    }

    #[tokio::test]
    async fn snapshot_refresh_keeps_cursor_on_same_question() {
        let (mut s, _) = session(
            vec![card("a", None), card("b", None), card("c", None)],
            MockGateway::new(),
        );
        s.skip_active();
        assert_eq!(s.active_card().unwrap().id, "b");

        // "a" was moderated away; "b" survived at a new position.
        s.apply_cards(vec![card("b", Some(5)), card("c", None)]);
        assert_eq!(s.active_card().unwrap().id, "b");

        // The active question vanished entirely, so the cursor resets.
        s.apply_cards(vec![card("c", None)]);
        assert_eq!(s.active_card().unwrap().id, "c");
    }
}
