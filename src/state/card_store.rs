use std::sync::Arc;

use dashmap::DashMap;

use crate::types::MarketCard;

/// In-memory store of the merged market cards, keyed by question id.
/// The reconciler is the only writer; API handlers and deck sessions read
/// ordered snapshots.
pub struct CardStore {
    cards: DashMap<String, MarketCard>,
}

impl CardStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            cards: DashMap::new(),
        })
    }

    /// Swap in a freshly merged card list. Cards whose question disappeared
    /// from the merge input are dropped.
    pub fn replace_all(&self, fresh: Vec<MarketCard>) {
        let keep: std::collections::HashSet<String> =
            fresh.iter().map(|c| c.id.clone()).collect();
        self.cards.retain(|id, _| keep.contains(id));
        for card in fresh {
            self.cards.insert(card.id.clone(), card);
        }
    }

    pub fn get(&self, id: &str) -> Option<MarketCard> {
        self.cards.get(id).map(|c| c.clone())
    }

    /// Ordered snapshot: newest question first, id as the tiebreak so the
    /// same inputs always list identically.
    pub fn list(&self) -> Vec<MarketCard> {
        let mut cards: Vec<MarketCard> =
            self.cards.iter().map(|e| e.value().clone()).collect();
        cards.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MarketPhase;

    fn card(id: &str, created_at: &str) -> MarketCard {
        MarketCard {
            id: id.to_string(),
            title: format!("card {id}"),
            description: String::new(),
            image: String::new(),
            category: "General".to_string(),
            symbol: "GENERAL".to_string(),
            is_new: false,
            market_id: None,
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
            created_at: created_at.to_string(),
        }
    }

    #[test]
    fn replace_all_drops_stale_cards() {
        let store = CardStore::new();
        store.replace_all(vec![card("a", "2025-01-01T00:00:00Z"), card("b", "2025-01-02T00:00:00Z")]);
        assert_eq!(store.len(), 2);

        store.replace_all(vec![card("b", "2025-01-02T00:00:00Z")]);
        assert_eq!(store.len(), 1);
        assert!(store.get("a").is_none());
        assert!(store.get("b").is_some());
    }

    #[test]
    fn list_is_newest_first() {
        let store = CardStore::new();
        store.replace_all(vec![
            card("old", "2025-01-01T00:00:00Z"),
            card("new", "2025-03-01T00:00:00Z"),
            card("mid", "2025-02-01T00:00:00Z"),
        ]);
        let ids: Vec<String> = store.list().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }
}
