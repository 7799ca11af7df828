use ethers::types::U256;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Question — off-chain moderated record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionStatus {
    Pending,
    Approved,
    Rejected,
}

impl QuestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionStatus::Pending => "pending",
            QuestionStatus::Approved => "approved",
            QuestionStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(QuestionStatus::Pending),
            "approved" => Some(QuestionStatus::Approved),
            "rejected" => Some(QuestionStatus::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for QuestionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Listing filter for the moderation console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    All,
    Pending,
    Approved,
    Rejected,
}

impl StatusFilter {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "all" => Some(StatusFilter::All),
            "pending" => Some(StatusFilter::Pending),
            "approved" => Some(StatusFilter::Approved),
            "rejected" => Some(StatusFilter::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Question {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    /// Scheduled close, kept as separate date/time display strings.
    pub end_date: String,
    pub end_time: String,
    pub category: String,
    /// Short display symbol derived from the category at submission time.
    pub symbol: String,
    pub photo_url: Option<String>,
    pub status: QuestionStatus,
    /// Display fallbacks until the market has on-chain volume. Sum to 100.
    pub yes_percentage: u8,
    pub no_percentage: u8,
    pub volume: String,
    pub is_new: bool,
    /// On-chain market identifier; None until deployed ("upcoming").
    pub market_id: Option<u64>,
    pub created_at: String,
    pub updated_at: String,
}

// ---------------------------------------------------------------------------
// Market — chain-derived, recomputed on every poll
// ---------------------------------------------------------------------------

/// Raw contract state for one market id, as read in a single poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainMarket {
    pub question: String,
    /// Unix seconds at which staking closes.
    pub end_time: u64,
    pub yes_pool: U256,
    pub no_pool: U256,
    pub resolved: bool,
    /// 0 = unresolved, 1 = YES, 2 = NO.
    pub winning_side: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketPhase {
    /// Not deployed on-chain (or the read failed): display only, no staking.
    Upcoming,
    Live,
    /// End time passed but the market is not yet resolved.
    AwaitingResolution,
    Resolved,
}

impl std::fmt::Display for MarketPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MarketPhase::Upcoming => "upcoming",
            MarketPhase::Live => "live",
            MarketPhase::AwaitingResolution => "awaiting_resolution",
            MarketPhase::Resolved => "resolved",
        };
        write!(f, "{s}")
    }
}

/// The side of a binary market, using the contract's encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Yes,
    No,
}

impl Side {
    /// Contract encoding: YES = 1, NO = 2.
    pub fn as_u8(&self) -> u8 {
        match self {
            Side::Yes => 1,
            Side::No => 2,
        }
    }
}

// ---------------------------------------------------------------------------
// MarketCard — the merged view model the UI renders
// ---------------------------------------------------------------------------

/// Union of a question's descriptive fields and its market's derived state,
/// keyed by the question's stable id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketCard {
    pub id: String,
    pub title: String,
    pub description: String,
    pub image: String,
    pub category: String,
    pub symbol: String,
    pub is_new: bool,
    pub market_id: Option<u64>,
    /// Pool sizes in base units, decimal strings.
    pub yes_pool: String,
    pub no_pool: String,
    pub volume: String,
    pub resolved: bool,
    pub winning_side: Option<u8>,
    pub phase: MarketPhase,
    pub yes_percentage: u8,
    pub no_percentage: u8,
    pub end_date: String,
    pub end_time: String,
    pub created_at: String,
}

// ---------------------------------------------------------------------------
// Activity — ephemeral, in-memory only
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeAction {
    Yes,
    No,
    Skip,
}

impl From<Side> for TradeAction {
    fn from(side: Side) -> Self {
        match side {
            Side::Yes => TradeAction::Yes,
            Side::No => TradeAction::No,
        }
    }
}

/// One entry in the session activity view. Not persisted anywhere.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionRecord {
    pub question_id: String,
    pub title: String,
    pub action: TradeAction,
    pub nominal: f64,
    pub timestamp: String,
}
