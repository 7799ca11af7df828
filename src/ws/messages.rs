use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::swipe::CardState;
use crate::types::{MarketCard, TransactionRecord};

/// One frame from the mobile client. The client streams gesture endpoints,
/// not raw touch moves; drag animation stays client-side.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Finger lifted after dragging (`dx`, `dy`) px from the touch origin.
    /// `nominal` is the stake amount currently entered on the card.
    Release {
        dx: f64,
        dy: f64,
        #[serde(default)]
        nominal: f64,
    },
    Tap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StakeStatus {
    Staked,
    /// Advanced without a transaction: skip gesture, off-chain card, or a
    /// failed attempt (which behaves as a skip).
    Skipped,
    Failed,
}

/// One frame to the client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Full card snapshot plus the session's active index. Sent on connect
    /// and after every reconcile poll.
    Cards {
        cards: Vec<MarketCard>,
        active: usize,
    },
    /// The active card's interaction state changed (armed or cancelled).
    CardState { state: CardState },
    /// A stake is in flight; the client blocks input while active.
    Processing { active: bool },
    StakeResult {
        status: StakeStatus,
        record: Option<TransactionRecord>,
        message: Option<String>,
    },
    /// Response to a double tap.
    Detail { card: MarketCard },
}

/// Parse one client text frame. Malformed frames are dropped with a warning
/// rather than closing the session.
pub fn parse_client_frame(raw: &str) -> Option<ClientFrame> {
    match serde_json::from_str::<ClientFrame>(raw) {
        Ok(frame) => Some(frame),
        Err(e) => {
            let sample = &raw[..raw.len().min(200)];
            warn!("Unrecognized client frame ({e}): {sample}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_release_frame() {
        let frame =
            parse_client_frame(r#"{"type":"release","dx":120.5,"dy":-3.0,"nominal":100}"#)
                .unwrap();
        match frame {
            ClientFrame::Release { dx, nominal, .. } => {
                assert!((dx - 120.5).abs() < f64::EPSILON);
                assert!((nominal - 100.0).abs() < f64::EPSILON);
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn nominal_defaults_to_zero() {
        let frame = parse_client_frame(r#"{"type":"release","dx":0,"dy":-200}"#).unwrap();
        match frame {
            ClientFrame::Release { nominal, .. } => assert_eq!(nominal, 0.0),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn garbage_is_dropped() {
        assert!(parse_client_frame("not json").is_none());
        assert!(parse_client_frame(r#"{"type":"unknown"}"#).is_none());
    }
}
