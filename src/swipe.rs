use serde::Serialize;

use crate::config::{DOUBLE_TAP_WINDOW_MS, SWIPE_THRESHOLD_PX, SWIPE_UP_THRESHOLD_PX};
use crate::types::Side;

/// The three interaction states of the active card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CardState {
    Neutral,
    ConfirmYes,
    ConfirmNo,
}

/// What a gesture resolved to. `None` means the drag stayed under every
/// threshold and the card snaps back unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeEffect {
    None,
    /// Entered a confirmation state; no side effect yet.
    Armed(Side),
    /// Backed out of a confirmation state.
    Cancelled,
    /// Confirmed a side; the caller triggers the staking workflow.
    Commit(Side),
    /// Upward fling from neutral: advance with no side effect.
    Skip,
    /// Double tap from neutral: open the detail view, no state change.
    OpenDetail,
}

/// Drag-release state machine for one card. Horizontal drags arm and then
/// commit a side (or back out); an upward fling skips; a double tap opens
/// details, and only from neutral.
#[derive(Debug)]
pub struct SwipeController {
    state: CardState,
    last_tap_ms: Option<u64>,
}

impl SwipeController {
    pub fn new() -> Self {
        Self {
            state: CardState::Neutral,
            last_tap_ms: None,
        }
    }

    pub fn state(&self) -> CardState {
        self.state
    }

    /// Back to neutral for the next card.
    pub fn reset(&mut self) {
        self.state = CardState::Neutral;
        self.last_tap_ms = None;
    }

    /// Finger lifted after a drag of (`dx`, `dy`) client px. Positive dx is
    /// rightward, positive dy is downward.
    pub fn on_release(&mut self, dx: f64, dy: f64) -> SwipeEffect {
        match self.state {
            CardState::Neutral => {
                if dy < -SWIPE_UP_THRESHOLD_PX {
                    self.reset();
                    return SwipeEffect::Skip;
                }
                if dx > SWIPE_THRESHOLD_PX {
                    self.state = CardState::ConfirmYes;
                    return SwipeEffect::Armed(Side::Yes);
                }
                if dx < -SWIPE_THRESHOLD_PX {
                    self.state = CardState::ConfirmNo;
                    return SwipeEffect::Armed(Side::No);
                }
                SwipeEffect::None
            }
            CardState::ConfirmYes => {
                if dx > SWIPE_THRESHOLD_PX {
                    self.reset();
                    return SwipeEffect::Commit(Side::Yes);
                }
                if dx < -SWIPE_THRESHOLD_PX {
                    self.state = CardState::Neutral;
                    return SwipeEffect::Cancelled;
                }
                SwipeEffect::None
            }
            CardState::ConfirmNo => {
                if dx < -SWIPE_THRESHOLD_PX {
                    self.reset();
                    return SwipeEffect::Commit(Side::No);
                }
                if dx > SWIPE_THRESHOLD_PX {
                    self.state = CardState::Neutral;
                    return SwipeEffect::Cancelled;
                }
                SwipeEffect::None
            }
        }
    }

    /// A tap at `at_ms`. Two taps inside the double-tap window open the
    /// detail view, but only while neutral; a second tap in a confirmation
    /// state is swallowed without restarting the window.
    pub fn on_tap(&mut self, at_ms: u64) -> SwipeEffect {
        if let Some(last) = self.last_tap_ms {
            let since = at_ms.saturating_sub(last);
            if since > 0 && since < DOUBLE_TAP_WINDOW_MS {
                return if self.state == CardState::Neutral {
                    SwipeEffect::OpenDetail
                } else {
                    SwipeEffect::None
                };
            }
        }
        self.last_tap_ms = Some(at_ms);
        SwipeEffect::None
    }
}

impl Default for SwipeController {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn right_swipe_arms_then_commits_yes() {
        let mut c = SwipeController::new();
        assert_eq!(c.on_release(120.0, 0.0), SwipeEffect::Armed(Side::Yes));
        assert_eq!(c.state(), CardState::ConfirmYes);
        assert_eq!(c.on_release(120.0, 0.0), SwipeEffect::Commit(Side::Yes));
        assert_eq!(c.state(), CardState::Neutral);
    }

    #[test]
    fn left_swipe_arms_then_commits_no() {
        let mut c = SwipeController::new();
        assert_eq!(c.on_release(-90.0, 0.0), SwipeEffect::Armed(Side::No));
        assert_eq!(c.on_release(-90.0, 0.0), SwipeEffect::Commit(Side::No));
    }

    #[test]
    fn opposite_swipe_cancels_confirmation() {
        let mut c = SwipeController::new();
        c.on_release(120.0, 0.0);
        assert_eq!(c.on_release(-120.0, 0.0), SwipeEffect::Cancelled);
        assert_eq!(c.state(), CardState::Neutral);

        c.on_release(-120.0, 0.0);
        assert_eq!(c.state(), CardState::ConfirmNo);
        assert_eq!(c.on_release(120.0, 0.0), SwipeEffect::Cancelled);
        assert_eq!(c.state(), CardState::Neutral);
    }

    #[test]
    fn sub_threshold_release_does_nothing() {
        let mut c = SwipeController::new();
        assert_eq!(c.on_release(40.0, -40.0), SwipeEffect::None);
        assert_eq!(c.state(), CardState::Neutral);
    }

    #[test]
    fn upward_fling_skips_from_neutral_only() {
        let mut c = SwipeController::new();
        assert_eq!(c.on_release(0.0, -200.0), SwipeEffect::Skip);

        // Armed cards don't skip; vertical distance is ignored there.
        c.on_release(120.0, 0.0);
        assert_eq!(c.on_release(0.0, -200.0), SwipeEffect::None);
        assert_eq!(c.state(), CardState::ConfirmYes);
    }

    #[test]
    fn double_tap_opens_detail_from_neutral() {
        let mut c = SwipeController::new();
        assert_eq!(c.on_tap(1_000), SwipeEffect::None);
        assert_eq!(c.on_tap(1_200), SwipeEffect::OpenDetail);
    }

    #[test]
    fn slow_second_tap_is_not_a_double_tap() {
        let mut c = SwipeController::new();
        c.on_tap(1_000);
        assert_eq!(c.on_tap(1_500), SwipeEffect::None);
        // ...but it restarts the window.
        assert_eq!(c.on_tap(1_600), SwipeEffect::OpenDetail);
    }

    #[test]
    fn double_tap_in_confirmation_state_is_swallowed() {
        let mut c = SwipeController::new();
        c.on_release(120.0, 0.0);
        c.on_tap(1_000);
        assert_eq!(c.on_tap(1_100), SwipeEffect::None);
        assert_eq!(c.state(), CardState::ConfirmYes);
    }
}
