use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ethers::types::U256;
use ethers::utils::parse_units;
use tracing::{info, warn};

use crate::chain::MarketGateway;
use crate::config::TOKEN_DECIMALS;
use crate::error::{AppError, Result};
use crate::state::ActivityLog;
use crate::types::{MarketCard, Side, TransactionRecord};

/// How one stake attempt ended, as reported back to the deck session.
#[derive(Debug, Clone)]
pub enum StakeOutcome {
    Staked(TransactionRecord),
    /// The card has no on-chain market. Nothing was sent; the interaction
    /// advances as if skipped.
    SkippedOffChain,
    /// Another stake is in flight. The trigger is dropped, not queued.
    Busy,
    /// Some step failed. No record is emitted and the interaction advances.
    Failed(String),
}

/// Client-driven staking sequence: allowance check, approval when short,
/// stake, confirmation. Strictly in that order, one at a time.
///
/// The busy flag guards the single staking wallet: a second trigger while a
/// transaction is outstanding is ignored, never queued.
pub struct StakeWorkflow<G> {
    gateway: Arc<G>,
    activity: Arc<ActivityLog>,
    busy: AtomicBool,
}

impl<G: MarketGateway> StakeWorkflow<G> {
    pub fn new(gateway: Arc<G>, activity: Arc<ActivityLog>) -> Self {
        Self {
            gateway,
            activity,
            busy: AtomicBool::new(false),
        }
    }

    pub async fn place(&self, card: &MarketCard, side: Side, nominal: f64) -> StakeOutcome {
        let Some(market_id) = card.market_id else {
            info!(card = %card.id, "Card has no on-chain market, skipping stake");
            return StakeOutcome::SkippedOffChain;
        };

        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return StakeOutcome::Busy;
        }

        let result = self.execute(market_id, side, nominal, card).await;
        self.busy.store(false, Ordering::Release);

        match result {
            Ok(record) => {
                self.activity.push(record.clone());
                StakeOutcome::Staked(record)
            }
            Err(e) => {
                warn!(card = %card.id, market_id, "Stake failed: {e}");
                StakeOutcome::Failed(e.to_string())
            }
        }
    }

    async fn execute(
        &self,
        market_id: u64,
        side: Side,
        nominal: f64,
        card: &MarketCard,
    ) -> Result<TransactionRecord> {
        let amount = to_base_units(nominal)?;

        let allowance = self.gateway.get_allowance().await?;
        if allowance < amount {
            // Unlimited approval so repeated stakes don't re-approve.
            info!(%allowance, %amount, "Allowance short, requesting approval");
            self.gateway.approve_unlimited().await?;
        }

        let tx = self.gateway.stake(market_id, side, amount).await?;
        info!(tx = %tx, market_id, "Stake placed");

        Ok(TransactionRecord {
            question_id: card.id.clone(),
            title: card.title.clone(),
            action: side.into(),
            nominal,
            timestamp: chrono::Utc::now().to_rfc3339(),
        })
    }
}

/// Nominal token amount → base units at the token's 18 decimals.
pub fn to_base_units(nominal: f64) -> Result<U256> {
    let parsed = parse_units(nominal.to_string(), TOKEN_DECIMALS)
        .map_err(|e| AppError::Validation(format!("invalid stake amount: {e}")))?;
    Ok(parsed.into())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
