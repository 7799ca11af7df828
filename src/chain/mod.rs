pub mod gateway;

use std::future::Future;

use ethers::types::{H256, U256};

use crate::error::Result;
use crate::types::{ChainMarket, Side};

pub use gateway::EthersGateway;

/// Typed access to the prediction-market contract and its stake token.
///
/// `get_markets` is the read path polled by the reconciler; the remaining
/// methods are the write path driven by the staking workflow. Implementations
/// collapse wallet rejections, RPC failures and reverts into
/// `TransactionFailed` and bound every confirmation wait.
pub trait MarketGateway: Send + Sync + 'static {
    /// Batch point-in-time read. The result is position-aligned with `ids`:
    /// `result[i]` belongs to `ids[i]`, and a failed item is `None` without
    /// shifting any other item.
    fn get_markets(&self, ids: &[u64]) -> impl Future<Output = Vec<Option<ChainMarket>>> + Send;

    /// Current stake-token allowance granted by the staking wallet to the
    /// market contract.
    fn get_allowance(&self) -> impl Future<Output = Result<U256>> + Send;

    /// Grant the market contract an unlimited allowance and wait for the
    /// approval to confirm.
    fn approve_unlimited(&self) -> impl Future<Output = Result<H256>> + Send;

    /// Submit a stake and wait for confirmation. Assumes sufficient prior
    /// approval; ended/resolved markets and zero amounts revert on-chain and
    /// are not pre-validated here.
    fn stake(
        &self,
        market_id: u64,
        side: Side,
        amount: U256,
    ) -> impl Future<Output = Result<H256>> + Send;
}
