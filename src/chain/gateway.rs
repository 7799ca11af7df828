use std::sync::Arc;
use std::time::Duration;

use ethers::abi::Detokenize;
use ethers::contract::{abigen, ContractCall};
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, H256, U256};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::chain::MarketGateway;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::types::{ChainMarket, Side};

abigen!(
    PredictionMarket,
    r#"[
        function idrx() external view returns (address)
        function markets(uint256 marketId) external view returns (string question, uint256 endTime, uint256 yesPool, uint256 noPool, bool resolved, uint8 winningSide)
        function stake(uint256 marketId, uint8 side, uint256 amount) external
    ]"#
);

abigen!(
    StakeToken,
    r#"[
        function allowance(address owner, address spender) external view returns (uint256)
        function approve(address spender, uint256 amount) external returns (bool)
    ]"#
);

type ChainClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// ethers-backed gateway: one HTTP provider, one staking wallet, typed
/// contract bindings. The token address is read once and cached for the
/// process lifetime.
pub struct EthersGateway {
    client: Arc<ChainClient>,
    contract: PredictionMarket<ChainClient>,
    contract_address: Address,
    token_address: OnceCell<Address>,
    confirm_timeout: Duration,
}

impl EthersGateway {
    pub fn connect(cfg: &Config) -> Result<Self> {
        let provider = Provider::<Http>::try_from(cfg.rpc_url.as_str())
            .map_err(|e| AppError::Config(format!("invalid RPC_URL: {e}")))?;
        let wallet = cfg
            .staker_private_key
            .parse::<LocalWallet>()
            .map_err(|e| AppError::Config(format!("invalid STAKER_PRIVATE_KEY: {e}")))?
            .with_chain_id(cfg.chain_id);
        let contract_address = cfg
            .contract_address
            .parse::<Address>()
            .map_err(|e| AppError::Config(format!("invalid CONTRACT_ADDRESS: {e}")))?;

        let client = Arc::new(SignerMiddleware::new(provider, wallet));
        let contract = PredictionMarket::new(contract_address, Arc::clone(&client));

        info!(
            contract = %contract_address,
            staker = %client.signer().address(),
            "Chain gateway connected"
        );

        Ok(Self {
            client,
            contract,
            contract_address,
            token_address: OnceCell::new(),
            confirm_timeout: Duration::from_secs(cfg.confirm_timeout_secs),
        })
    }

    /// The stake token address, read from the contract on first use.
    pub async fn token_address(&self) -> Result<Address> {
        self.token_address
            .get_or_try_init(|| async {
                self.contract
                    .idrx()
                    .call()
                    .await
                    .map_err(|e| AppError::TransactionFailed(format!("idrx(): {e}")))
            })
            .await
            .copied()
    }

    async fn token(&self) -> Result<StakeToken<ChainClient>> {
        let address = self.token_address().await?;
        Ok(StakeToken::new(address, Arc::clone(&self.client)))
    }

    async fn read_market(&self, market_id: u64) -> Option<ChainMarket> {
        match self.contract.markets(U256::from(market_id)).call().await {
            Ok((question, end_time, yes_pool, no_pool, resolved, winning_side)) => {
                Some(ChainMarket {
                    question,
                    end_time: u64::try_from(end_time).unwrap_or(u64::MAX),
                    yes_pool,
                    no_pool,
                    resolved,
                    winning_side,
                })
            }
            Err(e) => {
                debug!(market_id, "markets() read failed: {e}");
                None
            }
        }
    }

    /// Submit a write call, then wait (bounded) for its receipt.
    async fn send_and_confirm<D: Detokenize>(
        &self,
        call: ContractCall<ChainClient, D>,
        label: &str,
    ) -> Result<H256> {
        let pending = call
            .send()
            .await
            .map_err(|e| AppError::TransactionFailed(format!("{label}: {e}")))?;
        let receipt = tokio::time::timeout(self.confirm_timeout, pending)
            .await
            .map_err(|_| AppError::Timeout(self.confirm_timeout.as_secs()))?
            .map_err(|e| AppError::TransactionFailed(format!("{label}: {e}")))?
            .ok_or_else(|| {
                AppError::TransactionFailed(format!("{label}: transaction dropped"))
            })?;

        if receipt.status != Some(1u64.into()) {
            return Err(AppError::TransactionFailed(format!(
                "{label}: reverted in block {:?}",
                receipt.block_number
            )));
        }
        Ok(receipt.transaction_hash)
    }
}

impl MarketGateway for EthersGateway {
    async fn get_markets(&self, ids: &[u64]) -> Vec<Option<ChainMarket>> {
        let reads = ids.iter().map(|&id| self.read_market(id));
        futures_util::future::join_all(reads).await
    }

    async fn get_allowance(&self) -> Result<U256> {
        let token = self.token().await?;
        token
            .allowance(self.client.signer().address(), self.contract_address)
            .call()
            .await
            .map_err(|e| AppError::TransactionFailed(format!("allowance(): {e}")))
    }

    async fn approve_unlimited(&self) -> Result<H256> {
        let token = self.token().await?;
        let call = token.approve(self.contract_address, U256::max_value());
        let tx = self.send_and_confirm(call, "approve").await?;
        info!(tx = %tx, "Unlimited allowance approved");
        Ok(tx)
    }

    async fn stake(&self, market_id: u64, side: Side, amount: U256) -> Result<H256> {
        let call = self
            .contract
            .stake(U256::from(market_id), side.as_u8(), amount);
        let tx = self.send_and_confirm(call, "stake").await?;
        info!(tx = %tx, market_id, side = side.as_u8(), %amount, "Stake confirmed");
        Ok(tx)
    }
}
