use crate::pools::PoolStore;
use crate::types::{Pool, PoolSource, Result, Route, RoutingError};
use crate::utils;
use async_trait::async_trait;
use ethers::prelude::*;
use ethers::types::{Address, U256};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

// UniswapV2 Factory ABI (simplified)
abigen!(
    UniswapV2Factory,
    r#"[
        function getPair(address tokenA, address tokenB) external view returns (address pair)
    ]"#,
);

// UniswapV2 Pair ABI (simplified)
abigen!(
    UniswapV2Pair,
    r#"[
        function token0() external view returns (address)
        function token1() external view returns (address)
        function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast)
    ]"#,
);

// UniswapV2 Router ABI (simplified)
abigen!(
    UniswapV2Router,
    r#"[
        function getAmountsOut(uint256 amountIn, address[] path) external view returns (uint256[] amounts)
    ]"#,
);

/// Live state of a pair contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairState {
    pub token0: Address,
    pub reserve0: U256,
    pub reserve1: U256,
}

/// Read-only chain access needed to refresh pools and cross-check quotes
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PairReader: Send + Sync {
    /// Pair contract for two tokens, `None` when the factory has no such pair
    async fn get_pair(&self, token_a: Address, token_b: Address) -> Result<Option<Address>>;

    async fn get_pair_state(&self, pair: Address) -> Result<PairState>;

    /// Router `getAmountsOut` along `path`
    async fn get_amounts_out(&self, amount_in: U256, path: Vec<Address>) -> Result<Vec<U256>>;

    /// Timestamp of the latest block, in unix seconds
    async fn block_timestamp(&self) -> Result<u64>;
}

/// [`PairReader`] over an HTTP JSON-RPC provider
pub struct EthersPairReader {
    provider: Arc<Provider<Http>>,
    factory: Option<Address>,
    router: Option<Address>,
}

impl EthersPairReader {
    pub fn new(provider: Arc<Provider<Http>>, factory: Option<Address>, router: Option<Address>) -> Self {
        Self {
            provider,
            factory,
            router,
        }
    }

    pub fn from_url(rpc_url: &str, factory: Option<Address>, router: Option<Address>) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| RoutingError::RpcError(format!("Failed to create provider: {}", e)))?;
        Ok(Self::new(Arc::new(provider), factory, router))
    }
}

#[async_trait]
impl PairReader for EthersPairReader {
    async fn get_pair(&self, token_a: Address, token_b: Address) -> Result<Option<Address>> {
        let factory_address = self
            .factory
            .ok_or_else(|| RoutingError::ConfigError("FACTORY_ADDRESS is not set".to_string()))?;
        let factory = UniswapV2Factory::new(factory_address, self.provider.clone());

        let pair = factory
            .get_pair(token_a, token_b)
            .call()
            .await
            .map_err(|e| RoutingError::ContractError(format!("Failed to get pair: {}", e)))?;

        Ok((!pair.is_zero()).then_some(pair))
    }

    async fn get_pair_state(&self, pair_address: Address) -> Result<PairState> {
        let pair = UniswapV2Pair::new(pair_address, self.provider.clone());

        let token0 = pair
            .token_0()
            .call()
            .await
            .map_err(|e| RoutingError::ContractError(format!("Failed to get token0: {}", e)))?;

        let reserves = pair
            .get_reserves()
            .call()
            .await
            .map_err(|e| RoutingError::ContractError(format!("Failed to get reserves: {}", e)))?;

        Ok(PairState {
            token0,
            reserve0: U256::from(reserves.0),
            reserve1: U256::from(reserves.1),
        })
    }

    async fn get_amounts_out(&self, amount_in: U256, path: Vec<Address>) -> Result<Vec<U256>> {
        let router_address = self
            .router
            .ok_or_else(|| RoutingError::ConfigError("ROUTER_ADDRESS is not set".to_string()))?;
        let router = UniswapV2Router::new(router_address, self.provider.clone());

        router
            .get_amounts_out(amount_in, path)
            .call()
            .await
            .map_err(|e| RoutingError::ContractError(format!("getAmountsOut failed: {}", e)))
    }

    async fn block_timestamp(&self) -> Result<u64> {
        let block = self
            .provider
            .get_block(BlockNumber::Latest)
            .await
            .map_err(|e| RoutingError::RpcError(format!("Failed to get latest block: {}", e)))?
            .ok_or_else(|| RoutingError::RpcError("Latest block not available".to_string()))?;

        Ok(block.timestamp.as_u64())
    }
}

/// Outcome of a refresh pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    /// Pairs whose reserves were read successfully
    pub refreshed: usize,
    /// Pairs whose read failed; their previous data was kept
    pub retained: usize,
    /// Pairs the factory does not know about
    pub missing: usize,
    /// Pools of other DEXes kept as they were
    pub carried: usize,
    /// Pools in the cache after the pass
    pub total_pools: usize,
}

/// Reads live reserves for every known pair and swaps them into a [`PoolStore`]
pub struct OnChainRefresher {
    reader: Arc<dyn PairReader>,
    store: Arc<PoolStore>,
    dex_name: String,
    fee_bps: u32,
}

impl OnChainRefresher {
    pub fn new(reader: Arc<dyn PairReader>, store: Arc<PoolStore>, dex_name: String, fee_bps: u32) -> Self {
        Self {
            reader,
            store,
            dex_name,
            fee_bps,
        }
    }

    /// Refresh every pair known from the fallback list or the current cache,
    /// then replace the cache. Pairs that fail to load keep their previous data.
    /// Pools of other DEXes are carried over untouched.
    pub async fn refresh_all_pools(&self) -> Result<RefreshReport> {
        // Current entries overwrite fallback ones so a failed read keeps the newest data
        let fallback = self.store.fallback_pools();
        let current = self.store.list_pools();
        let mut known: BTreeMap<(Address, Address), Pool> = BTreeMap::new();
        let mut others: BTreeMap<String, Pool> = BTreeMap::new();
        for pool in fallback.iter().chain(current.iter()) {
            if pool.token0 == pool.token1 {
                continue;
            }
            if self.is_own_dex(pool) {
                // The factory holds one pair per token pair
                known.insert(utils::sort_tokens(pool.token0, pool.token1), pool.clone());
            } else {
                others.insert(pool.key(), pool.clone());
            }
        }

        info!("Refreshing {} pairs from {}", known.len(), self.dex_name);

        let timestamp = match self.reader.block_timestamp().await {
            Ok(ts) => ts,
            Err(e) => {
                debug!("Falling back to local clock: {}", e);
                utils::unix_now()
            }
        };

        let mut report = RefreshReport {
            carried: others.len(),
            ..RefreshReport::default()
        };
        let mut pools = Vec::with_capacity(known.len() + others.len());

        for ((token_a, token_b), previous) in known {
            match self.fetch_pool(token_a, token_b, timestamp).await {
                Ok(Some(pool)) => {
                    report.refreshed += 1;
                    pools.push(pool);
                }
                Ok(None) => {
                    debug!("No {} pair for {:?}/{:?}", self.dex_name, token_a, token_b);
                    report.missing += 1;
                    pools.push(previous);
                }
                Err(e) => {
                    warn!("Failed to refresh pair {:?}/{:?}: {}", token_a, token_b, e);
                    report.retained += 1;
                    pools.push(previous);
                }
            }
        }

        if report.refreshed > 0 {
            pools.extend(others.into_values());
            self.store.set_runtime_pools(Some(pools));
        } else {
            warn!("No pair could be refreshed, leaving the pool cache untouched");
        }
        report.total_pools = self.store.list_pools().len();

        info!(
            "Refresh done: {} refreshed, {} retained, {} missing, {} carried",
            report.refreshed, report.retained, report.missing, report.carried
        );
        Ok(report)
    }

    fn is_own_dex(&self, pool: &Pool) -> bool {
        pool.dex_name.eq_ignore_ascii_case(&self.dex_name)
    }

    /// Read one pair from chain. `Ok(None)` when no pair is deployed.
    pub async fn fetch_pool(&self, token_a: Address, token_b: Address, timestamp: u64) -> Result<Option<Pool>> {
        let Some(pair_address) = self.reader.get_pair(token_a, token_b).await? else {
            return Ok(None);
        };

        let state = self.reader.get_pair_state(pair_address).await?;
        let token1 = if state.token0 == token_a {
            token_b
        } else if state.token0 == token_b {
            token_a
        } else {
            return Err(RoutingError::ContractError(format!(
                "Pair {:?} reports token0 {:?}, expected one of {:?}/{:?}",
                pair_address, state.token0, token_a, token_b
            )));
        };

        let pool = Pool {
            token0: state.token0,
            token1,
            reserve0: state.reserve0,
            reserve1: state.reserve1,
            fee_bps: self.fee_bps,
            dex_name: self.dex_name.clone(),
            last_updated: timestamp,
            pair_address: Some(pair_address),
            source: PoolSource::OnChain,
        };

        debug!("Fetched pool: {:?}", pair_address);
        Ok(Some(pool))
    }

    /// Empty the runtime cache unconditionally
    pub fn clear_pool_cache(&self) {
        self.store.clear();
    }

    /// Ask the router what the route's path would pay out right now
    pub async fn quote_on_chain(&self, route: &Route) -> Result<U256> {
        let amounts = self
            .reader
            .get_amounts_out(route.amount_in, route.path())
            .await?;

        amounts
            .last()
            .copied()
            .ok_or_else(|| RoutingError::ContractError("getAmountsOut returned no amounts".to_string()))
    }
}
