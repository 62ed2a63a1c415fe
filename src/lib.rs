// Swap Router Library
//
// Multi-hop swap route discovery over constant-product liquidity pools,
// with an in-memory pool cache refreshed from on-chain pair contracts.

pub mod config;
pub mod onchain;
pub mod pools;
pub mod quote;
pub mod router;
pub mod tokens;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::{Chain, Config};
pub use onchain::{EthersPairReader, OnChainRefresher, PairReader, PairState, RefreshReport};
pub use pools::{CacheStats, PoolStore};
pub use quote::{QuoteEngine, QuoteResult};
pub use router::Router;
pub use tokens::TokenRegistry;
pub use types::{Pool, PoolSource, Result, Route, RouteEdge, RoutingError, TokenInfo};

use ethers::types::{Address, U256};
use std::sync::Arc;
use tracing::info;

/// Main routing interface: token registry, pool store and refresher wired
/// together from a [`Config`].
pub struct SwapRouter {
    config: Config,
    registry: TokenRegistry,
    store: Arc<PoolStore>,
    refresher: OnChainRefresher,
}

impl SwapRouter {
    /// Create a router talking to the configured RPC endpoint
    pub fn new(config: Config) -> Result<Self> {
        let reader = EthersPairReader::from_url(
            &config.rpc_url,
            config.factory_address,
            config.router_address,
        )?;
        Self::with_reader(config, Arc::new(reader))
    }

    /// Create a router over any chain reader
    pub fn with_reader(config: Config, reader: Arc<dyn PairReader>) -> Result<Self> {
        config.validate()?;

        let registry = TokenRegistry::for_chain(config.chain)?;
        if let Some(path) = &config.token_list_path {
            registry.load_token_list(path)?;
        }

        let fallback = match &config.fallback_pools_path {
            Some(path) => pools::load_pools_file(path)?,
            None => pools::builtin_fallback_pools(config.chain, &config.dex_name, config.fee_bps)?,
        };

        let store = Arc::new(PoolStore::new(config.chain.chain_id(), fallback));
        let refresher = OnChainRefresher::new(
            reader,
            store.clone(),
            config.dex_name.clone(),
            config.fee_bps,
        );

        info!(
            "Swap router ready on {} with {} fallback pools",
            config.chain,
            store.fallback_pools().len()
        );

        Ok(Self {
            config,
            registry,
            store,
            refresher,
        })
    }

    /// Current pool set (runtime cache or fallback list)
    pub fn list_pools(&self) -> Arc<Vec<Pool>> {
        self.store.list_pools()
    }

    /// Get pools containing a specific token
    pub fn pools_with_token(&self, token: Address) -> Vec<Pool> {
        self.store.pools_with_token(&token)
    }

    /// Re-read every known pair from chain and replace the pool cache
    pub async fn refresh_all_pools(&self) -> Result<RefreshReport> {
        if self.config.factory_address.is_none() {
            return Err(RoutingError::ConfigError(
                "FACTORY_ADDRESS must be set to refresh pools".to_string(),
            ));
        }
        self.refresher.refresh_all_pools().await
    }

    /// Drop the runtime cache; lookups fall back to the static list
    pub fn clear_pool_cache(&self) {
        self.refresher.clear_pool_cache()
    }

    /// Resolve a symbol (or address) through the chain's token registry
    pub fn resolve_token(&self, symbol: &str) -> Result<TokenInfo> {
        self.registry.resolve_token_by_symbol(symbol)
    }

    /// Parse a human amount ("1.5") into base units of `symbol`
    pub fn parse_amount(&self, symbol: &str, amount: &str) -> Result<U256> {
        let token = self.resolve_token(symbol)?;
        utils::parse_token_amount(amount, token.decimals)
    }

    /// Best route between two symbols. Unknown symbols are an error; no route
    /// within `max_hops` is `Ok(None)`.
    pub fn find_best_route(
        &self,
        token_in: &str,
        token_out: &str,
        amount_in: U256,
        max_hops: usize,
    ) -> Result<Option<Route>> {
        let (from, to) = self.resolve_pair(token_in, token_out)?;
        Ok(self.find_best_route_by_address(from, to, amount_in, max_hops))
    }

    /// Best route between two pool-level token addresses
    pub fn find_best_route_by_address(
        &self,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
        max_hops: usize,
    ) -> Option<Route> {
        let pools = self.store.list_pools();
        Router::new(max_hops).find_best_route(&pools, token_in, token_out, amount_in)
    }

    /// Up to `limit` routes between two symbols, best first
    pub fn find_top_routes(
        &self,
        token_in: &str,
        token_out: &str,
        amount_in: U256,
        max_hops: usize,
        limit: usize,
    ) -> Result<Vec<Route>> {
        let (from, to) = self.resolve_pair(token_in, token_out)?;
        let pools = self.store.list_pools();
        Ok(Router::new(max_hops).find_top_routes(&pools, from, to, amount_in, limit))
    }

    /// Cross-check a route against the router contract's `getAmountsOut`
    pub async fn quote_on_chain(&self, route: &Route) -> Result<U256> {
        if self.config.router_address.is_none() {
            return Err(RoutingError::ConfigError(
                "ROUTER_ADDRESS must be set to quote on chain".to_string(),
            ));
        }
        self.refresher.quote_on_chain(route).await
    }

    /// Export the current pool set to a JSON snapshot
    pub fn export_cache(&self, path: &str) -> Result<()> {
        self.store.export_to_file(path)
    }

    /// Load a JSON snapshot as the runtime pool set
    pub fn import_cache(&self, path: &str) -> Result<usize> {
        self.store.import_from_file(path)
    }

    /// Get cache statistics
    pub fn cache_stats(&self) -> CacheStats {
        self.store.stats()
    }

    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    /// Get configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn resolve_pair(&self, token_in: &str, token_out: &str) -> Result<(Address, Address)> {
        let from = self.resolve_token(token_in)?;
        let to = self.resolve_token(token_out)?;
        Ok((
            self.registry.routing_address(&from)?,
            self.registry.routing_address(&to)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_router() {
        let router = SwapRouter::new(Config::default()).unwrap();
        assert_eq!(router.list_pools().len(), 1);
        assert_eq!(router.config().chain, Chain::Fuji);
    }

    #[test]
    fn test_native_symbol_routes_through_wrapped_pool() {
        let router = SwapRouter::new(Config::default()).unwrap();
        let amount = router.parse_amount("AVAX", "1").unwrap();

        let route = router.find_best_route("AVAX", "USDC", amount, 3).unwrap().unwrap();
        assert_eq!(route.hop_count(), 1);
        assert!(route.amount_out > U256::zero());
    }

    #[test]
    fn test_unknown_symbol_is_error() {
        let router = SwapRouter::new(Config::default()).unwrap();
        let result = router.find_best_route("AVAX", "NOPE", U256::from(1u64), 3);
        assert!(matches!(result, Err(RoutingError::UnknownToken(_))));
    }

    #[tokio::test]
    async fn test_refresh_requires_factory() {
        let router = SwapRouter::new(Config::default()).unwrap();
        let result = router.refresh_all_pools().await;
        assert!(matches!(result, Err(RoutingError::ConfigError(_))));
    }
}
