use crate::config::Chain;
use crate::tokens;
use crate::types::{Pool, PoolSource, Result, RoutingError};
use crate::utils;
use ethers::types::{Address, U256};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// In-memory pool set: a runtime cache fed by refreshes, backed by a static
/// fallback list. Shared behind an `Arc`; nothing is persisted.
pub struct PoolStore {
    chain_id: u64,
    fallback: Arc<Vec<Pool>>,
    runtime: RwLock<Option<Arc<Vec<Pool>>>>,
}

impl PoolStore {
    /// Create a store serving `fallback` until runtime pools are set
    pub fn new(chain_id: u64, fallback: Vec<Pool>) -> Self {
        Self {
            chain_id,
            fallback: Arc::new(fallback),
            runtime: RwLock::new(None),
        }
    }

    /// Current pool set: the runtime cache when present, the fallback list otherwise
    pub fn list_pools(&self) -> Arc<Vec<Pool>> {
        match self.runtime.read().as_ref() {
            Some(pools) => Arc::clone(pools),
            None => Arc::clone(&self.fallback),
        }
    }

    pub fn fallback_pools(&self) -> Arc<Vec<Pool>> {
        Arc::clone(&self.fallback)
    }

    /// Replace the runtime cache wholesale, or clear it with `None`.
    /// An empty set is treated as a clear so lookups keep the fallback data.
    pub fn set_runtime_pools(&self, pools: Option<Vec<Pool>>) {
        let next = pools.filter(|p| !p.is_empty()).map(Arc::new);
        match &next {
            Some(pools) => info!("Runtime pool cache set to {} pools", pools.len()),
            None => info!("Runtime pool cache cleared, serving {} fallback pools", self.fallback.len()),
        }
        *self.runtime.write() = next;
    }

    /// Drop the runtime cache unconditionally
    pub fn clear(&self) {
        self.set_runtime_pools(None);
    }

    pub fn has_runtime_pools(&self) -> bool {
        self.runtime.read().is_some()
    }

    /// Get pools containing a specific token
    pub fn pools_with_token(&self, token: &Address) -> Vec<Pool> {
        self.list_pools()
            .iter()
            .filter(|pool| pool.token0 == *token || pool.token1 == *token)
            .cloned()
            .collect()
    }

    /// Get pools for a token pair
    pub fn pools_for_pair(&self, token_a: &Address, token_b: &Address) -> Vec<Pool> {
        self.list_pools()
            .iter()
            .filter(|pool| pool.connects(token_a, token_b))
            .cloned()
            .collect()
    }

    /// Export the current pool set to a JSON file
    pub fn export_to_file(&self, path: &str) -> Result<()> {
        let cache_data = CacheData {
            chain_id: self.chain_id,
            pools: self.list_pools().to_vec(),
            timestamp: utils::unix_now(),
        };

        if let Some(parent) = Path::new(path).parent() {
            fs::create_dir_all(parent)
                .map_err(|e| RoutingError::CacheError(format!("Failed to create cache directory: {}", e)))?;
        }

        let json = serde_json::to_string_pretty(&cache_data)
            .map_err(|e| RoutingError::CacheError(format!("Failed to serialize cache: {}", e)))?;

        fs::write(path, json)
            .map_err(|e| RoutingError::CacheError(format!("Failed to write cache file: {}", e)))?;

        info!("Exported {} pools to {}", cache_data.pools.len(), path);
        Ok(())
    }

    /// Import a JSON snapshot as the runtime pool set
    pub fn import_from_file(&self, path: &str) -> Result<usize> {
        let json = fs::read_to_string(path)
            .map_err(|e| RoutingError::CacheError(format!("Failed to read cache file: {}", e)))?;

        let cache_data: CacheData = serde_json::from_str(&json)
            .map_err(|e| RoutingError::CacheError(format!("Failed to parse cache: {}", e)))?;

        if cache_data.chain_id != self.chain_id {
            return Err(RoutingError::CacheError(format!(
                "Snapshot is for chain {}, store is for chain {}",
                cache_data.chain_id, self.chain_id
            )));
        }

        let count = cache_data.pools.len();
        self.set_runtime_pools(Some(cache_data.pools));

        info!(
            "Imported {} pools from {} (cached at timestamp: {})",
            count, path, cache_data.timestamp
        );
        Ok(count)
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let pools = self.list_pools();

        let mut dex_counts: HashMap<String, usize> = HashMap::new();
        let mut on_chain = 0;
        for pool in pools.iter() {
            *dex_counts.entry(pool.dex_name.clone()).or_insert(0) += 1;
            if pool.source == PoolSource::OnChain {
                on_chain += 1;
            }
        }

        CacheStats {
            total_pools: pools.len(),
            serving_runtime: self.has_runtime_pools(),
            on_chain_pools: on_chain,
            fallback_pools: pools.len() - on_chain,
            dex_counts,
            oldest_update: pools.iter().map(|pool| pool.last_updated).min(),
        }
    }
}

/// Snapshot file layout
#[derive(Debug, Serialize, Deserialize)]
struct CacheData {
    chain_id: u64,
    pools: Vec<Pool>,
    timestamp: u64,
}

/// Cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub total_pools: usize,
    /// False when only the fallback list is being served
    pub serving_runtime: bool,
    pub on_chain_pools: usize,
    pub fallback_pools: usize,
    pub dex_counts: HashMap<String, usize>,
    pub oldest_update: Option<u64>,
}

fn seed_pool(
    token_a: &str,
    token_b: &str,
    reserve_a: U256,
    reserve_b: U256,
    dex_name: &str,
    fee_bps: u32,
) -> Result<Pool> {
    let a = utils::parse_address(token_a)?;
    let b = utils::parse_address(token_b)?;
    let (token0, token1) = utils::sort_tokens(a, b);
    let (reserve0, reserve1) = if token0 == a {
        (reserve_a, reserve_b)
    } else {
        (reserve_b, reserve_a)
    };

    Ok(Pool {
        token0,
        token1,
        reserve0,
        reserve1,
        fee_bps,
        dex_name: dex_name.to_string(),
        last_updated: 0,
        pair_address: None,
        source: PoolSource::Fallback,
    })
}

/// Whole-token amount scaled to base units
fn units(amount: u64, decimals: u8) -> Result<U256> {
    utils::decimals_factor(decimals)
        .and_then(|factor| factor.checked_mul(U256::from(amount)))
        .ok_or(RoutingError::MathError)
}

/// Static seed pools used until a refresh succeeds
pub fn builtin_fallback_pools(chain: Chain, dex_name: &str, fee_bps: u32) -> Result<Vec<Pool>> {
    let pools = match chain {
        Chain::Fuji => vec![seed_pool(
            tokens::FUJI_WAVAX,
            tokens::FUJI_USDC,
            units(10_000, 18)?,
            units(250_000, 6)?,
            dex_name,
            fee_bps,
        )?],
        Chain::Alfajores => vec![
            seed_pool(
                tokens::ALFAJORES_CELO,
                tokens::ALFAJORES_CUSD,
                units(100_000, 18)?,
                units(50_000, 18)?,
                dex_name,
                fee_bps,
            )?,
            seed_pool(
                tokens::ALFAJORES_CELO,
                tokens::ALFAJORES_CEUR,
                units(100_000, 18)?,
                units(46_000, 18)?,
                dex_name,
                fee_bps,
            )?,
            seed_pool(
                tokens::ALFAJORES_CUSD,
                tokens::ALFAJORES_CEUR,
                units(50_000, 18)?,
                units(46_000, 18)?,
                dex_name,
                fee_bps,
            )?,
        ],
        Chain::CeloSepolia => Vec::new(),
    };

    debug!("{} built-in fallback pools for {}", pools.len(), chain);
    Ok(pools)
}

/// Load a JSON array of pools to use as the fallback list
pub fn load_pools_file(path: &str) -> Result<Vec<Pool>> {
    let json = fs::read_to_string(path)
        .map_err(|e| RoutingError::ConfigError(format!("Failed to read pool list {}: {}", path, e)))?;

    let pools: Vec<Pool> = serde_json::from_str(&json)
        .map_err(|e| RoutingError::ParseError(format!("Failed to parse pool list {}: {}", path, e)))?;

    let invalid = pools.iter().filter(|pool| pool.token0 == pool.token1).count();
    if invalid > 0 {
        warn!("{} pools in {} pair a token with itself and will never be routed", invalid, path);
    }

    info!("Loaded {} fallback pools from {}", pools.len(), path);
    Ok(pools)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(a: u64, b: u64, source: PoolSource) -> Pool {
        Pool {
            token0: Address::from_low_u64_be(a),
            token1: Address::from_low_u64_be(b),
            reserve0: U256::from(1_000u64),
            reserve1: U256::from(1_000u64),
            fee_bps: 30,
            dex_name: "TestDEX".to_string(),
            last_updated: 7,
            pair_address: None,
            source,
        }
    }

    #[test]
    fn test_list_falls_back_until_set() {
        let store = PoolStore::new(1, vec![pool(1, 2, PoolSource::Fallback)]);
        assert_eq!(store.list_pools().len(), 1);
        assert!(!store.has_runtime_pools());

        store.set_runtime_pools(Some(vec![
            pool(1, 2, PoolSource::OnChain),
            pool(2, 3, PoolSource::OnChain),
        ]));
        assert_eq!(store.list_pools().len(), 2);
        assert!(store.has_runtime_pools());
    }

    #[test]
    fn test_clear_restores_fallback() {
        let fallback = vec![pool(1, 2, PoolSource::Fallback)];
        let store = PoolStore::new(1, fallback.clone());
        store.set_runtime_pools(Some(vec![pool(5, 6, PoolSource::OnChain)]));

        store.clear();
        assert_eq!(*store.list_pools(), fallback);
    }

    #[test]
    fn test_empty_runtime_set_counts_as_clear() {
        let store = PoolStore::new(1, vec![pool(1, 2, PoolSource::Fallback)]);
        store.set_runtime_pools(Some(vec![]));
        assert!(!store.has_runtime_pools());
        assert_eq!(store.list_pools().len(), 1);
    }

    #[test]
    fn test_snapshot_survives_later_writes() {
        let store = PoolStore::new(1, vec![]);
        store.set_runtime_pools(Some(vec![pool(1, 2, PoolSource::OnChain)]));
        let snapshot = store.list_pools();

        store.set_runtime_pools(Some(vec![pool(3, 4, PoolSource::OnChain), pool(4, 5, PoolSource::OnChain)]));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.list_pools().len(), 2);
    }

    #[test]
    fn test_token_and_pair_filters() {
        let store = PoolStore::new(
            1,
            vec![pool(1, 2, PoolSource::Fallback), pool(2, 3, PoolSource::Fallback)],
        );
        let t1 = Address::from_low_u64_be(1);
        let t2 = Address::from_low_u64_be(2);
        let t3 = Address::from_low_u64_be(3);

        assert_eq!(store.pools_with_token(&t2).len(), 2);
        assert_eq!(store.pools_for_pair(&t3, &t2).len(), 1);
        assert!(store.pools_for_pair(&t1, &t3).is_empty());
    }

    #[test]
    fn test_cache_stats() {
        let store = PoolStore::new(1, vec![pool(1, 2, PoolSource::Fallback)]);
        let stats = store.stats();
        assert_eq!(stats.total_pools, 1);
        assert!(!stats.serving_runtime);
        assert_eq!(stats.fallback_pools, 1);

        store.set_runtime_pools(Some(vec![pool(1, 2, PoolSource::OnChain), pool(2, 3, PoolSource::Fallback)]));
        let stats = store.stats();
        assert!(stats.serving_runtime);
        assert_eq!(stats.on_chain_pools, 1);
        assert_eq!(stats.fallback_pools, 1);
        assert_eq!(stats.dex_counts.get("TestDEX"), Some(&2));
        assert_eq!(stats.oldest_update, Some(7));
    }

    #[test]
    fn test_builtin_fallback_pools_are_sorted_pairs() {
        let pools = builtin_fallback_pools(Chain::Alfajores, "UniswapV2", 30).unwrap();
        assert_eq!(pools.len(), 3);
        for pool in &pools {
            assert!(pool.token0 < pool.token1);
            assert!(pool.has_liquidity());
            assert_eq!(pool.source, PoolSource::Fallback);
        }
        assert!(builtin_fallback_pools(Chain::CeloSepolia, "UniswapV2", 30)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_seed_pool_orients_reserves() {
        let wavax = utils::parse_address(tokens::FUJI_WAVAX).unwrap();
        let pools = builtin_fallback_pools(Chain::Fuji, "UniswapV2", 30).unwrap();
        let (reserve_in, _) = pools[0].get_reserves(&wavax).unwrap();
        assert_eq!(reserve_in, units(10_000, 18).unwrap());
    }
}
