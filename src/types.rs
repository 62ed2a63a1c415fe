use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::utils;

/// Custom error types for route discovery
#[derive(Error, Debug)]
pub enum RoutingError {
    #[error("RPC error: {0}")]
    RpcError(String),

    #[error("Contract call failed: {0}")]
    ContractError(String),

    #[error("Unknown token: {0}")]
    UnknownToken(String),

    #[error("Unsupported chain: {0}")]
    UnsupportedChain(String),

    #[error("Invalid token address: {0}")]
    InvalidTokenAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient liquidity: {0}")]
    InsufficientLiquidity(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Math overflow or underflow")]
    MathError,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for routing operations
pub type Result<T> = std::result::Result<T, RoutingError>;

/// Where a pool record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolSource {
    /// Static seed data shipped with the chain profile or loaded from a file
    Fallback,
    /// Reserves read from the pair contract
    OnChain,
}

impl fmt::Display for PoolSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolSource::Fallback => write!(f, "fallback"),
            PoolSource::OnChain => write!(f, "on-chain"),
        }
    }
}

/// A constant-product liquidity pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    /// First token address
    pub token0: Address,

    /// Second token address
    pub token1: Address,

    /// Reserve of token0 in base units
    pub reserve0: U256,

    /// Reserve of token1 in base units
    pub reserve1: U256,

    /// Fee in basis points (e.g., 30 = 0.3%)
    pub fee_bps: u32,

    /// DEX name
    pub dex_name: String,

    /// Unix timestamp (seconds) of the last reserve update
    pub last_updated: u64,

    /// Pair contract address, when known
    #[serde(default)]
    pub pair_address: Option<Address>,

    #[serde(default = "default_source")]
    pub source: PoolSource,
}

fn default_source() -> PoolSource {
    PoolSource::Fallback
}

impl Pool {
    /// Get the other token in the pair
    pub fn get_other_token(&self, token: &Address) -> Option<Address> {
        if token == &self.token0 {
            Some(self.token1)
        } else if token == &self.token1 {
            Some(self.token0)
        } else {
            None
        }
    }

    /// Get reserves oriented as (reserve_in, reserve_out) for a given input token
    pub fn get_reserves(&self, token_in: &Address) -> Option<(U256, U256)> {
        if token_in == &self.token0 {
            Some((self.reserve0, self.reserve1))
        } else if token_in == &self.token1 {
            Some((self.reserve1, self.reserve0))
        } else {
            None
        }
    }

    /// True when the pool connects `a` and `b` in either order
    pub fn connects(&self, a: &Address, b: &Address) -> bool {
        (self.token0 == *a && self.token1 == *b) || (self.token0 == *b && self.token1 == *a)
    }

    pub fn has_liquidity(&self) -> bool {
        !self.reserve0.is_zero() && !self.reserve1.is_zero()
    }

    /// Stable identity used for de-duplication and deterministic ordering.
    ///
    /// The pair contract address when known, otherwise the DEX name plus the
    /// token pair in sorted order.
    pub fn key(&self) -> String {
        match self.pair_address {
            Some(addr) => format!("{:?}", addr),
            None => {
                let (a, b) = utils::sort_tokens(self.token0, self.token1);
                format!("{}:{:?}:{:?}", self.dex_name, a, b)
            }
        }
    }
}

/// A single traversal of one pool in a given direction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteEdge {
    /// Identity of the pool traversed (see [`Pool::key`])
    pub pool_key: String,

    /// Pair contract address, when known
    pub pair_address: Option<Address>,

    pub dex_name: String,

    pub token_in: Address,

    pub token_out: Address,

    pub amount_in: U256,

    pub amount_out: U256,

    /// Fee paid in this hop (in token_in)
    pub fee: U256,

    pub fee_bps: u32,
}

/// Ordered sequence of edges from the source token to the destination token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub token_in: Address,

    pub token_out: Address,

    pub amount_in: U256,

    /// Output of the final hop
    pub amount_out: U256,

    pub edges: Vec<RouteEdge>,

    /// Deviation of the executed price from the pre-trade marginal price, in basis points
    pub price_impact_bps: u32,
}

impl Route {
    /// Get number of hops
    pub fn hop_count(&self) -> usize {
        self.edges.len()
    }

    /// Tokens visited in order, including both endpoints
    pub fn path(&self) -> Vec<Address> {
        let mut path = Vec::with_capacity(self.edges.len() + 1);
        path.push(self.token_in);
        path.extend(self.edges.iter().map(|edge| edge.token_out));
        path
    }

    /// Effective exchange rate in base units (out per in)
    pub fn exchange_rate(&self) -> f64 {
        if self.amount_in.is_zero() {
            return 0.0;
        }
        utils::u256_to_f64(self.amount_out) / utils::u256_to_f64(self.amount_in)
    }

    pub fn price_impact_percent(&self) -> f64 {
        self.price_impact_bps as f64 / 100.0
    }

    /// Total fees paid across all hops, each in that hop's input token
    pub fn total_fees(&self) -> Vec<(Address, U256)> {
        self.edges
            .iter()
            .map(|edge| (edge.token_in, edge.fee))
            .collect()
    }

    /// Minimum acceptable output after applying a slippage tolerance
    pub fn min_amount_out(&self, slippage_bps: u32) -> U256 {
        let keep = U256::from(10_000u32.saturating_sub(slippage_bps));
        let base = U256::from(10_000u32);
        // Split to stay clear of overflow for amounts near U256::MAX
        (self.amount_out / base) * keep + (self.amount_out % base) * keep / base
    }

    /// Generate a human-readable route path using a label for each token
    pub fn describe<F>(&self, label: F) -> String
    where
        F: Fn(&Address) -> String,
    {
        self.path().iter().map(label).collect::<Vec<_>>().join(" → ")
    }
}

/// Token metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub symbol: String,

    pub name: String,

    /// Contract address, or the native-asset sentinel
    pub address: Address,

    pub decimals: u8,

    /// Wrapped ERC-20 used in pools when this is a native asset
    #[serde(default)]
    pub wrapped: Option<Address>,
}

impl TokenInfo {
    pub fn is_native(&self) -> bool {
        self.address == crate::tokens::NATIVE_TOKEN_ADDRESS
    }
}

impl fmt::Display for TokenInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.symbol, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> Pool {
        Pool {
            token0: Address::from_low_u64_be(1),
            token1: Address::from_low_u64_be(2),
            reserve0: U256::from(1_000u64),
            reserve1: U256::from(4_000u64),
            fee_bps: 30,
            dex_name: "TestDEX".to_string(),
            last_updated: 0,
            pair_address: None,
            source: PoolSource::Fallback,
        }
    }

    #[test]
    fn test_reserves_are_oriented_by_input() {
        let pool = pool();
        let t0 = Address::from_low_u64_be(1);
        let t1 = Address::from_low_u64_be(2);

        assert_eq!(pool.get_reserves(&t0), Some((pool.reserve0, pool.reserve1)));
        assert_eq!(pool.get_reserves(&t1), Some((pool.reserve1, pool.reserve0)));
        assert_eq!(pool.get_reserves(&Address::from_low_u64_be(9)), None);
        assert_eq!(pool.get_other_token(&t1), Some(t0));
    }

    #[test]
    fn test_key_ignores_token_order() {
        let a = pool();
        let b = Pool {
            token0: a.token1,
            token1: a.token0,
            ..pool()
        };
        assert_eq!(a.key(), b.key());

        let with_pair = Pool {
            pair_address: Some(Address::from_low_u64_be(100)),
            ..pool()
        };
        assert_ne!(with_pair.key(), a.key());
    }

    #[test]
    fn test_min_amount_out() {
        let route = Route {
            token_in: Address::from_low_u64_be(1),
            token_out: Address::from_low_u64_be(2),
            amount_in: U256::from(100u64),
            amount_out: U256::from(10_000u64),
            edges: vec![],
            price_impact_bps: 0,
        };
        assert_eq!(route.min_amount_out(50), U256::from(9_950u64));
        assert_eq!(route.min_amount_out(20_000), U256::zero());
    }
}
