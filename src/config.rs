use crate::types::{Result, RoutingError};
use crate::utils;
use ethers::types::Address;
use std::env;
use std::fmt;
use std::str::FromStr;

/// Supported EVM networks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Chain {
    /// Avalanche Fuji C-Chain testnet
    Fuji,
    /// Celo Alfajores testnet
    Alfajores,
    /// Celo Sepolia testnet
    CeloSepolia,
}

impl Chain {
    pub fn chain_id(&self) -> u64 {
        match self {
            Chain::Fuji => 43113,
            Chain::Alfajores => 44787,
            Chain::CeloSepolia => 11142220,
        }
    }

    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            Chain::Fuji => "https://api.avax-test.network/ext/bc/C/rpc",
            Chain::Alfajores => "https://alfajores-forno.celo-testnet.org",
            Chain::CeloSepolia => "https://forno.celo-sepolia.celo-testnet.org",
        }
    }

    pub fn native_symbol(&self) -> &'static str {
        match self {
            Chain::Fuji => "AVAX",
            Chain::Alfajores | Chain::CeloSepolia => "CELO",
        }
    }

    pub fn from_chain_id(chain_id: u64) -> Result<Self> {
        [Chain::Fuji, Chain::Alfajores, Chain::CeloSepolia]
            .into_iter()
            .find(|chain| chain.chain_id() == chain_id)
            .ok_or_else(|| RoutingError::UnsupportedChain(chain_id.to_string()))
    }
}

impl FromStr for Chain {
    type Err = RoutingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "fuji" | "avalanche-fuji" | "avalanche_fuji" | "43113" => Ok(Chain::Fuji),
            "alfajores" | "celo-alfajores" | "celo_alfajores" | "44787" => Ok(Chain::Alfajores),
            "celo-sepolia" | "celo_sepolia" | "sepolia" | "11142220" => Ok(Chain::CeloSepolia),
            other => Err(RoutingError::UnsupportedChain(other.to_string())),
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Chain::Fuji => write!(f, "Avalanche Fuji"),
            Chain::Alfajores => write!(f, "Celo Alfajores"),
            Chain::CeloSepolia => write!(f, "Celo Sepolia"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub chain: Chain,

    pub rpc_url: String,

    /// Uniswap-V2 style factory used to look up pair contracts
    pub factory_address: Option<Address>,

    /// Router used for on-chain `getAmountsOut` cross-checks
    pub router_address: Option<Address>,

    pub dex_name: String,

    /// Fee charged by the configured DEX, in basis points
    pub fee_bps: u32,

    pub max_hops: usize,

    pub default_slippage_bps: u32,

    /// Default location for pool snapshot export/import
    pub cache_path: String,

    /// Optional JSON token list merged into the built-in registry
    pub token_list_path: Option<String>,

    /// Optional JSON pool list replacing the built-in fallback pools
    pub fallback_pools_path: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let chain = match env::var("CHAIN") {
            Ok(value) => Chain::from_str(&value)?,
            Err(_) => Chain::Fuji,
        };

        let rpc_url = env::var("RPC_URL").unwrap_or_else(|_| chain.default_rpc_url().to_string());

        let factory_address = Self::optional_address("FACTORY_ADDRESS")?;
        let router_address = Self::optional_address("ROUTER_ADDRESS")?;

        let dex_name = env::var("DEX_NAME").unwrap_or_else(|_| "UniswapV2".to_string());

        let fee_bps = Self::numeric_var("FEE_BPS", 30)?;
        let max_hops = Self::numeric_var("MAX_HOPS", 3)?;
        let default_slippage_bps = Self::numeric_var("DEFAULT_SLIPPAGE_BPS", 50)?;

        let cache_path = env::var("CACHE_PATH").unwrap_or_else(|_| "./cache/pools.json".to_string());

        let config = Self {
            chain,
            rpc_url,
            factory_address,
            router_address,
            dex_name,
            fee_bps,
            max_hops,
            default_slippage_bps,
            cache_path,
            token_list_path: env::var("TOKEN_LIST_PATH").ok(),
            fallback_pools_path: env::var("FALLBACK_POOLS_PATH").ok(),
        };
        config.validate()?;

        Ok(config)
    }

    /// Reject settings that would make every quote fail
    pub fn validate(&self) -> Result<()> {
        if self.fee_bps >= 10_000 {
            return Err(RoutingError::ConfigError(format!(
                "FEE_BPS must be below 10000, got {}",
                self.fee_bps
            )));
        }
        if self.max_hops == 0 {
            return Err(RoutingError::ConfigError("MAX_HOPS must be at least 1".to_string()));
        }
        if self.default_slippage_bps > 10_000 {
            return Err(RoutingError::ConfigError(
                "DEFAULT_SLIPPAGE_BPS must not exceed 10000".to_string(),
            ));
        }
        Ok(())
    }

    fn optional_address(var: &str) -> Result<Option<Address>> {
        match env::var(var) {
            Ok(value) if !value.trim().is_empty() => utils::parse_address(&value).map(Some),
            _ => Ok(None),
        }
    }

    fn numeric_var<T: FromStr>(var: &str, default: T) -> Result<T> {
        Self::parse_numeric(var, env::var(var).ok().as_deref(), default)
    }

    /// Unset means `default`; anything set must parse
    fn parse_numeric<T: FromStr>(var: &str, raw: Option<&str>, default: T) -> Result<T> {
        match raw {
            None => Ok(default),
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| RoutingError::ConfigError(format!("Invalid {}: '{}'", var, value))),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chain: Chain::Fuji,
            rpc_url: Chain::Fuji.default_rpc_url().to_string(),
            factory_address: None,
            router_address: None,
            dex_name: "UniswapV2".to_string(),
            fee_bps: 30,
            max_hops: 3,
            default_slippage_bps: 50,
            cache_path: "./cache/pools.json".to_string(),
            token_list_path: None,
            fallback_pools_path: None,
        }
    }
}
