use crate::config::Chain;
use crate::types::{Result, RoutingError, TokenInfo};
use crate::utils;
use dashmap::DashMap;
use ethers::types::{Address, H160};
use std::fs;
use tracing::{debug, info};

/// Sentinel address standing in for a chain's native asset
pub const NATIVE_TOKEN_ADDRESS: Address = H160([0xee; 20]);

pub const FUJI_WAVAX: &str = "0xd00ae08403B9bbb9124bB305C09058E32C39A48c";
pub const FUJI_USDC: &str = "0x5425890298aed601595a70AB815c96711a31Bc65";

// CELO is both the native asset and an ERC-20 on Celo networks
pub const ALFAJORES_CELO: &str = "0xF194afDf50B03e69Bd7D057c1Aa9e10c9954E4C9";
pub const ALFAJORES_CUSD: &str = "0x874069Fa1Eb16D44d622F2e0Ca25eeA172369bC1";
pub const ALFAJORES_CEUR: &str = "0x10c892A6EC43a53E45D0B916B4b7D383B1b78C0F";

pub const CELO_SEPOLIA_CELO: &str = "0x471EcE3750Da237f93B8E339c536989b8978a438";

fn token(symbol: &str, name: &str, address: &str, decimals: u8) -> Result<TokenInfo> {
    Ok(TokenInfo {
        symbol: symbol.to_string(),
        name: name.to_string(),
        address: utils::parse_address(address)?,
        decimals,
        wrapped: None,
    })
}

/// Tokens known out of the box for a chain
pub fn builtin_tokens(chain: Chain) -> Result<Vec<TokenInfo>> {
    let tokens = match chain {
        Chain::Fuji => vec![
            TokenInfo {
                symbol: "AVAX".to_string(),
                name: "Avalanche".to_string(),
                address: NATIVE_TOKEN_ADDRESS,
                decimals: 18,
                wrapped: Some(utils::parse_address(FUJI_WAVAX)?),
            },
            token("WAVAX", "Wrapped AVAX", FUJI_WAVAX, 18)?,
            token("USDC", "USD Coin", FUJI_USDC, 6)?,
        ],
        Chain::Alfajores => vec![
            token("CELO", "Celo", ALFAJORES_CELO, 18)?,
            token("cUSD", "Celo Dollar", ALFAJORES_CUSD, 18)?,
            token("cEUR", "Celo Euro", ALFAJORES_CEUR, 18)?,
        ],
        Chain::CeloSepolia => vec![token("CELO", "Celo", CELO_SEPOLIA_CELO, 18)?],
    };
    Ok(tokens)
}

/// Symbol and address lookup for the tokens a chain profile knows about
pub struct TokenRegistry {
    chain: Chain,
    by_symbol: DashMap<String, TokenInfo>,
    by_address: DashMap<Address, TokenInfo>,
}

impl TokenRegistry {
    /// Empty registry for a chain
    pub fn new(chain: Chain) -> Self {
        Self {
            chain,
            by_symbol: DashMap::new(),
            by_address: DashMap::new(),
        }
    }

    /// Registry seeded with the chain's built-in tokens
    pub fn for_chain(chain: Chain) -> Result<Self> {
        let registry = Self::new(chain);
        for token in builtin_tokens(chain)? {
            registry.register(token);
        }
        Ok(registry)
    }

    /// Add or replace a token. Symbols are matched case-insensitively.
    pub fn register(&self, token: TokenInfo) {
        debug!("Registering token {} at {:?}", token.symbol, token.address);
        self.by_address.insert(token.address, token.clone());
        self.by_symbol.insert(token.symbol.to_uppercase(), token);
    }

    /// Merge a JSON array of tokens into the registry
    pub fn load_token_list(&self, path: &str) -> Result<usize> {
        let json = fs::read_to_string(path)
            .map_err(|e| RoutingError::ConfigError(format!("Failed to read token list {}: {}", path, e)))?;

        let tokens: Vec<TokenInfo> = serde_json::from_str(&json)
            .map_err(|e| RoutingError::ParseError(format!("Failed to parse token list {}: {}", path, e)))?;

        if let Some(token) = tokens.iter().find(|t| t.decimals > utils::MAX_TOKEN_DECIMALS) {
            return Err(RoutingError::ParseError(format!(
                "Token {} in {} has {} decimals, maximum is {}",
                token.symbol,
                path,
                token.decimals,
                utils::MAX_TOKEN_DECIMALS
            )));
        }

        let count = tokens.len();
        for token in tokens {
            self.register(token);
        }

        info!("Loaded {} tokens from {}", count, path);
        Ok(count)
    }

    /// Resolve a symbol (or a `0x` address) to token metadata.
    ///
    /// Unknown addresses resolve to a placeholder with 18 decimals so that
    /// pools discovered on chain can still be routed through.
    pub fn resolve_token_by_symbol(&self, symbol_or_address: &str) -> Result<TokenInfo> {
        let input = symbol_or_address.trim();

        if let Some(token) = self.by_symbol.get(&input.to_uppercase()) {
            return Ok(token.value().clone());
        }

        if input.starts_with("0x") && input.len() == 42 {
            let address = utils::parse_address(input)?;
            if let Some(token) = self.get_by_address(&address) {
                return Ok(token);
            }
            return Ok(TokenInfo {
                symbol: utils::short_address(&address),
                name: "Unknown token".to_string(),
                address,
                decimals: 18,
                wrapped: None,
            });
        }

        Err(RoutingError::UnknownToken(format!(
            "'{}' on {}. Known symbols: {}",
            input,
            self.chain,
            self.symbols().join(", ")
        )))
    }

    pub fn get_by_address(&self, address: &Address) -> Option<TokenInfo> {
        self.by_address.get(address).map(|entry| entry.value().clone())
    }

    /// Address a token trades under inside pools: native assets route through
    /// their wrapped ERC-20.
    pub fn routing_address(&self, token: &TokenInfo) -> Result<Address> {
        if token.is_native() {
            return token.wrapped.ok_or_else(|| {
                RoutingError::UnknownToken(format!("{} has no wrapped counterpart", token.symbol))
            });
        }
        Ok(token.address)
    }

    /// Display label for an address: symbol when known, shortened address otherwise
    pub fn label(&self, address: &Address) -> String {
        self.get_by_address(address)
            .map(|token| token.symbol)
            .unwrap_or_else(|| utils::short_address(address))
    }

    /// Decimals for an address, 18 when unknown
    pub fn decimals(&self, address: &Address) -> u8 {
        self.get_by_address(address).map(|token| token.decimals).unwrap_or(18)
    }

    /// All registered tokens sorted by symbol
    pub fn all(&self) -> Vec<TokenInfo> {
        let mut tokens: Vec<TokenInfo> = self
            .by_symbol
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        tokens.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        tokens
    }

    fn symbols(&self) -> Vec<String> {
        self.all().into_iter().map(|token| token.symbol).collect()
    }
}
