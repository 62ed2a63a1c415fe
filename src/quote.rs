use crate::types::{Pool, Result, Route, RouteEdge, RoutingError};
use crate::utils;
use ethers::types::{Address, U256};
use tracing::debug;

/// Quote engine for constant-product swap outputs
pub struct QuoteEngine;

impl QuoteEngine {
    /// Calculate output amount for a single pool swap
    pub fn calculate_pool_output(pool: &Pool, token_in: Address, amount_in: U256) -> Result<QuoteResult> {
        let (reserve_in, reserve_out) = pool.get_reserves(&token_in).ok_or_else(|| {
            RoutingError::InvalidTokenAddress(format!(
                "Token {:?} not in pool {}",
                token_in,
                pool.key()
            ))
        })?;

        let token_out = pool
            .get_other_token(&token_in)
            .ok_or_else(|| RoutingError::InvalidTokenAddress("Invalid token pair".to_string()))?;

        let amount_out = utils::get_amount_out(amount_in, reserve_in, reserve_out, pool.fee_bps)?;
        let fee = utils::calculate_fee(amount_in, pool.fee_bps);
        let marginal = utils::marginal_rate(reserve_in, reserve_out, pool.fee_bps);
        let price_impact_bps = utils::price_impact_bps(amount_in, amount_out, marginal);

        debug!(
            "Pool {}: {} in -> {} out (price impact: {} bps)",
            pool.key(),
            amount_in,
            amount_out,
            price_impact_bps
        );

        Ok(QuoteResult {
            pool: pool.clone(),
            token_in,
            token_out,
            amount_in,
            amount_out,
            fee,
            price_impact_bps,
        })
    }

    /// Calculate per-hop amounts along a path, feeding each hop's output into the next
    pub fn calculate_route_output(pools: &[&Pool], tokens: &[Address], amount_in: U256) -> Result<Vec<RouteEdge>> {
        if pools.is_empty() || tokens.len() != pools.len() + 1 {
            return Err(RoutingError::InvalidAmount(
                "Invalid route: pools and tokens mismatch".to_string(),
            ));
        }

        let mut edges = Vec::with_capacity(pools.len());
        let mut current_amount = amount_in;

        for (i, pool) in pools.iter().enumerate() {
            let token_in = tokens[i];
            let token_out = tokens[i + 1];

            if pool.get_other_token(&token_in) != Some(token_out) {
                return Err(RoutingError::InvalidTokenAddress(format!(
                    "Pool {} does not connect {:?} and {:?}",
                    pool.key(),
                    token_in,
                    token_out
                )));
            }

            let quote = Self::calculate_pool_output(pool, token_in, current_amount)?;

            edges.push(RouteEdge {
                pool_key: pool.key(),
                pair_address: pool.pair_address,
                dex_name: pool.dex_name.clone(),
                token_in,
                token_out,
                amount_in: current_amount,
                amount_out: quote.amount_out,
                fee: quote.fee,
                fee_bps: pool.fee_bps,
            });

            current_amount = quote.amount_out;
        }

        Ok(edges)
    }

    /// Evaluate a full path into a [`Route`], including its price impact
    pub fn quote_path(pools: &[&Pool], tokens: &[Address], amount_in: U256) -> Result<Route> {
        let edges = Self::calculate_route_output(pools, tokens, amount_in)?;

        // Pre-trade marginal rate of the whole path, net of fees
        let mut marginal = 1.0;
        for (pool, token_in) in pools.iter().zip(tokens) {
            let (reserve_in, reserve_out) = pool.get_reserves(token_in).ok_or(RoutingError::MathError)?;
            marginal *= utils::marginal_rate(reserve_in, reserve_out, pool.fee_bps);
        }

        let amount_out = edges.last().map(|edge| edge.amount_out).unwrap_or_default();
        let price_impact_bps = utils::price_impact_bps(amount_in, amount_out, marginal);

        Ok(Route {
            token_in: tokens[0],
            token_out: tokens[tokens.len() - 1],
            amount_in,
            amount_out,
            edges,
            price_impact_bps,
        })
    }
}

/// Result of a single-pool quote
#[derive(Debug, Clone)]
pub struct QuoteResult {
    pub pool: Pool,
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
    pub amount_out: U256,
    pub fee: U256,
    pub price_impact_bps: u32,
}
