use crate::quote::QuoteEngine;
use crate::types::{Pool, Route};
use ethers::types::{Address, U256};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, info};

/// Upper bound on hops regardless of what callers ask for
pub const MAX_HOPS_CAP: usize = 4;

/// token -> [(index into the pool slice, counterparty token)]
type Adjacency = HashMap<Address, Vec<(usize, Address)>>;

/// Router for finding the best multi-hop swap route
pub struct Router {
    max_hops: usize,
}

impl Router {
    /// Create a new router
    pub fn new(max_hops: usize) -> Self {
        Self {
            max_hops: max_hops.min(MAX_HOPS_CAP),
        }
    }

    pub fn max_hops(&self) -> usize {
        self.max_hops
    }

    /// Find the route with the highest output, or `None` when no path exists
    /// within the hop limit.
    pub fn find_best_route(
        &self,
        pools: &[Pool],
        token_in: Address,
        token_out: Address,
        amount_in: U256,
    ) -> Option<Route> {
        let best = self
            .find_top_routes(pools, token_in, token_out, amount_in, 1)
            .into_iter()
            .next();

        match &best {
            Some(route) => info!(
                "Best route: {} hop(s), {} out, impact {} bps",
                route.hop_count(),
                route.amount_out,
                route.price_impact_bps
            ),
            None => info!("No route from {:?} to {:?} within {} hops", token_in, token_out, self.max_hops),
        }

        best
    }

    /// All viable routes, best first, truncated to `limit`
    pub fn find_top_routes(
        &self,
        pools: &[Pool],
        token_in: Address,
        token_out: Address,
        amount_in: U256,
        limit: usize,
    ) -> Vec<Route> {
        if token_in == token_out || amount_in.is_zero() || self.max_hops == 0 || limit == 0 {
            return Vec::new();
        }

        let adjacency = self.build_adjacency_map(pools);
        let paths = self.find_all_paths(&adjacency, token_in, token_out);
        debug!("Found {} candidate paths", paths.len());

        let mut routes: Vec<Route> = paths
            .iter()
            .filter_map(|path| {
                let hop_pools: Vec<&Pool> = path.pools.iter().map(|&i| &pools[i]).collect();
                match QuoteEngine::quote_path(&hop_pools, &path.tokens, amount_in) {
                    Ok(route) => Some(route),
                    Err(e) => {
                        debug!("Discarding path of {} hops: {}", path.pools.len(), e);
                        None
                    }
                }
            })
            .collect();

        routes.sort_by(compare_routes);
        routes.truncate(limit);
        routes
    }

    /// Build adjacency map for the token graph. Pools without liquidity and
    /// duplicate entries for the same pool are left out.
    fn build_adjacency_map(&self, pools: &[Pool]) -> Adjacency {
        let mut adjacency: Adjacency = HashMap::new();
        let mut seen = HashSet::new();

        for (index, pool) in pools.iter().enumerate() {
            if !pool.has_liquidity() || pool.token0 == pool.token1 {
                continue;
            }
            if !seen.insert(pool.key()) {
                continue;
            }

            adjacency
                .entry(pool.token0)
                .or_default()
                .push((index, pool.token1));

            adjacency
                .entry(pool.token1)
                .or_default()
                .push((index, pool.token0));
        }

        adjacency
    }

    /// Breadth-first enumeration of simple paths up to `max_hops` edges
    fn find_all_paths(&self, adjacency: &Adjacency, start: Address, end: Address) -> Vec<Path> {
        let mut paths = Vec::new();
        let mut queue: VecDeque<Path> = VecDeque::new();

        queue.push_back(Path {
            tokens: vec![start],
            pools: vec![],
        });

        while let Some(path) = queue.pop_front() {
            if path.pools.len() >= self.max_hops {
                continue;
            }

            let current = path.tokens[path.tokens.len() - 1];
            let Some(connections) = adjacency.get(&current) else {
                continue;
            };

            for &(pool_index, next_token) in connections {
                // Simple paths only
                if path.tokens.contains(&next_token) {
                    continue;
                }

                let mut next = path.clone();
                next.tokens.push(next_token);
                next.pools.push(pool_index);

                if next_token == end {
                    paths.push(next);
                } else {
                    queue.push_back(next);
                }
            }
        }

        paths
    }
}

/// Higher output first; then fewer hops; then lower price impact; then pool keys
/// so equal routes always come back in the same order.
fn compare_routes(a: &Route, b: &Route) -> Ordering {
    b.amount_out
        .cmp(&a.amount_out)
        .then_with(|| a.hop_count().cmp(&b.hop_count()))
        .then_with(|| a.price_impact_bps.cmp(&b.price_impact_bps))
        .then_with(|| {
            let keys_a = a.edges.iter().map(|edge| edge.pool_key.as_str());
            let keys_b = b.edges.iter().map(|edge| edge.pool_key.as_str());
            keys_a.cmp(keys_b)
        })
}

/// A candidate path through the pool graph
#[derive(Debug, Clone)]
struct Path {
    tokens: Vec<Address>,
    pools: Vec<usize>,
}
