use ethers::types::{Address, U256};
use std::collections::HashSet;
use swap_router::{quote::QuoteEngine, utils, Pool, PoolSource, Router};

const E18: u128 = 1_000_000_000_000_000_000;

fn token(n: u64) -> Address {
    Address::from_low_u64_be(n)
}

fn create_test_pool(a: u64, b: u64, reserve_a: u128, reserve_b: u128) -> Pool {
    Pool {
        token0: token(a),
        token1: token(b),
        reserve0: U256::from(reserve_a),
        reserve1: U256::from(reserve_b),
        fee_bps: 30,
        dex_name: "TestDEX".to_string(),
        last_updated: 0,
        pair_address: None,
        source: PoolSource::Fallback,
    }
}

#[test]
fn test_direct_route_matches_constant_product() {
    let pools = vec![
        create_test_pool(1, 2, 100 * E18, 200 * E18),
        create_test_pool(2, 3, 50 * E18, 80 * E18),
    ];
    let amount_in = U256::from(3 * E18);

    // Both directions of the direct pool
    for (from, to) in [(1, 2), (2, 1)] {
        let route = Router::new(1)
            .find_best_route(&pools, token(from), token(to), amount_in)
            .unwrap();

        let (reserve_in, reserve_out) = pools[0].get_reserves(&token(from)).unwrap();
        let expected = utils::get_amount_out(amount_in, reserve_in, reserve_out, 30).unwrap();

        assert_eq!(route.hop_count(), 1);
        assert_eq!(route.amount_out, expected);
        assert_eq!(route.edges[0].token_in, token(from));
        assert_eq!(route.edges[0].token_out, token(to));
    }
}

#[test]
fn test_reference_example() {
    // reserves 1000/1000, 0.3% fee, 10 in -> 1000 * 9.97 / 1009.97 ≈ 9.8716
    let pools = vec![create_test_pool(1, 2, 1_000 * E18, 1_000 * E18)];
    let route = Router::new(1)
        .find_best_route(&pools, token(1), token(2), U256::from(10 * E18))
        .unwrap();

    assert_eq!(route.amount_out, U256::from(9_871_580_343_970_612_988u128));
    let human = utils::format_token_amount(route.amount_out, 18);
    assert!(human.starts_with("9.8715"), "got {}", human);
}

#[test]
fn test_output_strictly_increases_with_input() {
    let pool = create_test_pool(1, 2, 1_000 * E18, 2_000 * E18);
    let step = U256::from(E18 / 100);

    let mut previous = U256::zero();
    for k in 1..=200u64 {
        let amount_in = step * U256::from(k);
        let quote = QuoteEngine::calculate_pool_output(&pool, token(1), amount_in).unwrap();
        assert!(
            quote.amount_out > previous,
            "output did not increase at step {}",
            k
        );
        previous = quote.amount_out;
    }
}

#[test]
fn test_routes_never_repeat_tokens() {
    // Fully connected graph over six tokens with uneven reserves
    let mut pools = Vec::new();
    for a in 1..=6u64 {
        for b in (a + 1)..=6u64 {
            let reserve_a = (a as u128 * 7 + b as u128) * 100 * E18;
            let reserve_b = (b as u128 * 5 + a as u128) * 100 * E18;
            pools.push(create_test_pool(a, b, reserve_a, reserve_b));
        }
    }

    let router = Router::new(4);
    let routes = router.find_top_routes(&pools, token(1), token(6), U256::from(E18), usize::MAX);

    // 1 direct + 4 + 4*3 + 4*3*2 simple paths within four hops
    assert_eq!(routes.len(), 41);

    for route in &routes {
        let path = route.path();
        let unique: HashSet<_> = path.iter().collect();
        assert_eq!(unique.len(), path.len(), "repeated token in {:?}", path);
        assert!(route.hop_count() <= 4);
        assert_eq!(path.first(), Some(&token(1)));
        assert_eq!(path.last(), Some(&token(6)));

        for pair in route.edges.windows(2) {
            assert_eq!(pair[0].token_out, pair[1].token_in);
            assert_eq!(pair[0].amount_out, pair[1].amount_in);
        }
    }

    for pair in routes.windows(2) {
        assert!(pair[0].amount_out >= pair[1].amount_out);
    }
}

#[test]
fn test_disconnected_tokens_have_no_route() {
    let pools = vec![
        create_test_pool(1, 2, 100 * E18, 100 * E18),
        create_test_pool(3, 4, 100 * E18, 100 * E18),
    ];

    for max_hops in 1..=4 {
        let router = Router::new(max_hops);
        for (from, to) in [(1, 3), (1, 4), (2, 3), (4, 1), (1, 9)] {
            assert!(router
                .find_best_route(&pools, token(from), token(to), U256::from(E18))
                .is_none());
        }
    }
}

#[test]
fn test_parallel_pools_pick_deeper_liquidity() {
    let shallow = create_test_pool(1, 2, 100 * E18, 200 * E18);
    let deep = Pool {
        pair_address: Some(token(101)),
        ..create_test_pool(1, 2, 200 * E18, 400 * E18)
    };
    let pools = vec![shallow, deep];

    let route = Router::new(2)
        .find_best_route(&pools, token(1), token(2), U256::from(E18))
        .unwrap();

    assert_eq!(route.edges[0].pair_address, Some(token(101)));
}

#[test]
fn test_identical_routes_break_ties_by_pool_key() {
    let low_key = Pool {
        pair_address: Some(token(0xa)),
        ..create_test_pool(1, 2, 1_000, 1_000)
    };
    let high_key = Pool {
        pair_address: Some(token(0xb)),
        ..create_test_pool(1, 2, 1_000, 1_000)
    };
    let forward = vec![high_key.clone(), low_key.clone()];
    let reversed = vec![low_key, high_key];
    let router = Router::new(1);

    for pools in [forward, reversed] {
        let routes = router.find_top_routes(&pools, token(1), token(2), U256::from(10u64), 2);
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].amount_out, routes[1].amount_out);
        assert_eq!(routes[0].price_impact_bps, routes[1].price_impact_bps);
        assert_eq!(routes[0].edges[0].pair_address, Some(token(0xa)));
    }
}

#[test]
fn test_equal_output_prefers_lower_price_impact() {
    // Both floor to 9 out for 10 in; the second starts from a better marginal
    // rate, so the same output is a larger deviation from it
    let calm = Pool {
        fee_bps: 0,
        pair_address: Some(token(0xb)),
        ..create_test_pool(1, 2, 1_000, 1_000)
    };
    let skewed = Pool {
        fee_bps: 0,
        pair_address: Some(token(0xa)),
        ..create_test_pool(1, 2, 1_000, 1_001)
    };
    let router = Router::new(1);

    for pools in [vec![calm.clone(), skewed.clone()], vec![skewed, calm]] {
        let routes = router.find_top_routes(&pools, token(1), token(2), U256::from(10u64), 2);
        assert_eq!(routes[0].amount_out, U256::from(9u64));
        assert_eq!(routes[1].amount_out, U256::from(9u64));
        assert!(routes[0].price_impact_bps < routes[1].price_impact_bps);
        assert_eq!(routes[0].edges[0].pair_address, Some(token(0xb)));
    }
}

#[test]
fn test_price_impact_grows_with_trade_size() {
    let pools = vec![create_test_pool(1, 2, 1_000 * E18, 2_000 * E18)];
    let router = Router::new(1);

    let small = router
        .find_best_route(&pools, token(1), token(2), U256::from(E18))
        .unwrap();
    let large = router
        .find_best_route(&pools, token(1), token(2), U256::from(500 * E18))
        .unwrap();

    assert!(small.price_impact_bps < 100);
    assert!(large.price_impact_bps > 100);
    assert!(large.price_impact_bps > small.price_impact_bps);
}

#[test]
fn test_zero_reserve_pools_are_ignored() {
    let pools = vec![
        create_test_pool(1, 2, 0, 100 * E18),
        create_test_pool(1, 3, 100 * E18, 100 * E18),
        create_test_pool(3, 2, 100 * E18, 100 * E18),
    ];

    let route = Router::new(3)
        .find_best_route(&pools, token(1), token(2), U256::from(E18))
        .unwrap();
    assert_eq!(route.path(), vec![token(1), token(3), token(2)]);
}

#[test]
fn test_parse_token_amount() {
    let cases = vec![
        ("1.0", 18, U256::from(1_000_000_000_000_000_000u128)),
        ("0.5", 18, U256::from(500_000_000_000_000_000u128)),
        ("1000", 6, U256::from(1_000_000_000u128)),
        ("1.23456", 6, U256::from(1_234_560u128)),
    ];

    for (input, decimals, expected) in cases {
        let result = utils::parse_token_amount(input, decimals);
        assert!(result.is_ok(), "Failed to parse: {}", input);
        assert_eq!(result.unwrap(), expected, "Wrong value for: {}", input);
    }
}
