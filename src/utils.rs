use crate::types::{Result, RoutingError};
use ethers::types::{Address, U256};
use std::str::FromStr;

const BPS_DENOMINATOR: u32 = 10_000;

/// Largest decimals value whose scale factor fits in a U256 (10^77)
pub const MAX_TOKEN_DECIMALS: u8 = 77;

/// 10^decimals, or `None` when it does not fit in a U256
pub fn decimals_factor(decimals: u8) -> Option<U256> {
    U256::from(10u64).checked_pow(U256::from(decimals))
}

/// Calculate the output of a constant-product (x * y = k) swap
/// amountOut = (amountIn * feeFactor * reserveOut) / (reserveIn * 10000 + amountIn * feeFactor)
/// where feeFactor = 10000 - fee_bps (e.g., 9970 for 0.3% fee)
pub fn get_amount_out(
    amount_in: U256,
    reserve_in: U256,
    reserve_out: U256,
    fee_bps: u32,
) -> Result<U256> {
    if amount_in.is_zero() {
        return Err(RoutingError::InvalidAmount("Amount in cannot be zero".to_string()));
    }
    if fee_bps >= BPS_DENOMINATOR {
        return Err(RoutingError::InvalidAmount(format!(
            "Fee of {} bps leaves nothing to swap",
            fee_bps
        )));
    }
    if reserve_in.is_zero() || reserve_out.is_zero() {
        return Err(RoutingError::InsufficientLiquidity("Pool has zero reserves".to_string()));
    }

    let fee_factor = U256::from(BPS_DENOMINATOR - fee_bps);
    let fee_base = U256::from(BPS_DENOMINATOR);

    let amount_in_with_fee = amount_in
        .checked_mul(fee_factor)
        .ok_or(RoutingError::MathError)?;

    let numerator = amount_in_with_fee
        .checked_mul(reserve_out)
        .ok_or(RoutingError::MathError)?;

    let denominator = reserve_in
        .checked_mul(fee_base)
        .ok_or(RoutingError::MathError)?
        .checked_add(amount_in_with_fee)
        .ok_or(RoutingError::MathError)?;

    let amount_out = numerator
        .checked_div(denominator)
        .ok_or(RoutingError::MathError)?;

    if amount_out.is_zero() {
        return Err(RoutingError::InsufficientLiquidity(
            "Output amount would be zero".to_string(),
        ));
    }

    Ok(amount_out)
}

/// Calculate the fee amount from an input amount
pub fn calculate_fee(amount: U256, fee_bps: u32) -> U256 {
    amount
        .checked_mul(U256::from(fee_bps))
        .and_then(|v| v.checked_div(U256::from(BPS_DENOMINATOR)))
        .unwrap_or_default()
}

/// Marginal (infinitesimal-trade) rate of one hop, net of the pool fee
pub fn marginal_rate(reserve_in: U256, reserve_out: U256, fee_bps: u32) -> f64 {
    if reserve_in.is_zero() {
        return 0.0;
    }
    let fee_factor = (BPS_DENOMINATOR.saturating_sub(fee_bps)) as f64 / BPS_DENOMINATOR as f64;
    u256_to_f64(reserve_out) / u256_to_f64(reserve_in) * fee_factor
}

/// Price impact in basis points: how far the executed rate `amount_out / amount_in`
/// falls below the pre-trade marginal rate. Clamped to [0, 10000].
pub fn price_impact_bps(amount_in: U256, amount_out: U256, marginal: f64) -> u32 {
    if amount_in.is_zero() || marginal <= 0.0 || !marginal.is_finite() {
        return BPS_DENOMINATOR;
    }

    let executed = u256_to_f64(amount_out) / u256_to_f64(amount_in);
    let impact = (1.0 - executed / marginal) * BPS_DENOMINATOR as f64;

    impact.round().clamp(0.0, BPS_DENOMINATOR as f64) as u32
}

/// Lossy conversion of a U256 into f64, valid over the full U256 range
pub fn u256_to_f64(value: U256) -> f64 {
    value
        .0
        .iter()
        .rev()
        .fold(0.0, |acc, word| acc * 18_446_744_073_709_551_616.0 + *word as f64)
}

/// Order two token addresses the way Uniswap-V2 pairs do (token0 < token1)
pub fn sort_tokens(a: Address, b: Address) -> (Address, Address) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Parse a token amount string with decimal support
/// Examples: "1.0", "0.5", "1000"
pub fn parse_token_amount(amount_str: &str, decimals: u8) -> Result<U256> {
    let amount_str = amount_str.trim();
    if decimals > MAX_TOKEN_DECIMALS {
        return Err(RoutingError::ParseError(format!(
            "Token decimals {} exceed the supported maximum of {}",
            decimals, MAX_TOKEN_DECIMALS
        )));
    }
    let parts: Vec<&str> = amount_str.split('.').collect();

    if parts.is_empty() || parts.len() > 2 || parts[0].is_empty() {
        return Err(RoutingError::ParseError(format!(
            "Invalid amount format: {}",
            amount_str
        )));
    }

    let integer_part = U256::from_dec_str(parts[0])
        .map_err(|_| RoutingError::ParseError(format!("Invalid integer part: {}", parts[0])))?;

    let decimal_part = if parts.len() == 2 {
        let dec_str = parts[1];
        if dec_str.len() > decimals as usize {
            return Err(RoutingError::ParseError(format!(
                "Too many decimal places. Max: {}",
                decimals
            )));
        }
        if dec_str.is_empty() {
            U256::zero()
        } else {
            let padded = format!("{:0<width$}", dec_str, width = decimals as usize);
            U256::from_dec_str(&padded).map_err(|_| {
                RoutingError::ParseError(format!("Invalid decimal part: {}", dec_str))
            })?
        }
    } else {
        U256::zero()
    };

    // (integer_part * 10^decimals) + decimal_part
    decimals_factor(decimals)
        .and_then(|factor| integer_part.checked_mul(factor))
        .and_then(|v| v.checked_add(decimal_part))
        .ok_or(RoutingError::MathError)
}

/// Format a token amount with decimals for display
pub fn format_token_amount(amount: U256, decimals: u8) -> String {
    if amount.is_zero() {
        return "0".to_string();
    }

    let Some(divisor) = decimals_factor(decimals) else {
        return amount.to_string();
    };
    let integer_part = amount / divisor;
    let remainder = amount % divisor;

    if remainder.is_zero() {
        return integer_part.to_string();
    }

    let decimal_str = format!("{:0>width$}", remainder.to_string(), width = decimals as usize);
    let trimmed = decimal_str.trim_end_matches('0');

    if trimmed.is_empty() {
        integer_part.to_string()
    } else {
        format!("{}.{}", integer_part, trimmed)
    }
}

/// Parse an EVM address from string
pub fn parse_address(addr_str: &str) -> Result<Address> {
    Address::from_str(addr_str.trim())
        .map_err(|_| RoutingError::InvalidTokenAddress(addr_str.to_string()))
}

/// Shorten an address for table output: 0x1234…abcd
pub fn short_address(addr: &Address) -> String {
    let full = format!("{:?}", addr);
    format!("{}…{}", &full[..6], &full[full.len() - 4..])
}

/// Current unix time in seconds
pub fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_amount_out_matches_formula() {
        // 10 in against 1000/1000 at 0.3%: 1000 * 9.97 / 1009.97 ≈ 9.8716
        let amount_in = U256::from(10_000_000_000_000_000_000u128);
        let reserve = U256::from(1_000_000_000_000_000_000_000u128);

        let amount_out = get_amount_out(amount_in, reserve, reserve, 30).unwrap();
        assert_eq!(amount_out, U256::from(9_871_580_343_970_612_988u128));
    }

    #[test]
    fn test_get_amount_out_rejects_bad_input() {
        let reserve = U256::from(1_000_000u64);
        assert!(matches!(
            get_amount_out(U256::zero(), reserve, reserve, 30),
            Err(RoutingError::InvalidAmount(_))
        ));
        assert!(matches!(
            get_amount_out(U256::from(10u64), U256::zero(), reserve, 30),
            Err(RoutingError::InsufficientLiquidity(_))
        ));
        assert!(matches!(
            get_amount_out(U256::from(10u64), reserve, reserve, 10_000),
            Err(RoutingError::InvalidAmount(_))
        ));
        // Floors to zero
        assert!(get_amount_out(U256::from(1u64), reserve, U256::from(10u64), 30).is_err());
    }

    #[test]
    fn test_get_amount_out_overflow() {
        assert!(matches!(
            get_amount_out(U256::MAX, U256::from(1u64), U256::from(1u64), 30),
            Err(RoutingError::MathError)
        ));
    }

    #[test]
    fn test_price_impact_small_and_large() {
        let reserve = U256::from(1_000_000_000_000_000_000_000u128);
        let marginal = marginal_rate(reserve, reserve, 30);

        let small_in = U256::from(1_000_000_000_000_000u128);
        let small_out = get_amount_out(small_in, reserve, reserve, 30).unwrap();
        assert_eq!(price_impact_bps(small_in, small_out, marginal), 0);

        // 10 in: a_eff / (r + a_eff) = 9.97 / 1009.97 ≈ 98.7 bps
        let big_in = U256::from(10_000_000_000_000_000_000u128);
        let big_out = get_amount_out(big_in, reserve, reserve, 30).unwrap();
        assert_eq!(price_impact_bps(big_in, big_out, marginal), 99);
    }

    #[test]
    fn test_u256_to_f64_large_values() {
        assert_eq!(u256_to_f64(U256::from(12345u64)), 12345.0);
        let big = U256::exp10(30);
        assert!((u256_to_f64(big) / 1e30 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_parse_token_amount() {
        let amount = parse_token_amount("1.0", 18).unwrap();
        assert_eq!(amount, U256::from(1_000_000_000_000_000_000u128));

        let amount = parse_token_amount("0.5", 18).unwrap();
        assert_eq!(amount, U256::from(500_000_000_000_000_000u128));

        let amount = parse_token_amount("1000", 6).unwrap();
        assert_eq!(amount, U256::from(1_000_000_000u128));

        assert!(parse_token_amount("1.1234567", 6).is_err());
        assert!(parse_token_amount("abc", 18).is_err());
        assert!(parse_token_amount(".5", 18).is_err());
    }

    #[test]
    fn test_format_token_amount() {
        let amount = U256::from(1_000_000_000_000_000_000u128);
        assert_eq!(format_token_amount(amount, 18), "1");

        let amount = U256::from(1_500_000_000_000_000_000u128);
        assert_eq!(format_token_amount(amount, 18), "1.5");

        let amount = U256::from(1_234_560u128);
        assert_eq!(format_token_amount(amount, 6), "1.23456");

        assert_eq!(format_token_amount(U256::from(5u64), 6), "0.000005");
    }

    #[test]
    fn test_oversized_decimals_do_not_overflow() {
        assert!(matches!(parse_token_amount("1", 78), Err(RoutingError::ParseError(_))));
        assert!(matches!(parse_token_amount("1", u8::MAX), Err(RoutingError::ParseError(_))));
        assert_eq!(parse_token_amount("1", 77).unwrap(), U256::exp10(77));

        // Unscalable amounts are shown in base units
        assert_eq!(format_token_amount(U256::from(5u64), 80), "5");
        assert_eq!(format_token_amount(U256::exp10(77), 77), "1");
        assert!(decimals_factor(78).is_none());
    }

    #[test]
    fn test_sort_tokens() {
        let a = Address::from_low_u64_be(2);
        let b = Address::from_low_u64_be(1);
        assert_eq!(sort_tokens(a, b), (b, a));
        assert_eq!(sort_tokens(b, a), (b, a));
    }
}
