use liquidity::curve::SwapCheck;
use liquidity::{Curve, CurveParams, CurveType, LiquidityError, DEFAULT_MAX_RESERVE};
use proptest::prelude::*;

fn all_curves() -> Vec<CurveParams> {
    [CurveType::ConstantProduct, CurveType::Stable, CurveType::Piecewise]
        .into_iter()
        .map(CurveParams::default_for)
        .collect()
}

/// Log-uniform amount in `1..=DEFAULT_MAX_RESERVE`
fn magnitude() -> impl Strategy<Value = u64> {
    (0u32..63, any::<u64>()).prop_map(|(shift, seed)| (seed >> shift).clamp(1, DEFAULT_MAX_RESERVE))
}

/// Independent reserves and input, from dust to the reserve ceiling
fn market() -> impl Strategy<Value = (u64, u64, u64)> {
    (magnitude(), magnitude(), magnitude())
}

proptest! {
    #[test]
    fn more_input_never_yields_less_output((reserve_in, reserve_out, amount_in) in market(), extra in 1u64..1_000_000_000) {
        for params in all_curves() {
            let curve = params.curve();
            let small = curve.swap_output(amount_in, reserve_in, reserve_out);
            let large = curve.swap_output(amount_in + extra, reserve_in, reserve_out);
            match (small, large) {
                (Ok(small), Ok(large)) => prop_assert!(small <= large, "{}: {} > {}", params.curve_type(), small, large),
                (_, Err(LiquidityError::InsufficientLiquidity)) => {}
                (small, large) => prop_assert!(false, "{}: {:?} then {:?}", params.curve_type(), small, large),
            }
        }
    }

    #[test]
    fn quoted_swap_never_shrinks_invariant((reserve_in, reserve_out, amount_in) in market()) {
        for params in all_curves() {
            let curve = params.curve();
            let out = match curve.swap_output(amount_in, reserve_in, reserve_out) {
                Ok(out) => out,
                Err(LiquidityError::InsufficientLiquidity) => continue,
                Err(e) => return Err(TestCaseError::fail(format!("{}: {}", params.curve_type(), e))),
            };
            prop_assert!(out < reserve_out);
            let before = curve.invariant(reserve_in, reserve_out).unwrap();
            let after = curve.invariant(reserve_in + amount_in, reserve_out - out);
            prop_assert!(after.is_ok(), "{}: settled state not priceable: {:?}", params.curve_type(), after);
            let after = after.unwrap();
            prop_assert!(after >= before, "{}: {} < {}", params.curve_type(), after, before);
        }
    }

    #[test]
    fn check_accepts_exactly_the_quote((reserve_in, reserve_out, amount_in) in market()) {
        for params in all_curves() {
            let curve = params.curve();
            let out = match curve.swap_output(amount_in, reserve_in, reserve_out) {
                Ok(out) => out,
                Err(_) => continue,
            };
            let check = |amount_out: u64| SwapCheck {
                reserve_a: reserve_in,
                reserve_b: reserve_out,
                balance_a: reserve_in + amount_in,
                balance_b: reserve_out - amount_out,
                amount_a_in: amount_in,
                amount_b_in: 0,
                amount_a_out: 0,
                amount_b_out: amount_out,
            };
            prop_assert!(curve.check_swap(&check(out)).is_ok(), "{} rejected its own quote", params.curve_type());
            if out + 1 < reserve_out {
                prop_assert!(
                    matches!(curve.check_swap(&check(out + 1)), Err(LiquidityError::InvariantViolation { .. })),
                    "{} accepted more than its quote",
                    params.curve_type()
                );
            }
        }
    }

    #[test]
    fn proportional_mint_then_burn_never_profits(
        reserve_a in 1_000_000u64..1_000_000_000_000,
        reserve_b in 1_000_000u64..1_000_000_000_000,
        supply in 1_000u64..1_000_000_000_000,
        amount_a in 1u64..1_000_000_000,
    ) {
        for params in all_curves() {
            let curve = params.curve();
            let amount_b = match curve.quote(amount_a, reserve_a, reserve_b) {
                Ok(b) if b > 0 => b,
                _ => continue,
            };
            let shares = match curve.mint_shares(amount_a, amount_b, reserve_a, reserve_b, supply) {
                Ok(shares) => shares,
                Err(_) => continue,
            };
            let (out_a, out_b) = match curve.burn_shares(shares, reserve_a + amount_a, reserve_b + amount_b, supply + shares) {
                Ok(amounts) => amounts,
                Err(_) => continue,
            };
            prop_assert!(out_a <= amount_a && out_b <= amount_b);
        }
    }
}
