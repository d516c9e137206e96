use market_core::{MarketError, Side};

pub const MAX_LEVERAGE: u32 = 50;
/// Simulated taker fee, 0.1% of position size.
pub const FEE_RATE: f64 = 0.001;

/// Derived economics of a margin order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradePlan {
    pub size: f64,
    pub fee: f64,
    pub liquidation_price: f64,
}

/// Derive position size, fee, and liquidation price for a margin order.
///
/// Balance checks belong to the execution layer; this function never
/// inspects a balance. Out-of-bounds leverage or a non-positive margin or
/// entry price is rejected before any position can exist.
pub fn compute_trade(
    entry_price: f64,
    leverage: u32,
    margin: f64,
    side: Side,
) -> Result<TradePlan, MarketError> {
    if !(1..=MAX_LEVERAGE).contains(&leverage) {
        return Err(MarketError::InvalidTradeParameters(format!(
            "leverage {leverage}x outside 1x-{MAX_LEVERAGE}x"
        )));
    }
    if !margin.is_finite() || margin <= 0.0 {
        return Err(MarketError::InvalidTradeParameters(format!(
            "margin {margin} must be a positive amount"
        )));
    }
    if !entry_price.is_finite() || entry_price <= 0.0 {
        return Err(MarketError::InvalidTradeParameters(format!(
            "entry price {entry_price} must be a positive price"
        )));
    }

    let lev = leverage as f64;
    let size = margin * lev;
    let fee = size * FEE_RATE;
    let liquidation_price = match side {
        Side::Long => entry_price * (1.0 - 1.0 / lev),
        Side::Short => entry_price * (1.0 + 1.0 / lev),
    };

    Ok(TradePlan {
        size,
        fee,
        liquidation_price,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_plan_at_ten_x() {
        let plan = compute_trade(50_000.0, 10, 1_000.0, Side::Long).unwrap();
        assert_eq!(plan.size, 10_000.0);
        assert_eq!(plan.fee, 10.0);
        assert_eq!(plan.liquidation_price, 45_000.0);
    }

    #[test]
    fn short_liquidation_sits_above_entry() {
        let plan = compute_trade(50_000.0, 10, 1_000.0, Side::Short).unwrap();
        assert_eq!(plan.liquidation_price, 55_000.0);
    }

    #[test]
    fn one_x_long_liquidates_at_zero() {
        let plan = compute_trade(100.0, 1, 50.0, Side::Long).unwrap();
        assert_eq!(plan.liquidation_price, 0.0);
        assert_eq!(plan.size, 50.0);
    }

    #[test]
    fn rejects_out_of_bounds_leverage() {
        assert!(compute_trade(100.0, 0, 1_000.0, Side::Long).is_err());
        assert!(compute_trade(100.0, 51, 1_000.0, Side::Long).is_err());
    }

    #[test]
    fn rejects_bad_margin_and_entry() {
        assert!(compute_trade(100.0, 10, 0.0, Side::Long).is_err());
        assert!(compute_trade(100.0, 10, -5.0, Side::Long).is_err());
        assert!(compute_trade(100.0, 10, f64::NAN, Side::Long).is_err());
        assert!(compute_trade(0.0, 10, 1_000.0, Side::Short).is_err());
    }
}
