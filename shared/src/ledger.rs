//! Stock ledger arithmetic
//!
//! Weight and bag count of a lot move together. A weight delta is converted
//! into a bag delta using the lot's current average bag weight, rounded up to
//! whole bags. This is an approximation: repeated partial movements on lots
//! with irregular bag weights can drift the bag count, and downstream reports
//! depend on exactly this behavior.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current physical quantities of a stock lot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockQuantities {
    pub weight: Decimal,
    pub bags: i32,
}

/// Outcome of applying a weight delta to a lot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjustment {
    pub weight_per_bag: Decimal,
    pub weight_delta: Decimal,
    pub bags_delta: i32,
    pub previous_weight: Decimal,
    pub previous_bags: i32,
    pub new_weight: Decimal,
    pub new_bags: i32,
}

impl StockAdjustment {
    /// True when the adjustment puts stock back (or leaves it unchanged)
    pub fn is_restoration(&self) -> bool {
        self.weight_delta >= Decimal::ZERO
    }

    pub fn quantities(&self) -> StockQuantities {
        StockQuantities {
            weight: self.new_weight,
            bags: self.new_bags,
        }
    }
}

/// Reasons an adjustment cannot be applied
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdjustmentError {
    #[error("adjustment of {delta} kg would leave weight at {resulting} kg (available {available} kg)")]
    NegativeWeight {
        available: Decimal,
        delta: Decimal,
        resulting: Decimal,
    },

    #[error("adjustment of {delta} bags would leave bag count at {resulting} (available {available})")]
    NegativeBags {
        available: i32,
        delta: i64,
        resulting: i64,
    },

    #[error("bag delta for {weight_delta} kg does not fit in a bag count")]
    BagCountOverflow { weight_delta: Decimal },

    #[error("adjustment of {weight_delta} kg is out of range for {available} kg")]
    WeightOverflow {
        available: Decimal,
        weight_delta: Decimal,
    },
}

/// Pricing inputs too large to compute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("lot pricing is out of range")]
pub struct PricingOverflow;

/// Round to two decimal places, half away from zero
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Average weight of one bag, rounded to two places; zero for an empty lot
pub fn weight_per_bag(current: StockQuantities) -> Decimal {
    if current.bags > 0 {
        round2(current.weight / Decimal::from(current.bags))
    } else {
        Decimal::ZERO
    }
}

/// Plan the effect of `weight_delta` on a lot without mutating anything.
///
/// Both resulting fields are checked before an adjustment is returned, so a
/// caller that only writes on `Ok` can never persist half of a movement.
pub fn plan_adjustment(
    current: StockQuantities,
    weight_delta: Decimal,
) -> Result<StockAdjustment, AdjustmentError> {
    let per_bag = weight_per_bag(current);

    let bags_delta: i64 = if per_bag > Decimal::ZERO {
        let magnitude = weight_delta
            .abs()
            .checked_div(per_bag)
            .and_then(|bags| bags.ceil().to_i64())
            .ok_or(AdjustmentError::BagCountOverflow { weight_delta })?;
        if weight_delta.is_sign_negative() && !weight_delta.is_zero() {
            -magnitude
        } else {
            magnitude
        }
    } else {
        0
    };

    let new_weight =
        current
            .weight
            .checked_add(weight_delta)
            .ok_or(AdjustmentError::WeightOverflow {
                available: current.weight,
                weight_delta,
            })?;
    let new_bags = i64::from(current.bags) + bags_delta;

    if new_weight < Decimal::ZERO {
        return Err(AdjustmentError::NegativeWeight {
            available: current.weight,
            delta: weight_delta,
            resulting: new_weight,
        });
    }

    if new_bags < 0 {
        return Err(AdjustmentError::NegativeBags {
            available: current.bags,
            delta: bags_delta,
            resulting: new_bags,
        });
    }

    let new_bags = i32::try_from(new_bags)
        .map_err(|_| AdjustmentError::BagCountOverflow { weight_delta })?;
    let bags_delta = i32::try_from(bags_delta)
        .map_err(|_| AdjustmentError::BagCountOverflow { weight_delta })?;

    Ok(StockAdjustment {
        weight_per_bag: per_bag,
        weight_delta,
        bags_delta,
        previous_weight: current.weight,
        previous_bags: current.bags,
        new_weight,
        new_bags,
    })
}

/// Derived pricing fields of a lot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotPricing {
    pub commission: Decimal,
    pub net_price: Decimal,
    pub total: Decimal,
}

/// Compute commission, net price per kg and lot total.
///
/// `purchase_value` and `penalty` are per kg, `commission_rate` is a percentage.
pub fn price_lot(
    purchase_value: Decimal,
    commission_rate: Decimal,
    penalty: Decimal,
    weight: Decimal,
) -> Result<LotPricing, PricingOverflow> {
    let commission = purchase_value
        .checked_mul(commission_rate)
        .and_then(|value| value.checked_div(Decimal::ONE_HUNDRED))
        .map(round2)
        .ok_or(PricingOverflow)?;
    let net_price = purchase_value
        .checked_add(commission)
        .and_then(|value| value.checked_sub(penalty))
        .map(round2)
        .ok_or(PricingOverflow)?;
    let total = net_price
        .checked_mul(weight)
        .map(round2)
        .ok_or(PricingOverflow)?;

    Ok(LotPricing {
        commission,
        net_price,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn lot(weight: &str, bags: i32) -> StockQuantities {
        StockQuantities {
            weight: dec(weight),
            bags,
        }
    }

    #[test]
    fn deducting_rounds_bags_up() {
        let adj = plan_adjustment(lot("100", 10), dec("-35")).unwrap();
        assert_eq!(adj.weight_per_bag, dec("10"));
        assert_eq!(adj.bags_delta, -4);
        assert_eq!(adj.new_weight, dec("65"));
        assert_eq!(adj.new_bags, 6);
        assert!(!adj.is_restoration());
    }

    #[test]
    fn restoring_uses_current_bag_weight() {
        // 65 / 6 = 10.833.. rounds to 10.83; 35 / 10.83 = 3.23.. rounds up to 4
        let adj = plan_adjustment(lot("65", 6), dec("35")).unwrap();
        assert_eq!(adj.weight_per_bag, dec("10.83"));
        assert_eq!(adj.bags_delta, 4);
        assert_eq!(adj.new_weight, dec("100"));
        assert_eq!(adj.new_bags, 10);
        assert!(adj.is_restoration());
    }

    #[test]
    fn empty_lot_moves_weight_only() {
        let adj = plan_adjustment(lot("0", 0), dec("25")).unwrap();
        assert_eq!(adj.weight_per_bag, Decimal::ZERO);
        assert_eq!(adj.bags_delta, 0);
        assert_eq!(adj.new_weight, dec("25"));
        assert_eq!(adj.new_bags, 0);
    }

    #[test]
    fn zero_delta_is_a_restoration_noop() {
        let adj = plan_adjustment(lot("40", 4), Decimal::ZERO).unwrap();
        assert_eq!(adj.bags_delta, 0);
        assert_eq!(adj.quantities(), lot("40", 4));
        assert!(adj.is_restoration());
    }

    #[test]
    fn over_deduction_is_rejected() {
        let err = plan_adjustment(lot("10", 2), dec("-10.01")).unwrap_err();
        assert!(matches!(err, AdjustmentError::NegativeWeight { .. }));
    }

    #[test]
    fn bag_shortfall_is_rejected_even_when_weight_fits() {
        // 10 kg over 3 bags = 3.33 per bag; taking 9.99 kg needs ceil(3.0) = 3 bags,
        // taking 10 kg needs ceil(3.003) = 4 bags which the lot does not have.
        let err = plan_adjustment(lot("10", 3), dec("-10")).unwrap_err();
        assert!(matches!(err, AdjustmentError::NegativeBags { resulting: -1, .. }));

        let ok = plan_adjustment(lot("10", 3), dec("-9.99")).unwrap();
        assert_eq!(ok.new_bags, 0);
    }

    #[test]
    fn round2_is_half_away_from_zero() {
        assert_eq!(round2(dec("1.005")), dec("1.01"));
        assert_eq!(round2(dec("-1.005")), dec("-1.01"));
        assert_eq!(round2(dec("2.344")), dec("2.34"));
    }

    #[test]
    fn pricing_fields() {
        let pricing = price_lot(dec("4.50"), dec("2.5"), dec("0.10"), dec("200")).unwrap();
        assert_eq!(pricing.commission, dec("0.11"));
        assert_eq!(pricing.net_price, dec("4.51"));
        assert_eq!(pricing.total, dec("902.00"));
    }

    #[test]
    fn huge_amounts_are_errors_not_panics() {
        let err = plan_adjustment(lot("0.01", 1), Decimal::MAX).unwrap_err();
        assert!(matches!(err, AdjustmentError::BagCountOverflow { .. }));

        let err = plan_adjustment(lot("100", 0), Decimal::MAX).unwrap_err();
        assert!(matches!(err, AdjustmentError::WeightOverflow { .. }));

        assert_eq!(
            price_lot(Decimal::MAX, dec("100"), Decimal::ZERO, dec("1")),
            Err(PricingOverflow)
        );
        assert_eq!(
            price_lot(dec("4.50"), Decimal::ZERO, Decimal::ZERO, Decimal::MAX),
            Err(PricingOverflow)
        );
    }
}
