use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::cart::Cart;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxRounding {
    /// Midpoints round away from zero: 0.975 -> 0.98, 2.925 -> 2.93.
    #[default]
    HalfUp,
    /// Banker's rounding: 0.975 -> 0.98, 2.925 -> 2.92.
    HalfEven,
}

impl TaxRounding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HalfUp => "half_up",
            Self::HalfEven => "half_even",
        }
    }

    fn strategy(self) -> RoundingStrategy {
        match self {
            Self::HalfUp => RoundingStrategy::MidpointAwayFromZero,
            Self::HalfEven => RoundingStrategy::MidpointNearestEven,
        }
    }
}

impl fmt::Display for TaxRounding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaxRounding {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "half_up" | "half-up" => Ok(Self::HalfUp),
            "half_even" | "half-even" | "bankers" => Ok(Self::HalfEven),
            other => Err(format!("unknown tax rounding `{other}` (expected half_up|half_even)")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxPolicy {
    pub rate: Decimal,
    pub rounding: TaxRounding,
}

impl TaxPolicy {
    pub const DEFAULT_RATE: Decimal = Decimal::from_parts(975, 0, 0, false, 4);

    pub fn new(rate: Decimal, rounding: TaxRounding) -> Self {
        Self { rate, rounding }
    }

    pub fn tax_on(&self, subtotal: Decimal) -> Decimal {
        (subtotal * self.rate).round_dp_with_strategy(2, self.rounding.strategy())
    }
}

impl Default for TaxPolicy {
    fn default() -> Self {
        Self { rate: Self::DEFAULT_RATE, rounding: TaxRounding::HalfUp }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTraceStep {
    pub stage: String,
    pub detail: String,
    pub amount: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTrace {
    pub steps: Vec<PricingTraceStep>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub trace: PricingTrace,
}

pub fn compute_totals(cart: &Cart, policy: &TaxPolicy) -> OrderTotals {
    let subtotal = cart.total();
    let tax = policy.tax_on(subtotal);
    let total = subtotal + tax;

    OrderTotals {
        subtotal,
        tax,
        total,
        trace: PricingTrace {
            steps: vec![
                PricingTraceStep {
                    stage: "subtotal".to_owned(),
                    detail: format!("sum(line_total) over {} lines", cart.len()),
                    amount: subtotal,
                },
                PricingTraceStep {
                    stage: "tax".to_owned(),
                    detail: format!("subtotal * {} rounded {}", policy.rate, policy.rounding),
                    amount: tax,
                },
                PricingTraceStep {
                    stage: "total".to_owned(),
                    detail: "subtotal + tax".to_owned(),
                    amount: total,
                },
            ],
        },
    }
}

/// Two-decimal dollar amount, e.g. `$14.00`.
pub fn format_money(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("${rounded:.2}")
}

/// Menu price: whole dollars render bare (`$12`), anything else as money.
pub fn format_price(amount: Decimal) -> String {
    if amount.fract().is_zero() {
        format!("${}", amount.trunc().normalize())
    } else {
        format_money(amount)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::domain::cart::Cart;
    use crate::domain::item::{CatalogItem, ItemId, MenuSection};

    use super::{compute_totals, format_money, format_price, TaxPolicy, TaxRounding};

    fn cart_with_subtotal(dollars: i64) -> Cart {
        let item = CatalogItem {
            id: ItemId("plate".to_owned()),
            name: "Plate".to_owned(),
            description: String::new(),
            section: MenuSection::Lunch,
            base_price: Decimal::new(dollars, 0),
            add_ons: Vec::new(),
        };
        let mut cart = Cart::new();
        cart.add_line(&item, 1, &[] as &[&str]);
        cart
    }

    #[test]
    fn default_policy_taxes_at_regional_rate() {
        let totals = compute_totals(&cart_with_subtotal(25), &TaxPolicy::default());

        assert_eq!(totals.subtotal, Decimal::new(2500, 2));
        assert_eq!(totals.tax, Decimal::new(244, 2));
        assert_eq!(totals.total, Decimal::new(2744, 2));
        assert_eq!(format_money(totals.total), "$27.44");
        assert_eq!(totals.trace.steps.len(), 3);
        assert_eq!(totals.trace.steps[1].stage, "tax");
    }

    #[test]
    fn half_up_rounds_midpoints_away_from_zero() {
        let policy = TaxPolicy::new(TaxPolicy::DEFAULT_RATE, TaxRounding::HalfUp);

        assert_eq!(policy.tax_on(Decimal::new(10, 0)), Decimal::new(98, 2));
        assert_eq!(policy.tax_on(Decimal::new(30, 0)), Decimal::new(293, 2));
    }

    #[test]
    fn half_even_rounds_midpoints_to_even_cent() {
        let policy = TaxPolicy::new(TaxPolicy::DEFAULT_RATE, TaxRounding::HalfEven);

        // 0.975 -> 0.98 (8 is even), 2.925 -> 2.92
        assert_eq!(policy.tax_on(Decimal::new(10, 0)), Decimal::new(98, 2));
        assert_eq!(policy.tax_on(Decimal::new(30, 0)), Decimal::new(292, 2));
    }

    #[test]
    fn empty_cart_has_zero_totals() {
        let totals = compute_totals(&Cart::new(), &TaxPolicy::default());
        assert!(totals.total.is_zero());
    }

    #[test]
    fn money_and_menu_prices_format_differently() {
        assert_eq!(format_money(Decimal::new(14, 0)), "$14.00");
        assert_eq!(format_money(Decimal::new(1234, 3)), "$1.23");
        assert_eq!(format_price(Decimal::new(12, 0)), "$12");
        assert_eq!(format_price(Decimal::new(1200, 2)), "$12");
        assert_eq!(format_price(Decimal::new(650, 2)), "$6.50");
    }

    #[test]
    fn rounding_parses_from_config_strings() {
        assert_eq!("half_even".parse::<TaxRounding>(), Ok(TaxRounding::HalfEven));
        assert_eq!(" Half-Up ".parse::<TaxRounding>(), Ok(TaxRounding::HalfUp));
        assert!("ceiling".parse::<TaxRounding>().is_err());
    }
}
