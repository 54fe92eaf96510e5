pub mod effects;
pub mod pricing;

pub use effects::{CartSnapshot, CompletionNotice, OrderSubmission, SessionEffect, ShutdownRequest};
pub use pricing::{
    compute_totals, format_money, format_price, OrderTotals, PricingTrace, TaxPolicy, TaxRounding,
};
