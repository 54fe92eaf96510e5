use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::item::{AddOn, CatalogItem, ItemId};

/// One accumulated purchase. Snapshots name and prices at add time so later
/// catalog edits never reprice a live cart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    #[serde(rename = "id")]
    pub item_id: ItemId,
    pub name: String,
    pub quantity: u32,
    #[serde(rename = "price", with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    #[serde(rename = "addons")]
    pub selected_add_ons: Vec<AddOn>,
    #[serde(rename = "total", with = "rust_decimal::serde::float")]
    pub line_total: Decimal,
}

impl CartLine {
    pub fn new(item: &CatalogItem, quantity: u32, selected_add_ons: Vec<AddOn>) -> Self {
        let add_on_total: Decimal = selected_add_ons.iter().map(|add_on| add_on.price).sum();
        let line_total = (item.base_price + add_on_total) * Decimal::from(quantity);

        Self {
            item_id: item.id.clone(),
            name: item.name.clone(),
            quantity,
            unit_price: item.base_price,
            selected_add_ons,
            line_total,
        }
    }

    pub fn add_on_names(&self) -> Vec<&str> {
        self.selected_add_ons.iter().map(|add_on| add_on.name.as_str()).collect()
    }
}

/// Append-only line collection. Repeated adds of the same item produce
/// separate lines; nothing is merged.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_line<S>(
        &mut self,
        item: &CatalogItem,
        quantity: u32,
        requested_add_ons: &[S],
    ) -> &CartLine
    where
        S: AsRef<str>,
    {
        let selected = item.match_add_ons(requested_add_ons);
        self.lines.push(CartLine::new(item, quantity, selected));
        &self.lines[self.lines.len() - 1]
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn total(&self) -> Decimal {
        self.lines.iter().map(|line| line.line_total).sum()
    }
}
