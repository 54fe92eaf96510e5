use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Menu sections in resolution order. Tie-breaks between equally good
/// matches always fall to the section listed first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuSection {
    Breakfast,
    Kids,
    Lunch,
}

impl MenuSection {
    pub const ALL: [MenuSection; 3] = [Self::Breakfast, Self::Kids, Self::Lunch];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Breakfast => "breakfast",
            Self::Kids => "kids",
            Self::Lunch => "lunch",
        }
    }
}

impl fmt::Display for MenuSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MenuSection {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "breakfast" => Ok(Self::Breakfast),
            "kids" => Ok(Self::Kids),
            "lunch" => Ok(Self::Lunch),
            other => Err(format!("unknown menu section `{other}` (expected breakfast|kids|lunch)")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOn {
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: ItemId,
    pub name: String,
    pub description: String,
    pub section: MenuSection,
    #[serde(with = "rust_decimal::serde::float")]
    pub base_price: Decimal,
    pub add_ons: Vec<AddOn>,
}

impl CatalogItem {
    /// Add-ons whose declared name contains the requested name, ignoring
    /// case. Requests that match nothing are dropped.
    pub fn match_add_ons<S>(&self, requested: &[S]) -> Vec<AddOn>
    where
        S: AsRef<str>,
    {
        let mut selected = Vec::new();
        for request in requested {
            let needle = request.as_ref().trim().to_lowercase();
            if needle.is_empty() {
                continue;
            }
            for add_on in &self.add_ons {
                if add_on.name.to_lowercase().contains(&needle) {
                    selected.push(add_on.clone());
                }
            }
        }
        selected
    }
}
