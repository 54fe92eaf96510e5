use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::domain::item::{AddOn, CatalogItem, ItemId, MenuSection};
use crate::menu::aliases::AliasTable;

const BUNDLED_MENU: &str = include_str!("../../data/menu.toml");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not read menu file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse menu definition: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("menu item in section `{section}` has an empty {field}")]
    EmptyField { section: MenuSection, field: &'static str },
    #[error("duplicate menu item id `{0}`")]
    DuplicateItemId(ItemId),
    #[error("menu item `{id}` has a negative price for `{label}`")]
    NegativePrice { id: ItemId, label: String },
    #[error("alias table contains an empty phrase or target")]
    EmptyAlias,
    #[error("alias `{alias}` maps to `{target}`, which is not on the menu")]
    UnknownAliasTarget { alias: String, target: String },
}

/// Immutable menu shared by every session. Items are stored in resolution
/// order: section order first, then file order inside a section.
#[derive(Clone, Debug)]
pub struct Catalog {
    items: Vec<CatalogItem>,
    aliases: AliasTable,
}

impl Catalog {
    pub fn bundled() -> Result<Self, CatalogError> {
        Self::from_toml_str(BUNDLED_MENU)
    }

    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| CatalogError::ReadFile { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&raw)
    }

    /// Loads from `path` when given, the bundled menu otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, CatalogError> {
        match path {
            Some(path) => Self::from_path(path),
            None => Self::bundled(),
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, CatalogError> {
        let document: MenuDocument = toml::from_str(raw)?;

        let mut items = Vec::new();
        let mut seen_ids = HashSet::new();
        for section in MenuSection::ALL {
            for raw_item in document.section(section) {
                let item = raw_item.clone().into_item(section)?;
                if !seen_ids.insert(item.id.clone()) {
                    return Err(CatalogError::DuplicateItemId(item.id));
                }
                items.push(item);
            }
        }

        let known_names: HashSet<String> =
            items.iter().map(|item| item.name.to_lowercase()).collect();
        let aliases = AliasTable::from_entries(document.aliases)?;
        if let Some((alias, target)) =
            aliases.iter().find(|(_, target)| !known_names.contains(*target))
        {
            return Err(CatalogError::UnknownAliasTarget {
                alias: alias.to_owned(),
                target: target.to_owned(),
            });
        }

        info!(
            event_name = "menu.catalog.loaded",
            item_count = items.len(),
            alias_count = aliases.len(),
            "menu catalog loaded"
        );

        Ok(Self { items, aliases })
    }

    pub fn lookup_by_id(&self, id: &ItemId) -> Option<&CatalogItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    /// Every item in resolution order.
    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn section(&self, section: MenuSection) -> impl Iterator<Item = &CatalogItem> {
        self.items.iter().filter(move |item| item.section == section)
    }

    pub fn grouped(&self) -> Vec<(MenuSection, Vec<&CatalogItem>)> {
        MenuSection::ALL
            .into_iter()
            .map(|section| (section, self.section(section).collect()))
            .collect()
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct MenuDocument {
    #[serde(default)]
    breakfast: Vec<RawItem>,
    #[serde(default)]
    kids: Vec<RawItem>,
    #[serde(default)]
    lunch: Vec<RawItem>,
    #[serde(default)]
    aliases: BTreeMap<String, String>,
}

impl MenuDocument {
    fn section(&self, section: MenuSection) -> &[RawItem] {
        match section {
            MenuSection::Breakfast => &self.breakfast,
            MenuSection::Kids => &self.kids,
            MenuSection::Lunch => &self.lunch,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawItem {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    price: Decimal,
    #[serde(default)]
    add_ons: Vec<RawAddOn>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAddOn {
    name: String,
    price: Decimal,
}

impl RawItem {
    fn into_item(self, section: MenuSection) -> Result<CatalogItem, CatalogError> {
        let id = self.id.trim();
        if id.is_empty() {
            return Err(CatalogError::EmptyField { section, field: "id" });
        }
        let name = self.name.trim();
        if name.is_empty() {
            return Err(CatalogError::EmptyField { section, field: "name" });
        }

        let id = ItemId(id.to_owned());
        if self.price < Decimal::ZERO {
            return Err(CatalogError::NegativePrice { id, label: "base".to_owned() });
        }

        let mut add_ons = Vec::with_capacity(self.add_ons.len());
        for add_on in self.add_ons {
            if add_on.name.trim().is_empty() {
                return Err(CatalogError::EmptyField { section, field: "add-on name" });
            }
            if add_on.price < Decimal::ZERO {
                return Err(CatalogError::NegativePrice { id, label: add_on.name });
            }
            add_ons.push(AddOn { name: add_on.name.trim().to_owned(), price: add_on.price });
        }

        Ok(CatalogItem {
            id,
            name: name.to_owned(),
            description: self.description.trim().to_owned(),
            section,
            base_price: self.price,
            add_ons,
        })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::domain::item::{ItemId, MenuSection};

    use super::{Catalog, CatalogError};

    #[test]
    fn bundled_menu_loads_all_sections_in_order() {
        let catalog = Catalog::bundled().expect("bundled menu should load");

        assert_eq!(catalog.section(MenuSection::Breakfast).count(), 11);
        assert_eq!(catalog.section(MenuSection::Kids).count(), 4);
        assert_eq!(catalog.section(MenuSection::Lunch).count(), 14);
        assert_eq!(catalog.len(), 29);

        let sections: Vec<_> = catalog.items().iter().map(|item| item.section).collect();
        let mut sorted = sections.clone();
        sorted.sort();
        assert_eq!(sections, sorted, "items must be stored in section order");
    }

    #[test]
    fn lookup_by_id_returns_item_with_add_ons() {
        let catalog = Catalog::bundled().expect("bundled menu should load");
        let croissant = catalog
            .lookup_by_id(&ItemId("sunrise-croissant".to_owned()))
            .expect("croissant should exist");

        assert_eq!(croissant.name, "Sunrise Croissant");
        assert_eq!(croissant.base_price, Decimal::new(12, 0));
        assert_eq!(croissant.add_ons.len(), 2);
        assert!(catalog.lookup_by_id(&ItemId("missing".to_owned())).is_none());
    }

    #[test]
    fn grouped_view_follows_section_order() {
        let catalog = Catalog::bundled().expect("bundled menu should load");
        let grouped = catalog.grouped();

        let order: Vec<_> = grouped.iter().map(|(section, _)| *section).collect();
        assert_eq!(order, MenuSection::ALL.to_vec());
        assert_eq!(grouped[1].1[0].name, "French Toast");
    }

    #[test]
    fn duplicate_ids_are_fatal() {
        let raw = r#"
[[breakfast]]
id = "toast"
name = "Toast"
price = 3

[[lunch]]
id = "toast"
name = "Lunch Toast"
price = 4
"#;
        let error = Catalog::from_toml_str(raw).expect_err("duplicate ids must fail");
        assert!(matches!(error, CatalogError::DuplicateItemId(ref id) if id.0 == "toast"));
    }

    #[test]
    fn negative_add_on_prices_are_fatal() {
        let raw = r#"
[[kids]]
id = "plate"
name = "Plate"
price = 5
add_ons = [{ name = "Refund", price = -1 }]
"#;
        let error = Catalog::from_toml_str(raw).expect_err("negative add-on must fail");
        assert!(matches!(
            error,
            CatalogError::NegativePrice { ref label, .. } if label == "Refund"
        ));
    }

    #[test]
    fn alias_targets_must_exist() {
        let raw = r#"
[[lunch]]
id = "soup"
name = "Soup du Jour"
price = 7

[aliases]
"soup" = "soup du jour"
"bisque" = "lobster bisque"
"#;
        let error = Catalog::from_toml_str(raw).expect_err("dangling alias must fail");
        assert!(matches!(
            error,
            CatalogError::UnknownAliasTarget { ref alias, .. } if alias == "bisque"
        ));
    }

    #[test]
    fn unknown_sections_are_rejected() {
        let raw = r#"
[[dinner]]
id = "steak"
name = "Steak"
price = 30
"#;
        assert!(matches!(Catalog::from_toml_str(raw), Err(CatalogError::Parse(_))));
    }
}
