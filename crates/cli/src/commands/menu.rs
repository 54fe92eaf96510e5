use qbeat_core::config::LoadOptions;
use qbeat_core::domain::item::{CatalogItem, MenuSection};
use serde::Serialize;

use crate::commands::{load_catalog, load_config, CommandResult, EXIT_USAGE};

#[derive(Debug, Serialize)]
struct MenuReport<'a> {
    command: &'static str,
    status: &'static str,
    section: Option<MenuSection>,
    item_count: usize,
    alias_count: usize,
    items: Vec<&'a CatalogItem>,
}

pub fn run(options: LoadOptions, section: Option<&str>) -> CommandResult {
    let config = match load_config("menu", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let catalog = match load_catalog("menu", &config) {
        Ok(catalog) => catalog,
        Err(failure) => return failure,
    };

    let section = match section.map(str::parse::<MenuSection>).transpose() {
        Ok(section) => section,
        Err(message) => {
            return CommandResult::failure("menu", "invalid_argument", message, EXIT_USAGE);
        }
    };

    let items: Vec<&CatalogItem> = match section {
        Some(section) => catalog.section(section).collect(),
        None => catalog.items().iter().collect(),
    };

    CommandResult::report(&MenuReport {
        command: "menu",
        status: "ok",
        section,
        item_count: items.len(),
        alias_count: catalog.aliases().len(),
        items,
    })
}
