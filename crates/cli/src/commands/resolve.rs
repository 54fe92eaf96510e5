use std::sync::Arc;

use qbeat_core::config::LoadOptions;
use qbeat_core::domain::item::CatalogItem;
use qbeat_core::menu::{MatchRule, Resolver};
use serde::Serialize;

use crate::commands::{load_catalog, load_config, CommandResult};

#[derive(Debug, Serialize)]
struct ResolveReport<'a> {
    command: &'static str,
    status: &'static str,
    phrase: &'a str,
    matched: Option<&'a CatalogItem>,
    rule: Option<MatchRule>,
    via_alias: bool,
}

pub fn run(options: LoadOptions, phrase: &str) -> CommandResult {
    let config = match load_config("resolve", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let catalog = match load_catalog("resolve", &config) {
        Ok(catalog) => catalog,
        Err(failure) => return failure,
    };

    let resolver = Resolver::new(Arc::new(catalog));
    let resolution = resolver.resolve_with_rule(phrase);

    CommandResult::report(&ResolveReport {
        command: "resolve",
        status: "ok",
        phrase,
        matched: resolution.as_ref().map(|resolution| resolution.item),
        via_alias: resolution.as_ref().is_some_and(|resolution| resolution.via_alias),
        rule: resolution.map(|resolution| resolution.rule),
    })
}
