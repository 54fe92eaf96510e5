use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::item::CatalogItem;
use crate::menu::aliases::normalize_phrase;
use crate::menu::catalog::Catalog;
use crate::menu::similarity::sequence_ratio;

pub const SIMILARITY_CUTOFF: f64 = 0.6;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum MatchRule {
    Exact,
    Substring,
    ReverseSubstring,
    Similarity { score: f64 },
    WordOverlap { shared_words: usize },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Resolution<'a> {
    pub item: &'a CatalogItem,
    pub rule: MatchRule,
    pub via_alias: bool,
}

/// Maps spoken phrases onto catalog items. Rules run in a fixed priority
/// order and the first hit wins:
///
/// 1. alias substitution (rewrites the phrase, then continues)
/// 2. exact, substring, or reverse-substring match in catalog order
/// 3. best similarity score at or above [`SIMILARITY_CUTOFF`]
/// 4. word overlap for multi-word phrases
#[derive(Clone, Debug)]
pub struct Resolver {
    catalog: Arc<Catalog>,
}

impl Resolver {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn resolve(&self, phrase: &str) -> Option<&CatalogItem> {
        self.resolve_with_rule(phrase).map(|resolution| resolution.item)
    }

    pub fn resolve_with_rule(&self, phrase: &str) -> Option<Resolution<'_>> {
        let normalized = normalize_phrase(phrase);
        if normalized.is_empty() {
            return None;
        }

        let (query, via_alias) = match self.catalog.aliases().lookup(&normalized) {
            Some(canonical) => {
                debug!(alias = %normalized, canonical, "menu phrase rewritten by alias");
                (canonical.to_owned(), true)
            }
            None => (normalized, false),
        };

        let resolution = self
            .direct_match(&query)
            .or_else(|| self.similarity_match(&query))
            .or_else(|| self.word_overlap_match(&query))
            .map(|(item, rule)| Resolution { item, rule, via_alias });

        match &resolution {
            Some(resolution) => debug!(
                event_name = "menu.resolver.matched",
                phrase,
                item_id = %resolution.item.id,
                rule = ?resolution.rule,
                via_alias = resolution.via_alias,
                "menu phrase resolved"
            ),
            None => warn!(event_name = "menu.resolver.miss", phrase, "no menu item matched phrase"),
        }

        resolution
    }

    fn direct_match(&self, query: &str) -> Option<(&CatalogItem, MatchRule)> {
        self.catalog.items().iter().find_map(|item| {
            let name = item.name.to_lowercase();
            if name == query {
                Some((item, MatchRule::Exact))
            } else if name.contains(query) {
                Some((item, MatchRule::Substring))
            } else if query.contains(name.as_str()) {
                Some((item, MatchRule::ReverseSubstring))
            } else {
                None
            }
        })
    }

    fn similarity_match(&self, query: &str) -> Option<(&CatalogItem, MatchRule)> {
        let mut best: Option<(&CatalogItem, f64)> = None;
        for item in self.catalog.items() {
            let score = sequence_ratio(&item.name.to_lowercase(), query);
            if score < SIMILARITY_CUTOFF {
                continue;
            }
            // strict comparison keeps the earlier item on ties
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((item, score));
            }
        }
        best.map(|(item, score)| (item, MatchRule::Similarity { score }))
    }

    fn word_overlap_match(&self, query: &str) -> Option<(&CatalogItem, MatchRule)> {
        let words: Vec<&str> = query.split_whitespace().collect();
        if words.len() < 2 {
            return None;
        }
        let required = (words.len() / 2 + 1).min(2);
        let query_words: BTreeSet<&str> = words.into_iter().collect();

        self.catalog.items().iter().find_map(|item| {
            let name = item.name.to_lowercase();
            let shared_words = name
                .split_whitespace()
                .filter(|word| query_words.contains(word))
                .collect::<BTreeSet<_>>()
                .len();
            (shared_words >= required).then_some((item, MatchRule::WordOverlap { shared_words }))
        })
    }
}
