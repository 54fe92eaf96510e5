pub mod aliases;
pub mod catalog;
pub mod resolver;
pub mod similarity;

pub use aliases::AliasTable;
pub use catalog::{Catalog, CatalogError};
pub use resolver::{MatchRule, Resolution, Resolver, SIMILARITY_CUTOFF};
