use std::collections::BTreeMap;

use crate::menu::catalog::CatalogError;

/// Misheard or shortened phrases mapped to canonical item names. Keys and
/// targets are stored lowercased and trimmed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AliasTable {
    entries: BTreeMap<String, String>,
}

impl AliasTable {
    pub fn from_entries<I>(entries: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut table = BTreeMap::new();
        for (alias, target) in entries {
            let alias = normalize_phrase(&alias);
            let target = normalize_phrase(&target);
            if alias.is_empty() || target.is_empty() {
                return Err(CatalogError::EmptyAlias);
            }
            table.insert(alias, target);
        }
        Ok(Self { entries: table })
    }

    pub fn lookup(&self, phrase: &str) -> Option<&str> {
        self.entries.get(&normalize_phrase(phrase)).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(alias, target)| (alias.as_str(), target.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn normalize_phrase(phrase: &str) -> String {
    phrase.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::AliasTable;
    use crate::menu::catalog::CatalogError;

    #[test]
    fn lookups_ignore_case_and_surrounding_whitespace() {
        let table = AliasTable::from_entries([(
            "Sunrise Crescent".to_owned(),
            "sunrise croissant".to_owned(),
        )])
        .expect("valid table");

        assert_eq!(table.lookup("  SUNRISE crescent "), Some("sunrise croissant"));
        assert_eq!(table.lookup("sunrise"), None);
    }

    #[test]
    fn empty_entries_are_rejected() {
        let error = AliasTable::from_entries([(" ".to_owned(), "soup du jour".to_owned())])
            .expect_err("blank alias must fail");
        assert!(matches!(error, CatalogError::EmptyAlias));
    }
}
