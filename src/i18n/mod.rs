use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;

const EN_SOURCE: &str = include_str!("en.json");
const FR_SOURCE: &str = include_str!("fr.json");

static EN: Lazy<HashMap<String, String>> =
    Lazy::new(|| serde_json::from_str(EN_SOURCE).expect("en catalog should remain valid JSON"));
static FR: Lazy<HashMap<String, String>> =
    Lazy::new(|| serde_json::from_str(FR_SOURCE).expect("fr catalog should remain valid JSON"));

pub trait Translate: Send + Sync {
    /// Message for `key`, or the key itself when no message exists.
    fn translate(&self, key: &str) -> String;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Lang {
    #[default]
    En,
    Fr,
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Lang::En => "en",
            Lang::Fr => "fr",
        })
    }
}

impl FromStr for Lang {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Lang::En),
            "fr" => Ok(Lang::Fr),
            other => Err(format!("unsupported language {other:?}")),
        }
    }
}

/// Message tables bundled with the crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct Catalog {
    lang: Lang,
}

impl Catalog {
    pub fn new(lang: Lang) -> Self {
        Self { lang }
    }

    pub fn lang(&self) -> Lang {
        self.lang
    }

    fn table(&self) -> &'static HashMap<String, String> {
        match self.lang {
            Lang::En => &*EN,
            Lang::Fr => &*FR,
        }
    }
}

impl Translate for Catalog {
    fn translate(&self, key: &str) -> String {
        self.table()
            .get(key)
            .or_else(|| EN.get(key))
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogs_share_the_same_keys() {
        let mut en: Vec<_> = EN.keys().collect();
        let mut fr: Vec<_> = FR.keys().collect();
        en.sort();
        fr.sort();
        assert_eq!(en, fr);
    }

    #[test]
    fn unknown_keys_fall_back_to_the_key() {
        let catalog = Catalog::new(Lang::Fr);
        assert_eq!(catalog.translate("nope.missing"), "nope.missing");
        assert_eq!(
            catalog.translate("migration.credentials.decrypt.title"),
            "Mot de passe du projet"
        );
    }

    #[test]
    fn parses_language_codes() {
        assert_eq!("FR".parse::<Lang>(), Ok(Lang::Fr));
        assert!("de".parse::<Lang>().is_err());
    }
}
