//! Charset identifiers and their `//` modifiers.
//!
//! Descriptors never rewrite the identifiers they are opened with. This type
//! only builds identifiers (`Charset::new("ASCII").transliterate()`) and reads
//! them back (`Charset::parse("ASCII//TRANSLIT")`).

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{IconvError, Result};

const IDENTIFIER_PATTERN: &str =
    r"^(?P<name>[A-Za-z0-9_.:+()\-]*)(?P<modifiers>(?://[A-Za-z0-9_,]*)*)$";

fn identifier_regex() -> Result<&'static Regex> {
    static IDENTIFIER: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    IDENTIFIER
        .get_or_init(|| Regex::new(IDENTIFIER_PATTERN))
        .as_ref()
        .map_err(|error| {
            IconvError::InvalidArgument(format!("charset identifier pattern: {error}"))
        })
}

/// A charset name plus modifiers such as `TRANSLIT` and `IGNORE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Charset {
    name: String,
    modifiers: Vec<String>,
}

impl Charset {
    /// A charset with no modifiers.
    ///
    /// An empty name means "the current locale's charset" to iconv.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modifiers: Vec::new(),
        }
    }

    /// Splits an identifier such as `ASCII//TRANSLIT//IGNORE` or
    /// `ASCII//TRANSLIT,IGNORE` into its name and modifiers.
    pub fn parse(identifier: &str) -> Result<Self> {
        let captures = identifier_regex()?.captures(identifier).ok_or_else(|| {
            IconvError::InvalidArgument(format!("malformed charset identifier: {identifier:?}"))
        })?;

        let name = captures
            .name("name")
            .map_or("", |value| value.as_str())
            .to_string();
        let modifiers = captures
            .name("modifiers")
            .map_or("", |value| value.as_str())
            .split("//")
            .flat_map(|group| group.split(','))
            .filter(|modifier| !modifier.is_empty())
            .map(str::to_ascii_uppercase)
            .collect();

        Ok(Self { name, modifiers })
    }

    /// Adds the `TRANSLIT` modifier.
    pub fn transliterate(self) -> Self {
        self.with_modifier("TRANSLIT")
    }

    /// Adds the `IGNORE` modifier.
    pub fn ignore(self) -> Self {
        self.with_modifier("IGNORE")
    }

    /// Adds an arbitrary modifier, once.
    pub fn with_modifier(mut self, modifier: impl Into<String>) -> Self {
        let modifier = modifier.into().to_ascii_uppercase();
        if !self.modifiers.contains(&modifier) {
            self.modifiers.push(modifier);
        }
        self
    }

    /// Charset name without modifiers.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Upper-cased modifiers in the order they appear.
    pub fn modifiers(&self) -> &[String] {
        &self.modifiers
    }

    /// Whether `TRANSLIT` is among the modifiers.
    pub fn is_transliterating(&self) -> bool {
        self.has_modifier("TRANSLIT")
    }

    /// Whether `IGNORE` is among the modifiers.
    pub fn is_ignoring(&self) -> bool {
        self.has_modifier("IGNORE")
    }

    fn has_modifier(&self, modifier: &str) -> bool {
        self.modifiers.iter().any(|value| value == modifier)
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for modifier in &self.modifiers {
            write!(f, "//{modifier}")?;
        }
        Ok(())
    }
}

impl From<Charset> for String {
    fn from(value: Charset) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod charset_tests {
    use super::Charset;
    use crate::error::IconvError;

    #[test]
    fn builder_renders_modifiers_in_order() {
        let charset = Charset::new("ASCII").transliterate().ignore();
        assert_eq!(charset.to_string(), "ASCII//TRANSLIT//IGNORE");
        assert!(charset.is_transliterating());
        assert!(charset.is_ignoring());
    }

    #[test]
    fn modifiers_are_not_duplicated() {
        let charset = Charset::new("ASCII").transliterate().with_modifier("translit");
        assert_eq!(charset.to_string(), "ASCII//TRANSLIT");
    }

    #[test]
    fn parse_splits_slash_and_comma_modifiers() {
        let charset = Charset::parse("ISO-8859-1//translit,IGNORE").expect("valid identifier");
        assert_eq!(charset.name(), "ISO-8859-1");
        assert_eq!(charset.modifiers(), ["TRANSLIT", "IGNORE"]);

        let charset = Charset::parse("UTF-8").expect("valid identifier");
        assert!(charset.modifiers().is_empty());
        assert!(!charset.is_transliterating());
    }

    #[test]
    fn parse_accepts_locale_charset_with_modifier() {
        let charset = Charset::parse("//TRANSLIT").expect("valid identifier");
        assert_eq!(charset.name(), "");
        assert!(charset.is_transliterating());
    }

    #[test]
    fn parse_rejects_malformed_identifiers() {
        for identifier in ["UTF 8", "ASCII/TRANSLIT", "ASCII//TRANS LIT"] {
            let error = Charset::parse(identifier).expect_err("malformed identifier");
            assert!(matches!(error, IconvError::InvalidArgument(_)));
        }
    }

    #[test]
    fn parse_round_trips_rendered_identifiers() {
        let charset = Charset::new("CP1252").ignore();
        assert_eq!(Charset::parse(&charset.to_string()).expect("parse"), charset);
    }
}
