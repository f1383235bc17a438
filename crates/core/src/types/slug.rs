//! URL slug type for organizations and products.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Slug`].
#[derive(thiserror::Error, Debug, Clone)]
pub enum SlugError {
    /// The input string is empty.
    #[error("slug cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("slug must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains a character outside `[a-z0-9-]`.
    #[error("slug may only contain lowercase letters, digits, and hyphens")]
    InvalidCharacter,
    /// The input starts or ends with a hyphen, or contains a double hyphen.
    #[error("slug cannot start or end with a hyphen or contain '--'")]
    BadHyphenation,
}

/// A URL-safe identifier for an organization or product.
///
/// Slugs appear in URLs (`/orgs/{slug}/products/{slug}`), so the accepted
/// alphabet is deliberately narrow: lowercase ASCII letters, digits, and
/// single interior hyphens, up to 64 characters.
///
/// Use [`Slug::parse`] to validate caller-supplied values, or
/// [`Slug::slugify`] to derive one from a display name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    /// Maximum length of a slug.
    pub const MAX_LENGTH: usize = 64;

    /// Parse a `Slug` from a string, validating the alphabet.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, too long, contains a
    /// character outside `[a-z0-9-]`, or is badly hyphenated.
    pub fn parse(s: &str) -> Result<Self, SlugError> {
        if s.is_empty() {
            return Err(SlugError::Empty);
        }

        if s.len() > Self::MAX_LENGTH {
            return Err(SlugError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        if !s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(SlugError::InvalidCharacter);
        }

        if s.starts_with('-') || s.ends_with('-') || s.contains("--") {
            return Err(SlugError::BadHyphenation);
        }

        Ok(Self(s.to_owned()))
    }

    /// Derive a slug from an arbitrary display name.
    ///
    /// Lowercases, maps runs of non-alphanumeric characters to single
    /// hyphens, and truncates to the maximum length.
    ///
    /// # Errors
    ///
    /// Returns [`SlugError::Empty`] if nothing survives normalization
    /// (e.g., the name was all punctuation).
    pub fn slugify(name: &str) -> Result<Self, SlugError> {
        let mut out = String::with_capacity(name.len());
        let mut pending_hyphen = false;

        for c in name.chars() {
            if c.is_ascii_alphanumeric() {
                if pending_hyphen && !out.is_empty() {
                    out.push('-');
                }
                pending_hyphen = false;
                out.push(c.to_ascii_lowercase());
            } else {
                pending_hyphen = true;
            }
            if out.len() >= Self::MAX_LENGTH {
                break;
            }
        }

        while out.ends_with('-') {
            out.pop();
        }

        Self::parse(&out)
    }

    /// Returns the slug as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `Slug` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Slug {
    type Err = SlugError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// SQLx support (with postgres feature)
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Slug {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Slug {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        // Database values are assumed valid
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Slug {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        assert!(Slug::parse("acme").is_ok());
        assert!(Slug::parse("acme-widgets-2").is_ok());
        assert!(Slug::parse("a1").is_ok());
    }

    #[test]
    fn test_parse_rejects_uppercase_and_spaces() {
        assert!(matches!(
            Slug::parse("Acme"),
            Err(SlugError::InvalidCharacter)
        ));
        assert!(matches!(
            Slug::parse("acme widgets"),
            Err(SlugError::InvalidCharacter)
        ));
    }

    #[test]
    fn test_parse_rejects_bad_hyphens() {
        assert!(matches!(
            Slug::parse("-acme"),
            Err(SlugError::BadHyphenation)
        ));
        assert!(matches!(
            Slug::parse("acme-"),
            Err(SlugError::BadHyphenation)
        ));
        assert!(matches!(
            Slug::parse("acme--widgets"),
            Err(SlugError::BadHyphenation)
        ));
    }

    #[test]
    fn test_parse_empty_and_too_long() {
        assert!(matches!(Slug::parse(""), Err(SlugError::Empty)));
        let long = "a".repeat(65);
        assert!(matches!(Slug::parse(&long), Err(SlugError::TooLong { .. })));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(Slug::slugify("Acme Widgets").unwrap().as_str(), "acme-widgets");
        assert_eq!(
            Slug::slugify("  Fancy -- Store!  ").unwrap().as_str(),
            "fancy-store"
        );
        assert_eq!(Slug::slugify("Café 42").unwrap().as_str(), "caf-42");
    }

    #[test]
    fn test_slugify_all_punctuation() {
        assert!(matches!(Slug::slugify("!!!"), Err(SlugError::Empty)));
    }

    #[test]
    fn test_slugify_truncates() {
        let name = "x".repeat(200);
        let slug = Slug::slugify(&name).unwrap();
        assert!(slug.as_str().len() <= Slug::MAX_LENGTH);
    }
}
