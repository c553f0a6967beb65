//! Parsed placeholder references

use std::fmt;

use crate::error::{DomainError, DomainResult};

use super::scanner::{CLOSE_MARKER, OPEN_MARKER};

const SUPPRESS_MARKER: char = '!';

/// A parsed placeholder token body.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlaceholderRef {
    /// The variable name, without the `!` marker and sub-path.
    pub name: String,

    /// Whether the token was written as `((!name))`.
    pub suppress_generation: bool,

    /// Keys to descend into the fetched value, possibly empty.
    pub sub_path: Vec<String>,
}

impl PlaceholderRef {
    /// Parses a token body (the text between the markers).
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidPlaceholder`] naming the body verbatim when
    /// it contains whitespace, marker characters, consecutive dots, or any
    /// character outside `[A-Za-z0-9_-/.]` (a single leading `!` is allowed).
    ///
    /// # Examples
    ///
    /// ```
    /// use manifold_domain::placeholder::PlaceholderRef;
    ///
    /// let reference = PlaceholderRef::parse("!/certs/web.ca.fingerprint").unwrap();
    /// assert_eq!(reference.name, "/certs/web");
    /// assert!(reference.suppress_generation);
    /// assert_eq!(reference.sub_path, vec!["ca", "fingerprint"]);
    /// assert!(reference.is_absolute());
    /// ```
    pub fn parse(body: &str) -> DomainResult<Self> {
        if body.contains("..") {
            return Err(DomainError::placeholder(
                body,
                "Must not contain consecutive dots",
            ));
        }

        let (suppress_generation, unmarked) = match body.strip_prefix(SUPPRESS_MARKER) {
            Some(rest) => (true, rest),
            None => (false, body),
        };

        if unmarked.is_empty() {
            return Err(DomainError::placeholder(body, "Must not be empty"));
        }

        if !unmarked.chars().all(is_name_char) {
            return Err(DomainError::placeholder(
                body,
                "Must only contain alphanumerics, underscores, dashes, dots or forward slashes",
            ));
        }

        let mut parts = unmarked.split('.');
        let name = parts.next().unwrap_or_default();
        let sub_path: Vec<String> = parts.map(str::to_string).collect();

        if name.is_empty() {
            return Err(DomainError::placeholder(body, "Must not start with a dot"));
        }
        if sub_path.last().is_some_and(String::is_empty) {
            return Err(DomainError::placeholder(body, "Must not end with a dot"));
        }
        if name.ends_with('/') {
            return Err(DomainError::placeholder(
                body,
                "Must not end with a forward slash",
            ));
        }

        Ok(Self {
            name: name.to_string(),
            suppress_generation,
            sub_path,
        })
    }

    /// Returns true if the name starts with `/` and is used as-is against the store.
    #[must_use]
    pub fn is_absolute(&self) -> bool {
        self.name.starts_with('/')
    }

    /// Returns the dotted name of the value reached after descending `depth`
    /// keys of the sub-path, e.g. `name.x.y` for depth 2.
    #[must_use]
    pub fn dotted_prefix(&self, depth: usize) -> String {
        let mut dotted = self.name.clone();
        for key in self.sub_path.iter().take(depth) {
            dotted.push('.');
            dotted.push_str(key);
        }
        dotted
    }
}

impl fmt::Display for PlaceholderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(OPEN_MARKER)?;
        if self.suppress_generation {
            write!(f, "{SUPPRESS_MARKER}")?;
        }
        f.write_str(&self.dotted_prefix(self.sub_path.len()))?;
        f.write_str(CLOSE_MARKER)
    }
}

const fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '/' | '.')
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_relative_name() {
        let reference = PlaceholderRef::parse("db_password").unwrap();
        assert_eq!(reference.name, "db_password");
        assert!(!reference.suppress_generation);
        assert!(reference.sub_path.is_empty());
        assert!(!reference.is_absolute());
    }

    #[test]
    fn test_parse_absolute_name() {
        let reference = PlaceholderRef::parse("/director/deployment/secret").unwrap();
        assert_eq!(reference.name, "/director/deployment/secret");
        assert!(reference.is_absolute());
    }

    #[test]
    fn test_parse_strips_suppress_marker() {
        let reference = PlaceholderRef::parse("!age").unwrap();
        assert_eq!(reference.name, "age");
        assert!(reference.suppress_generation);
    }

    #[test]
    fn test_parse_sub_path() {
        let reference = PlaceholderRef::parse("/nested_placeholder.x.y.z").unwrap();
        assert_eq!(reference.name, "/nested_placeholder");
        assert_eq!(reference.sub_path, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_consecutive_dots_rejected() {
        let err = PlaceholderRef::parse("nested_placeholder..x").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Placeholder name 'nested_placeholder..x' syntax error: \
             Must not contain consecutive dots"
        );
    }

    #[test]
    fn test_whitespace_and_symbols_rejected() {
        for body in ["I am an invalid name &%^", "invalid name $%$^", " name", "a\tb"] {
            let err = PlaceholderRef::parse(body).unwrap_err();
            assert!(
                matches!(&err, DomainError::InvalidPlaceholder { name, .. } if name == body),
                "expected syntax error for {body:?}"
            );
        }
    }

    #[test]
    fn test_marker_characters_rejected() {
        assert!(PlaceholderRef::parse("a(b").is_err());
        assert!(PlaceholderRef::parse("a)b").is_err());
    }

    #[test]
    fn test_misplaced_dots_and_marks_rejected() {
        assert!(PlaceholderRef::parse("!").is_err());
        assert!(PlaceholderRef::parse(".x").is_err());
        assert!(PlaceholderRef::parse("x.").is_err());
        assert!(PlaceholderRef::parse("a!b").is_err());
        assert!(PlaceholderRef::parse("!!a").is_err());
        assert!(PlaceholderRef::parse("name/").is_err());
    }

    #[test]
    fn test_dotted_prefix() {
        let reference = PlaceholderRef::parse("/nested.x.y.a").unwrap();
        assert_eq!(reference.dotted_prefix(0), "/nested");
        assert_eq!(reference.dotted_prefix(2), "/nested.x.y");
    }

    #[test]
    fn test_display_round_trips_token() {
        let reference = PlaceholderRef::parse("!cert.ca").unwrap();
        assert_eq!(reference.to_string(), "((!cert.ca))");
    }
}
