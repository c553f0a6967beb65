//! Scanner for `((placeholder))` tokens
//!
//! Finds the byte spans of placeholder tokens inside a string scalar.

use std::ops::Range;

/// Opening marker of a placeholder token.
pub const OPEN_MARKER: &str = "((";

/// Closing marker of a placeholder token.
pub const CLOSE_MARKER: &str = "))";

/// A placeholder token found inside a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderToken {
    /// Text between the markers, verbatim.
    pub body: String,

    /// Byte range of the whole token, markers included.
    pub span: Range<usize>,
}

/// Scans a string for non-overlapping placeholder tokens, left to right.
///
/// A token body is everything between `((` and the next `))`, and must be
/// non-empty and free of parentheses.
///
/// ```
/// use manifold_domain::placeholder::scan_placeholders;
///
/// let tokens = scan_placeholders("https://((host)):((port))/api");
/// assert_eq!(tokens.len(), 2);
/// assert_eq!(tokens[0].body, "host");
/// assert_eq!(tokens[1].body, "port");
/// ```
#[must_use]
pub fn scan_placeholders(input: &str) -> Vec<PlaceholderToken> {
    let mut tokens = Vec::new();
    let mut cursor = 0;

    while let Some(offset) = input[cursor..].find(OPEN_MARKER) {
        let open = cursor + offset;
        let body_start = open + OPEN_MARKER.len();
        let body_len = input[body_start..]
            .find(['(', ')'])
            .unwrap_or(input.len() - body_start);
        let body_end = body_start + body_len;

        if body_len > 0 && input[body_end..].starts_with(CLOSE_MARKER) {
            let end = body_end + CLOSE_MARKER.len();
            tokens.push(PlaceholderToken {
                body: input[body_start..body_end].to_string(),
                span: open..end,
            });
            cursor = end;
        } else {
            // Retry from the next byte so "(((name))" still yields "((name))".
            cursor = open + 1;
        }
    }

    tokens
}

/// Returns the token body if the whole string is exactly one placeholder.
///
/// `"((name))"` qualifies; `"((a))((b))"`, `"((a)) suffix"` and `"((a"` do not.
#[must_use]
pub fn full_placeholder(input: &str) -> Option<&str> {
    let body = input
        .strip_prefix(OPEN_MARKER)?
        .strip_suffix(CLOSE_MARKER)?;

    if body.is_empty() || body.contains(['(', ')']) {
        None
    } else {
        Some(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_single_token() {
        let tokens = scan_placeholders("((name))");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].body, "name");
        assert_eq!(tokens[0].span, 0..8);
    }

    #[test]
    fn test_scan_embedded_tokens() {
        let input = "this is ((smurf_1)) this is ((smurf_2))";
        let tokens = scan_placeholders(input);
        assert_eq!(tokens.len(), 2);
        assert_eq!(&input[tokens[0].span.clone()], "((smurf_1))");
        assert_eq!(&input[tokens[1].span.clone()], "((smurf_2))");
    }

    #[test]
    fn test_scan_adjacent_tokens() {
        let tokens = scan_placeholders("((a))((b))((c))");
        let bodies: Vec<_> = tokens.iter().map(|t| t.body.as_str()).collect();
        assert_eq!(bodies, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_scan_keeps_body_verbatim() {
        let tokens = scan_placeholders("((I am an invalid name &%^))");
        assert_eq!(tokens[0].body, "I am an invalid name &%^");
    }

    #[test]
    fn test_scan_unclosed_token() {
        assert!(scan_placeholders("((name").is_empty());
        assert!(scan_placeholders("name))").is_empty());
    }

    #[test]
    fn test_scan_empty_token() {
        assert!(scan_placeholders("(())").is_empty());
    }

    #[test]
    fn test_scan_extra_opening_paren() {
        let input = "(((name))";
        let tokens = scan_placeholders(input);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].body, "name");
        assert_eq!(tokens[0].span, 1..9);
    }

    #[test]
    fn test_single_parens_are_not_tokens() {
        assert!(scan_placeholders("(name)").is_empty());
        assert!(scan_placeholders("f(x) = (y)").is_empty());
    }

    #[test]
    fn test_full_placeholder() {
        assert_eq!(full_placeholder("((my_smurf))"), Some("my_smurf"));
        assert_eq!(full_placeholder("((!my_smurf))"), Some("!my_smurf"));
        assert_eq!(
            full_placeholder("((invalid name $%$^))"),
            Some("invalid name $%$^")
        );
    }

    #[test]
    fn test_not_full_placeholder() {
        assert_eq!(full_placeholder("my_smurf"), None);
        assert_eq!(full_placeholder("((my_smurf"), None);
        assert_eq!(full_placeholder("my_smurf))"), None);
        assert_eq!(full_placeholder("((my_smurf))((vroom))"), None);
        assert_eq!(full_placeholder("((my_smurf)) i am happy"), None);
        assert_eq!(full_placeholder("(())"), None);
    }
}
