use crate::settings::MatchMode;
use memchr::memmem::Finder;

/// Line predicate for one search term.
///
/// | Mode                                  | Matches when the line...                                   |
/// |---------------------------------------|------------------------------------------------------------|
/// | [`Lenient`](MatchMode::Lenient)       | contains the term ignoring case, or a boundary token below |
/// | [`Boundary`](MatchMode::Boundary)     | contains `"term"` or ` term ` exactly                      |
/// | [`Literal`](MatchMode::Literal)       | contains the term exactly                                  |
///
/// Boundary tokens exist for numeric/ID-like terms embedded in delimited
/// text: `4521` should hit `"pin": "4521"` but not `ref=454521x`.
///
/// ```
/// use logsift_search::{Matcher, MatchMode};
///
/// let exact = Matcher::new("4521", MatchMode::Boundary);
/// assert!(exact.is_match(r#"{"pin": "4521"}"#));
/// assert!(exact.is_match("pin 4521 accepted"));
/// assert!(!exact.is_match("ref=454521x"));
///
/// let lenient = Matcher::new("Timeout", MatchMode::Lenient);
/// assert!(lenient.is_match("upstream TIMEOUT after 30s"));
/// ```
#[derive(Clone, Debug)]
pub struct Matcher {
    mode: MatchMode,
    term: Finder<'static>,
    lowered: String,
    quoted: Finder<'static>,
    spaced: Finder<'static>,
}

impl Matcher {
    pub fn new(term: &str, mode: MatchMode) -> Self {
        Self {
            mode,
            term: Finder::new(term).into_owned(),
            lowered: term.to_lowercase(),
            quoted: Finder::new(&format!("\"{term}\"")).into_owned(),
            spaced: Finder::new(&format!(" {term} ")).into_owned(),
        }
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn is_match(&self, line: &str) -> bool {
        match self.mode {
            MatchMode::Lenient => self.is_token(line) || line.to_lowercase().contains(&self.lowered),
            MatchMode::Boundary => self.is_token(line),
            MatchMode::Literal => self.term.find(line.as_bytes()).is_some(),
        }
    }

    fn is_token(&self, line: &str) -> bool {
        let haystack = line.as_bytes();
        self.quoted.find(haystack).is_some() || self.spaced.find(haystack).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("payout 4521 sent", true)]
    #[case(r#"{"pin":"4521"}"#, true)]
    #[case("PIN=4521", true)]
    #[case("ref 454521x", true)]
    #[case("nothing here", false)]
    fn test_lenient(#[case] line: &str, #[case] expected: bool) {
        assert_eq!(Matcher::new("4521", MatchMode::Lenient).is_match(line), expected);
    }

    #[rstest]
    #[case("ERROR: Connection Refused", "connection refused", true)]
    #[case("straße gesperrt", "STRASSE", false)]
    #[case("ÉCHEC du virement", "échec", true)]
    fn test_lenient_case_folding(#[case] line: &str, #[case] term: &str, #[case] expected: bool) {
        assert_eq!(Matcher::new(term, MatchMode::Lenient).is_match(line), expected);
    }

    #[rstest]
    #[case(r#"{"pin": "4521"}"#, true)]
    #[case("pin 4521 ok", true)]
    #[case("ref 454521x", false)]
    #[case("pin 4521", false)]
    #[case("4521 at start", false)]
    #[case(r#""4521" quoted"#, true)]
    fn test_boundary(#[case] line: &str, #[case] expected: bool) {
        assert_eq!(Matcher::new("4521", MatchMode::Boundary).is_match(line), expected);
    }

    #[test]
    fn test_boundary_is_case_sensitive() {
        let matcher = Matcher::new("abc", MatchMode::Boundary);
        assert!(matcher.is_match("id abc ok"));
        assert!(!matcher.is_match("id ABC ok"));
    }

    #[rstest]
    #[case("Timeout reached", true)]
    #[case("timeout reached", false)]
    #[case("xTimeouty", true)]
    fn test_literal(#[case] line: &str, #[case] expected: bool) {
        assert_eq!(Matcher::new("Timeout", MatchMode::Literal).is_match(line), expected);
    }
}
