use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use logsift_storage::validate_prefix;

/// Parameters of one scan. Immutable once the scan starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanRequest {
    term: String,
    date_filter: Option<String>,
    path_prefix: String,
}

impl ScanRequest {
    /// Validate and build a request.
    ///
    /// Fails with [`MissingTerm`](ErrorKind::MissingTerm) for an absent or
    /// blank term, and with [`InvalidPrefix`](ErrorKind::InvalidPrefix) for an
    /// empty prefix or when the prefix and date would climb out of the
    /// storage root.
    ///
    /// ```
    /// use logsift_search::ScanRequest;
    ///
    /// let request = ScanRequest::new(Some("4521"), Some("2024-05-01"), "/Partner/").unwrap();
    /// assert_eq!(request.effective_prefix(), "Partner/2024-05-01/");
    /// assert!(ScanRequest::new(None, None, "Partner").is_err());
    /// ```
    pub fn new(term: Option<&str>, date_filter: Option<&str>, path_prefix: &str) -> Result<Self> {
        let term = match term {
            Some(term) if !term.trim().is_empty() => term.to_string(),
            _ => exn::bail!(ErrorKind::MissingTerm),
        };
        let path_prefix = path_prefix.trim_matches('/');
        if path_prefix.trim().is_empty() {
            exn::bail!(ErrorKind::InvalidPrefix(path_prefix.to_string()));
        }
        let date_filter = date_filter.map(|d| d.trim_matches('/')).filter(|d| !d.is_empty()).map(str::to_string);
        let request = Self { term, date_filter, path_prefix: path_prefix.to_string() };
        let effective = request.effective_prefix();
        validate_prefix(&effective).or_raise(|| ErrorKind::InvalidPrefix(effective.clone()))?;
        Ok(request)
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn date_filter(&self) -> Option<&str> {
        self.date_filter.as_deref()
    }

    /// `<pathPrefix>/` or `<pathPrefix>/<dateFilter>/`.
    pub fn effective_prefix(&self) -> String {
        match &self.date_filter {
            Some(date) => format!("{}/{date}/", self.path_prefix),
            None => format!("{}/", self.path_prefix),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(None)]
    #[case(Some(""))]
    #[case(Some("   "))]
    fn test_missing_term(#[case] term: Option<&str>) {
        let err = ScanRequest::new(term, None, "Partner").unwrap_err();
        assert_eq!(*err, ErrorKind::MissingTerm);
    }

    #[test]
    fn test_term_is_kept_verbatim() {
        let request = ScanRequest::new(Some(" 4521 "), None, "Partner").unwrap();
        assert_eq!(request.term(), " 4521 ");
    }

    #[rstest]
    #[case("Partner", None, "Partner/")]
    #[case("/Partner/", None, "Partner/")]
    #[case("Partner", Some("2024-05-01"), "Partner/2024-05-01/")]
    #[case("Partner", Some(""), "Partner/")]
    #[case("Partner/sub", Some("/2024/05/"), "Partner/sub/2024/05/")]
    fn test_effective_prefix(#[case] prefix: &str, #[case] date: Option<&str>, #[case] expected: &str) {
        let request = ScanRequest::new(Some("x"), date, prefix).unwrap();
        assert_eq!(request.effective_prefix(), expected);
    }

    #[test]
    fn test_empty_date_is_absent() {
        let request = ScanRequest::new(Some("x"), Some("/"), "Partner").unwrap();
        assert_eq!(request.date_filter(), None);
    }

    #[rstest]
    #[case("", None)]
    #[case("/", None)]
    #[case("//", Some("2024-05-01"))]
    #[case(" ", None)]
    fn test_empty_prefix_is_rejected(#[case] prefix: &str, #[case] date: Option<&str>) {
        let err = ScanRequest::new(Some("x"), date, prefix).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPrefix(_)));
    }

    #[test]
    fn test_traversal_is_rejected() {
        let err = ScanRequest::new(Some("x"), Some("../../secrets"), "Partner").unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPrefix(_)));
    }
}
