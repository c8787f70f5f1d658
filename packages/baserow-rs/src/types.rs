use serde::{Deserialize, Serialize};

/// A table row keyed by user field names.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Paginated list response for table rows.
#[derive(Debug, Clone, Deserialize)]
pub struct RowPage {
    #[serde(default)]
    pub count: u64,
    /// URL of the next page, absent on the last one.
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub results: Vec<Row>,
}

impl RowPage {
    /// Whether another page follows, given the rows read before this one.
    pub fn has_more(&self, rows_before: usize) -> bool {
        if self.results.is_empty() {
            return false;
        }
        let read = (rows_before + self.results.len()) as u64;
        self.next.is_some() || read < self.count
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct TokenAuthRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// `token-auth` returns `access_token` on newer versions and `token` on older ones.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TokenAuthResponse {
    pub access_token: Option<String>,
    pub token: Option<String>,
}

impl TokenAuthResponse {
    pub fn into_token(self) -> Option<String> {
        self.access_token.or(self.token).filter(|t| !t.is_empty())
    }
}

/// A file stored in Baserow user files.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadedFile {
    pub name: String,
    pub url: Option<String>,
    pub original_name: Option<String>,
}

/// A row filter, rendered as a `filter__{field}__{kind}` query parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub field: String,
    pub kind: &'static str,
    pub value: String,
}

impl Filter {
    pub fn equal(field: impl Into<String>, value: impl ToString) -> Self {
        Self {
            field: field.into(),
            kind: "equal",
            value: value.to_string(),
        }
    }

    pub fn single_select_equal(field: impl Into<String>, option_id: u64) -> Self {
        Self {
            field: field.into(),
            kind: "single_select_equal",
            value: option_id.to_string(),
        }
    }

    pub fn query_param(&self) -> (String, String) {
        (
            format!("filter__{}__{}", self.field, self.kind),
            self.value.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_renders_query_param() {
        let filter = Filter::equal("Generation UUID", "abc123");
        assert_eq!(
            filter.query_param(),
            ("filter__Generation UUID__equal".to_string(), "abc123".to_string())
        );

        let filter = Filter::single_select_equal("Status", 3055);
        assert_eq!(filter.query_param().0, "filter__Status__single_select_equal");
        assert_eq!(filter.query_param().1, "3055");
    }

    fn page(count: u64, next: Option<&str>, rows: usize) -> RowPage {
        RowPage {
            count,
            next: next.map(str::to_string),
            results: (0..rows).map(|_| Row::new()).collect(),
        }
    }

    #[test]
    fn has_more_follows_next_link_and_count() {
        assert!(page(450, Some("https://b.example/?page=2"), 200).has_more(0));
        // No link, but the count says rows remain
        assert!(page(450, None, 200).has_more(200));
        assert!(!page(450, None, 50).has_more(400));
        assert!(!page(0, None, 0).has_more(0));
        // An empty page ends the walk whatever the count claims
        assert!(!page(450, Some("https://b.example/?page=9"), 0).has_more(400));
    }

    #[test]
    fn token_response_accepts_both_shapes() {
        let newer: TokenAuthResponse =
            serde_json::from_value(serde_json::json!({"access_token": "jwt-a"})).unwrap();
        assert_eq!(newer.into_token().as_deref(), Some("jwt-a"));

        let older: TokenAuthResponse =
            serde_json::from_value(serde_json::json!({"token": "jwt-b"})).unwrap();
        assert_eq!(older.into_token().as_deref(), Some("jwt-b"));

        let empty: TokenAuthResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(empty.into_token().is_none());
    }
}
