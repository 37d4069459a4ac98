//! Parser configuration

use serde::{Deserialize, Serialize};

/// Per-parser settings affecting how resources are written
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParserOptions {
    /// Base URL of the server the output is meant for. References on this
    /// base are written without base and version.
    pub server_base_url: Option<String>,

    /// Leave narrative text out of the output
    pub suppress_narratives: bool,

    /// Indent the output
    pub pretty_print: bool,
}

impl ParserOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blank values clear the setting
    pub fn with_server_base_url(mut self, url: Option<&str>) -> Self {
        self.set_server_base_url(url);
        self
    }

    pub fn with_suppress_narratives(mut self, suppress: bool) -> Self {
        self.suppress_narratives = suppress;
        self
    }

    pub fn with_pretty_print(mut self, pretty: bool) -> Self {
        self.pretty_print = pretty;
        self
    }

    pub fn set_server_base_url(&mut self, url: Option<&str>) {
        self.server_base_url = url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string);
    }

    /// Configured server base, blank values and trailing `/` removed
    pub fn server_base(&self) -> Option<&str> {
        self.server_base_url
            .as_deref()
            .map(|u| u.trim().trim_end_matches('/'))
            .filter(|u| !u.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_camel_case_with_defaults() {
        let options: ParserOptions = serde_json::from_value(json!({
            "serverBaseUrl": "http://example.com/fhir/",
            "prettyPrint": true
        }))
        .unwrap();

        assert_eq!(options.server_base(), Some("http://example.com/fhir"));
        assert!(options.pretty_print);
        assert!(!options.suppress_narratives);
    }

    #[test]
    fn test_blank_base_url_is_cleared() {
        let options = ParserOptions::new().with_server_base_url(Some("  "));
        assert_eq!(options.server_base_url, None);

        let options: ParserOptions =
            serde_json::from_value(json!({ "serverBaseUrl": "" })).unwrap();
        assert_eq!(options.server_base(), None);
    }
}
