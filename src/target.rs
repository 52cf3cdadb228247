/// The upstream Guardrail Gateway that every chat message is forwarded to.
///
/// A target is built once at startup from the process configuration and never changes afterwards;
/// handlers only ever read it.
use bon::Builder;
use std::time::Duration;
use url::Url;

/// Path appended to the gateway base URL for every forwarded message.
pub const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Clone, Builder)]
pub struct Target {
    /// Base URL of the gateway. Any trailing slashes are dropped before the path is appended.
    pub url: Url,
    /// Provider name sent in the `provider` field of every request.
    #[builder(into)]
    pub provider: String,
    /// Bearer token for the gateway. An empty token is treated the same as no token.
    pub bearer: Option<String>,
    /// Covers the whole exchange: connecting, sending, and reading the response body.
    #[builder(default = DEFAULT_TIMEOUT)]
    pub timeout: Duration,
}

impl Target {
    pub fn chat_completions_url(&self) -> String {
        format!(
            "{}{}",
            self.url.as_str().trim_end_matches('/'),
            CHAT_COMPLETIONS_PATH
        )
    }

    pub fn bearer_token(&self) -> Option<&str> {
        self.bearer.as_deref().filter(|key| !key.is_empty())
    }
}

// Hand-written so the bearer token never ends up in logs.
impl std::fmt::Debug for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Target")
            .field("url", &self.url.as_str())
            .field("provider", &self.provider)
            .field("bearer", &self.bearer_token().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("http://127.0.0.1:18080", "http://127.0.0.1:18080/v1/chat/completions")]
    #[case("http://127.0.0.1:18080/", "http://127.0.0.1:18080/v1/chat/completions")]
    #[case("https://gw.example.com/guard//", "https://gw.example.com/guard/v1/chat/completions")]
    fn test_chat_completions_url_strips_trailing_slashes(
        #[case] base: &str,
        #[case] expected: &str,
    ) {
        let target = Target::builder()
            .url(base.parse().unwrap())
            .provider("calypso")
            .build();
        assert_eq!(target.chat_completions_url(), expected);
    }

    #[test]
    fn test_empty_bearer_is_no_bearer() {
        let target = Target::builder()
            .url("http://localhost".parse().unwrap())
            .provider("calypso")
            .bearer(String::new())
            .build();
        assert_eq!(target.bearer_token(), None);

        let target = Target::builder()
            .url("http://localhost".parse().unwrap())
            .provider("calypso")
            .bearer("secret".to_string())
            .build();
        assert_eq!(target.bearer_token(), Some("secret"));
        assert_eq!(target.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_debug_redacts_bearer() {
        let target = Target::builder()
            .url("http://localhost".parse().unwrap())
            .provider("calypso")
            .bearer("super-secret".to_string())
            .build();
        let rendered = format!("{target:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
