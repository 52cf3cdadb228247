//! Configuration parsing and validation for the relay
//!
//! Every option can be given as a command-line flag or through the environment. Values are read
//! once at startup and never change afterwards.
use anyhow::{anyhow, bail};
use axum::http::Uri;
use clap::Parser;
use guardrail_relay::client::PoolConfig;
use guardrail_relay::target::Target;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use url::Url;

#[derive(Clone, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// The address on which the relay will listen.
    #[arg(long, env = "RELAY_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// The port on which the relay will listen.
    #[arg(short = 'p', long, env = "RELAY_PORT", default_value_t = 5000)]
    pub port: u16,

    /// Base URL of the Guardrail Gateway.
    #[arg(long, env = "GATEWAY_BASE_URL", default_value = "http://127.0.0.1:18080")]
    pub gateway_base_url: String,

    /// Timeout (in seconds) for a single call to the gateway.
    #[arg(long, env = "GATEWAY_TIMEOUT", default_value_t = 120)]
    pub gateway_timeout: u64,

    /// Bearer token for the gateway. Left empty, no Authorization header is sent.
    #[arg(long, env = "GATEWAY_BEARER", default_value = "", hide_env_values = true)]
    pub gateway_bearer: String,

    /// Provider name sent with every request, as registered with the gateway.
    #[arg(long, env = "DEFAULT_PROVIDER", default_value = "default")]
    pub default_provider: String,

    /// Whether to enable the metrics endpoint.
    #[arg(short = 'm', long, env = "RELAY_METRICS", default_value_t = false)]
    pub metrics: bool,

    /// The port on which the metrics server will listen.
    #[arg(long, env = "RELAY_METRICS_PORT", default_value_t = 9090)]
    pub metrics_port: u16,

    /// The prefix to use for metrics.
    #[arg(long, env = "RELAY_METRICS_PREFIX", default_value = "guardrail_relay")]
    pub metrics_prefix: String,

    /// Maximum number of idle connections to keep alive to the gateway.
    #[arg(long, env = "RELAY_POOL_MAX_IDLE_PER_HOST", default_value_t = 100)]
    pub pool_max_idle_per_host: usize,

    /// How long (in seconds) to keep idle gateway connections alive.
    #[arg(long, env = "RELAY_POOL_IDLE_TIMEOUT_SECS", default_value_t = 90)]
    pub pool_idle_timeout_secs: u64,
}

impl Config {
    pub fn validate(self) -> Result<Self, anyhow::Error> {
        if self.gateway_timeout == 0 {
            bail!("Gateway timeout must be at least one second");
        }
        let target = self.target()?;
        target
            .chat_completions_url()
            .parse::<Uri>()
            .map_err(|e| anyhow!("Gateway URL '{}' is not usable: {}", self.gateway_base_url, e))?;
        Ok(self)
    }

    /// The gateway every message is forwarded to.
    pub fn target(&self) -> Result<Target, anyhow::Error> {
        let url = Url::parse(&self.gateway_base_url)
            .map_err(|e| anyhow!("Invalid gateway URL '{}': {}", self.gateway_base_url, e))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!(
                "Gateway URL '{}' must use http or https",
                self.gateway_base_url
            );
        }

        Ok(Target::builder()
            .url(url)
            .provider(self.default_provider.clone())
            .bearer(self.gateway_bearer.clone())
            .timeout(Duration::from_secs(self.gateway_timeout))
            .build())
    }

    pub fn pool(&self) -> PoolConfig {
        PoolConfig {
            max_idle_per_host: self.pool_max_idle_per_host,
            idle_timeout: Duration::from_secs(self.pool_idle_timeout_secs),
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn metrics_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.metrics_port)
    }
}

// Hand-written so the bearer token never ends up in the startup log.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bearer = if self.gateway_bearer.is_empty() {
            "<none>"
        } else {
            "<redacted>"
        };
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("gateway_base_url", &self.gateway_base_url)
            .field("gateway_timeout", &self.gateway_timeout)
            .field("gateway_bearer", &bearer)
            .field("default_provider", &self.default_provider)
            .field("metrics", &self.metrics)
            .field("metrics_port", &self.metrics_port)
            .field("metrics_prefix", &self.metrics_prefix)
            .field("pool_max_idle_per_host", &self.pool_max_idle_per_host)
            .field("pool_idle_timeout_secs", &self.pool_idle_timeout_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["guardrail-relay"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = parse(&[
            "--gateway-base-url",
            "https://gw.internal:8443/",
            "--gateway-timeout",
            "5",
            "--gateway-bearer",
            "secret",
            "--default-provider",
            "calypso",
            "--port",
            "8080",
        ])
        .validate()
        .unwrap();

        let target = config.target().unwrap();
        assert_eq!(
            target.chat_completions_url(),
            "https://gw.internal:8443/v1/chat/completions"
        );
        assert_eq!(target.timeout, Duration::from_secs(5));
        assert_eq!(target.bearer_token(), Some("secret"));
        assert_eq!(target.provider, "calypso");
        assert_eq!(config.bind_addr().port(), 8080);
    }

    #[test]
    fn test_debug_redacts_bearer() {
        let config = parse(&["--gateway-bearer", "secret-token"]);
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_rejects_bad_gateway_urls() {
        assert!(parse(&["--gateway-base-url", "not a url"]).validate().is_err());
        assert!(
            parse(&["--gateway-base-url", "ftp://gw.internal"])
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_rejects_zero_timeout() {
        assert!(parse(&["--gateway-timeout", "0"]).validate().is_err());
    }
}
