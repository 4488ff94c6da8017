use anyhow::{Context, Result};
use clap::Parser;
use redash_gateway_core::{AggFuncRule, AutoParameterResolver, SplitPolicy, TimeBucketRule, TimeLayout};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Default file looked up when no config path is given
const DEFAULT_CONFIG_FILE: &str = "config/gateway.yaml";

/// Command-line flags. Explicit flags win over file and environment values.
#[derive(Debug, Default, Parser)]
#[command(name = "redash-gateway")]
#[command(about = "Query-execution gateway in front of a Redash service")]
#[command(version)]
pub struct Cli {
    /// Config file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Upstream Redash URL
    #[arg(long)]
    pub redash: Option<String>,

    /// Address to bind the HTTP server to
    #[arg(long)]
    pub bind: Option<String>,

    /// Max job polls (one per poll interval) before giving up
    #[arg(long)]
    pub wait: Option<u32>,
}

/// Configuration for the gateway service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Upstream BI service configuration
    pub upstream: UpstreamConfig,

    /// Auto parameters, partitioning and polling
    pub dispatch: DispatchConfig,

    /// Metrics and monitoring configuration
    pub metrics: MetricsConfig,

    /// Health check configuration
    pub health: HealthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the HTTP server to
    pub bind_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the upstream service
    pub base_url: String,

    /// Timeout for each upstream HTTP call in milliseconds
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Maximum number of job-status polls
    pub max_wait: u32,

    /// Delay between job-status polls in milliseconds
    pub poll_interval_ms: u64,

    /// Layout of `fromTime` / `toTime` values
    pub time_layout: String,

    /// Aggregation functions only qualify below this many blocks
    pub max_block: i64,

    /// Ordered time-bucket rules
    pub time_buckets: Vec<TimeBucketRule>,

    /// Ordered aggregation-function rules
    pub agg_funcs: Vec<AggFuncRule>,

    /// Buckets that may be split; empty allows every request
    pub allow_split_bucket: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint
    pub enable_prometheus: bool,

    /// Metrics endpoint path
    pub metrics_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Health check endpoint path
    pub health_path: String,
}

/// Flat file layout used by older deployments
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LegacyFileConfig {
    port: u16,
    bind: String,
    layout: String,
    #[serde(rename = "redashurl", alias = "redashURL")]
    redash_url: String,
    #[serde(rename = "maxwait", alias = "maxWait")]
    max_wait: u32,
    #[serde(rename = "maxBlock")]
    max_block: i64,
    #[serde(rename = "tableTimers")]
    table_timers: Vec<TimeBucketRule>,
    #[serde(rename = "AggFuncs")]
    agg_funcs: Vec<AggFuncRule>,
    #[serde(rename = "AllowSplitBucket")]
    allow_split_bucket: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://redash.evgcdn.net/".to_string(),
            request_timeout_ms: 60_000,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_wait: 100,
            poll_interval_ms: 1000,
            time_layout: "2006-01-02 15:04:05".to_string(),
            max_block: 100,
            time_buckets: Vec::new(),
            agg_funcs: Vec::new(),
            allow_split_bucket: String::new(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enable_prometheus: true,
            metrics_path: "/metrics".to_string(),
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            health_path: "/health".to_string(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            upstream: UpstreamConfig::default(),
            dispatch: DispatchConfig::default(),
            metrics: MetricsConfig::default(),
            health: HealthConfig::default(),
        }
    }
}

impl From<LegacyFileConfig> for GatewayConfig {
    fn from(legacy: LegacyFileConfig) -> Self {
        let mut config = Self::default();

        if !legacy.bind.is_empty() {
            config.server.bind_address = format!("{}:{}", legacy.bind, legacy.port);
        }
        if !legacy.redash_url.is_empty() {
            config.upstream.base_url = legacy.redash_url;
        }
        if legacy.max_wait != 0 {
            config.dispatch.max_wait = legacy.max_wait;
        }
        if !legacy.layout.is_empty() {
            config.dispatch.time_layout = legacy.layout;
        }
        if legacy.max_block != 0 {
            config.dispatch.max_block = legacy.max_block;
        }
        config.dispatch.time_buckets = legacy.table_timers;
        config.dispatch.agg_funcs = legacy.agg_funcs;
        config.dispatch.allow_split_bucket = legacy.allow_split_bucket;

        config
    }
}

impl GatewayConfig {
    /// Load configuration from file, environment variables, flags and defaults
    pub fn load(cli: &Cli) -> Result<Self> {
        Self::load_with_env(cli, |key| env::var(key).ok())
    }

    /// `load` with an explicit environment lookup
    pub fn load_with_env<F>(cli: &Cli, env_var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        // Try to load from config file first
        if let Some(path) = &cli.config {
            config = Self::load_from_file(path)?;
        } else if let Some(path) = env_var("CONFIG_PATH") {
            config = Self::load_from_file(&path)?;
        } else if std::path::Path::new(DEFAULT_CONFIG_FILE).exists() {
            config = Self::load_from_file(DEFAULT_CONFIG_FILE)?;
        }

        config.apply_env(&env_var)?;

        if let Some(redash) = &cli.redash {
            config.upstream.base_url = redash.clone();
        }
        if let Some(bind) = &cli.bind {
            config.server.bind_address = bind.clone();
        }
        if let Some(wait) = cli.wait {
            config.dispatch.max_wait = wait;
        }

        config.validate()?;

        Ok(config)
    }

    /// Override with environment variables if present
    fn apply_env<F>(&mut self, env_var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind_addr) = env_var("GATEWAY_BIND_ADDRESS") {
            self.server.bind_address = bind_addr;
        }

        if let Some(base_url) = env_var("GATEWAY_REDASH_URL") {
            self.upstream.base_url = base_url;
        }

        if let Some(timeout) = env_var("GATEWAY_UPSTREAM_TIMEOUT_MS") {
            self.upstream.request_timeout_ms = timeout.parse()?;
        }

        if let Some(max_wait) = env_var("GATEWAY_MAX_WAIT") {
            self.dispatch.max_wait = max_wait.parse()?;
        }

        if let Some(interval) = env_var("GATEWAY_POLL_INTERVAL_MS") {
            self.dispatch.poll_interval_ms = interval.parse()?;
        }

        if let Some(layout) = env_var("GATEWAY_TIME_LAYOUT") {
            self.dispatch.time_layout = layout;
        }

        if let Some(allow) = env_var("GATEWAY_ALLOW_SPLIT_BUCKET") {
            self.dispatch.allow_split_bucket = allow;
        }

        if let Some(enable_prometheus) = env_var("GATEWAY_ENABLE_PROMETHEUS") {
            self.metrics.enable_prometheus = enable_prometheus.parse()?;
        }

        Ok(())
    }

    /// Load configuration from a YAML file, nested or legacy flat layout
    pub fn load_from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        Self::from_yaml(&contents).with_context(|| format!("Failed to parse config file: {}", path))
    }

    /// Parse YAML text, detecting the legacy flat layout
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(contents)?;

        let nested = ["server", "upstream", "dispatch", "metrics", "health"]
            .iter()
            .any(|key| value.get(*key).is_some());

        let config = if nested || value.is_null() {
            serde_yaml::from_value(value)?
        } else {
            let legacy: LegacyFileConfig = serde_yaml::from_value(value)?;
            legacy.into()
        };

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.bind_address.is_empty() {
            return Err(anyhow::anyhow!("Bind address cannot be empty"));
        }

        if self.upstream.base_url.is_empty() {
            return Err(anyhow::anyhow!("Upstream base URL cannot be empty"));
        }

        if self.dispatch.max_wait == 0 {
            return Err(anyhow::anyhow!("Max wait must be greater than 0"));
        }

        if self.dispatch.max_block <= 0 {
            return Err(anyhow::anyhow!("Max block must be greater than 0"));
        }

        if let Some(rule) = self
            .dispatch
            .agg_funcs
            .iter()
            .find(|rule| rule.threshold_seconds <= 0)
        {
            return Err(anyhow::anyhow!(
                "Aggregation rule '{}' needs a positive threshold",
                rule.name
            ));
        }

        Ok(())
    }

    /// Get the delay between job polls as a Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.dispatch.poll_interval_ms)
    }

    /// Get the upstream request timeout as a Duration
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream.request_timeout_ms)
    }

    /// Build the auto-parameter resolver from the configured rules
    pub fn resolver(&self) -> AutoParameterResolver {
        AutoParameterResolver::new(
            TimeLayout::new(&self.dispatch.time_layout),
            self.dispatch.time_buckets.clone(),
            self.dispatch.agg_funcs.clone(),
            self.dispatch.max_block,
        )
    }

    /// Build the partition split policy
    pub fn split_policy(&self) -> SplitPolicy {
        SplitPolicy::new(self.dispatch.allow_split_bucket.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_is_valid() {
        let config = GatewayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_nested_yaml() {
        let config = GatewayConfig::from_yaml(
            r#"
server:
  bind_address: "127.0.0.1:9000"
dispatch:
  max_wait: 30
  max_block: 200
  time_buckets:
    - { name: "t_raw", fromSeconds: 0, toSeconds: 3600 }
    - { name: "t_hour", fromSeconds: 3600, toSeconds: -1 }
  agg_funcs:
    - { name: "minute", thresholdSeconds: 60 }
  allow_split_bucket: "'events'"
"#,
        )
        .unwrap();

        assert_eq!(config.server.bind_address, "127.0.0.1:9000");
        assert_eq!(config.dispatch.max_wait, 30);
        assert_eq!(config.dispatch.time_buckets.len(), 2);
        assert_eq!(config.dispatch.agg_funcs[0].threshold_seconds, 60);
        // untouched sections keep their defaults
        assert_eq!(config.dispatch.poll_interval_ms, 1000);
        assert_eq!(config.metrics.metrics_path, "/metrics");
    }

    #[test]
    fn test_legacy_flat_yaml() {
        let config = GatewayConfig::from_yaml(
            r#"
port: 8090
bind: "0.0.0.0"
layout: "2006-01-02T15:04:05Z07:00"
redashurl: "http://redash.local"
maxBlock: 150
tableTimers:
  - { name: "agg_1m", from: 0, to: 86400 }
  - { name: "agg_1h", from: 86400, to: -1 }
AggFuncs:
  - { name: "minute", time: 60 }
  - { name: "hour", time: 3600 }
AllowSplitBucket: "'a','b'"
"#,
        )
        .unwrap();

        assert_eq!(config.server.bind_address, "0.0.0.0:8090");
        assert_eq!(config.upstream.base_url, "http://redash.local");
        assert_eq!(config.dispatch.max_wait, 100);
        assert_eq!(config.dispatch.max_block, 150);
        assert_eq!(config.dispatch.time_layout, "2006-01-02T15:04:05Z07:00");
        assert_eq!(config.dispatch.time_buckets[1].to_seconds, -1);
        assert_eq!(config.dispatch.agg_funcs[1].name, "hour");
        assert_eq!(config.dispatch.allow_split_bucket, "'a','b'");
    }

    #[test]
    fn test_validate_rejects_zero_threshold() {
        let mut config = GatewayConfig::default();
        config.dispatch.agg_funcs = vec![AggFuncRule::new("broken", 0)];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_wait() {
        let mut config = GatewayConfig::default();
        config.dispatch.max_wait = 0;
        assert!(config.validate().is_err());
    }

    fn env_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from(["redash-gateway", "--wait", "5", "--bind", "127.0.0.1:1234"]);
        let config = GatewayConfig::load_with_env(&cli, env_from(&[])).unwrap();
        assert_eq!(config.dispatch.max_wait, 5);
        assert_eq!(config.server.bind_address, "127.0.0.1:1234");
    }

    #[test]
    fn test_env_overrides_and_cli_wins() {
        let env = env_from(&[
            ("GATEWAY_REDASH_URL", "http://redash.internal"),
            ("GATEWAY_MAX_WAIT", "7"),
            ("GATEWAY_POLL_INTERVAL_MS", "250"),
            ("GATEWAY_ALLOW_SPLIT_BUCKET", "'events'"),
        ]);

        let config = GatewayConfig::load_with_env(&Cli::default(), &env).unwrap();
        assert_eq!(config.upstream.base_url, "http://redash.internal");
        assert_eq!(config.dispatch.max_wait, 7);
        assert_eq!(config.dispatch.poll_interval_ms, 250);
        assert_eq!(config.dispatch.allow_split_bucket, "'events'");

        let cli = Cli::parse_from(["redash-gateway", "--wait", "3"]);
        let config = GatewayConfig::load_with_env(&cli, &env).unwrap();
        assert_eq!(config.dispatch.max_wait, 3);
    }

    #[test]
    fn test_invalid_env_value_fails() {
        let env = env_from(&[("GATEWAY_MAX_WAIT", "soon")]);
        assert!(GatewayConfig::load_with_env(&Cli::default(), env).is_err());
    }

    #[test]
    fn test_legacy_bind_without_port() {
        let config = GatewayConfig::from_yaml("bind: \"127.0.0.1\"\n").unwrap();
        assert_eq!(config.server.bind_address, "127.0.0.1:0");

        let config = GatewayConfig::from_yaml("port: 9000\n").unwrap();
        assert_eq!(config.server.bind_address, "0.0.0.0:8080");
    }
}
