use clap::Parser;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub ucloud: UcloudConfig,
    pub scrape: ScrapeSettings,
    pub registry: RegistryConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub metrics_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 9200,
            metrics_path: "/metrics".into(),
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct UcloudConfig {
    pub public_key: String,
    pub private_key: String,
    pub project_id: String,
    pub base_url: String,
    pub area_code: String,
    pub request_timeout_secs: u64,
}

impl Default for UcloudConfig {
    fn default() -> Self {
        Self {
            public_key: String::new(),
            private_key: String::new(),
            project_id: String::new(),
            base_url: "https://api.ucloud.cn".into(),
            area_code: "cn".into(),
            request_timeout_secs: 10,
        }
    }
}

// Keeps the private key out of logs.
impl std::fmt::Debug for UcloudConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UcloudConfig")
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .field("project_id", &self.project_id)
            .field("base_url", &self.base_url)
            .field("area_code", &self.area_code)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScrapeSettings {
    /// Window length (seconds).
    pub range_time: u64,
    /// Offset from now to the window end (seconds). Recent points are incomplete upstream.
    pub delay_time: u64,
    /// Domain list refresh period (seconds).
    pub ticker_time: u64,
    pub scrape_timeout_secs: u64,
    pub max_concurrency: usize,
    /// Optional metric name prefix (`<namespace>_cdn_hit_rate`).
    pub namespace: String,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            range_time: 3000,
            delay_time: 60,
            ticker_time: 10,
            scrape_timeout_secs: 20,
            max_concurrency: 8,
            namespace: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub bootstrap_attempts: u32,
    pub bootstrap_retry_secs: u64,
    pub page_size: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            bootstrap_attempts: 5,
            bootstrap_retry_secs: 3,
            page_size: 100,
        }
    }
}

/// Command-line flags; each one set overrides the config file.
#[derive(Debug, Default, Parser)]
#[command(name = "ucdn-exporter", version, about = "Prometheus exporter for UCloud CDN statistics")]
pub struct Cli {
    /// Optional TOML config file.
    #[arg(long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// UCloud API public key.
    #[arg(long = "pubkey", env = "UCLOUD_PUB_KEY")]
    pub public_key: Option<String>,

    /// UCloud API private key.
    #[arg(long = "privatekey", env = "UCLOUD_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,

    /// Project the CDN domains belong to.
    #[arg(long = "project-id", env = "UCLOUD_PROJECT_ID")]
    pub project_id: Option<String>,

    /// Listen address.
    #[arg(long)]
    pub host: Option<String>,

    /// Listen port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Path the metrics are served on.
    #[arg(long)]
    pub metrics_path: Option<String>,

    /// Window length in seconds.
    #[arg(long = "range-time")]
    pub range_time: Option<u64>,

    /// Offset from now to the window end, in seconds.
    #[arg(long = "delay-time")]
    pub delay_time: Option<u64>,

    /// Domain list refresh period in seconds.
    #[arg(long = "ticker-time")]
    pub ticker_time: Option<u64>,

    /// Statistics area code.
    #[arg(long = "area-code")]
    pub area_code: Option<String>,
}

impl AppConfig {
    /// Loads the file named by `--config` / `CONFIG_FILE` (defaults if unset),
    /// applies the command-line overrides, then validates.
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let mut config = match &cli.config {
            Some(path) => {
                let s = std::fs::read_to_string(path)
                    .map_err(|e| anyhow::anyhow!("reading config file {}: {}", path, e))?;
                toml::from_str(&s)?
            }
            None => AppConfig::default(),
        };
        config.apply_cli(cli);
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_cli(&mut self, cli: &Cli) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(v) = value {
                *target = v.clone();
            }
        }
        set(&mut self.ucloud.public_key, &cli.public_key);
        set(&mut self.ucloud.private_key, &cli.private_key);
        set(&mut self.ucloud.project_id, &cli.project_id);
        set(&mut self.ucloud.area_code, &cli.area_code);
        set(&mut self.server.host, &cli.host);
        set(&mut self.server.port, &cli.port);
        set(&mut self.server.metrics_path, &cli.metrics_path);
        set(&mut self.scrape.range_time, &cli.range_time);
        set(&mut self.scrape.delay_time, &cli.delay_time);
        set(&mut self.scrape.ticker_time, &cli.ticker_time);
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            self.server.metrics_path.starts_with('/')
                && !matches!(self.server.metrics_path.as_str(), "/" | "/version"),
            "server.metrics_path must start with '/' and not be '/' or '/version', got {:?}",
            self.server.metrics_path
        );
        anyhow::ensure!(
            !self.ucloud.public_key.is_empty(),
            "ucloud.public_key must be set (--pubkey or UCLOUD_PUB_KEY)"
        );
        anyhow::ensure!(
            !self.ucloud.private_key.is_empty(),
            "ucloud.private_key must be set (--privatekey or UCLOUD_PRIVATE_KEY)"
        );
        anyhow::ensure!(
            !self.ucloud.base_url.is_empty(),
            "ucloud.base_url must be non-empty"
        );
        anyhow::ensure!(
            self.ucloud.request_timeout_secs > 0,
            "ucloud.request_timeout_secs must be > 0, got {}",
            self.ucloud.request_timeout_secs
        );
        anyhow::ensure!(
            self.scrape.range_time > self.scrape.delay_time,
            "scrape.delay_time ({}) must be less than scrape.range_time ({})",
            self.scrape.delay_time,
            self.scrape.range_time
        );
        anyhow::ensure!(
            self.scrape.ticker_time > 0,
            "scrape.ticker_time must be > 0, got {}",
            self.scrape.ticker_time
        );
        anyhow::ensure!(
            self.scrape.scrape_timeout_secs > 0,
            "scrape.scrape_timeout_secs must be > 0, got {}",
            self.scrape.scrape_timeout_secs
        );
        anyhow::ensure!(
            self.scrape.max_concurrency > 0,
            "scrape.max_concurrency must be > 0, got {}",
            self.scrape.max_concurrency
        );
        anyhow::ensure!(
            self.registry.bootstrap_attempts > 0,
            "registry.bootstrap_attempts must be > 0, got {}",
            self.registry.bootstrap_attempts
        );
        anyhow::ensure!(
            self.registry.page_size > 0,
            "registry.page_size must be > 0, got {}",
            self.registry.page_size
        );
        Ok(())
    }
}
