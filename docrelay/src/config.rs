//! Application configuration management.
//!
//! Configuration is loaded from an optional YAML file with environment variable overrides. The
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `DOCRELAY_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`, may be absent)
//! 2. **Environment variables** - Variables prefixed with `DOCRELAY_` override YAML values
//! 3. **Deployment variables** - The plain `AWS_*` and `MODAL_*` variables used by existing
//!    deployments (see [`ENV_ALIASES`])
//!
//! For nested values, use double underscores: `DOCRELAY_STORAGE__BUCKET=my-bucket` sets
//! `storage.bucket`.
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! DOCRELAY_PORT=8080
//! AWS_S3_BUCKET_NAME=my-documents
//! AWS_S3_REGION=eu-west-2
//! MODAL_UPLOAD_URL=https://example--rag-upload.modal.run
//! MODAL_CHAT_URL=https://example--rag-chat.modal.run
//! MODAL_API_TOKEN=secret
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Plain environment variables mapped onto configuration keys.
pub const ENV_ALIASES: &[(&str, &str)] = &[
    ("AWS_S3_BUCKET_NAME", "storage.bucket"),
    ("AWS_S3_REGION", "storage.region"),
    ("AWS_ACCESS_KEY_ID", "storage.access_key_id"),
    ("AWS_SECRET_ACCESS_KEY", "storage.secret_access_key"),
    ("MODAL_UPLOAD_URL", "upstream.ingestion_url"),
    ("MODAL_CHAT_URL", "upstream.chat_url"),
    ("MODAL_API_TOKEN", "upstream.api_token"),
];

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "DOCRELAY_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Bucket that receives uploaded documents
    pub storage: StorageConfig,
    /// The remote document question-answering service
    pub upstream: UpstreamConfig,
    /// CORS configuration for browser clients
    pub cors: CorsConfig,
    /// Enable Prometheus metrics endpoint at `/internal/metrics`
    pub enable_metrics: bool,
    /// Enable OpenTelemetry OTLP export for distributed tracing
    pub enable_otel_export: bool,
    /// Console log output format
    pub log_format: LogFormat,
}

/// Object storage settings.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    /// Static credentials. When absent the default AWS provider chain is used.
    pub access_key_id: Option<String>,
    #[serde(skip_serializing)]
    pub secret_access_key: Option<String>,
    /// Endpoint override for S3-compatible stores
    pub endpoint: Option<Url>,
    /// Base URL under which objects are publicly readable. Defaults to the virtual-hosted
    /// AWS form `https://{bucket}.s3.{region}.amazonaws.com/`.
    pub public_base_url: Option<Url>,
}

/// Endpoints and credentials of the document service.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Receives `{"document_url": ...}` and answers with a `session_id`
    pub ingestion_url: Option<Url>,
    /// Receives `{"session_id": ..., "questions": [...]}`
    pub chat_url: Option<Url>,
    /// Bearer token sent on every outbound call
    #[serde(skip_serializing)]
    pub api_token: Option<String>,
}

/// CORS (Cross-Origin Resource Sharing) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins for CORS requests
    pub allowed_origins: Vec<CorsOrigin>,
    /// Allow credentials (cookies) in CORS requests
    pub allow_credentials: bool,
    /// Cache preflight requests for this many seconds
    pub max_age: Option<u64>,
}

/// CORS origin specification.
///
/// Can be either a wildcard (`*`) to allow all origins, or a specific URL.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// Allow all origins (`*`)
    #[serde(deserialize_with = "parse_wildcard")]
    Wildcard,
    /// Specific origin URL (e.g., `https://app.example.com`)
    Url(Url),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

fn redacted(secret: &Option<String>) -> Option<&'static str> {
    secret.as_ref().map(|_| "<redacted>")
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &redacted(&self.secret_access_key))
            .field("endpoint", &self.endpoint)
            .field("public_base_url", &self.public_base_url)
            .finish()
    }
}

impl fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("ingestion_url", &self.ingestion_url)
            .field("chat_url", &self.chat_url)
            .field("api_token", &redacted(&self.api_token))
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            storage: StorageConfig::default(),
            upstream: UpstreamConfig::default(),
            cors: CorsConfig::default(),
            enable_metrics: false,
            enable_otel_export: false,
            log_format: LogFormat::default(),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![CorsOrigin::Wildcard],
            allow_credentials: true,
            max_age: None,
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Check that everything needed to serve a request is present.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.storage.bucket.trim().is_empty() {
            anyhow::bail!("Config validation: storage.bucket is not set (AWS_S3_BUCKET_NAME or DOCRELAY_STORAGE__BUCKET)");
        }
        if self.storage.region.trim().is_empty() {
            anyhow::bail!("Config validation: storage.region is not set (AWS_S3_REGION or DOCRELAY_STORAGE__REGION)");
        }
        if self.storage.access_key_id.is_some() != self.storage.secret_access_key.is_some() {
            anyhow::bail!("Config validation: storage.access_key_id and storage.secret_access_key must be set together");
        }
        if self.upstream.ingestion_url.is_none() {
            anyhow::bail!("Config validation: upstream.ingestion_url is not set (MODAL_UPLOAD_URL or DOCRELAY_UPSTREAM__INGESTION_URL)");
        }
        if self.upstream.chat_url.is_none() {
            anyhow::bail!("Config validation: upstream.chat_url is not set (MODAL_CHAT_URL or DOCRELAY_UPSTREAM__CHAT_URL)");
        }
        if self.upstream.api_token.as_deref().is_none_or(|t| t.trim().is_empty()) {
            anyhow::bail!("Config validation: upstream.api_token is not set (MODAL_API_TOKEN or DOCRELAY_UPSTREAM__API_TOKEN)");
        }
        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        let mut figment = Figment::new()
            .merge(Yaml::file(&args.config))
            // DOCRELAY_CONFIG names the file itself and is not a setting
            .merge(Env::prefixed("DOCRELAY_").ignore(&["config"]).split("__"));

        for &(var, key) in ENV_ALIASES {
            figment = figment.merge(Env::raw().only(&[var]).map(move |_| key.into()));
        }

        figment
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
