use std::env;
use std::fmt;

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

/// Read an optional string variable, treating blank values as unset.
fn env_opt(var: &str) -> Option<String> {
    env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 4 * 1024 * 1024;
pub const MIN_MOCK_DELAY_MS: u64 = 500;
pub const MAX_MOCK_DELAY_MS: u64 = 800;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub gateway: GatewayConfig,
    /// Backend for the text-lines route.
    pub ocr: ProviderConfig,
    /// Backend for the structured-fields route.
    pub vision: ProviderConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub max_upload_bytes: usize,
    pub mock_delay_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            mock_delay_ms: 600,
        }
    }
}

/// Connection settings for one provider family.
///
/// Fields are kept raw: nothing here is validated at load time. The provider
/// selector checks the fields a family needs right before building an adapter.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Provider family identifier, e.g. `azure-vision`, `azure-openai`, `openai`.
    pub provider: String,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    /// Model name or deployment identifier.
    pub model: Option<String>,
    pub api_version: Option<String>,
    pub timeout_secs: u64,
    /// Env var prefix used in error messages (`OCR`, `VISION`).
    pub env_prefix: &'static str,
}

impl ProviderConfig {
    fn from_env(
        prefix: &'static str,
        default_provider: &str,
        default_version: &str,
        default_timeout: u64,
    ) -> Self {
        Self {
            provider: env_opt(&format!("{prefix}_PROVIDER"))
                .unwrap_or_else(|| default_provider.to_string()),
            endpoint: env_opt(&format!("{prefix}_ENDPOINT")),
            api_key: env_opt(&format!("{prefix}_API_KEY")),
            model: env_opt(&format!("{prefix}_MODEL")),
            api_version: env_opt(&format!("{prefix}_API_VERSION"))
                .or_else(|| Some(default_version.to_string())),
            timeout_secs: parse_env_or(&format!("{prefix}_TIMEOUT"), default_timeout),
            env_prefix: prefix,
        }
    }

    /// Name of the environment variable backing `field`, for error messages.
    pub fn env_name(&self, field: &str) -> String {
        format!("{}_{}", self.env_prefix, field)
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("model", &self.model)
            .field("api_version", &self.api_version)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let requested_delay =
            parse_env_or("MOCK_DELAY_MS", GatewayConfig::default().mock_delay_ms);
        let mock_delay_ms = requested_delay.clamp(MIN_MOCK_DELAY_MS, MAX_MOCK_DELAY_MS);
        if mock_delay_ms != requested_delay {
            tracing::warn!(
                "MOCK_DELAY_MS={} is outside {}..={}, using {}",
                requested_delay,
                MIN_MOCK_DELAY_MS,
                MAX_MOCK_DELAY_MS,
                mock_delay_ms
            );
        }

        Self {
            server: ServerConfig {
                host: env::var("GLIMPSE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_env_or("GLIMPSE_PORT", 3000),
            },
            gateway: GatewayConfig {
                max_upload_bytes: parse_env_or("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES),
                mock_delay_ms,
            },
            ocr: ProviderConfig::from_env("OCR", "azure-vision", "2023-10-01", 30),
            vision: ProviderConfig::from_env("VISION", "azure-openai", "2024-02-15-preview", 60),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }
}
