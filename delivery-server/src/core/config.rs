use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::auth::JwtConfig;
use crate::core::ServerError;
use crate::delivery::{DistanceBased, EarningsKind, EarningsPolicy, FeeShare, FlatRate};
use crate::payments::MismatchPolicy;

/// Server configuration
///
/// # Environment
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | WORK_DIR | ./data | Database and log directory |
/// | HTTP_PORT | 8080 | HTTP port |
/// | ENVIRONMENT | development | development / staging / production |
/// | JWT_SECRET | random (dev) | HS256 verification secret |
/// | PUBLIC_BASE_URL | http://localhost:8080 | Base of the gateway callback URL |
/// | FREEMOPAY_BASE_URL | https://api-v2.freemopay.com | Gateway base URL |
/// | FREEMOPAY_APP_KEY / FREEMOPAY_SECRET_KEY | empty | Gateway credentials |
/// | GATEWAY_TIMEOUT_MS | 30000 | Bound on every gateway call |
/// | NOTIFY_TIMEOUT_MS | 5000 | Bound on every notification |
/// | REFERENCE_MISMATCH_POLICY | warn | warn / reject |
/// | EARNINGS_POLICY | fee_share | flat / distance / fee_share |
/// | EARNINGS_FLAT_AMOUNT | 500 | flat |
/// | EARNINGS_BASE_AMOUNT / EARNINGS_PER_KM | 300 / 100 | distance |
/// | EARNINGS_FEE_SHARE_PERCENT | 80 | fee_share |
/// | EXPO_PUSH_URL | https://exp.host/--/api/v2/push/send | Push endpoint |
/// | PUSH_ENABLED | true | Send pushes (inbox rows are always stored) |
/// | CATALOG_FILE | unset | JSON catalog imported at startup |
/// | LOG_LEVEL / LOG_JSON | info / false | Logging |
///
/// ```ignore
/// WORK_DIR=/srv/delivery HTTP_PORT=9000 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub work_dir: String,
    pub http_port: u16,
    /// development | staging | production
    pub environment: String,
    pub jwt: JwtConfig,

    pub public_base_url: String,
    pub freemopay_base_url: String,
    pub freemopay_app_key: String,
    pub freemopay_secret_key: String,
    pub gateway_timeout_ms: u64,
    pub reference_mismatch_policy: MismatchPolicy,

    pub notify_timeout_ms: u64,
    pub expo_push_url: String,
    pub push_enabled: bool,

    pub earnings_policy: EarningsKind,
    pub earnings_flat_amount: Decimal,
    pub earnings_base_amount: Decimal,
    pub earnings_per_km: Decimal,
    pub earnings_fee_share_percent: Decimal,

    pub catalog_file: Option<String>,
    pub log_level: String,
    pub log_json: bool,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

impl Config {
    /// Load from the environment, falling back to defaults
    ///
    /// Fails only on a JWT secret that is set but too short, or on an
    /// unknown policy name.
    pub fn from_env() -> Result<Self, ServerError> {
        let reference_mismatch_policy = match std::env::var("REFERENCE_MISMATCH_POLICY") {
            Ok(v) => v.parse().map_err(ServerError::Config)?,
            Err(_) => MismatchPolicy::default(),
        };
        let earnings_policy = match std::env::var("EARNINGS_POLICY") {
            Ok(v) => v.parse().map_err(ServerError::Config)?,
            Err(_) => EarningsKind::default(),
        };

        Ok(Self {
            work_dir: env_string("WORK_DIR", "./data"),
            http_port: env_or("HTTP_PORT", 8080),
            environment: env_string("ENVIRONMENT", "development"),
            jwt: JwtConfig::from_env()?,

            public_base_url: env_string("PUBLIC_BASE_URL", "http://localhost:8080"),
            freemopay_base_url: env_string("FREEMOPAY_BASE_URL", "https://api-v2.freemopay.com"),
            freemopay_app_key: env_string("FREEMOPAY_APP_KEY", ""),
            freemopay_secret_key: env_string("FREEMOPAY_SECRET_KEY", ""),
            gateway_timeout_ms: env_or("GATEWAY_TIMEOUT_MS", 30_000),
            reference_mismatch_policy,

            notify_timeout_ms: env_or("NOTIFY_TIMEOUT_MS", 5_000),
            expo_push_url: env_string("EXPO_PUSH_URL", "https://exp.host/--/api/v2/push/send"),
            push_enabled: env_or("PUSH_ENABLED", true),

            earnings_policy,
            earnings_flat_amount: env_or("EARNINGS_FLAT_AMOUNT", Decimal::from(500)),
            earnings_base_amount: env_or("EARNINGS_BASE_AMOUNT", Decimal::from(300)),
            earnings_per_km: env_or("EARNINGS_PER_KM", Decimal::from(100)),
            earnings_fee_share_percent: env_or("EARNINGS_FEE_SHARE_PERCENT", Decimal::from(80)),

            catalog_file: std::env::var("CATALOG_FILE").ok().filter(|s| !s.is_empty()),
            log_level: env_string("LOG_LEVEL", "info"),
            log_json: env_or("LOG_JSON", false),
        })
    }

    /// Defaults for tests and embedding, with a fixed JWT secret
    pub fn with_defaults(work_dir: impl Into<String>, jwt: JwtConfig) -> Self {
        Self {
            work_dir: work_dir.into(),
            http_port: 8080,
            environment: "development".into(),
            jwt,
            public_base_url: "http://localhost:8080".into(),
            freemopay_base_url: "https://api-v2.freemopay.com".into(),
            freemopay_app_key: String::new(),
            freemopay_secret_key: String::new(),
            gateway_timeout_ms: 30_000,
            reference_mismatch_policy: MismatchPolicy::default(),
            notify_timeout_ms: 5_000,
            expo_push_url: "https://exp.host/--/api/v2/push/send".into(),
            push_enabled: false,
            earnings_policy: EarningsKind::default(),
            earnings_flat_amount: Decimal::from(500),
            earnings_base_amount: Decimal::from(300),
            earnings_per_km: Decimal::from(100),
            earnings_fee_share_percent: Decimal::from(80),
            catalog_file: None,
            log_level: "info".into(),
            log_json: false,
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("delivery.redb")
    }

    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("logs")
    }

    /// URL the gateway posts payment callbacks to
    pub fn callback_url(&self) -> String {
        format!(
            "{}/api/webhooks/freemopay",
            self.public_base_url.trim_end_matches('/')
        )
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_millis(self.gateway_timeout_ms)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_millis(self.notify_timeout_ms)
    }

    /// Driver earnings policy selected by `EARNINGS_POLICY`
    pub fn earnings(&self) -> Arc<dyn EarningsPolicy> {
        match self.earnings_policy {
            EarningsKind::Flat => Arc::new(FlatRate {
                amount: self.earnings_flat_amount,
            }),
            EarningsKind::Distance => Arc::new(DistanceBased {
                base: self.earnings_base_amount,
                per_km: self.earnings_per_km,
            }),
            EarningsKind::FeeShare => Arc::new(FeeShare {
                percent: self.earnings_fee_share_percent,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::with_defaults("/tmp/delivery", JwtConfig::with_secret("x".repeat(32)))
    }

    #[test]
    fn callback_url_strips_trailing_slash() {
        let mut config = config();
        config.public_base_url = "https://api.example.cm/".into();
        assert_eq!(
            config.callback_url(),
            "https://api.example.cm/api/webhooks/freemopay"
        );
    }

    #[test]
    fn paths_live_under_work_dir() {
        let config = config();
        assert_eq!(config.database_path(), PathBuf::from("/tmp/delivery/delivery.redb"));
        assert_eq!(config.log_dir(), PathBuf::from("/tmp/delivery/logs"));
    }

    #[test]
    fn earnings_policy_selection() {
        let mut config = config();
        config.earnings_policy = EarningsKind::Flat;
        assert!(format!("{:?}", config.earnings()).contains("FlatRate"));
        config.earnings_policy = EarningsKind::Distance;
        assert!(format!("{:?}", config.earnings()).contains("DistanceBased"));
    }
}
