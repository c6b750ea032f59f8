use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub telegram_token: String,
    #[serde(default)]
    pub database_url: String,
    pub db_max_connections: u32,
    #[serde(default)]
    pub stripe_secret_key: String,
    #[serde(default)]
    pub stripe_webhook_secret: String,
    #[serde(default)]
    pub stripe_price_id: String,
    /// Amount in minor units, recorded on each payment row.
    pub price_amount: i64,
    pub price_currency: String,
    #[serde(default)]
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_base_url: String,
    pub server_port: u16,
    pub plan_timeout_secs: u64,
    pub shutdown_grace_ms: u64,
    pub webhook_tolerance_secs: i64,
    pub log_file: String,
}

impl AppConfig {
    /// Reads `dietbot.toml` (optional) and then the environment, which wins.
    pub fn load() -> Result<Self> {
        let builder = Self::defaults(Config::builder())?
            .add_source(File::with_name("dietbot").required(false))
            .add_source(Environment::default().try_parsing(true));
        let config = builder.build().context("Failed to read configuration")?;
        Self::from_config(config)
    }

    fn defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        Ok(builder
            .set_default("db_max_connections", 20)?
            .set_default("price_amount", 100_000)?
            .set_default("price_currency", "rub")?
            .set_default("openai_model", "gpt-4")?
            .set_default("openai_base_url", "https://api.openai.com/v1")?
            .set_default("server_port", 8080)?
            .set_default("plan_timeout_secs", 60)?
            .set_default("shutdown_grace_ms", 500)?
            .set_default("webhook_tolerance_secs", 300)?
            .set_default("log_file", "dietbot.log")?)
    }

    pub fn from_config(config: Config) -> Result<Self> {
        let cfg: AppConfig = config
            .try_deserialize()
            .context("Invalid configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        let required = [
            ("TELEGRAM_TOKEN", &self.telegram_token),
            ("DATABASE_URL", &self.database_url),
            ("STRIPE_SECRET_KEY", &self.stripe_secret_key),
            ("STRIPE_WEBHOOK_SECRET", &self.stripe_webhook_secret),
            ("STRIPE_PRICE_ID", &self.stripe_price_id),
            ("OPENAI_API_KEY", &self.openai_api_key),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();

        if !missing.is_empty() {
            return Err(anyhow::anyhow!(
                "Missing required configuration: {}",
                missing.join(", ")
            ));
        }
        dietbot_db::db::validate_database_url(&self.database_url)?;
        Ok(())
    }

    pub fn plan_timeout(&self) -> Duration {
        Duration::from_secs(self.plan_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Human readable price, e.g. `1000.00 RUB`.
    pub fn price_display(&self) -> String {
        format!(
            "{}.{:02} {}",
            self.price_amount / 100,
            self.price_amount % 100,
            self.price_currency.to_uppercase()
        )
    }
}

#[cfg(test)]
impl AppConfig {
    pub fn for_tests() -> Self {
        Self {
            telegram_token: "123:abc".into(),
            database_url: "postgres://localhost/dietbot".into(),
            db_max_connections: 5,
            stripe_secret_key: "sk_test".into(),
            stripe_webhook_secret: "whsec_test".into(),
            stripe_price_id: "price_123".into(),
            price_amount: 100_000,
            price_currency: "rub".into(),
            openai_api_key: "sk-openai".into(),
            openai_model: "gpt-4".into(),
            openai_base_url: "https://api.openai.com/v1".into(),
            server_port: 8080,
            plan_timeout_secs: 60,
            shutdown_grace_ms: 500,
            webhook_tolerance_secs: 300,
            log_file: "dietbot.log".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_required() -> config::ConfigBuilder<config::builder::DefaultState> {
        AppConfig::defaults(Config::builder())
            .unwrap()
            .set_override("telegram_token", "123:abc")
            .unwrap()
            .set_override("database_url", "postgres://localhost/dietbot")
            .unwrap()
            .set_override("stripe_secret_key", "sk_test")
            .unwrap()
            .set_override("stripe_webhook_secret", "whsec_test")
            .unwrap()
            .set_override("stripe_price_id", "price_123")
            .unwrap()
            .set_override("openai_api_key", "sk-openai")
            .unwrap()
    }

    #[test]
    fn defaults_fill_optional_keys() {
        let cfg = AppConfig::from_config(with_required().build().unwrap()).unwrap();
        assert_eq!(cfg.server_port, 8080);
        assert_eq!(cfg.openai_model, "gpt-4");
        assert_eq!(cfg.plan_timeout(), Duration::from_secs(60));
        assert_eq!(cfg.shutdown_grace(), Duration::from_millis(500));
        assert_eq!(cfg.price_display(), "1000.00 RUB");
    }

    #[test]
    fn missing_secrets_are_reported_together() {
        let config = AppConfig::defaults(Config::builder())
            .unwrap()
            .set_override("telegram_token", "123:abc")
            .unwrap()
            .build()
            .unwrap();
        let err = AppConfig::from_config(config).unwrap_err().to_string();
        assert!(err.contains("DATABASE_URL"));
        assert!(err.contains("STRIPE_WEBHOOK_SECRET"));
        assert!(err.contains("OPENAI_API_KEY"));
        assert!(!err.contains("TELEGRAM_TOKEN"));
    }

    #[test]
    fn rejects_non_postgres_database_url() {
        let config = with_required()
            .set_override("database_url", "sqlite://diet.db")
            .unwrap()
            .build()
            .unwrap();
        assert!(AppConfig::from_config(config).is_err());
    }

    #[test]
    fn overrides_replace_defaults() {
        let config = with_required()
            .set_override("server_port", 9090)
            .unwrap()
            .set_override("price_amount", 4999)
            .unwrap()
            .set_override("price_currency", "usd")
            .unwrap()
            .build()
            .unwrap();
        let cfg = AppConfig::from_config(config).unwrap();
        assert_eq!(cfg.server_port, 9090);
        assert_eq!(cfg.price_display(), "49.99 USD");
    }
}
