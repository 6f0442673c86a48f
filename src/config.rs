use crate::domain::{Decimal, ExchangeRates};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    /// Staleness tolerance for prices and snapshots used in IL/HODL math.
    pub max_price_age_secs: i64,
    /// Annualized ROI over fewer held days than this is flagged low-confidence.
    pub low_confidence_days: i64,
    pub exchange_rates: ExchangeRates,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let max_price_age_secs = env_map
            .get("MAX_PRICE_AGE_SECS")
            .map(|s| s.as_str())
            .unwrap_or("3600")
            .parse::<i64>()
            .ok()
            .filter(|v| *v > 0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "MAX_PRICE_AGE_SECS".to_string(),
                    "must be a positive integer".to_string(),
                )
            })?;

        let low_confidence_days = env_map
            .get("LOW_CONFIDENCE_DAYS")
            .map(|s| s.as_str())
            .unwrap_or("7")
            .parse::<i64>()
            .ok()
            .filter(|v| *v >= 1)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "LOW_CONFIDENCE_DAYS".to_string(),
                    "must be an integer >= 1".to_string(),
                )
            })?;

        let exchange_rates = parse_exchange_rates_from_map(&env_map)?;

        Ok(Config {
            port,
            database_path,
            max_price_age_secs,
            low_confidence_days,
            exchange_rates,
        })
    }
}

/// Parse `EXCHANGE_RATES` as `CODE=rate` pairs separated by commas.
fn parse_exchange_rates_from_map(
    env_map: &HashMap<String, String>,
) -> Result<ExchangeRates, ConfigError> {
    let Some(raw) = env_map.get("EXCHANGE_RATES") else {
        return Ok(ExchangeRates::default());
    };

    let mut rates = HashMap::new();
    for pair in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (code, rate) = pair.split_once('=').ok_or_else(|| {
            ConfigError::InvalidValue(
                "EXCHANGE_RATES".to_string(),
                format!("expected CODE=rate, got {}", pair),
            )
        })?;
        let rate = Decimal::from_str_canonical(rate)
            .ok()
            .filter(|r| r.is_positive())
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "EXCHANGE_RATES".to_string(),
                    format!("rate for {} must be a positive decimal", code.trim()),
                )
            })?;
        rates.insert(code.trim().to_string(), rate);
    }

    Ok(ExchangeRates::new(rates))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("DATABASE_PATH".to_string(), "/tmp/test.db".to_string());
        map
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_price_age_secs, 3600);
        assert_eq!(config.low_confidence_days, 7);
        assert!(config.exchange_rates.is_empty());
    }

    #[test]
    fn test_missing_database_path() {
        let mut env_map = setup_required_env();
        env_map.remove("DATABASE_PATH");
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "DATABASE_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_invalid_port() {
        let mut env_map = setup_required_env();
        env_map.insert("PORT".to_string(), "not_a_number".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PORT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_non_positive_price_age_rejected() {
        let mut env_map = setup_required_env();
        env_map.insert("MAX_PRICE_AGE_SECS".to_string(), "0".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "MAX_PRICE_AGE_SECS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_low_confidence_days() {
        let mut env_map = setup_required_env();
        env_map.insert("LOW_CONFIDENCE_DAYS".to_string(), "zero".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "LOW_CONFIDENCE_DAYS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_exchange_rates_parsed() {
        let mut env_map = setup_required_env();
        env_map.insert("EXCHANGE_RATES".to_string(), "EUR=1.25, gbp=1.5".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(
            config.exchange_rates.rate("GBP"),
            Some(Decimal::from_str_canonical("1.5").unwrap())
        );
    }

    #[test]
    fn test_malformed_exchange_rates_rejected() {
        let mut env_map = setup_required_env();
        env_map.insert("EXCHANGE_RATES".to_string(), "EUR:1.25".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "EXCHANGE_RATES"),
            _ => panic!("Expected InvalidValue error"),
        }
    }
}
