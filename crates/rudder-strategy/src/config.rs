//! Supervisor configuration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Settings for `SignalSupervisor`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Symbols whose prices are refreshed from the price source.
    #[serde(default)]
    pub symbols: Vec<String>,
    /// USD notional used to size each signal.
    #[serde(default = "default_quote_notional_usd")]
    pub quote_notional_usd: Decimal,
    /// Prices kept per symbol.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

fn default_quote_notional_usd() -> Decimal {
    Decimal::from(50)
}

fn default_history_capacity() -> usize {
    200
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            quote_notional_usd: default_quote_notional_usd(),
            history_capacity: default_history_capacity(),
        }
    }
}

impl SupervisorConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.quote_notional_usd <= Decimal::ZERO {
            return Err(format!(
                "quote_notional_usd ({}) must be positive",
                self.quote_notional_usd
            ));
        }
        if self.history_capacity == 0 {
            return Err("history_capacity must be at least 1".to_string());
        }
        if let Some(empty) = self.symbols.iter().position(|s| s.trim().is_empty()) {
            return Err(format!("symbols[{empty}] is empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_is_valid() {
        let config = SupervisorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.quote_notional_usd, dec!(50));
    }

    #[test]
    fn test_validation_errors() {
        let config = SupervisorConfig {
            quote_notional_usd: Decimal::ZERO,
            ..SupervisorConfig::default()
        };
        assert!(config.validate().is_err());

        let config = SupervisorConfig {
            symbols: vec!["BTCUSDT".into(), " ".into()],
            ..SupervisorConfig::default()
        };
        assert!(config.validate().unwrap_err().contains("symbols[1]"));
    }
}
