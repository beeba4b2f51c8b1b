//! Bar invariant checks.
//!
//! Hard rules (the bar is rejected):
//! - prices and volume are non-negative
//! - high >= low
//! - open and close lie within [low, high]
//!
//! Soft rules (logged, bar accepted):
//! - zero volume
//! - prices above a sanity ceiling

use log::warn;
use rust_decimal::Decimal;

use super::model::Bar;
use crate::errors::IntegrityError;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationSeverity {
    /// Reject the bar.
    Hard,
    /// Accept the bar, log a warning.
    Soft,
}

#[derive(Clone, Debug)]
struct ValidationIssue {
    severity: ValidationSeverity,
    message: String,
}

#[derive(Clone, Debug)]
pub struct ValidatorConfig {
    /// Soft ceiling for prices.
    pub max_price: Option<Decimal>,
    pub warn_on_zero_volume: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_price: Some(Decimal::from(1_000_000i64)),
            warn_on_zero_volume: true,
        }
    }
}

/// Checks bars against the OHLC invariants before they reach storage.
#[derive(Clone, Debug, Default)]
pub struct BarValidator {
    config: ValidatorConfig,
}

impl BarValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Validate one bar. Soft issues are logged; hard issues are returned.
    pub fn validate(&self, bar: &Bar) -> Result<(), IntegrityError> {
        let issues = self.collect_issues(bar);

        let hard: Vec<&str> = issues
            .iter()
            .filter(|i| i.severity == ValidationSeverity::Hard)
            .map(|i| i.message.as_str())
            .collect();

        if !hard.is_empty() {
            return Err(IntegrityError::InvalidBar {
                symbol: bar.symbol.clone(),
                date: bar.date,
                reason: hard.join("; "),
            });
        }

        for issue in issues.iter().filter(|i| i.severity == ValidationSeverity::Soft) {
            warn!("Bar warning for {} {}: {}", bar.symbol, bar.date, issue.message);
        }

        Ok(())
    }

    /// Whether the bar passes the hard rules. Does not log.
    pub fn is_valid(&self, bar: &Bar) -> bool {
        self.collect_issues(bar)
            .iter()
            .all(|i| i.severity != ValidationSeverity::Hard)
    }

    /// Split a batch into valid bars and rejected bars with their reasons.
    pub fn validate_batch(&self, bars: Vec<Bar>) -> (Vec<Bar>, Vec<(Bar, IntegrityError)>) {
        let mut valid = Vec::with_capacity(bars.len());
        let mut invalid = Vec::new();

        for bar in bars {
            match self.validate(&bar) {
                Ok(()) => valid.push(bar),
                Err(e) => invalid.push((bar, e)),
            }
        }

        (valid, invalid)
    }

    fn collect_issues(&self, bar: &Bar) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let hard = |message: String| ValidationIssue {
            severity: ValidationSeverity::Hard,
            message,
        };

        for (label, value) in [
            ("open", bar.open),
            ("high", bar.high),
            ("low", bar.low),
            ("close", bar.close),
        ] {
            if value < Decimal::ZERO {
                issues.push(hard(format!("Negative {} price: {}", label, value)));
            }
        }

        if bar.volume < 0 {
            issues.push(hard(format!("Negative volume: {}", bar.volume)));
        }

        if bar.high < bar.low {
            issues.push(hard(format!(
                "High ({}) is less than Low ({})",
                bar.high, bar.low
            )));
        } else {
            if bar.open < bar.low || bar.open > bar.high {
                issues.push(hard(format!(
                    "Open ({}) is outside Low/High range ({}-{})",
                    bar.open, bar.low, bar.high
                )));
            }
            if bar.close < bar.low || bar.close > bar.high {
                issues.push(hard(format!(
                    "Close ({}) is outside Low/High range ({}-{})",
                    bar.close, bar.low, bar.high
                )));
            }
        }

        if let Some(max_price) = self.config.max_price {
            if bar.high > max_price {
                issues.push(ValidationIssue {
                    severity: ValidationSeverity::Soft,
                    message: format!("High ({}) exceeds max threshold ({})", bar.high, max_price),
                });
            }
        }

        if self.config.warn_on_zero_volume && bar.volume == 0 {
            issues.push(ValidationIssue {
                severity: ValidationSeverity::Soft,
                message: "Zero volume".to_string(),
            });
        }

        issues
    }
}
