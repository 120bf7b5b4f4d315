// src/domain/trade_params.rs

// 🌍 Standard library
use std::fmt;
use std::str::FromStr;

// 📦 External crates
use thiserror::Error;

// 🧠 Internal modules
use crate::async_actors::messages::DEFAULT_CURRENCY;
use crate::model::ContractType;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TradeParamsError {
    #[error("Unknown duration mode: {0}")]
    DurationMode(String),
    #[error("Unknown time unit: {0}")]
    TimeUnit(String),
    #[error("Unknown amount basis: {0}")]
    AmountBasis(String),
    #[error("Invalid minimum duration: {0}")]
    MinDuration(String),
    #[error("Duration is required")]
    MissingDuration,
    #[error("Amount must be greater than zero, got {0}")]
    NonPositiveAmount(f64),
    #[error("Duration {given} is below the minimum of {minimum}")]
    BelowMinimum { given: String, minimum: String },
    #[error("Duration in {given} cannot satisfy a minimum of {minimum}")]
    IncompatibleUnit { given: TimeUnit, minimum: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DurationMode {
    #[default]
    Duration,
    EndTime,
}

impl FromStr for DurationMode {
    type Err = TradeParamsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "duration" => Ok(Self::Duration),
            "end time" | "endtime" => Ok(Self::EndTime),
            _ => Err(TradeParamsError::DurationMode(s.to_string())),
        }
    }
}

impl fmt::Display for DurationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Duration => "Duration",
            Self::EndTime => "End Time",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeUnit {
    Hours,
    #[default]
    Minutes,
    Seconds,
    Ticks,
}

impl TimeUnit {
    /// Unit suffix used by the venue, e.g. `5t`, `15s`.
    #[must_use]
    pub const fn as_venue_str(self) -> &'static str {
        match self {
            Self::Hours => "h",
            Self::Minutes => "m",
            Self::Seconds => "s",
            Self::Ticks => "t",
        }
    }

    const fn seconds(self) -> Option<u64> {
        match self {
            Self::Hours => Some(3_600),
            Self::Minutes => Some(60),
            Self::Seconds => Some(1),
            Self::Ticks => None,
        }
    }
}

impl FromStr for TimeUnit {
    type Err = TradeParamsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hours" | "h" => Ok(Self::Hours),
            "minutes" | "m" => Ok(Self::Minutes),
            "seconds" | "s" => Ok(Self::Seconds),
            "ticks" | "t" => Ok(Self::Ticks),
            _ => Err(TradeParamsError::TimeUnit(s.to_string())),
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Hours => "Hours",
            Self::Minutes => "Minutes",
            Self::Seconds => "Seconds",
            Self::Ticks => "Ticks",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AmountBasis {
    #[default]
    Stake,
    Payout,
}

impl FromStr for AmountBasis {
    type Err = TradeParamsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stake" => Ok(Self::Stake),
            "payout" => Ok(Self::Payout),
            _ => Err(TradeParamsError::AmountBasis(s.to_string())),
        }
    }
}

impl fmt::Display for AmountBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Stake => "Stake",
            Self::Payout => "Payout",
        };
        write!(f, "{s}")
    }
}

/// Minimum contract duration as sent by the venue (`1t`, `15s`, `1d`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinDuration {
    Ticks(u64),
    Seconds(u64),
}

impl FromStr for MinDuration {
    type Err = TradeParamsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| TradeParamsError::MinDuration(s.to_string()))?;
        let (amount, unit) = s.split_at(split);
        let amount: u64 = amount
            .parse()
            .map_err(|_| TradeParamsError::MinDuration(s.to_string()))?;

        let seconds = |per_unit: u64| {
            amount
                .checked_mul(per_unit)
                .map(Self::Seconds)
                .ok_or_else(|| TradeParamsError::MinDuration(s.to_string()))
        };
        match unit {
            "t" => Ok(Self::Ticks(amount)),
            "s" => Ok(Self::Seconds(amount)),
            "m" => seconds(60),
            "h" => seconds(3_600),
            "d" => seconds(86_400),
            _ => Err(TradeParamsError::MinDuration(s.to_string())),
        }
    }
}

/// State of the trade form for one contract.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeParameters {
    pub duration_mode: DurationMode,
    pub time_unit: TimeUnit,
    pub duration: Option<u64>,
    pub amount_basis: AmountBasis,
    pub amount: f64,
    pub currency: String,
    pub allow_equals: bool,
    pub min_duration: Option<String>,
}

impl Default for TradeParameters {
    fn default() -> Self {
        Self {
            duration_mode: DurationMode::default(),
            time_unit: TimeUnit::default(),
            duration: None,
            amount_basis: AmountBasis::default(),
            amount: 0.0,
            currency: DEFAULT_CURRENCY.to_string(),
            allow_equals: false,
            min_duration: None,
        }
    }
}

impl TradeParameters {
    /// Form seeded from the selected contract's stake and minimum duration.
    #[must_use]
    pub fn for_contract(contract: &ContractType) -> Self {
        let min_duration = Some(contract.min_contract_duration.clone())
            .filter(|d| !d.is_empty());
        Self {
            amount: contract.default_stake,
            min_duration,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), TradeParamsError> {
        if self.amount <= 0.0 || !self.amount.is_finite() {
            return Err(TradeParamsError::NonPositiveAmount(self.amount));
        }
        if self.duration_mode == DurationMode::EndTime {
            return Ok(());
        }
        let duration = match self.duration {
            Some(d) if d > 0 => d,
            _ => return Err(TradeParamsError::MissingDuration),
        };
        let Some(raw_minimum) = &self.min_duration else {
            return Ok(());
        };

        let given = format!("{duration}{}", self.time_unit.as_venue_str());
        let below = match (raw_minimum.parse::<MinDuration>()?, self.time_unit.seconds()) {
            (MinDuration::Ticks(min), None) => duration < min,
            // Overflowing u64 seconds is far above any minimum.
            (MinDuration::Seconds(min), Some(unit)) => {
                duration.checked_mul(unit).is_some_and(|seconds| seconds < min)
            }
            _ => {
                return Err(TradeParamsError::IncompatibleUnit {
                    given: self.time_unit,
                    minimum: raw_minimum.clone(),
                })
            }
        };

        if below {
            return Err(TradeParamsError::BelowMinimum {
                given,
                minimum: raw_minimum.clone(),
            });
        }
        Ok(())
    }
}
