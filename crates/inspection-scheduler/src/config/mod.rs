use crate::workflows::inspections::policy::{add_months, DateOffset, WeekdayCalendar};
use crate::workflows::inspections::SchedulingPolicy;
use chrono::NaiveDate;
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub scheduling: SchedulingConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            scheduling: SchedulingConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Deployment-wide scheduling defaults. Requests may still override capacity per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulingConfig {
    pub max_per_day: usize,
    pub max_per_week: usize,
    pub horizon_years: u32,
    pub move_in_buffer_months: u32,
    pub move_out_buffer_months: u32,
    pub skip_weekends: bool,
    pub holidays: Vec<NaiveDate>,
    pub max_repair_iterations: usize,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            max_per_day: SchedulingPolicy::DEFAULT_MAX_PER_DAY,
            max_per_week: SchedulingPolicy::DEFAULT_MAX_PER_WEEK,
            horizon_years: SchedulingPolicy::DEFAULT_HORIZON_YEARS,
            move_in_buffer_months: 3,
            move_out_buffer_months: 1,
            skip_weekends: true,
            holidays: Vec::new(),
            max_repair_iterations: SchedulingPolicy::DEFAULT_MAX_REPAIR_ITERATIONS,
        }
    }
}

impl SchedulingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let holidays = match env::var("SCHEDULE_HOLIDAYS") {
            Ok(raw) => parse_holidays(&raw)?,
            Err(_) => defaults.holidays,
        };

        Ok(Self {
            max_per_day: env_number("SCHEDULE_MAX_PER_DAY", defaults.max_per_day)?,
            max_per_week: env_number("SCHEDULE_MAX_PER_WEEK", defaults.max_per_week)?,
            horizon_years: env_number("SCHEDULE_HORIZON_YEARS", defaults.horizon_years)?,
            move_in_buffer_months: env_number(
                "SCHEDULE_MOVE_IN_BUFFER_MONTHS",
                defaults.move_in_buffer_months,
            )?,
            move_out_buffer_months: env_number(
                "SCHEDULE_MOVE_OUT_BUFFER_MONTHS",
                defaults.move_out_buffer_months,
            )?,
            skip_weekends: env_flag("SCHEDULE_SKIP_WEEKENDS", defaults.skip_weekends)?,
            holidays,
            max_repair_iterations: env_number(
                "SCHEDULE_MAX_REPAIR_ITERATIONS",
                defaults.max_repair_iterations,
            )?,
        })
    }

    /// Builds the policy for a run anchored on `today`.
    pub fn policy(&self, today: NaiveDate) -> Result<SchedulingPolicy, ConfigError> {
        let mut calendar = if self.skip_weekends {
            WeekdayCalendar::weekends_closed()
        } else {
            WeekdayCalendar::new()
        };
        calendar = calendar.with_holidays(self.holidays.iter().copied());

        let base = SchedulingPolicy::standard(today);
        let horizon_months = self
            .horizon_years
            .checked_mul(12)
            .ok_or_else(|| ConfigError::InvalidPolicy("horizon is too large".to_string()))?;
        let horizon = add_months(base.earliest_date, horizon_months);
        let move_out = i32::try_from(self.move_out_buffer_months)
            .map_err(|_| ConfigError::InvalidPolicy("move-out buffer is too large".to_string()))?;
        let move_in = i32::try_from(self.move_in_buffer_months)
            .map_err(|_| ConfigError::InvalidPolicy("move-in buffer is too large".to_string()))?;

        let policy = base
            .with_horizon(horizon)
            .with_buffers(DateOffset::Months(move_in), DateOffset::Months(-move_out))
            .with_capacity(self.max_per_day, self.max_per_week)
            .with_blackout(calendar)
            .with_max_repair_iterations(self.max_repair_iterations);

        policy.validate().map_err(ConfigError::InvalidPolicy)?;
        Ok(policy)
    }
}

fn env_number<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidNumber {
            key,
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}

fn env_flag(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidFlag { key, value: raw }),
        },
        Err(_) => Ok(default),
    }
}

fn parse_holidays(raw: &str) -> Result<Vec<NaiveDate>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| ConfigError::InvalidHoliday {
                value: value.to_string(),
            })
        })
        .collect()
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str, value: String },
    InvalidFlag { key: &'static str, value: String },
    InvalidHoliday { value: String },
    InvalidPolicy(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{key} must be a non-negative integer, got '{value}'")
            }
            ConfigError::InvalidFlag { key, value } => {
                write!(f, "{key} must be true or false, got '{value}'")
            }
            ConfigError::InvalidHoliday { value } => {
                write!(f, "SCHEDULE_HOLIDAYS entry '{value}' is not a YYYY-MM-DD date")
            }
            ConfigError::InvalidPolicy(reason) => write!(f, "invalid scheduling policy: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
