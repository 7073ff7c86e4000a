use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ErrorContext, FapilogError};
use crate::level::Level;

const ENV_PREFIX: &str = "FAPILOG_";

/// `auto|json|pretty` (§3, §4.3 step 11). `auto` means pretty when stdout is
/// attached to an interactive terminal, else JSON; the decision is made at
/// render time, not at settings time, so this enum only carries the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsoleFormat {
    #[default]
    Auto,
    Json,
    Pretty,
}

impl fmt::Display for ConsoleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConsoleFormat::Auto => "auto",
            ConsoleFormat::Json => "json",
            ConsoleFormat::Pretty => "pretty",
        })
    }
}

impl FromStr for ConsoleFormat {
    type Err = FapilogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ConsoleFormat::Auto),
            "json" => Ok(ConsoleFormat::Json),
            "pretty" => Ok(ConsoleFormat::Pretty),
            other => Err(FapilogError::Configuration {
                context: ErrorContext::new("settings", "parse_console_format")
                    .with_offending_value(other)
                    .with_config_key("JSON_CONSOLE"),
                constraint: "one of auto|json|pretty".to_string(),
            }),
        }
    }
}

/// Queue overflow policy (§4.7). `Block` exists in the spec's vocabulary but
/// is explicitly "not supported by default," so it is not a constructible
/// variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowStrategy {
    #[default]
    Drop,
    Sample,
}

impl fmt::Display for OverflowStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OverflowStrategy::Drop => "drop",
            OverflowStrategy::Sample => "sample",
        })
    }
}

impl FromStr for OverflowStrategy {
    type Err = FapilogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "drop" => Ok(OverflowStrategy::Drop),
            "sample" => Ok(OverflowStrategy::Sample),
            other => Err(FapilogError::Configuration {
                context: ErrorContext::new("settings", "parse_overflow_strategy")
                    .with_offending_value(other)
                    .with_config_key("QUEUE_OVERFLOW"),
                constraint: "one of drop|sample".to_string(),
            }),
        }
    }
}

/// A validated, immutable configuration value (§3). Every enumeration field
/// is already canonicalized by the time a `Settings` exists; construction is
/// the only place parsing/validation happens.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub level: Level,
    pub sinks: Vec<String>,
    pub console_format: ConsoleFormat,
    pub redact_fields: Vec<String>,
    pub redact_patterns: Vec<String>,
    pub redact_level: Level,
    pub redact_replacement: String,
    pub sampling_rate: f64,
    pub queue_enabled: bool,
    pub queue_size: usize,
    pub batch_size: usize,
    pub batch_timeout: Duration,
    pub retry_delay: Duration,
    pub max_retries: u32,
    pub overflow_strategy: OverflowStrategy,
    pub trace_header_name: String,
    pub enable_resource_metrics: bool,
    pub enable_httpx_trace_propagation: bool,
    pub enrichers: Vec<String>,
    pub enricher_conditions: HashMap<String, String>,
    pub user_context_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            level: Level::Info,
            sinks: vec!["stdout://json".to_string()],
            console_format: ConsoleFormat::Auto,
            redact_fields: Vec::new(),
            redact_patterns: Vec::new(),
            redact_level: Level::Info,
            redact_replacement: "REDACTED".to_string(),
            sampling_rate: 1.0,
            queue_enabled: true,
            queue_size: 1000,
            batch_size: 100,
            batch_timeout: Duration::from_millis(500),
            retry_delay: Duration::from_millis(500),
            max_retries: 3,
            overflow_strategy: OverflowStrategy::Drop,
            trace_header_name: "X-Request-ID".to_string(),
            enable_resource_metrics: false,
            enable_httpx_trace_propagation: false,
            enrichers: Vec::new(),
            enricher_conditions: HashMap::new(),
            user_context_enabled: true,
        }
    }
}

impl Settings {
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }

    /// Parses settings from the process environment. Every field is
    /// optional; absent variables fall back to `Settings::default()`'s
    /// value. Mirrors `R2eConfig::load`'s "snapshot env once" idiom.
    pub fn from_env() -> Result<Self, FapilogError> {
        let snapshot: HashMap<String, String> = std::env::vars().collect();
        Self::from_map(&snapshot)
    }

    /// Parses settings from an arbitrary environment-shaped mapping, the
    /// seam `from_env` and tests both go through.
    pub fn from_map(env: &HashMap<String, String>) -> Result<Self, FapilogError> {
        let defaults = Settings::default();
        let mut builder = SettingsBuilder::default();

        if let Some(v) = lookup(env, "LEVEL") {
            builder = builder.level(v.parse()?);
        }
        if let Some(v) = lookup(env, "SINKS") {
            builder = builder.sinks(split_csv(&v));
        }
        if let Some(v) = lookup(env, "JSON_CONSOLE") {
            builder = builder.console_format(v.parse()?);
        }
        if let Some(v) = lookup(env, "REDACT_PATTERNS") {
            builder = builder.redact_patterns(split_csv(&v));
        }
        if let Some(v) = lookup(env, "REDACT_FIELDS") {
            builder = builder.redact_fields(split_csv(&v));
        }
        if let Some(v) = lookup(env, "REDACT_LEVEL") {
            builder = builder.redact_level(v.parse()?);
        }
        if let Some(v) = lookup(env, "REDACT_REPLACEMENT") {
            builder = builder.redact_replacement(v);
        }
        if let Some(v) = lookup(env, "SAMPLING_RATE") {
            builder = builder.sampling_rate(parse_f64(&v, "SAMPLING_RATE")?);
        }
        if let Some(v) = lookup(env, "QUEUE_ENABLED") {
            builder = builder.queue_enabled(parse_bool(&v, "QUEUE_ENABLED")?);
        }
        if let Some(v) = lookup(env, "QUEUE_SIZE") {
            builder = builder.queue_size(parse_usize(&v, "QUEUE_SIZE")?);
        }
        if let Some(v) = lookup(env, "QUEUE_BATCH_SIZE") {
            builder = builder.batch_size(parse_usize(&v, "QUEUE_BATCH_SIZE")?);
        }
        if let Some(v) = lookup(env, "QUEUE_BATCH_TIMEOUT") {
            builder = builder.batch_timeout(parse_duration_secs(&v, "QUEUE_BATCH_TIMEOUT")?);
        }
        if let Some(v) = lookup(env, "QUEUE_RETRY_DELAY") {
            builder = builder.retry_delay(parse_duration_secs(&v, "QUEUE_RETRY_DELAY")?);
        }
        if let Some(v) = lookup(env, "QUEUE_MAX_RETRIES") {
            builder = builder.max_retries(parse_u32(&v, "QUEUE_MAX_RETRIES")?);
        }
        if let Some(v) = lookup(env, "QUEUE_OVERFLOW") {
            builder = builder.overflow_strategy(v.parse()?);
        }
        if let Some(v) = lookup(env, "ENABLE_RESOURCE_METRICS") {
            builder = builder.enable_resource_metrics(parse_bool(&v, "ENABLE_RESOURCE_METRICS")?);
        }
        if let Some(v) = lookup(env, "ENABLE_HTTPX_TRACE_PROPAGATION") {
            builder = builder
                .enable_httpx_trace_propagation(parse_bool(&v, "ENABLE_HTTPX_TRACE_PROPAGATION")?);
        }
        if let Some(v) = lookup(env, "TRACE_HEADER_NAME") {
            builder = builder.trace_header_name(v);
        }
        if let Some(v) = lookup(env, "USER_CONTEXT_ENABLED") {
            builder = builder.user_context_enabled(parse_bool(&v, "USER_CONTEXT_ENABLED")?);
        }
        if let Some(v) = lookup(env, "ENRICHERS") {
            builder = builder.enrichers(split_csv(&v));
        }

        builder.build_from(defaults)
    }
}

fn lookup(env: &HashMap<String, String>, suffix: &str) -> Option<String> {
    env.get(&format!("{ENV_PREFIX}{suffix}")).cloned()
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(value: &str, key: &'static str) -> Result<bool, FapilogError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(FapilogError::Configuration {
            context: ErrorContext::new("settings", "parse_bool")
                .with_offending_value(other)
                .with_config_key(key),
            constraint: "one of true|false|1|0|yes|no".to_string(),
        }),
    }
}

fn parse_f64(value: &str, key: &'static str) -> Result<f64, FapilogError> {
    value.parse::<f64>().map_err(|_| FapilogError::Configuration {
        context: ErrorContext::new("settings", "parse_float")
            .with_offending_value(value)
            .with_config_key(key),
        constraint: "a floating-point number".to_string(),
    })
}

fn parse_usize(value: &str, key: &'static str) -> Result<usize, FapilogError> {
    value.parse::<usize>().map_err(|_| FapilogError::Configuration {
        context: ErrorContext::new("settings", "parse_usize")
            .with_offending_value(value)
            .with_config_key(key),
        constraint: "a non-negative integer".to_string(),
    })
}

fn parse_u32(value: &str, key: &'static str) -> Result<u32, FapilogError> {
    value.parse::<u32>().map_err(|_| FapilogError::Configuration {
        context: ErrorContext::new("settings", "parse_u32")
            .with_offending_value(value)
            .with_config_key(key),
        constraint: "a non-negative integer".to_string(),
    })
}

fn parse_duration_secs(value: &str, key: &'static str) -> Result<Duration, FapilogError> {
    let secs = parse_f64(value, key)?;
    if secs <= 0.0 {
        return Err(FapilogError::Configuration {
            context: ErrorContext::new("settings", "parse_duration")
                .with_offending_value(value)
                .with_config_key(key),
            constraint: "a positive number of seconds".to_string(),
        });
    }
    Ok(Duration::from_secs_f64(secs))
}

/// Builder for `Settings`, grounded on `ObservabilityConfig`'s `with_*`
/// chained-setter idiom (including the sampling-rate clamp).
#[derive(Debug, Clone, Default)]
pub struct SettingsBuilder {
    overrides: SettingsOverrides,
}

#[derive(Debug, Clone, Default)]
struct SettingsOverrides {
    level: Option<Level>,
    sinks: Option<Vec<String>>,
    console_format: Option<ConsoleFormat>,
    redact_fields: Option<Vec<String>>,
    redact_patterns: Option<Vec<String>>,
    redact_level: Option<Level>,
    redact_replacement: Option<String>,
    sampling_rate: Option<f64>,
    queue_enabled: Option<bool>,
    queue_size: Option<usize>,
    batch_size: Option<usize>,
    batch_timeout: Option<Duration>,
    retry_delay: Option<Duration>,
    max_retries: Option<u32>,
    overflow_strategy: Option<OverflowStrategy>,
    trace_header_name: Option<String>,
    enable_resource_metrics: Option<bool>,
    enable_httpx_trace_propagation: Option<bool>,
    enrichers: Option<Vec<String>>,
    enricher_conditions: Option<HashMap<String, String>>,
    user_context_enabled: Option<bool>,
}

macro_rules! setter {
    ($name:ident, $field:ident, $ty:ty) => {
        pub fn $name(mut self, value: $ty) -> Self {
            self.overrides.$field = Some(value);
            self
        }
    };
}

impl SettingsBuilder {
    setter!(level, level, Level);
    setter!(sinks, sinks, Vec<String>);
    setter!(console_format, console_format, ConsoleFormat);
    setter!(redact_fields, redact_fields, Vec<String>);
    setter!(redact_patterns, redact_patterns, Vec<String>);
    setter!(redact_level, redact_level, Level);
    setter!(queue_enabled, queue_enabled, bool);
    setter!(queue_size, queue_size, usize);
    setter!(batch_size, batch_size, usize);
    setter!(batch_timeout, batch_timeout, Duration);
    setter!(retry_delay, retry_delay, Duration);
    setter!(max_retries, max_retries, u32);
    setter!(overflow_strategy, overflow_strategy, OverflowStrategy);
    setter!(enable_resource_metrics, enable_resource_metrics, bool);
    setter!(
        enable_httpx_trace_propagation,
        enable_httpx_trace_propagation,
        bool
    );
    setter!(enrichers, enrichers, Vec<String>);
    setter!(enricher_conditions, enricher_conditions, HashMap<String, String>);
    setter!(user_context_enabled, user_context_enabled, bool);

    pub fn redact_replacement(mut self, value: impl Into<String>) -> Self {
        self.overrides.redact_replacement = Some(value.into());
        self
    }

    pub fn trace_header_name(mut self, value: impl Into<String>) -> Self {
        self.overrides.trace_header_name = Some(value.into());
        self
    }

    /// Clamped to `[0.0, 1.0]`, the same defensive clamp
    /// `ObservabilityConfig::with_sampling_ratio` applies.
    pub fn sampling_rate(mut self, value: f64) -> Self {
        self.overrides.sampling_rate = Some(value.clamp(0.0, 1.0));
        self
    }

    pub fn build(self) -> Result<Settings, FapilogError> {
        self.build_from(Settings::default())
    }

    fn build_from(self, base: Settings) -> Result<Settings, FapilogError> {
        let o = self.overrides;
        let settings = Settings {
            level: o.level.unwrap_or(base.level),
            sinks: o.sinks.unwrap_or(base.sinks),
            console_format: o.console_format.unwrap_or(base.console_format),
            redact_fields: o.redact_fields.unwrap_or(base.redact_fields),
            redact_patterns: o.redact_patterns.unwrap_or(base.redact_patterns),
            redact_level: o.redact_level.unwrap_or(base.redact_level),
            redact_replacement: o.redact_replacement.unwrap_or(base.redact_replacement),
            sampling_rate: o.sampling_rate.unwrap_or(base.sampling_rate),
            queue_enabled: o.queue_enabled.unwrap_or(base.queue_enabled),
            queue_size: o.queue_size.unwrap_or(base.queue_size),
            batch_size: o.batch_size.unwrap_or(base.batch_size),
            batch_timeout: o.batch_timeout.unwrap_or(base.batch_timeout),
            retry_delay: o.retry_delay.unwrap_or(base.retry_delay),
            max_retries: o.max_retries.unwrap_or(base.max_retries),
            overflow_strategy: o.overflow_strategy.unwrap_or(base.overflow_strategy),
            trace_header_name: o.trace_header_name.unwrap_or(base.trace_header_name),
            enable_resource_metrics: o
                .enable_resource_metrics
                .unwrap_or(base.enable_resource_metrics),
            enable_httpx_trace_propagation: o
                .enable_httpx_trace_propagation
                .unwrap_or(base.enable_httpx_trace_propagation),
            enrichers: o.enrichers.unwrap_or(base.enrichers),
            enricher_conditions: o.enricher_conditions.unwrap_or(base.enricher_conditions),
            user_context_enabled: o.user_context_enabled.unwrap_or(base.user_context_enabled),
        };
        settings.validate()
    }
}

impl Settings {
    fn validate(self) -> Result<Self, FapilogError> {
        if !(0.0..=1.0).contains(&self.sampling_rate) {
            return Err(FapilogError::Configuration {
                context: ErrorContext::new("settings", "validate")
                    .with_offending_value(self.sampling_rate.to_string())
                    .with_config_key("SAMPLING_RATE"),
                constraint: "a number in [0.0, 1.0]".to_string(),
            });
        }
        if self.queue_size < 1 {
            return Err(FapilogError::Configuration {
                context: ErrorContext::new("settings", "validate")
                    .with_offending_value(self.queue_size.to_string())
                    .with_config_key("QUEUE_SIZE"),
                constraint: "an integer >= 1".to_string(),
            });
        }
        if self.batch_size < 1 {
            return Err(FapilogError::Configuration {
                context: ErrorContext::new("settings", "validate")
                    .with_offending_value(self.batch_size.to_string())
                    .with_config_key("QUEUE_BATCH_SIZE"),
                constraint: "an integer >= 1".to_string(),
            });
        }
        if self.batch_timeout.is_zero() {
            return Err(FapilogError::Configuration {
                context: ErrorContext::new("settings", "validate")
                    .with_config_key("QUEUE_BATCH_TIMEOUT"),
                constraint: "a positive duration".to_string(),
            });
        }
        Ok(self)
    }
}
