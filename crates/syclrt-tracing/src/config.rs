//! Subscriber presets and their `SYCLRT_*` environment overrides.

use std::env;

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

use crate::TracingSetupError;

/// Preset selector: `local`, `ci`, `performance` or `test`.
pub const PROFILE_VAR: &str = "SYCLRT_TRACING_PROFILE";
/// Filter directives replacing the preset's.
pub const DIRECTIVES_VAR: &str = "SYCLRT_TRACING_DIRECTIVES";
/// `compact`, `pretty` or `json`.
pub const FORMAT_VAR: &str = "SYCLRT_TRACING_FORMAT";
/// Turns [`crate::performance::PerformanceSpan`] reporting on or off.
pub const PERF_TRACING_VAR: &str = "SYCLRT_PERF_TRACING";
/// Minimum performance span duration, in microseconds, worth reporting.
pub const PERF_THRESHOLD_VAR: &str = "SYCLRT_PERF_THRESHOLD_US";

/// Formatter of the output layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TracingOutput {
    Compact,
    Pretty,
    Json,
}

impl TracingOutput {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Some(Self::Compact),
            "pretty" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Where formatted records are written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TracingSink {
    #[default]
    Stdout,
    Stderr,
    /// The libtest capture buffer, so records only show for failing tests.
    TestHarness,
}

/// Named presets, see [`TracingConfig::preset`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TracingProfile {
    Local,
    Ci,
    Performance,
    Test,
}

impl TracingProfile {
    /// Unknown names fall back to [`TracingProfile::Local`].
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "ci" => Self::Ci,
            "performance" | "perf" => Self::Performance,
            "test" => Self::Test,
            _ => Self::Local,
        }
    }
}

/// How the process-wide subscriber is assembled.
#[derive(Clone, Debug)]
pub struct TracingConfig {
    /// Filter directives such as `syclrt=debug,info`. When absent `RUST_LOG` is consulted, then
    /// [`TracingConfig::default_directive`].
    pub directives: Option<String>,
    pub default_directive: String,
    /// Print event targets (module paths).
    pub include_targets: bool,
    /// ANSI colouring. Ignored for JSON output.
    pub ansi: bool,
    /// Span lifecycle events to emit.
    pub span_events: FmtSpan,
    pub output: TracingOutput,
    pub sink: TracingSink,
    /// When false, performance guards stay silent.
    pub enable_performance_tracing: bool,
    /// `None` reports every performance span.
    pub performance_threshold_us: Option<u64>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::preset(TracingProfile::Local)
    }
}

impl TracingConfig {
    pub fn preset(profile: TracingProfile) -> Self {
        let local = Self {
            directives: None,
            default_directive: "info".to_string(),
            include_targets: true,
            ansi: true,
            span_events: FmtSpan::NONE,
            output: TracingOutput::Pretty,
            sink: TracingSink::Stdout,
            enable_performance_tracing: cfg!(debug_assertions),
            performance_threshold_us: None,
        };
        match profile {
            TracingProfile::Local => local,
            TracingProfile::Ci => Self {
                ansi: false,
                output: TracingOutput::Json,
                enable_performance_tracing: false,
                ..local
            },
            TracingProfile::Performance => Self {
                directives: Some("syclrt=debug,syclrt_tracing=debug".to_string()),
                ansi: false,
                span_events: FmtSpan::CLOSE,
                output: TracingOutput::Json,
                sink: TracingSink::Stderr,
                enable_performance_tracing: true,
                ..local
            },
            TracingProfile::Test => Self {
                default_directive: "syclrt=debug,warn".to_string(),
                include_targets: false,
                ansi: false,
                output: TracingOutput::Compact,
                sink: TracingSink::TestHarness,
                enable_performance_tracing: true,
                ..local
            },
        }
    }

    /// The preset named by `SYCLRT_TRACING_PROFILE`, with the other `SYCLRT_*` variables applied.
    pub fn from_env() -> Self {
        let profile = env_value(PROFILE_VAR).map_or(TracingProfile::Local, |name| TracingProfile::from_name(&name));
        let mut config = Self::preset(profile);
        config.apply_env();
        config
    }

    /// Override single fields from the environment. Unparsable values are ignored.
    pub fn apply_env(&mut self) {
        if let Some(directives) = env_value(DIRECTIVES_VAR) {
            self.directives = Some(directives);
        }
        if let Some(output) = env_value(FORMAT_VAR).and_then(|value| TracingOutput::parse(&value)) {
            self.set_output(output);
        }
        if let Some(flag) = env_value(PERF_TRACING_VAR) {
            self.enable_performance_tracing = matches!(flag.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        if let Some(threshold) = env_value(PERF_THRESHOLD_VAR).and_then(|value| value.parse().ok()) {
            self.performance_threshold_us = Some(threshold);
        }
    }

    pub fn set_output(&mut self, output: TracingOutput) {
        self.output = output;
        self.ansi &= output != TracingOutput::Json;
    }

    pub(crate) fn filter(&self) -> Result<EnvFilter, TracingSetupError> {
        let Some(directives) = &self.directives else {
            return Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_directive)));
        };
        EnvFilter::try_new(directives).map_err(|err| TracingSetupError::InvalidFilter {
            directives: directives.clone(),
            reason: err.to_string(),
        })
    }
}

fn env_value(key: &str) -> Option<String> {
    let value = env::var(key).ok()?;
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // The environment is process-wide.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for key in [PROFILE_VAR, DIRECTIVES_VAR, FORMAT_VAR, PERF_TRACING_VAR, PERF_THRESHOLD_VAR, "RUST_LOG"] {
            env::remove_var(key);
        }
    }

    #[test]
    fn env_overrides_profile_fields() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var(PROFILE_VAR, "ci");
        env::set_var(FORMAT_VAR, "compact");
        env::set_var(DIRECTIVES_VAR, "syclrt=trace");

        let config = TracingConfig::from_env();
        assert_eq!(config.directives.as_deref(), Some("syclrt=trace"));
        assert_eq!(config.output, TracingOutput::Compact);
        assert!(!config.ansi);
        clear_env();
    }

    #[test]
    fn env_controls_performance_settings() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var(PERF_TRACING_VAR, "yes");
        env::set_var(PERF_THRESHOLD_VAR, " 250 ");

        let config = TracingConfig::from_env();
        assert!(config.enable_performance_tracing);
        assert_eq!(config.performance_threshold_us, Some(250));

        env::set_var(PERF_TRACING_VAR, "off");
        assert!(!TracingConfig::from_env().enable_performance_tracing);
        clear_env();
    }

    #[test]
    fn unknown_values_keep_the_preset() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var(PROFILE_VAR, "staging");
        env::set_var(FORMAT_VAR, "xml");
        env::set_var(PERF_THRESHOLD_VAR, "soon");
        let config = TracingConfig::from_env();
        assert_eq!(config.output, TracingOutput::Pretty);
        assert_eq!(config.performance_threshold_us, None);
        clear_env();
    }

    #[test]
    fn json_output_turns_colour_off() {
        let mut config = TracingConfig::default();
        assert!(config.ansi);
        config.set_output(TracingOutput::Json);
        assert!(!config.ansi);
        config.set_output(TracingOutput::Pretty);
        assert!(!config.ansi);
    }

    #[test]
    fn presets_differ_where_expected() {
        let perf = TracingConfig::preset(TracingProfile::Performance);
        assert!(perf.enable_performance_tracing);
        assert_eq!(perf.output, TracingOutput::Json);
        assert!(perf.directives.as_deref().is_some_and(|d| d.contains("syclrt")));

        let test = TracingConfig::preset(TracingProfile::Test);
        assert_eq!(test.sink, TracingSink::TestHarness);
        assert_eq!(TracingProfile::from_name(" PERF "), TracingProfile::Performance);
    }
}
