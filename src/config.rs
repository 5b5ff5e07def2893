use serde::{Deserialize, Serialize};

pub const MIB: u64 = 1024 * 1024;
pub const KIB: u64 = 1024;

/// Policy constants for the judging engine. Defaults are production values;
/// every field can be overridden through a `CJUDGE_*` environment variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeConfig {
    // Submission limits
    pub max_source_bytes: u64,
    pub max_stdin_bytes: u64,
    pub max_test_cases: usize,
    pub max_test_case_field_bytes: u64,

    // Captured output ceilings
    pub max_stdout_bytes: u64,
    pub max_stderr_bytes: u64,

    // Time limits (wall clock, milliseconds)
    pub default_time_limit_ms: u64,
    pub min_time_limit_ms: u64,
    pub max_time_limit_ms: u64,
    pub compile_timeout_ms: u64,
    pub cleanup_timeout_ms: u64,

    // Per-run memory cap (megabytes), enforced with ulimit inside the sandbox
    pub min_memory_limit_mb: u64,
    pub max_memory_limit_mb: u64,

    // Admission control
    pub rate_limit_max_requests: u32,
    pub rate_limit_window_secs: u64,
    pub max_concurrent_compilations: usize,

    // Sandbox pool
    pub pool_size: usize,
    pub container_prefix: String,
    pub image: String,
    pub container_cpus: f64,
    pub container_memory_bytes: i64,
    pub container_pids_limit: i64,
    pub workspace_tmpfs_bytes: u64,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            max_source_bytes: MIB,
            max_stdin_bytes: 10 * KIB,
            max_test_cases: 100,
            max_test_case_field_bytes: 10 * KIB,
            max_stdout_bytes: MIB,
            max_stderr_bytes: 256 * KIB,
            default_time_limit_ms: 5000,
            min_time_limit_ms: 100,
            max_time_limit_ms: 30000,
            compile_timeout_ms: 10000,
            cleanup_timeout_ms: 5000,
            min_memory_limit_mb: 16,
            max_memory_limit_mb: 1024,
            rate_limit_max_requests: 30,
            rate_limit_window_secs: 60,
            max_concurrent_compilations: 40,
            pool_size: 4,
            container_prefix: "cjudge-sandbox".to_string(),
            image: "gcc:13-bookworm".to_string(),
            container_cpus: 1.0,
            container_memory_bytes: 512 * MIB as i64,
            container_pids_limit: 64,
            workspace_tmpfs_bytes: 64 * MIB,
        }
    }
}

impl JudgeConfig {
    /// Build the config from defaults plus `CJUDGE_*` environment overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        read_env("CJUDGE_MAX_SOURCE_BYTES", &mut config.max_source_bytes);
        read_env("CJUDGE_MAX_STDIN_BYTES", &mut config.max_stdin_bytes);
        read_env("CJUDGE_MAX_TEST_CASES", &mut config.max_test_cases);
        read_env(
            "CJUDGE_MAX_TEST_CASE_FIELD_BYTES",
            &mut config.max_test_case_field_bytes,
        );
        read_env("CJUDGE_MAX_STDOUT_BYTES", &mut config.max_stdout_bytes);
        read_env("CJUDGE_MAX_STDERR_BYTES", &mut config.max_stderr_bytes);
        read_env("CJUDGE_DEFAULT_TIME_LIMIT_MS", &mut config.default_time_limit_ms);
        read_env("CJUDGE_MIN_TIME_LIMIT_MS", &mut config.min_time_limit_ms);
        read_env("CJUDGE_MAX_TIME_LIMIT_MS", &mut config.max_time_limit_ms);
        read_env("CJUDGE_COMPILE_TIMEOUT_MS", &mut config.compile_timeout_ms);
        read_env("CJUDGE_CLEANUP_TIMEOUT_MS", &mut config.cleanup_timeout_ms);
        read_env("CJUDGE_MIN_MEMORY_LIMIT_MB", &mut config.min_memory_limit_mb);
        read_env("CJUDGE_MAX_MEMORY_LIMIT_MB", &mut config.max_memory_limit_mb);
        read_env("CJUDGE_RATE_LIMIT_MAX_REQUESTS", &mut config.rate_limit_max_requests);
        read_env("CJUDGE_RATE_LIMIT_WINDOW_SECS", &mut config.rate_limit_window_secs);
        read_env(
            "CJUDGE_MAX_CONCURRENT_COMPILATIONS",
            &mut config.max_concurrent_compilations,
        );
        read_env("CJUDGE_POOL_SIZE", &mut config.pool_size);
        read_env("CJUDGE_CONTAINER_CPUS", &mut config.container_cpus);
        read_env("CJUDGE_CONTAINER_MEMORY_BYTES", &mut config.container_memory_bytes);
        read_env("CJUDGE_CONTAINER_PIDS_LIMIT", &mut config.container_pids_limit);
        read_env("CJUDGE_WORKSPACE_TMPFS_BYTES", &mut config.workspace_tmpfs_bytes);
        if let Ok(value) = std::env::var("CJUDGE_IMAGE") {
            config.image = value;
        }
        if let Ok(value) = std::env::var("CJUDGE_CONTAINER_PREFIX") {
            config.container_prefix = value;
        }
        config
    }

    /// Clamp an optional requested time limit into the configured range.
    pub fn effective_time_limit_ms(&self, requested: Option<u64>) -> u64 {
        requested
            .unwrap_or(self.default_time_limit_ms)
            .clamp(self.min_time_limit_ms, self.max_time_limit_ms)
    }
}

fn read_env<T: std::str::FromStr>(name: &str, slot: &mut T) {
    if let Ok(raw) = std::env::var(name) {
        if let Ok(value) = raw.parse() {
            *slot = value;
        } else {
            tracing::warn!("Ignoring unparseable {}={}", name, raw);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_policy() {
        let config = JudgeConfig::default();
        assert_eq!(config.max_source_bytes, 1024 * 1024);
        assert_eq!(config.max_test_cases, 100);
        assert_eq!(config.min_time_limit_ms, 100);
        assert_eq!(config.max_time_limit_ms, 30000);
        assert_eq!(config.max_concurrent_compilations, 40);
    }

    #[test]
    fn every_limit_knob_has_an_env_override() {
        let overrides: &[(&str, &str)] = &[
            ("CJUDGE_MAX_STDIN_BYTES", "2048"),
            ("CJUDGE_MAX_TEST_CASE_FIELD_BYTES", "4096"),
            ("CJUDGE_MIN_TIME_LIMIT_MS", "200"),
            ("CJUDGE_MAX_TIME_LIMIT_MS", "20000"),
            ("CJUDGE_CLEANUP_TIMEOUT_MS", "2500"),
            ("CJUDGE_MIN_MEMORY_LIMIT_MB", "32"),
            ("CJUDGE_MAX_MEMORY_LIMIT_MB", "768"),
            ("CJUDGE_CONTAINER_CPUS", "1.5"),
            ("CJUDGE_CONTAINER_MEMORY_BYTES", "268435456"),
            ("CJUDGE_WORKSPACE_TMPFS_BYTES", "33554432"),
        ];
        for (name, value) in overrides {
            std::env::set_var(name, value);
        }

        let config = JudgeConfig::from_env();

        for (name, _) in overrides {
            std::env::remove_var(name);
        }

        assert_eq!(config.max_stdin_bytes, 2048);
        assert_eq!(config.max_test_case_field_bytes, 4096);
        assert_eq!(config.min_time_limit_ms, 200);
        assert_eq!(config.max_time_limit_ms, 20000);
        assert_eq!(config.cleanup_timeout_ms, 2500);
        assert_eq!(config.min_memory_limit_mb, 32);
        assert_eq!(config.max_memory_limit_mb, 768);
        assert_eq!(config.container_cpus, 1.5);
        assert_eq!(config.container_memory_bytes, 268435456);
        assert_eq!(config.workspace_tmpfs_bytes, 33554432);
    }

    #[test]
    fn time_limit_is_clamped() {
        let config = JudgeConfig::default();
        assert_eq!(config.effective_time_limit_ms(None), 5000);
        assert_eq!(config.effective_time_limit_ms(Some(50)), 100);
        assert_eq!(config.effective_time_limit_ms(Some(60000)), 30000);
        assert_eq!(config.effective_time_limit_ms(Some(2500)), 2500);
    }
}
