//! Default values for subsystem configuration.

/// Retry engine.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 500;
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_ATTEMPT_TIMEOUT_SECS: u64 = 30;

/// Circuit breaker.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_RESET_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_SUCCESS_THRESHOLD: u32 = 2;

/// Resource admission.
pub const DEFAULT_MIN_DISK_GB: f64 = 1.0;
pub const DEFAULT_MIN_MEMORY_MB: u64 = 512;
pub const DEFAULT_WARN_DISK_GB: f64 = 5.0;
pub const DEFAULT_WARN_MEMORY_MB: u64 = 2048;

/// Registry.
pub const DEFAULT_HEALTH_CHECK_INTERVAL_SECS: u64 = 300;

/// Providers.
pub const DEFAULT_DIMENSIONS: usize = 1536;
pub const DEFAULT_MAX_BATCH_SIZE: usize = 32;
pub const DEFAULT_MAX_INPUT_TOKENS: usize = 8191;
