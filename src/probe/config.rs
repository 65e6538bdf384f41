//! Configuration resolution for the SSH probe.
//!
//! This module handles configuration values with a three-tier priority system:
//!
//! 1. **Parameter** - Explicitly provided value, usually a CLI flag (highest priority)
//! 2. **Environment Variable** - Value from environment variable (`.env` is loaded first)
//! 3. **Default** - Built-in default value (lowest priority)
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SSH_HOST` | - | Remote host name or address |
//! | `SSH_PORT` | 22 | Remote port |
//! | `SSH_USER` | - | Login user |
//! | `SSH_KEY_PATH` | - | Private key file (exclusive with `SSH_PASSWORD`) |
//! | `SSH_PASSWORD` | - | Password (exclusive with `SSH_KEY_PATH`) |
//! | `SSH_CONNECT_TIMEOUT` | 5s | Connection timeout in seconds |
//! | `SSH_KNOWN_HOSTS` | - | known_hosts file used to verify the host key |
//! | `SSH_INSECURE` | false | Accept any host key |
//! | `SSH_PROBE_COMMAND` | `ls -l /` | Command run by the one-shot probe |

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use super::error::ConfigError;
use super::types::{ConnectionRequest, HostVerificationPolicy, SessionMode, Settings};

/// Port dialed when the request leaves it empty
pub const DEFAULT_PORT: &str = "22";

/// Default SSH connection timeout in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Process exit code for invalid configuration, `EX_USAGE` from sysexits.h
pub const CONFIG_ERROR_EXIT_CODE: u8 = 64;

/// Command run by the one-shot probe when none is configured
pub const DEFAULT_PROBE_COMMAND: &str = "ls -l /";

pub(crate) const HOST_ENV_VAR: &str = "SSH_HOST";
pub(crate) const PORT_ENV_VAR: &str = "SSH_PORT";
pub(crate) const USER_ENV_VAR: &str = "SSH_USER";
pub(crate) const KEY_PATH_ENV_VAR: &str = "SSH_KEY_PATH";
pub(crate) const PASSWORD_ENV_VAR: &str = "SSH_PASSWORD";
pub(crate) const CONNECT_TIMEOUT_ENV_VAR: &str = "SSH_CONNECT_TIMEOUT";
pub(crate) const KNOWN_HOSTS_ENV_VAR: &str = "SSH_KNOWN_HOSTS";
pub(crate) const INSECURE_ENV_VAR: &str = "SSH_INSECURE";
pub(crate) const PROBE_COMMAND_ENV_VAR: &str = "SSH_PROBE_COMMAND";

/// Explicit values supplied by the caller, each overriding its environment variable.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<String>,
    pub user: Option<String>,
    pub key_path: Option<PathBuf>,
    pub password: Option<String>,
    pub connect_timeout_secs: Option<u64>,
    pub known_hosts: Option<PathBuf>,
    pub insecure: Option<bool>,
    pub probe_command: Option<String>,
    pub shell: bool,
}

/// Resolve a string setting with priority: parameter -> env var -> none
fn resolve_string(param: Option<String>, env_var: &str) -> Option<String> {
    if param.is_some() {
        return param;
    }
    env::var(env_var).ok()
}

/// Resolve the connection timeout value with priority: parameter -> env var -> default
pub(crate) fn resolve_connect_timeout(timeout_param: Option<u64>) -> u64 {
    // Priority 1: Use parameter if provided
    if let Some(timeout) = timeout_param {
        return timeout;
    }

    // Priority 2: Use environment variable if set
    if let Ok(env_timeout) = env::var(CONNECT_TIMEOUT_ENV_VAR)
        && let Ok(timeout) = env_timeout.parse::<u64>()
    {
        return timeout;
    }

    // Priority 3: Default value
    DEFAULT_CONNECT_TIMEOUT_SECS
}

/// Resolve the insecure host key setting with priority: parameter -> env var -> default (false)
pub(crate) fn resolve_insecure(insecure_param: Option<bool>) -> bool {
    if let Some(insecure) = insecure_param {
        return insecure;
    }

    if let Ok(env_insecure) = env::var(INSECURE_ENV_VAR) {
        return env_insecure.eq_ignore_ascii_case("true") || env_insecure == "1";
    }

    false
}

/// Resolve the probe command with priority: parameter -> env var -> default
pub(crate) fn resolve_probe_command(command_param: Option<String>) -> String {
    resolve_string(command_param, PROBE_COMMAND_ENV_VAR)
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_PROBE_COMMAND.to_string())
}

/// Build the run settings from explicit overrides and the environment.
///
/// Only the host verification policy is validated here; request validation
/// belongs to the credential resolver so it runs on injected requests too.
pub fn load_settings(overrides: Overrides) -> Result<Settings, ConfigError> {
    let timeout = resolve_connect_timeout(overrides.connect_timeout_secs);

    let request = ConnectionRequest {
        host: resolve_string(overrides.host, HOST_ENV_VAR).unwrap_or_default(),
        port: resolve_string(overrides.port, PORT_ENV_VAR).unwrap_or_default(),
        user: resolve_string(overrides.user, USER_ENV_VAR).unwrap_or_default(),
        key_path: overrides
            .key_path
            .or_else(|| env::var_os(KEY_PATH_ENV_VAR).map(PathBuf::from)),
        password: resolve_string(overrides.password, PASSWORD_ENV_VAR),
        connect_timeout: Duration::from_secs(timeout),
    };

    let known_hosts = overrides
        .known_hosts
        .or_else(|| env::var_os(KNOWN_HOSTS_ENV_VAR).map(PathBuf::from));
    let insecure = resolve_insecure(overrides.insecure);
    if !insecure && known_hosts.as_ref().is_none_or(|p| p.as_os_str().is_empty()) {
        warn!(
            "Neither {} nor {} is set, host keys will not be verified",
            KNOWN_HOSTS_ENV_VAR, INSECURE_ENV_VAR
        );
    }
    let policy = HostVerificationPolicy::from_settings(insecure, known_hosts)?;

    let mode = if overrides.shell {
        SessionMode::Shell
    } else {
        SessionMode::Probe {
            command: resolve_probe_command(overrides.probe_command),
        }
    };

    Ok(Settings {
        request,
        policy,
        mode,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    // Use a mutex to serialize env var tests to avoid race conditions
    static ENV_TEST_MUTEX: once_cell::sync::Lazy<StdMutex<()>> =
        once_cell::sync::Lazy::new(|| StdMutex::new(()));

    /// Helper to set an environment variable safely within tests.
    /// SAFETY: Must be called while holding ENV_TEST_MUTEX to prevent data races.
    unsafe fn set_env(key: &str, value: &str) {
        // SAFETY: Caller ensures ENV_TEST_MUTEX is held
        unsafe { env::set_var(key, value) };
    }

    /// Helper to remove an environment variable safely within tests.
    /// SAFETY: Must be called while holding ENV_TEST_MUTEX to prevent data races.
    unsafe fn remove_env(key: &str) {
        // SAFETY: Caller ensures ENV_TEST_MUTEX is held
        unsafe { env::remove_var(key) };
    }

    const ALL_VARS: &[&str] = &[
        HOST_ENV_VAR,
        PORT_ENV_VAR,
        USER_ENV_VAR,
        KEY_PATH_ENV_VAR,
        PASSWORD_ENV_VAR,
        CONNECT_TIMEOUT_ENV_VAR,
        KNOWN_HOSTS_ENV_VAR,
        INSECURE_ENV_VAR,
        PROBE_COMMAND_ENV_VAR,
    ];

    /// Clear every probe variable. Caller must hold ENV_TEST_MUTEX.
    fn clear_all() {
        for var in ALL_VARS {
            // SAFETY: Caller holds ENV_TEST_MUTEX
            unsafe { remove_env(var) };
        }
    }

    mod connect_timeout {
        use super::*;

        #[test]
        fn test_uses_param_when_provided() {
            assert_eq!(resolve_connect_timeout(Some(60)), 60);
        }

        #[test]
        fn test_param_takes_priority_over_env() {
            let _guard = ENV_TEST_MUTEX.lock().unwrap();
            // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
            unsafe {
                set_env(CONNECT_TIMEOUT_ENV_VAR, "120");
            }
            let result = resolve_connect_timeout(Some(45));
            // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
            unsafe {
                remove_env(CONNECT_TIMEOUT_ENV_VAR);
            }
            assert_eq!(result, 45);
        }

        #[test]
        fn test_uses_env_var_when_no_param() {
            let _guard = ENV_TEST_MUTEX.lock().unwrap();
            // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
            unsafe {
                set_env(CONNECT_TIMEOUT_ENV_VAR, "9");
            }
            let result = resolve_connect_timeout(None);
            // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
            unsafe {
                remove_env(CONNECT_TIMEOUT_ENV_VAR);
            }
            assert_eq!(result, 9);
        }

        #[test]
        fn test_ignores_invalid_env_var() {
            let _guard = ENV_TEST_MUTEX.lock().unwrap();
            // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
            unsafe {
                set_env(CONNECT_TIMEOUT_ENV_VAR, "soon");
            }
            let result = resolve_connect_timeout(None);
            // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
            unsafe {
                remove_env(CONNECT_TIMEOUT_ENV_VAR);
            }
            assert_eq!(result, DEFAULT_CONNECT_TIMEOUT_SECS);
        }
    }

    mod insecure {
        use super::*;

        #[test]
        fn test_param_wins() {
            assert!(resolve_insecure(Some(true)));
            assert!(!resolve_insecure(Some(false)));
        }

        #[test]
        fn test_env_var_accepts_true_and_one() {
            let _guard = ENV_TEST_MUTEX.lock().unwrap();
            for value in ["true", "TRUE", "1"] {
                // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
                unsafe {
                    set_env(INSECURE_ENV_VAR, value);
                }
                assert!(resolve_insecure(None), "{value} should enable insecure");
            }
            // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
            unsafe {
                set_env(INSECURE_ENV_VAR, "yes");
            }
            let result = resolve_insecure(None);
            // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
            unsafe {
                remove_env(INSECURE_ENV_VAR);
            }
            assert!(!result);
        }

        #[test]
        fn test_default_is_false() {
            let _guard = ENV_TEST_MUTEX.lock().unwrap();
            // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
            unsafe {
                remove_env(INSECURE_ENV_VAR);
            }
            assert!(!resolve_insecure(None));
        }
    }

    mod probe_command {
        use super::*;

        #[test]
        fn test_blank_param_falls_back_to_default() {
            let _guard = ENV_TEST_MUTEX.lock().unwrap();
            // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
            unsafe {
                remove_env(PROBE_COMMAND_ENV_VAR);
            }
            assert_eq!(resolve_probe_command(Some("  ".into())), DEFAULT_PROBE_COMMAND);
        }

        #[test]
        fn test_param_is_used() {
            assert_eq!(resolve_probe_command(Some("uptime".into())), "uptime");
        }
    }

    mod settings {
        use super::*;

        #[test]
        fn test_env_populates_request() {
            let _guard = ENV_TEST_MUTEX.lock().unwrap();
            clear_all();
            // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
            unsafe {
                set_env(HOST_ENV_VAR, "10.43.1.1");
                set_env(USER_ENV_VAR, "ea");
                set_env(KEY_PATH_ENV_VAR, "/keys/id_rsa");
            }
            let settings = load_settings(Overrides::default());
            clear_all();

            let settings = settings.unwrap();
            assert_eq!(settings.request.host, "10.43.1.1");
            assert_eq!(settings.request.user, "ea");
            assert_eq!(settings.request.effective_port(), "22");
            assert_eq!(
                settings.request.key_path,
                Some(PathBuf::from("/keys/id_rsa"))
            );
            assert!(settings.request.password.is_none());
            assert_eq!(settings.policy, HostVerificationPolicy::Insecure);
            assert_eq!(
                settings.mode,
                SessionMode::Probe {
                    command: DEFAULT_PROBE_COMMAND.to_string()
                }
            );
        }

        #[test]
        fn test_overrides_beat_env() {
            let _guard = ENV_TEST_MUTEX.lock().unwrap();
            clear_all();
            // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
            unsafe {
                set_env(HOST_ENV_VAR, "env-host");
                set_env(PORT_ENV_VAR, "2200");
            }
            let settings = load_settings(Overrides {
                host: Some("flag-host".into()),
                shell: true,
                connect_timeout_secs: Some(11),
                ..Default::default()
            });
            clear_all();

            let settings = settings.unwrap();
            assert_eq!(settings.request.host, "flag-host");
            assert_eq!(settings.request.port, "2200");
            assert_eq!(settings.request.connect_timeout, Duration::from_secs(11));
            assert_eq!(settings.mode, SessionMode::Shell);
        }

        #[test]
        fn test_conflicting_host_policy_is_rejected() {
            let _guard = ENV_TEST_MUTEX.lock().unwrap();
            clear_all();
            let result = load_settings(Overrides {
                insecure: Some(true),
                known_hosts: Some(PathBuf::from("/home/u/.ssh/known_hosts")),
                ..Default::default()
            });
            assert!(matches!(result, Err(ConfigError::ConflictingHostPolicy)));
        }
    }
}
