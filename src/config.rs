use crate::store::BackendKind;
use std::path::PathBuf;

pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;
pub const DEFAULT_SCHOOL_NAME: &str = "JNV Doddabalapura";
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@localhost";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyMode {
    Outbox,
    Off,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub backend: BackendKind,
    pub workspace: Option<PathBuf>,
    pub school_name: String,
    pub admin_email: String,
    pub notify: NotifyMode,
    pub max_upload_bytes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            backend: BackendKind::Sqlite,
            workspace: None,
            school_name: DEFAULT_SCHOOL_NAME.to_string(),
            admin_email: DEFAULT_ADMIN_EMAIL.to_string(),
            notify: NotifyMode::Outbox,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {var}={value:?}: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: &'static str,
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Config, ConfigError> {
        let var = |k: &str| get(k).filter(|v| !v.trim().is_empty());
        let mut cfg = Config::default();

        if let Some(v) = var("ATTENDD_BACKEND") {
            cfg.backend = BackendKind::parse(&v).ok_or(ConfigError {
                var: "ATTENDD_BACKEND",
                value: v.clone(),
                reason: "expected sqlite or json",
            })?;
        }
        if let Some(v) = var("ATTENDD_WORKSPACE") {
            cfg.workspace = Some(PathBuf::from(v));
        }
        if let Some(v) = var("ATTENDD_SCHOOL_NAME") {
            cfg.school_name = v.trim().to_string();
        }
        if let Some(v) = var("ATTENDD_ADMIN_EMAIL") {
            if !v.contains('@') {
                return Err(ConfigError {
                    var: "ATTENDD_ADMIN_EMAIL",
                    value: v,
                    reason: "expected an email address",
                });
            }
            cfg.admin_email = v.trim().to_string();
        }
        if let Some(v) = var("ATTENDD_NOTIFY") {
            cfg.notify = match v.trim().to_ascii_lowercase().as_str() {
                "outbox" => NotifyMode::Outbox,
                "off" => NotifyMode::Off,
                _ => {
                    return Err(ConfigError {
                        var: "ATTENDD_NOTIFY",
                        value: v,
                        reason: "expected outbox or off",
                    })
                }
            };
        }
        if let Some(v) = var("ATTENDD_MAX_UPLOAD_BYTES") {
            cfg.max_upload_bytes = match v.trim().parse::<u64>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError {
                        var: "ATTENDD_MAX_UPLOAD_BYTES",
                        value: v,
                        reason: "expected a positive integer",
                    })
                }
            };
        }
        Ok(cfg)
    }
}
