use anyhow::{anyhow, Context, Result};
use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;

pub fn required_env(name: &str) -> Result<String> {
    let value = env::var(name).with_context(|| format!("missing env: {name}"))?;
    if value.trim().is_empty() {
        return Err(anyhow!("empty env: {name}"));
    }
    Ok(value)
}

pub fn optional_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn env_or(name: &str, default: &str) -> String {
    optional_env(name).unwrap_or_else(|| default.to_string())
}

pub fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match optional_env(name) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|err| anyhow!("invalid value for {name}: {err}")),
        None => Ok(default),
    }
}

pub fn socket_addr_from_env(name: &str, default: &str) -> Result<SocketAddr> {
    let value = env::var(name).unwrap_or_else(|_| default.to_string());
    SocketAddr::from_str(&value).map_err(|err| anyhow!("invalid socket addr for {name}: {err}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBackend {
    Firestore,
    Memory,
}

impl FromStr for DataBackend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(Self::Firestore),
            "memory" => Ok(Self::Memory),
            other => Err(anyhow!("unknown data backend: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    pub project_id: String,
    pub database: String,
    pub emulator_host: Option<String>,
    pub access_token: Option<String>,
}

impl FirestoreConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            project_id: required_env("FIRESTORE_PROJECT_ID")?,
            database: env_or("FIRESTORE_DATABASE", "(default)"),
            emulator_host: optional_env("FIRESTORE_EMULATOR_HOST"),
            access_token: optional_env("FIRESTORE_ACCESS_TOKEN"),
        })
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: String,
    pub emulator_host: Option<String>,
    pub access_token: Option<String>,
}

impl StorageConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            bucket: required_env("STORAGE_BUCKET")?,
            emulator_host: optional_env("STORAGE_EMULATOR_HOST"),
            access_token: optional_env("STORAGE_ACCESS_TOKEN")
                .or_else(|| optional_env("FIRESTORE_ACCESS_TOKEN")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EnvGuard {
        key: &'static str,
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            env::remove_var(self.key);
        }
    }

    fn set_env(key: &'static str, value: &str) -> EnvGuard {
        env::set_var(key, value);
        EnvGuard { key }
    }

    #[test]
    fn required_env_reads_value() {
        let _guard = set_env("CA_TEST_REQUIRED_ENV_PRESENT", "value");
        let value = required_env("CA_TEST_REQUIRED_ENV_PRESENT").unwrap();
        assert_eq!(value, "value");
    }

    #[test]
    fn required_env_missing_returns_error() {
        env::remove_var("CA_TEST_REQUIRED_ENV_MISSING");
        assert!(required_env("CA_TEST_REQUIRED_ENV_MISSING").is_err());
    }

    #[test]
    fn required_env_blank_returns_error() {
        let _guard = set_env("CA_TEST_REQUIRED_ENV_BLANK", "   ");
        assert!(required_env("CA_TEST_REQUIRED_ENV_BLANK").is_err());
    }

    #[test]
    fn socket_addr_from_env_uses_default() {
        env::remove_var("CA_TEST_SOCKET_DEFAULT");
        let addr = socket_addr_from_env("CA_TEST_SOCKET_DEFAULT", "127.0.0.1:1234").unwrap();
        assert_eq!(addr, "127.0.0.1:1234".parse().unwrap());
    }

    #[test]
    fn socket_addr_from_env_invalid_returns_error() {
        let _guard = set_env("CA_TEST_SOCKET_INVALID", "not-a-socket");
        assert!(socket_addr_from_env("CA_TEST_SOCKET_INVALID", "127.0.0.1:1234").is_err());
    }

    #[test]
    fn parse_env_falls_back_and_rejects_garbage() {
        env::remove_var("CA_TEST_PARSE_DEFAULT");
        assert_eq!(parse_env::<u64>("CA_TEST_PARSE_DEFAULT", 7).unwrap(), 7);

        let _guard = set_env("CA_TEST_PARSE_GARBAGE", "seven");
        assert!(parse_env::<u64>("CA_TEST_PARSE_GARBAGE", 7).is_err());
    }

    #[test]
    fn data_backend_parses_case_insensitively() {
        assert_eq!("Memory".parse::<DataBackend>().unwrap(), DataBackend::Memory);
        assert_eq!(
            " firestore ".parse::<DataBackend>().unwrap(),
            DataBackend::Firestore
        );
        assert!("postgres".parse::<DataBackend>().is_err());
    }
}
