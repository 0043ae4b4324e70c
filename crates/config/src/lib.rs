//! Configuration for logsift.
//!
//! Values are layered, later sources overriding earlier ones:
//! 1. Built-in defaults.
//! 2. A TOML file: the one passed explicitly, or `config.toml` in the
//!    platform config directory when it exists.
//! 3. `LOGSIFT_`-prefixed environment variables, with `__` separating nested
//!    keys (`LOGSIFT_SCAN__PAGE_SIZE=200`, `LOGSIFT_STORAGE__TYPE=s3`).

pub mod error;
mod models;

pub use crate::models::{Config, ScanConfig, StorageConfig};

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use logsift_search::{ScanSettings, StreamingScanner};
use logsift_storage::BackendHandle;
#[cfg(feature = "s3")]
use logsift_storage::backend::S3Backend;
use logsift_storage::backend::LocalBackend;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const ENV_PREFIX: &str = "LOGSIFT_";
const CONFIG_FILE: &str = "config.toml";

/// `config.toml` inside the platform config directory, if one can be
/// determined for this user.
pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "logsift").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

/// The layered sources, without extracting them.
///
/// An explicit `path` must exist; the default location is optional.
pub fn sources(path: Option<&Path>) -> Figment {
    let figment = Figment::from(Serialized::defaults(Config::default()));
    let figment = match (path, default_path()) {
        (Some(path), _) => figment.merge(Toml::file_exact(path)),
        (None, Some(path)) => figment.merge(Toml::file(path)),
        (None, None) => figment,
    };
    figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load and validate configuration.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let config = Config::from_figment(&sources(path))?;
    tracing::debug!(storage = config.storage.kind(), default_prefix = %config.default_prefix, "Loaded configuration");
    Ok(config)
}

impl Config {
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_prefix.trim_matches('/').trim().is_empty() {
            exn::bail!(ErrorKind::Invalid("default_prefix must not be empty".to_string()));
        }
        if self.scan.page_size == 0 {
            exn::bail!(ErrorKind::Invalid("scan.page_size must be at least 1".to_string()));
        }
        if self.scan.progress_every == 0 {
            exn::bail!(ErrorKind::Invalid("scan.progress_every must be at least 1".to_string()));
        }
        if self.scan.suffix.is_empty() {
            exn::bail!(ErrorKind::Invalid("scan.suffix must not be empty".to_string()));
        }
        if let StorageConfig::S3 { bucket, .. } = &self.storage
            && bucket.trim().is_empty()
        {
            exn::bail!(ErrorKind::Invalid("storage.bucket must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn scan_settings(&self) -> ScanSettings {
        ScanSettings::from(&self.scan)
    }

    /// Construct the configured storage backend.
    pub fn build_backend(&self) -> Result<BackendHandle> {
        match &self.storage {
            StorageConfig::Local { root } => {
                let root = std::path::absolute(root).or_raise(|| ErrorKind::Storage)?;
                let backend = LocalBackend::new("local", &root).or_raise(|| ErrorKind::Storage)?;
                Ok(Arc::new(backend))
            },
            #[cfg(feature = "s3")]
            StorageConfig::S3 { bucket, prefix, region, endpoint, key_id, key_secret } => {
                let endpoint = endpoint.as_deref();
                let backend = S3Backend::new("s3", bucket, prefix.clone(), region, endpoint, key_id, key_secret)
                    .or_raise(|| ErrorKind::Storage)?;
                Ok(Arc::new(backend))
            },
            #[cfg(not(feature = "s3"))]
            StorageConfig::S3 { .. } => {
                exn::bail!(ErrorKind::Invalid("built without S3 support".to_string()))
            },
        }
    }

    /// A scanner over the configured backend with the configured settings.
    pub fn build_scanner(&self) -> Result<StreamingScanner> {
        let scanner = StreamingScanner::new(self.build_backend()?, self.scan_settings());
        Ok(scanner.with_default_prefix(self.default_prefix.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use logsift_search::MatchMode;
    use rstest::rstest;
    use std::time::Duration;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::from_figment(&Figment::from(Serialized::defaults(Config::default()))).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.default_prefix, "default");
        assert_eq!(config.scan_settings(), ScanSettings::default());
    }

    #[test]
    fn test_file_and_env_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "logsift.toml",
                r#"
                default_prefix = "Partner"

                [storage]
                type = "s3"
                bucket = "partner-logs"
                key_id = "id"
                key_secret = "secret"

                [scan]
                page_size = 200
                match_mode = "boundary"
                "#,
            )?;
            jail.set_env("LOGSIFT_SCAN__PAGE_SIZE", "50");
            jail.set_env("LOGSIFT_STORAGE__REGION", "eu-west-1");
            let config = load(Some(Path::new("logsift.toml"))).map_err(|e| format!("{e:?}"))?;
            assert_eq!(config.default_prefix, "Partner");
            assert_eq!(config.scan.page_size, 50);
            assert_eq!(config.scan.match_mode, MatchMode::Boundary);
            assert_eq!(config.scan.suffix, ".txt");
            assert_eq!(
                config.storage,
                StorageConfig::S3 {
                    bucket: "partner-logs".to_string(),
                    prefix: None,
                    region: "eu-west-1".to_string(),
                    endpoint: None,
                    key_id: "id".to_string(),
                    key_secret: "secret".to_string(),
                }
            );
            Ok(())
        });
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let err = load(Some(Path::new("/definitely/not/here/logsift.toml"))).unwrap_err();
        assert_eq!(*err, ErrorKind::Load);
    }

    #[test]
    fn test_scan_durations() {
        let settings = ScanSettings::from(&ScanConfig {
            keepalive_secs: 5,
            progress_secs: 2,
            retry_ms: 1500,
            ..ScanConfig::default()
        });
        assert_eq!(settings.keepalive_interval, Duration::from_secs(5));
        assert_eq!(settings.progress_interval, Duration::from_secs(2));
        assert_eq!(settings.retry_hint, Duration::from_millis(1500));
    }

    #[rstest]
    #[case(r#"default_prefix = "/""#)]
    #[case("[scan]\npage_size = 0")]
    #[case("[scan]\nprogress_every = 0")]
    #[case("[scan]\nsuffix = \"\"")]
    #[case("[storage]\ntype = \"s3\"\nbucket = \" \"\nkey_id = \"a\"\nkey_secret = \"b\"")]
    fn test_invalid_values(#[case] toml: &str) {
        let figment = Figment::from(Serialized::defaults(Config::default())).merge(Toml::string(toml));
        let err = Config::from_figment(&figment).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)), "{toml}: {:?}", *err);
    }

    #[rstest]
    #[case("[scan]\nmatch_mode = \"fuzzy\"")]
    #[case("[storage]\ntype = \"ftp\"")]
    #[case("[storage]\ntype = \"s3\"\nkey_id = \"a\"\nkey_secret = \"b\"")]
    fn test_undeserializable_values(#[case] toml: &str) {
        let figment = Figment::from(Serialized::defaults(Config::default())).merge(Toml::string(toml));
        let err = Config::from_figment(&figment).unwrap_err();
        assert_eq!(*err, ErrorKind::Load);
    }

    #[test]
    fn test_local_backend() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            storage: StorageConfig::Local { root: dir.path().to_path_buf() },
            ..Config::default()
        };
        assert_eq!(config.build_backend().unwrap().name(), "local");
        let scanner = config.build_scanner().unwrap();
        assert_eq!(scanner.settings(), &ScanSettings::default());
    }

    #[test]
    fn test_missing_local_root() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            storage: StorageConfig::Local { root: dir.path().join("missing") },
            ..Config::default()
        };
        assert_eq!(*config.build_backend().err().unwrap(), ErrorKind::Storage);
    }
}
