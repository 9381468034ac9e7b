// pgswap/src/storage/mod.rs
pub mod key;
pub mod local;
pub mod s3;

use crate::config::S3Settings;
use crate::errors::Result;
use local::LocalStorage;
use s3::S3Storage;

/// Where dumps live, selected by the scheme of the storage location.
///
/// Data never passes through this process: backends hand out shell fragments
/// that `pg_dump` and `pg_restore` are piped through.
#[derive(Debug, Clone)]
pub enum StorageClient {
    Local(LocalStorage),
    S3(S3Storage),
}

impl StorageClient {
    pub fn from_location(location: &str, s3: Option<&S3Settings>) -> Result<Self> {
        if location.starts_with("s3://") {
            let settings = s3.cloned().unwrap_or_default();
            Ok(StorageClient::S3(S3Storage::new(location, settings)?))
        } else {
            Ok(StorageClient::Local(LocalStorage::new(location)))
        }
    }

    /// Keys relative to the storage location starting with `prefix`, unordered.
    pub async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        match self {
            StorageClient::Local(local) => local.list(prefix),
            StorageClient::S3(s3) => s3.list(prefix).await,
        }
    }

    /// Fragment placed before a command that reads the dump on stdin.
    pub fn read_fragment(&self, key: &str) -> String {
        match self {
            StorageClient::Local(local) => local.read_fragment(key),
            StorageClient::S3(s3) => s3.read_fragment(key),
        }
    }

    /// Fragment placed after a command that writes the dump to stdout.
    pub fn write_fragment(&self, key: &str) -> Result<String> {
        match self {
            StorageClient::Local(local) => local.write_fragment(key),
            StorageClient::S3(s3) => Ok(s3.write_fragment(key)),
        }
    }

    pub fn credential_env(&self) -> Vec<(String, String)> {
        match self {
            StorageClient::Local(_) => Vec::new(),
            StorageClient::S3(s3) => s3.settings().env(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_selected_for_paths() -> anyhow::Result<()> {
        let storage = StorageClient::from_location(".pgswap/", None)?;
        assert!(matches!(storage, StorageClient::Local(_)));
        assert!(storage.credential_env().is_empty());
        Ok(())
    }

    #[test]
    fn test_s3_credentials_flow_into_env() -> anyhow::Result<()> {
        let settings = S3Settings {
            access_key_id: Some("AKIA".to_string()),
            secret_access_key: Some("secret".to_string()),
            ..Default::default()
        };
        let storage = StorageClient::S3(S3Storage::with_executable(
            "s3://bucket/",
            settings,
            "aws".to_string(),
        )?);
        let env = storage.credential_env();
        assert!(env.contains(&("AWS_ACCESS_KEY_ID".to_string(), "AKIA".to_string())));
        assert!(env.contains(&("AWS_SECRET_ACCESS_KEY".to_string(), "secret".to_string())));
        Ok(())
    }
}
