// pgswap/src/storage/s3.rs
use aws_sdk_s3 as s3;
use s3::config::Region;
use tracing::debug;

use crate::config::S3Settings;
use crate::errors::{AppError, Result};
use crate::utils::{find_executable, shell_quote};

/// Dumps stored in an S3 bucket. Transfers stream through the `aws` CLI;
/// listing uses the SDK.
#[derive(Debug, Clone)]
pub struct S3Storage {
    bucket: String,
    prefix: String,
    settings: S3Settings,
    aws: String,
}

/// Splits `s3://bucket/prefix/` into bucket and key prefix.
pub fn parse_s3_location(location: &str) -> Result<(String, String)> {
    let uri = url::Url::parse(location).map_err(|e| {
        AppError::Configuration(format!("Invalid S3 storage location \"{}\": {}", location, e))
    })?;
    if uri.scheme() != "s3" {
        return Err(AppError::Configuration(
            "S3 storage location must start with s3://".to_string(),
        ));
    }
    let bucket = uri
        .host_str()
        .filter(|bucket| !bucket.is_empty())
        .ok_or_else(|| {
            AppError::Configuration(format!("S3 storage location \"{}\" is missing a bucket", location))
        })?
        .to_string();
    Ok((bucket, uri.path().trim_start_matches('/').to_string()))
}

impl S3Storage {
    /// Requires the `aws` executable, which performs the transfers.
    pub fn new(location: &str, settings: S3Settings) -> Result<Self> {
        let aws = find_executable("aws")?;
        Self::with_executable(location, settings, aws.to_string_lossy().into_owned())
    }

    pub fn with_executable(location: &str, settings: S3Settings, aws: String) -> Result<Self> {
        let (bucket, prefix) = parse_s3_location(location)?;
        Ok(S3Storage {
            bucket,
            prefix,
            settings,
            aws,
        })
    }

    pub fn settings(&self) -> &S3Settings {
        &self.settings
    }

    fn url(&self, key: &str) -> String {
        format!("s3://{}/{}{}", self.bucket, self.prefix, key)
    }

    fn endpoint_flag(&self) -> String {
        match &self.settings.endpoint_url {
            Some(endpoint) => format!(" --endpoint-url {}", shell_quote(endpoint)),
            None => String::new(),
        }
    }

    pub fn read_fragment(&self, key: &str) -> String {
        format!(
            "{} s3 cp {} -{} |",
            shell_quote(&self.aws),
            shell_quote(&self.url(key)),
            self.endpoint_flag()
        )
    }

    pub fn write_fragment(&self, key: &str) -> String {
        format!(
            "| {} s3 cp - {}{}",
            shell_quote(&self.aws),
            shell_quote(&self.url(key)),
            self.endpoint_flag()
        )
    }

    async fn client(&self) -> s3::Client {
        let mut loader = aws_config::defaults(s3::config::BehaviorVersion::latest());
        if let Some(endpoint) = &self.settings.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        if let Some(region) = &self.settings.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let (Some(key_id), Some(secret)) =
            (&self.settings.access_key_id, &self.settings.secret_access_key)
        {
            loader = loader.credentials_provider(s3::config::Credentials::new(
                key_id, secret, None, None, "Static",
            ));
        }
        s3::Client::new(&loader.load().await)
    }

    /// Keys relative to the storage location that start with `prefix`.
    pub async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let client = self.client().await;
        let full_prefix = format!("{}{}", self.prefix, prefix);
        debug!("Listing s3://{}/{}", self.bucket, full_prefix);

        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;
        loop {
            let mut request = client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&full_prefix);
            if let Some(token) = continuation_token {
                request = request.continuation_token(token);
            }

            let output = request.send().await.map_err(|e| {
                AppError::S3Sdk(format!("Failed to list s3://{}/{}: {}", self.bucket, full_prefix, e))
            })?;

            for object in output.contents.unwrap_or_default() {
                let Some(key) = object.key else { continue };
                if key.ends_with('/') {
                    continue;
                }
                if let Some(relative) = key.strip_prefix(&self.prefix) {
                    keys.push(relative.to_string());
                }
            }

            if output.is_truncated.unwrap_or(false) {
                continuation_token = output.next_continuation_token;
            } else {
                break;
            }
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(endpoint_url: Option<&str>) -> S3Storage {
        let settings = S3Settings {
            endpoint_url: endpoint_url.map(str::to_string),
            ..Default::default()
        };
        S3Storage::with_executable("s3://dumps/team/", settings, "aws".to_string()).unwrap()
    }

    #[test]
    fn test_parse_location() -> anyhow::Result<()> {
        assert_eq!(
            parse_s3_location("s3://dumps/team/")?,
            ("dumps".to_string(), "team/".to_string())
        );
        assert_eq!(parse_s3_location("s3://dumps/")?, ("dumps".to_string(), String::new()));
        assert!(matches!(
            parse_s3_location("/local/dir/"),
            Err(AppError::Configuration(_))
        ));
        assert!(matches!(
            parse_s3_location("s3://"),
            Err(AppError::Configuration(_))
        ));
        Ok(())
    }

    #[test]
    fn test_fragments() {
        let key = "host1/orders/none/2024-01-01-00-00-00-000000.dump";
        let s3 = storage(None);
        assert_eq!(
            s3.write_fragment(key),
            format!("| aws s3 cp - s3://dumps/team/{}", key)
        );
        assert_eq!(s3.read_fragment(key), format!("aws s3 cp s3://dumps/team/{} - |", key));
    }

    #[test]
    fn test_endpoint_url_is_appended() {
        let s3 = storage(Some("https://nyc3.digitaloceanspaces.com"));
        assert!(s3
            .write_fragment("k")
            .ends_with(" --endpoint-url https://nyc3.digitaloceanspaces.com"));
        assert!(s3
            .read_fragment("k")
            .ends_with(" - --endpoint-url https://nyc3.digitaloceanspaces.com |"));
    }
}
