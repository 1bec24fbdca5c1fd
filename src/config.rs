// src/config.rs
// STORAGE CONFIGURATION
// Connection settings for the S3-compatible endpoint. Every field can come from
// a flag or the matching environment variable.

use clap::Args;

#[derive(Debug, Clone, Default, Args)]
pub struct StorageConfig {
    /// Region of the object store
    #[arg(long, env = "AWS_REGION", global = true, value_name = "REGION")]
    pub region: Option<String>,

    /// Custom endpoint (MinIO, Ceph, LocalStack...)
    #[arg(long, env = "AWS_ENDPOINT_URL", global = true, value_name = "URL")]
    pub endpoint_url: Option<String>,

    /// Static access key (falls back to the default credential chain)
    #[arg(long, env = "AWS_ACCESS_KEY_ID", global = true, hide_env_values = true)]
    pub access_key_id: Option<String>,

    /// Static secret key
    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", global = true, hide_env_values = true)]
    pub secret_access_key: Option<String>,

    /// Use path-style addressing (required by most self-hosted stores)
    #[arg(long, env = "S3_FORCE_PATH_STYLE", global = true)]
    pub force_path_style: bool,
}

impl StorageConfig {
    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(id), Some(secret)) => Some((id.as_str(), secret.as_str())),
            _ => None,
        }
    }
}
