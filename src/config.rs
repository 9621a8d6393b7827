use crate::services::backends::object_store::{DEFAULT_PRESIGN_TTL, UrlPolicy};
use anyhow::{Context, Result};
use clap::Parser;
use std::{env, path::PathBuf, time::Duration};

const DEFAULT_REGION: &str = "us-east-1";

/// Centralized application configuration.
/// Combines environment variables and CLI arguments; read once at startup.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Root of the filesystem backend.
    pub artworks_dir: PathBuf,
    /// Set when a bucket is configured; selects the object-store backend.
    pub object_store: Option<ObjectStoreConfig>,
    /// Set when the database overlay is enabled.
    pub database_url: Option<String>,
    pub admin_token: Option<String>,
}

/// Connection and URL settings for an S3-compatible bucket.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectStoreConfig {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub public_base_url: Option<String>,
    pub presign_ttl: Duration,
}

impl ObjectStoreConfig {
    /// Public URLs when a base URL is configured, pre-signed URLs otherwise.
    pub fn url_policy(&self) -> UrlPolicy {
        match &self.public_base_url {
            Some(base_url) => UrlPolicy::Public {
                base_url: base_url.clone(),
            },
            None => UrlPolicy::Presigned {
                ttl: self.presign_ttl,
            },
        }
    }
}

/// What the process should do after configuration is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    Serve,
    /// Apply database migrations and exit.
    Migrate,
    /// Copy a local artwork tree into the configured bucket and exit.
    Import(PathBuf),
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Artwork portfolio storage API")]
pub struct Args {
    /// Host to bind to (overrides HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory holding one folder per artwork (overrides ARTWORKS_DIR)
    #[arg(long)]
    pub artworks_dir: Option<PathBuf>,

    /// Overlay database URL (overrides DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,

    /// Upload every artwork folder under DIR to the bucket and exit
    #[arg(long, value_name = "DIR", conflicts_with = "migrate")]
    pub import_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and run mode.
    pub fn from_env_and_args() -> Result<(Self, RunMode)> {
        // Parse CLI once
        let args = Args::parse();
        let cfg = Self::from_sources(&args, |key| env::var(key).ok())?;
        Ok((cfg, args.run_mode()))
    }

    /// Merge `args` over values read through `lookup`.
    pub fn from_sources<F>(args: &Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_any = |keys: &[&str]| {
            keys.iter()
                .filter_map(|key| lookup(*key))
                .map(|value| value.trim().to_string())
                .find(|value| !value.is_empty())
        };

        // --- Environment fallback ---
        let env_host = env_any(&["HOST"]).unwrap_or_else(|| "0.0.0.0".into());
        let env_port = match env_any(&["PORT"]) {
            Some(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing PORT value `{}`", value))?,
            None => 8090,
        };
        let env_dir = env_any(&["ARTWORKS_DIR"]).unwrap_or_else(|| "./art".into());

        let object_store = env_any(&[
            "BUCKET_NAME",
            "BUCKET",
            "ARTWORKS_BUCKET",
            "OBJECT_STORAGE_BUCKET",
            "AWS_S3_BUCKET",
        ])
        .map(|bucket| {
            let region = env_any(&[
                "BUCKET_REGION",
                "REGION",
                "AWS_REGION",
                "S3_REGION",
                "OBJECT_STORAGE_REGION",
            ])
            .filter(|region| !region.eq_ignore_ascii_case("auto"))
            .unwrap_or_else(|| DEFAULT_REGION.into());
            let presign_ttl = env_any(&["ARTWORKS_PRESIGN_TTL_SECONDS"])
                .and_then(|value| value.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_PRESIGN_TTL);

            ObjectStoreConfig {
                bucket,
                region,
                endpoint: env_any(&[
                    "BUCKET_ENDPOINT",
                    "ENDPOINT",
                    "AWS_ENDPOINT_URL_S3",
                    "S3_ENDPOINT",
                    "OBJECT_STORAGE_ENDPOINT",
                ]),
                access_key_id: env_any(&[
                    "BUCKET_ACCESS_KEY_ID",
                    "ACCESS_KEY_ID",
                    "AWS_ACCESS_KEY_ID",
                    "OBJECT_STORAGE_ACCESS_KEY_ID",
                ]),
                secret_access_key: env_any(&[
                    "BUCKET_SECRET_ACCESS_KEY",
                    "SECRET_ACCESS_KEY",
                    "AWS_SECRET_ACCESS_KEY",
                    "OBJECT_STORAGE_SECRET_ACCESS_KEY",
                ]),
                public_base_url: env_any(&["ARTWORKS_PUBLIC_BASE_URL", "PUBLIC_BUCKET_BASE_URL"])
                    .map(|url| url.trim_end_matches('/').to_string()),
                presign_ttl,
            }
        });

        // --- Merge ---
        Ok(Self {
            host: args.host.clone().unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            artworks_dir: args.artworks_dir.clone().unwrap_or_else(|| env_dir.into()),
            object_store,
            database_url: args
                .database_url
                .clone()
                .or_else(|| env_any(&["DATABASE_URL"])),
            admin_token: env_any(&["ADMIN_TOKEN"]),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Args {
    pub fn run_mode(&self) -> RunMode {
        match (&self.import_dir, self.migrate) {
            (Some(dir), _) => RunMode::Import(dir.clone()),
            (None, true) => RunMode::Migrate,
            (None, false) => RunMode::Serve,
        }
    }
}
