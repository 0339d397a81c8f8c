//! Drive configuration module

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{DriveError, DriveResult};

/// Drive feature configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveConfig {
    /// Tenant buckets are named `<bucket_prefix><tenant id>`
    #[serde(default = "default_bucket_prefix")]
    pub bucket_prefix: String,

    /// Endpoint used to build public object URLs (e.g. http://10.0.0.5:9000)
    #[serde(default = "default_public_endpoint")]
    pub public_endpoint: String,

    /// Days a soft-deleted item stays in the recycle bin
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Maximum accepted upload size in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// IANA time zone used for fiscal years and schedules
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Cron expression of the recycle-bin purge
    #[serde(default = "default_purge_schedule")]
    pub purge_schedule: String,

    /// Cron expression of the fiscal-year rollover
    #[serde(default = "default_rollover_schedule")]
    pub rollover_schedule: String,
}

fn default_bucket_prefix() -> String {
    "ca-".to_string()
}

fn default_public_endpoint() -> String {
    "http://localhost:9000".to_string()
}

fn default_retention_days() -> u32 {
    90
}

fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

fn default_timezone() -> String {
    "Asia/Kolkata".to_string()
}

fn default_purge_schedule() -> String {
    "0 0 * * *".to_string()
}

fn default_rollover_schedule() -> String {
    "0 0 1 4 *".to_string()
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            bucket_prefix: default_bucket_prefix(),
            public_endpoint: default_public_endpoint(),
            retention_days: default_retention_days(),
            max_upload_bytes: default_max_upload_bytes(),
            timezone: default_timezone(),
            purge_schedule: default_purge_schedule(),
            rollover_schedule: default_rollover_schedule(),
        }
    }
}

impl DriveConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tz(&self) -> DriveResult<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| DriveError::Validation(format!("invalid timezone '{}': {}", self.timezone, e)))
    }

    /// Today's date in the configured time zone (UTC if the zone is invalid)
    pub fn today(&self) -> NaiveDate {
        self.local_date(Utc::now())
    }

    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        match self.tz() {
            Ok(tz) => crate::fiscal_year::local_date(&now.with_timezone(&tz)),
            Err(_) => now.date_naive(),
        }
    }

    pub fn validate(&self) -> DriveResult<()> {
        self.tz()?;
        if self.bucket_prefix.is_empty() {
            return Err(DriveError::Validation("bucket prefix cannot be empty".into()));
        }
        for expr in [&self.purge_schedule, &self.rollover_schedule] {
            croner::Cron::new(expr)
                .parse()
                .map_err(|e| DriveError::Validation(format!("invalid schedule '{}': {}", expr, e)))?;
        }
        Ok(())
    }
}
