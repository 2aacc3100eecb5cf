//! Courier configuration loaded from a TOML file.

use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::TimeDelta;
use serde::Deserialize;

use crate::core::eosio::is_valid_name;
use crate::core::keys::PrivateKey;
use crate::core::registry::by_name;
use crate::core::types::RecipientQuota;
use crate::io::http::HttpRetry;

/// Upper bound for every `[timing]` value.
pub const MAX_TIMING_SECS: u64 = 365 * 24 * 60 * 60;

/// Courier configuration (TOML).
///
/// Missing fields default to the values the courier was tuned with; the
/// acting account, its key, and at least one recipient must be provided.
#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CourierConfig {
    /// Account that owns the assets and signs transfers.
    pub account: String,
    pub private_key: String,

    /// Optional account that co-signs and pays for resources.
    pub fee_payer: Option<FeePayerConfig>,

    /// Chain API base URL (without `/v1/chain`).
    pub rpc_url: String,

    /// Asset index base URL (without `/atomicassets/v1/assets`).
    pub assets_url: String,

    /// Collection the inventory scan is scoped to.
    pub collection: String,

    /// Outbound HTTP proxy as `host:port`.
    pub proxy: Option<String>,

    /// Page size for the single inventory query.
    pub scan_limit: u32,

    pub timing: TimingConfig,
    pub retry: RetryConfig,

    /// Recipients in priority order.
    pub recipients: Vec<RecipientQuota>,
}

#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct FeePayerConfig {
    pub account: String,
    pub private_key: String,
}

const REDACTED: &str = "<redacted>";

impl fmt::Debug for CourierConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CourierConfig")
            .field("account", &self.account)
            .field("private_key", &REDACTED)
            .field("fee_payer", &self.fee_payer)
            .field("rpc_url", &self.rpc_url)
            .field("assets_url", &self.assets_url)
            .field("collection", &self.collection)
            .field("proxy", &self.proxy)
            .field("scan_limit", &self.scan_limit)
            .field("timing", &self.timing)
            .field("retry", &self.retry)
            .field("recipients", &self.recipients)
            .finish()
    }
}

impl fmt::Debug for FeePayerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeePayerConfig")
            .field("account", &self.account)
            .field("private_key", &REDACTED)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimingConfig {
    /// Wait between HTTP retry attempts.
    pub request_interval_secs: u64,
    /// Cooldown before the next scan after a recoverable failure.
    pub min_scan_interval_secs: u64,
    /// Wait between successful cycles when running repeatedly.
    pub scan_interval_secs: u64,
    /// Pause after startup before the first scan.
    pub start_delay_secs: u64,
    /// Pause after each recipient's transfer.
    pub transfer_pause_secs: u64,
    /// Pause after each accepted transaction.
    pub success_pause_secs: u64,
    /// Per-request network timeout.
    pub request_timeout_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            request_interval_secs: 3,
            min_scan_interval_secs: 15,
            scan_interval_secs: 30 * 60,
            start_delay_secs: 3,
            transfer_pause_secs: 2,
            success_pause_secs: 1,
            request_timeout_secs: 30,
        }
    }
}

impl TimingConfig {
    fn fields(&self) -> [(&'static str, u64); 7] {
        [
            ("request_interval_secs", self.request_interval_secs),
            ("min_scan_interval_secs", self.min_scan_interval_secs),
            ("scan_interval_secs", self.scan_interval_secs),
            ("start_delay_secs", self.start_delay_secs),
            ("transfer_pause_secs", self.transfer_pause_secs),
            ("success_pause_secs", self.success_pause_secs),
            ("request_timeout_secs", self.request_timeout_secs),
        ]
    }

    pub fn request_interval(&self) -> Duration {
        Duration::from_secs(self.request_interval_secs)
    }

    pub fn min_scan_interval(&self) -> TimeDelta {
        secs_delta(self.min_scan_interval_secs)
    }

    pub fn scan_interval(&self) -> TimeDelta {
        secs_delta(self.scan_interval_secs)
    }

    pub fn start_delay(&self) -> Duration {
        Duration::from_secs(self.start_delay_secs)
    }

    pub fn transfer_pause(&self) -> Duration {
        Duration::from_secs(self.transfer_pause_secs)
    }

    pub fn success_pause(&self) -> Duration {
        Duration::from_secs(self.success_pause_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn secs_delta(secs: u64) -> TimeDelta {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts for retried HTTP calls (inventory scan).
    pub http_attempts: u32,
    /// Consecutive contract failures tolerated before stopping; absent means
    /// retry forever.
    pub max_contract_retries: Option<u32>,
    /// Clear the contract failure counter after a successful cycle.
    pub reset_error_count_on_success: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            http_attempts: 5,
            max_contract_retries: None,
            reset_error_count_on_success: false,
        }
    }
}

impl Default for CourierConfig {
    fn default() -> Self {
        Self {
            account: String::new(),
            private_key: String::new(),
            fee_payer: None,
            rpc_url: "https://wax.greymass.com".to_string(),
            assets_url: "https://wax.api.atomicassets.io".to_string(),
            collection: "farmersworld".to_string(),
            proxy: None,
            scan_limit: 1000,
            timing: TimingConfig::default(),
            retry: RetryConfig::default(),
            recipients: Vec::new(),
        }
    }
}

impl CourierConfig {
    pub fn validate(&self) -> Result<()> {
        if !is_valid_name(&self.account) {
            return Err(anyhow!("account {:?} is not a valid account name", self.account));
        }
        parse_key(&self.private_key).context("private_key")?;
        if let Some(fee_payer) = &self.fee_payer {
            if !is_valid_name(&fee_payer.account) {
                return Err(anyhow!(
                    "fee_payer.account {:?} is not a valid account name",
                    fee_payer.account
                ));
            }
            parse_key(&fee_payer.private_key).context("fee_payer.private_key")?;
        }
        for (field, url) in [("rpc_url", &self.rpc_url), ("assets_url", &self.assets_url)] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(anyhow!("{field} must be an http(s) URL"));
            }
        }
        if self.collection.trim().is_empty() {
            return Err(anyhow!("collection must be non-empty"));
        }
        if self.scan_limit == 0 {
            return Err(anyhow!("scan_limit must be > 0"));
        }
        if self.timing.request_timeout_secs == 0 {
            return Err(anyhow!("timing.request_timeout_secs must be > 0"));
        }
        if let Some((field, secs)) = self
            .timing
            .fields()
            .into_iter()
            .find(|(_, secs)| *secs > MAX_TIMING_SECS)
        {
            return Err(anyhow!(
                "timing.{field} is {secs}, must be <= {MAX_TIMING_SECS} (one year)"
            ));
        }
        if self.retry.http_attempts == 0 {
            return Err(anyhow!("retry.http_attempts must be > 0"));
        }
        if self.retry.max_contract_retries == Some(0) {
            return Err(anyhow!("retry.max_contract_retries must be > 0 when set"));
        }
        if self.recipients.is_empty() {
            return Err(anyhow!("recipients must list at least one account"));
        }
        for (index, recipient) in self.recipients.iter().enumerate() {
            if !is_valid_name(&recipient.account) {
                return Err(anyhow!(
                    "recipients[{index}].account {:?} is not a valid account name",
                    recipient.account
                ));
            }
            if let Some(unknown) = recipient.quota.keys().find(|name| by_name(name).is_none()) {
                return Err(anyhow!(
                    "recipients[{index}].quota has unknown category {unknown:?}"
                ));
            }
        }
        Ok(())
    }

    pub fn signing_key(&self) -> Result<PrivateKey> {
        parse_key(&self.private_key).context("private_key")
    }

    /// Retry settings for index and node requests.
    pub fn http_retry(&self) -> HttpRetry {
        HttpRetry {
            attempts: self.retry.http_attempts,
            wait: self.timing.request_interval(),
        }
    }
}

fn parse_key(raw: &str) -> Result<PrivateKey> {
    if raw.trim().is_empty() {
        return Err(anyhow!("must be non-empty"));
    }
    raw.parse()
}

/// Load and validate config from a TOML file.
pub fn load_config(path: &Path) -> Result<CourierConfig> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: CourierConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEV_WIF: &str = "5KQwrPbwdL6PhXujxW37FSSQZ1JiwsST4cqQzDeyXtP79zkvFD3";

    fn write(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("courier.toml");
        fs::write(&path, contents).expect("write");
        (temp, path)
    }

    fn minimal() -> String {
        format!(
            r#"
account = "alice.wam"
private_key = "{DEV_WIF}"

[[recipients]]
account = "bob.wam"
quota = {{ barley = 3, corn = -1 }}

[[recipients]]
account = "carol.wam"
quota = {{ milk = 2 }}
"#
        )
    }

    #[test]
    fn minimal_config_fills_defaults() {
        let (_temp, path) = write(&minimal());
        let cfg = load_config(&path).expect("load");

        assert_eq!(cfg.collection, "farmersworld");
        assert_eq!(cfg.scan_limit, 1000);
        assert_eq!(cfg.timing, TimingConfig::default());
        assert_eq!(cfg.retry.http_attempts, 5);
        assert_eq!(cfg.retry.max_contract_retries, None);
        assert_eq!(cfg.recipients.len(), 2);
        assert_eq!(cfg.recipients[0].account, "bob.wam");
        assert_eq!(cfg.recipients[0].quota["corn"], -1);
    }

    #[test]
    fn nested_sections_override_defaults() {
        let contents = format!(
            "{}\n[timing]\ntransfer_pause_secs = 0\n\n[retry]\nmax_contract_retries = 3\n\n[fee_payer]\naccount = \"payer.wam\"\nprivate_key = \"{DEV_WIF}\"\n",
            minimal()
        );
        let (_temp, path) = write(&contents);
        let cfg = load_config(&path).expect("load");

        assert_eq!(cfg.timing.transfer_pause_secs, 0);
        assert_eq!(cfg.timing.request_timeout_secs, 30);
        assert_eq!(cfg.retry.max_contract_retries, Some(3));
        assert_eq!(
            cfg.fee_payer.map(|payer| payer.account),
            Some("payer.wam".to_string())
        );
    }

    #[test]
    fn unknown_category_is_rejected() {
        let contents = minimal().replace("milk = 2", "wheat = 2");
        let (_temp, path) = write(&contents);
        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("unknown category \"wheat\""));
    }

    #[test]
    fn bad_private_key_is_rejected() {
        let contents = minimal().replace(DEV_WIF, "not-a-key");
        let (_temp, path) = write(&contents);
        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("private_key"));
    }

    #[test]
    fn timing_above_one_year_is_rejected() {
        let contents = format!(
            "{}\n[timing]\nscan_interval_secs = 10000000000000\n",
            minimal()
        );
        let (_temp, path) = write(&contents);
        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("timing.scan_interval_secs"));

        let contents = format!(
            "{}\n[timing]\nmin_scan_interval_secs = {MAX_TIMING_SECS}\n",
            minimal()
        );
        let (_temp, path) = write(&contents);
        assert!(load_config(&path).is_ok());
    }

    #[test]
    fn huge_interval_saturates_instead_of_panicking() {
        let timing = TimingConfig {
            scan_interval_secs: u64::MAX,
            min_scan_interval_secs: i64::MAX as u64,
            ..TimingConfig::default()
        };
        assert_eq!(timing.scan_interval(), TimeDelta::MAX);
        assert_eq!(timing.min_scan_interval(), TimeDelta::MAX);
    }

    #[test]
    fn debug_output_hides_private_keys() {
        let (_temp, path) = write(&format!(
            "{}\n[fee_payer]\naccount = \"payer.wam\"\nprivate_key = \"{DEV_WIF}\"\n",
            minimal()
        ));
        let cfg = load_config(&path).expect("load");
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains(DEV_WIF));
        assert!(rendered.contains("alice.wam"));
        assert!(rendered.contains("payer.wam"));
    }

    #[test]
    fn missing_file_names_the_path() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("missing.toml");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("missing.toml"));
    }
}
