use accredit_auth::ChallengeLimits;
use accredit_core::AttributeOrdering;
use accredit_tree::{DEFAULT_DEPTH, MAX_DEPTH};
use accredit_zk::{PoolConfig, PublicSignalLayout};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{RootError, RootResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Tree depth; capacity is `2^depth` leaves.
    #[serde(default = "default_depth")]
    pub depth: usize,
}

fn default_depth() -> usize {
    DEFAULT_DEPTH
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            depth: default_depth(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuanceSettings {
    #[serde(default = "default_issuer_id")]
    pub issuer_id: u64,

    #[serde(default = "default_max_serial_attempts")]
    pub max_serial_attempts: u32,

    /// Published attribute ordering. Issuance enforces it and the verifier
    /// maps revealed names to signing positions with it.
    #[serde(default = "default_attribute_ordering")]
    pub attribute_ordering: Vec<String>,
}

fn default_issuer_id() -> u64 {
    42
}

fn default_attribute_ordering() -> Vec<String> {
    [
        "name",
        "birth_year",
        "birth_month",
        "birth_day",
        "expiry_year",
        "expiry_month",
        "nationality",
    ]
    .map(String::from)
    .to_vec()
}

fn default_max_serial_attempts() -> u32 {
    3
}

impl Default for IssuanceSettings {
    fn default() -> Self {
        Self {
            issuer_id: default_issuer_id(),
            max_serial_attempts: default_max_serial_attempts(),
            attribute_ordering: default_attribute_ordering(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeConfig {
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,

    #[serde(default)]
    pub limits: ChallengeLimits,
}

fn default_ttl() -> u64 {
    accredit_auth::DEFAULT_CHALLENGE_TTL_SECS
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
            limits: ChallengeLimits::default(),
        }
    }
}

/// Which eligibility proving system to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EligibilityBackendKind {
    /// In-process predicate with HMAC-authenticated signals.
    #[default]
    Native,
    /// External circom/snarkjs PLONK toolchain.
    Snarkjs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityConfig {
    #[serde(default)]
    pub backend: EligibilityBackendKind,

    #[serde(default = "default_min_age")]
    pub min_age: u32,

    #[serde(default = "default_circuit_dir")]
    pub circuit_dir: PathBuf,

    #[serde(default = "default_circuit_name")]
    pub circuit_name: String,

    #[serde(default = "default_ptau_power")]
    pub ptau_power: u32,

    #[serde(default = "default_circom_bin")]
    pub circom_bin: String,

    #[serde(default = "default_snarkjs_bin")]
    pub snarkjs_bin: String,

    #[serde(default = "default_node_bin")]
    pub node_bin: String,

    #[serde(default)]
    pub pool: PoolConfig,

    #[serde(default)]
    pub signal_layout: PublicSignalLayout,

    /// Days the proving date in the public signals may differ from today (UTC).
    #[serde(default = "default_date_tolerance_days")]
    pub date_tolerance_days: u32,
}

fn default_date_tolerance_days() -> u32 {
    accredit_verify::DEFAULT_DATE_TOLERANCE_DAYS
}

fn default_min_age() -> u32 {
    accredit_zk::DEFAULT_MIN_AGE
}

fn default_circuit_dir() -> PathBuf {
    PathBuf::from("zk")
}

fn default_circuit_name() -> String {
    "eligibility".to_string()
}

fn default_ptau_power() -> u32 {
    12
}

fn default_circom_bin() -> String {
    "circom".to_string()
}

fn default_snarkjs_bin() -> String {
    "snarkjs".to_string()
}

fn default_node_bin() -> String {
    "node".to_string()
}

impl Default for EligibilityConfig {
    fn default() -> Self {
        Self {
            backend: EligibilityBackendKind::default(),
            min_age: default_min_age(),
            circuit_dir: default_circuit_dir(),
            circuit_name: default_circuit_name(),
            ptau_power: default_ptau_power(),
            circom_bin: default_circom_bin(),
            snarkjs_bin: default_snarkjs_bin(),
            node_bin: default_node_bin(),
            pool: PoolConfig::default(),
            signal_layout: PublicSignalLayout::default(),
            date_tolerance_days: default_date_tolerance_days(),
        }
    }
}

impl EligibilityConfig {
    pub fn snarkjs(&self) -> accredit_zk::SnarkjsConfig {
        accredit_zk::SnarkjsConfig {
            circuit_dir: self.circuit_dir.clone(),
            circuit_name: self.circuit_name.clone(),
            ptau_power: self.ptau_power,
            circom_bin: self.circom_bin.clone(),
            snarkjs_bin: self.snarkjs_bin.clone(),
            node_bin: self.node_bin.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Mark the pseudonym cookie `Secure`.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_secure_cookies() -> bool {
    true
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            secure_cookies: default_secure_cookies(),
        }
    }
}

/// Top-level configuration, loaded from `~/.accredit/config.toml` by default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootConfig {
    /// Holds keys, the tree snapshot and the published root record.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Domain separator for pseudonym derivation.
    #[serde(default = "default_domain_tag")]
    pub domain_tag: String,

    #[serde(default)]
    pub tree: TreeConfig,

    #[serde(default)]
    pub issuance: IssuanceSettings,

    #[serde(default)]
    pub challenge: ChallengeConfig,

    #[serde(default)]
    pub eligibility: EligibilityConfig,

    #[serde(default)]
    pub http: HttpConfig,
}

fn default_data_dir() -> PathBuf {
    dirs_or_default(".accredit")
}

fn default_domain_tag() -> String {
    accredit_verify::DEFAULT_DOMAIN_TAG.to_string()
}

/// `$HOME/<suffix>` if HOME is set, otherwise `./<suffix>`.
fn dirs_or_default(suffix: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(suffix))
        .unwrap_or_else(|_| PathBuf::from(suffix))
}

impl Default for RootConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            domain_tag: default_domain_tag(),
            tree: TreeConfig::default(),
            issuance: IssuanceSettings::default(),
            challenge: ChallengeConfig::default(),
            eligibility: EligibilityConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl RootConfig {
    /// Load from a TOML file; a missing file yields the defaults.
    pub fn load(path: &Path) -> RootResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config: RootConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> RootResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| RootError::Config(format!("TOML serialize error: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> RootResult<()> {
        if self.tree.depth == 0 || self.tree.depth > MAX_DEPTH {
            return Err(RootError::Config(format!(
                "tree.depth must be between 1 and {}, got {}",
                MAX_DEPTH, self.tree.depth
            )));
        }
        if self.domain_tag.is_empty() {
            return Err(RootError::Config("domain_tag must not be empty".into()));
        }
        if self.issuance.max_serial_attempts == 0 {
            return Err(RootError::Config(
                "issuance.max_serial_attempts must be > 0".into(),
            ));
        }
        if self.challenge.ttl_seconds == 0 {
            return Err(RootError::Config("challenge.ttl_seconds must be > 0".into()));
        }
        let limits = &self.challenge.limits;
        if limits.max_open_per_key == 0 || limits.max_records == 0 {
            return Err(RootError::Config(
                "challenge.limits max_open_per_key and max_records must be > 0".into(),
            ));
        }
        if self.attribute_ordering()?.is_empty() {
            return Err(RootError::Config(
                "issuance.attribute_ordering must not be empty".into(),
            ));
        }
        let pool = &self.eligibility.pool;
        if pool.max_concurrent == 0 || pool.timeout_ms == 0 {
            return Err(RootError::Config(
                "eligibility.pool max_concurrent and timeout_ms must be > 0".into(),
            ));
        }
        if !self.eligibility.signal_layout.is_distinct() {
            return Err(RootError::Config(
                "eligibility.signal_layout positions must be distinct".into(),
            ));
        }
        Ok(())
    }

    pub fn default_config_path() -> PathBuf {
        dirs_or_default(".accredit/config.toml")
    }

    pub fn attribute_ordering(&self) -> RootResult<AttributeOrdering> {
        AttributeOrdering::new(self.issuance.attribute_ordering.iter().cloned())
            .map_err(|e| RootError::Config(format!("issuance.attribute_ordering: {e}")))
    }

    pub fn issuance_config(&self) -> RootResult<accredit_cred::IssuanceConfig> {
        Ok(accredit_cred::IssuanceConfig {
            max_serial_attempts: self.issuance.max_serial_attempts,
            ordering: Some(self.attribute_ordering()?),
        })
    }

    pub fn verifier_config(&self) -> RootResult<accredit_verify::VerifierConfig> {
        Ok(accredit_verify::VerifierConfig {
            ordering: self.attribute_ordering()?,
            domain_tag: self.domain_tag.clone(),
            signal_layout: self.eligibility.signal_layout,
            date_tolerance_days: self.eligibility.date_tolerance_days,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RootConfig::default();
        assert!(config.data_dir.to_str().unwrap().contains(".accredit"));
        assert_eq!(config.domain_tag, "accredit-verifier");
        assert_eq!(config.tree.depth, DEFAULT_DEPTH);
        assert_eq!(config.issuance.issuer_id, 42);
        assert_eq!(config.challenge.ttl_seconds, 600);
        assert_eq!(config.eligibility.backend, EligibilityBackendKind::Native);
        assert_eq!(config.eligibility.min_age, 18);
        assert_eq!(config.http.port, 3000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
data_dir = "/tmp/accredit-test"
domain_tag = "clinic"

[tree]
depth = 4

[challenge]
ttl_seconds = 120

[eligibility]
backend = "snarkjs"
circuit_dir = "/opt/zk"

[eligibility.pool]
max_concurrent = 4
timeout_ms = 30000

[eligibility.signal_layout]
commitment = 0
merkle_root = 1

[http]
port = 8080
"#;
        let config: RootConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/accredit-test"));
        assert_eq!(config.domain_tag, "clinic");
        assert_eq!(config.tree.depth, 4);
        assert_eq!(config.challenge.ttl_seconds, 120);
        assert_eq!(config.eligibility.backend, EligibilityBackendKind::Snarkjs);
        assert_eq!(config.eligibility.pool.max_concurrent, 4);
        assert_eq!(config.eligibility.pool.max_retries, 1);
        assert_eq!(config.eligibility.signal_layout.eligible, None);
        assert_eq!(config.eligibility.signal_layout.current_date, None);
        assert_eq!(config.challenge.limits, ChallengeLimits::default());
        assert_eq!(config.eligibility.snarkjs().circuit_dir, PathBuf::from("/opt/zk"));
        assert_eq!(config.http.port, 8080);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_depth() {
        let mut config = RootConfig::default();
        config.tree.depth = 0;
        assert!(config.validate().is_err());
        config.tree.depth = MAX_DEPTH + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_ttl() {
        let mut config = RootConfig::default();
        config.challenge.ttl_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_overlapping_layout() {
        let mut config = RootConfig::default();
        config.eligibility.signal_layout.merkle_root = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_attribute_ordering() {
        let mut config = RootConfig::default();
        config.issuance.attribute_ordering.push("name".into());
        assert!(matches!(config.validate(), Err(RootError::Config(_))));

        config.issuance.attribute_ordering = vec!["pk_bind".into()];
        assert!(config.validate().is_err());

        config.issuance.attribute_ordering.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_challenge_limits() {
        let mut config = RootConfig::default();
        config.challenge.limits.max_open_per_key = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_derived_crate_configs() {
        let config = RootConfig::default();
        let issuance = config.issuance_config().unwrap();
        let verifier = config.verifier_config().unwrap();
        assert_eq!(issuance.ordering.as_ref(), Some(&verifier.ordering));
        assert_eq!(verifier.ordering.names()[0], "name");
        assert_eq!(verifier.date_tolerance_days, 1);
        assert!(verifier.signal_layout.current_date.is_some());
    }

    #[test]
    fn test_validate_empty_domain_tag() {
        let mut config = RootConfig::default();
        config.domain_tag.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let config = RootConfig::load(Path::new("/nonexistent/accredit.toml")).unwrap();
        assert_eq!(config.tree.depth, DEFAULT_DEPTH);
    }

    #[test]
    fn test_load_rejects_invalid() {
        let dir = std::env::temp_dir().join(format!("accredit-config-bad-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "[tree]\ndepth = 64\n").unwrap();
        assert!(matches!(RootConfig::load(&path), Err(RootError::Config(_))));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("accredit-config-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("config.toml");

        let mut config = RootConfig::default();
        config.data_dir = PathBuf::from("/tmp/accredit-data");
        config.tree.depth = 6;
        config.eligibility.backend = EligibilityBackendKind::Snarkjs;
        config.save(&path).unwrap();

        let loaded = RootConfig::load(&path).unwrap();
        assert_eq!(loaded.data_dir, PathBuf::from("/tmp/accredit-data"));
        assert_eq!(loaded.tree.depth, 6);
        assert_eq!(loaded.eligibility.backend, EligibilityBackendKind::Snarkjs);
        assert_eq!(loaded.eligibility.signal_layout, PublicSignalLayout::default());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
