//! Deployment records left by the out-of-band deploy script under
//! `.deployments/<env>/deployments.json`. The client only reads them.

use chrono::{
    DateTime,
    Utc,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use serde::{
    Deserialize,
    Serialize,
};
use sha2::{
    Digest,
    Sha256,
};
use std::{
    fmt,
    fs,
    path::{
        Path,
        PathBuf,
    },
};

pub const DEPLOYMENTS_ROOT: &str = ".deployments";
const DEPLOYMENTS_FILE: &str = "deployments.json";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeploymentEnv {
    Dev,
    Test,
    Local,
}

impl DeploymentEnv {
    pub fn dir_name(self) -> &'static str {
        match self {
            DeploymentEnv::Dev => "dev",
            DeploymentEnv::Test => "test",
            DeploymentEnv::Local => "local",
        }
    }
}

impl fmt::Display for DeploymentEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeploymentEnv::Dev => "Devnet",
            DeploymentEnv::Test => "Testnet",
            DeploymentEnv::Local => "Local",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeploymentRecord {
    pub deployed_at: DateTime<Utc>,
    pub contract_id: String,
    /// sha256 of the ABI JSON the contract was built with.
    pub abi_hash: String,
    pub network_url: String,
    #[serde(default)]
    pub max_supply: Option<u64>,
    #[serde(default)]
    pub contract_salt: Option<String>,
}

impl DeploymentRecord {
    pub fn is_compatible_with_hash(&self, hash: &str) -> bool {
        self.abi_hash.eq_ignore_ascii_case(hash)
    }
}

#[derive(Debug)]
pub struct DeploymentStore {
    env: DeploymentEnv,
    path: PathBuf,
}

impl DeploymentStore {
    pub fn new(env: DeploymentEnv) -> Self {
        Self::under(Path::new(DEPLOYMENTS_ROOT), env)
    }

    pub fn under(root: &Path, env: DeploymentEnv) -> Self {
        Self {
            env,
            path: root.join(env.dir_name()).join(DEPLOYMENTS_FILE),
        }
    }

    pub fn load(&self) -> Result<Vec<DeploymentRecord>> {
        read_records(&self.path)
    }

    /// Most recent record built against `abi_hash`.
    pub fn latest_compatible(&self, abi_hash: &str) -> Result<Option<DeploymentRecord>> {
        let records = self.load()?;
        Ok(records
            .into_iter()
            .filter(|record| record.is_compatible_with_hash(abi_hash))
            .max_by_key(|record| record.deployed_at))
    }

    /// Human-readable explanation of why no usable record was found.
    pub fn summary(&self, abi_hash: &str) -> Result<String> {
        let records = self.load()?;
        let mut lines = vec![format!(
            "No {} deployment compatible with this client (abi {}) in {}",
            self.env,
            short_hash(abi_hash),
            self.path.display()
        )];
        if records.is_empty() {
            lines.push(String::from("No deployments recorded yet."));
        }
        for record in &records {
            lines.push(format!(
                "  {} {} abi {} at {}",
                record.deployed_at.format("%Y-%m-%d %H:%M"),
                record.contract_id,
                short_hash(&record.abi_hash),
                record.network_url
            ));
        }
        lines.push(String::from(
            "Redeploy the contract or pass --contract-id explicitly.",
        ));
        Ok(lines.join("\n"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn compute_abi_hash(abi_json: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(abi_json.as_bytes());
    hex::encode(hasher.finalize())
}

fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}

fn read_records(path: impl AsRef<Path>) -> Result<Vec<DeploymentRecord>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Vec::new());
    }
    let data = fs::read(path)
        .wrap_err_with(|| format!("Failed to read deployment records {}", path.display()))?;
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let records = serde_json::from_slice::<Vec<DeploymentRecord>>(&data)
        .wrap_err("Failed to parse deployment records JSON")?;
    Ok(records)
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use chrono::TimeZone;

    fn record(contract: &str, hash: &str, day: u32) -> DeploymentRecord {
        DeploymentRecord {
            deployed_at: Utc.with_ymd_and_hms(2025, 3, day, 12, 0, 0).unwrap(),
            contract_id: contract.to_string(),
            abi_hash: hash.to_string(),
            network_url: "http://localhost:4000/".to_string(),
            max_supply: Some(10),
            contract_salt: None,
        }
    }

    fn write(root: &Path, env: DeploymentEnv, records: &[DeploymentRecord]) {
        let dir = root.join(env.dir_name());
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(DEPLOYMENTS_FILE),
            serde_json::to_vec_pretty(records).unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn latest_compatible__picks_newest_matching_record() {
        // given
        let root = tempfile::tempdir().unwrap();
        write(
            root.path(),
            DeploymentEnv::Local,
            &[
                record("0xold", "aaaa", 1),
                record("0xnew", "aaaa", 9),
                record("0xother", "bbbb", 20),
            ],
        );
        let store = DeploymentStore::under(root.path(), DeploymentEnv::Local);

        // when
        let found = store.latest_compatible("AAAA").unwrap();

        // then
        assert_eq!(found.map(|r| r.contract_id), Some("0xnew".to_string()));
    }

    #[test]
    fn load__missing_file_has_no_records() {
        // given
        let root = tempfile::tempdir().unwrap();
        let store = DeploymentStore::under(root.path(), DeploymentEnv::Test);

        // when
        let records = store.load().unwrap();

        // then
        assert!(records.is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn load__tolerates_records_without_optional_fields() {
        // given
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("dev");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(DEPLOYMENTS_FILE),
            r#"[{"deployed_at":"2025-03-01T12:00:00Z","contract_id":"0x01","abi_hash":"cc","network_url":"https://devnet.fuel.network"}]"#,
        )
        .unwrap();
        let store = DeploymentStore::under(root.path(), DeploymentEnv::Dev);

        // when
        let records = store.load().unwrap();

        // then
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].max_supply, None);
    }

    #[test]
    fn summary__lists_known_deployments() {
        // given
        let root = tempfile::tempdir().unwrap();
        write(
            root.path(),
            DeploymentEnv::Local,
            &[record("0xabc", "deadbeefdeadbeef", 2)],
        );
        let store = DeploymentStore::under(root.path(), DeploymentEnv::Local);

        // when
        let summary = store.summary("0123456789abcdef").unwrap();

        // then
        assert!(summary.contains("No Local deployment compatible"));
        assert!(summary.contains("0xabc"));
        assert!(summary.contains("deadbeefdead"));
    }

    #[test]
    fn compute_abi_hash__is_stable_hex_sha256() {
        // when
        let hash = compute_abi_hash("");

        // then
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
