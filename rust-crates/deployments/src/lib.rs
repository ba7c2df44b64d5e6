use anyhow::{
    Context,
    Result,
    anyhow,
};
use chrono::Utc;
use serde::{
    Deserialize,
    Serialize,
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

/// Where the two contracts live on one network, and which ABI they were
/// deployed with. Addresses are kept as hex strings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeploymentRecord {
    pub deployed_at: String,
    pub network_url: String,
    pub chain_id: u64,
    pub cartela_contract: String,
    pub bingo_game_contract: String,
    #[serde(default)]
    pub cartela_abi_fingerprint: Option<String>,
    #[serde(default)]
    pub bingo_game_abi_fingerprint: Option<String>,
    #[serde(default)]
    pub deployment_block_height: Option<u64>,
}

impl DeploymentRecord {
    pub fn new(
        network_url: impl Into<String>,
        chain_id: u64,
        cartela_contract: impl Into<String>,
        bingo_game_contract: impl Into<String>,
    ) -> Self {
        Self {
            deployed_at: Utc::now().to_rfc3339(),
            network_url: network_url.into(),
            chain_id,
            cartela_contract: cartela_contract.into(),
            bingo_game_contract: bingo_game_contract.into(),
            cartela_abi_fingerprint: None,
            bingo_game_abi_fingerprint: None,
            deployment_block_height: None,
        }
    }

    /// A record without fingerprints predates fingerprinting and is trusted.
    pub fn is_compatible_with(&self, cartela_fp: &str, bingo_game_fp: &str) -> bool {
        let matches = |stored: &Option<String>, expected: &str| {
            stored.as_deref().is_none_or(|stored| stored == expected)
        };
        matches(&self.cartela_abi_fingerprint, cartela_fp)
            && matches(&self.bingo_game_abi_fingerprint, bingo_game_fp)
    }
}

#[derive(Debug)]
pub struct DeploymentStore {
    path: PathBuf,
}

impl DeploymentStore {
    pub fn new(env: DeploymentEnv) -> Result<Self> {
        let path = ensure_store(Path::new(DEPLOYMENTS_ROOT), env)?;
        Ok(Self { path })
    }

    /// Store backed by an explicit file, created empty when missing.
    pub fn at(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create deployment directory {}", parent.display())
            })?;
        }
        if !path.exists() {
            fs::write(&path, b"").with_context(|| {
                format!("Failed to create deployment record file {}", path.display())
            })?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Latest record, if any.
    pub fn load(&self) -> Result<Option<DeploymentRecord>> {
        Ok(self.load_all()?.pop())
    }

    /// All records, oldest first.
    pub fn load_all(&self) -> Result<Vec<DeploymentRecord>> {
        read_records(&self.path)
    }

    pub fn append(&self, record: DeploymentRecord) -> Result<()> {
        let mut records = self.load_all()?;
        records.push(record);
        write_records(&self.path, &records)
    }

    /// Replaces the whole history with a single record.
    pub fn save(&self, record: DeploymentRecord) -> Result<()> {
        write_records(&self.path, &[record])
    }
}

pub fn ensure_structure() -> Result<()> {
    ensure_structure_in(Path::new(DEPLOYMENTS_ROOT))
}

pub fn ensure_structure_in(root: &Path) -> Result<()> {
    for env in [
        DeploymentEnv::Dev,
        DeploymentEnv::Test,
        DeploymentEnv::Local,
    ] {
        let _ = ensure_store(root, env)?;
    }
    Ok(())
}

fn ensure_store(root: &Path, env: DeploymentEnv) -> Result<PathBuf> {
    let env_dir = root.join(env.dir_name());
    if !env_dir.exists() {
        fs::create_dir_all(&env_dir).with_context(|| {
            format!(
                "Failed to create {}/{} directory",
                root.display(),
                env.dir_name()
            )
        })?;
    }

    let file_path = env_dir.join(DEPLOYMENTS_FILE);
    if !file_path.exists() {
        fs::write(&file_path, b"").with_context(|| {
            format!(
                "Failed to create deployment record file for {} at {:?}",
                env, file_path
            )
        })?;
    }

    Ok(file_path)
}

fn read_records(path: impl AsRef<Path>) -> Result<Vec<DeploymentRecord>> {
    let data = fs::read(path.as_ref()).context("Failed to read deployment records")?;
    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    if let Ok(records) = serde_json::from_slice::<Vec<DeploymentRecord>>(&data) {
        return Ok(records);
    }
    if let Ok(record) = serde_json::from_slice::<DeploymentRecord>(&data) {
        return Ok(vec![record]);
    }
    Err(anyhow!(
        "Failed to parse deployment record JSON at {}; expected an array of deployments",
        path.as_ref().display()
    ))
}

fn write_records(path: impl AsRef<Path>, records: &[DeploymentRecord]) -> Result<()> {
    let json = serde_json::to_vec_pretty(records)
        .context("Failed to serialize deployment records")?;
    fs::write(path.as_ref(), json).context("Failed to write deployment records")?;
    Ok(())
}
