// ABOUTME: Configuration loading for agentcore — XDG config paths, TOML, provider secrets.

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;

use serde::Deserialize;

const APP_NAME: &str = "agentcore";

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub loop_driver: LoopDriverConfig,
    pub permissions: PermissionsConfig,
    pub compaction: CompactionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            loop_driver: LoopDriverConfig::default(),
            permissions: PermissionsConfig::default(),
            compaction: CompactionConfig::default(),
        }
    }
}

/// LLM provider configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "echo".to_string(),
            model: "claude-sonnet-4-5-20250929".to_string(),
            max_tokens: 4096,
        }
    }
}

/// Loop Driver run limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoopDriverConfig {
    pub max_steps_per_run: u64,
    pub approval_timeout_seconds: u64,
}

impl Default for LoopDriverConfig {
    fn default() -> Self {
        Self { max_steps_per_run: 50, approval_timeout_seconds: 120 }
    }
}

/// Runtime permission toggles.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PermissionsConfig {
    /// If true, the Approval Gate grants every request without asking (YOLO).
    pub bypass_approvals: bool,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self { bypass_approvals: false }
    }
}

/// Compaction configuration for automatic conversation summarization.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompactionConfig {
    pub enabled: bool,
    /// Override token limit triggering compaction (default: model's context window).
    pub threshold_token_limit: Option<u64>,
    pub threshold_ratio: f64,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        use crate::agent::compaction::COMPACTION_THRESHOLD_RATIO;
        Self { enabled: true, threshold_token_limit: None, threshold_ratio: COMPACTION_THRESHOLD_RATIO }
    }
}

impl Config {
    /// Load config from the XDG config path, falling back to defaults
    /// (and writing them out) if no config file exists yet.
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, default_config_toml())?;
        }
        let content = std::fs::read_to_string(&path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn config_dir() -> PathBuf {
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg_home).join(APP_NAME);
        }
        if let Some(base) = dirs::config_dir() {
            return base.join(APP_NAME);
        }
        if let Some(home) = dirs::home_dir() {
            return home.join(".config").join(APP_NAME);
        }
        PathBuf::from(".").join(APP_NAME)
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    pub fn secrets_env_path() -> PathBuf {
        Self::config_dir().join("secrets.env")
    }

    pub fn data_dir() -> PathBuf {
        if let Ok(xdg_data) = std::env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg_data).join(APP_NAME);
        }
        if let Some(base) = dirs::data_dir() {
            return base.join(APP_NAME);
        }
        if let Some(home) = dirs::home_dir() {
            return home.join(".local").join("share").join(APP_NAME);
        }
        PathBuf::from(".").join(APP_NAME)
    }

    /// Sessions directory inside the data directory — the default home for
    /// Context Store history files (`<sessions_dir>/<session-id>.jsonl`).
    pub fn sessions_dir() -> PathBuf {
        Self::data_dir().join("sessions")
    }
}

/// Interactive setup: initializes the XDG config dir and provider secrets.
pub fn run_setup() -> anyhow::Result<()> {
    let config_dir = Config::config_dir();
    std::fs::create_dir_all(&config_dir)?;

    let config_path = Config::config_path();
    if !config_path.exists() {
        std::fs::write(&config_path, default_config_toml())?;
        println!("Created {}", config_path.display());
    } else {
        println!("Using existing {}", config_path.display());
    }

    let secrets_path = Config::secrets_env_path();
    let mut env_map = load_env_file(&secrets_path)?;
    configure_provider_keys(&mut env_map)?;
    write_env_file(&secrets_path, &env_map)?;

    println!("Wrote {}", secrets_path.display());
    println!("Setup complete.");

    Ok(())
}

fn configure_provider_keys(env_map: &mut HashMap<String, String>) -> anyhow::Result<()> {
    let keys = [
        ("ANTHROPIC_API_KEY", "Anthropic"),
        ("OPENAI_API_KEY", "OpenAI"),
        ("GEMINI_API_KEY", "Google Gemini"),
    ];

    println!();
    println!("Configure AI provider keys (leave blank to skip):");
    for (key, provider_name) in keys {
        let existing = env_map.get(key).cloned().unwrap_or_default();
        let prompt = if existing.is_empty() {
            format!("{provider_name} ({key}): ")
        } else {
            format!("{provider_name} ({key}) [existing set, Enter to keep]: ")
        };

        let input = prompt_line(&prompt)?;
        let trimmed = input.trim();
        if trimmed.is_empty() {
            continue;
        }
        env_map.insert(key.to_string(), trimmed.to_string());
    }

    Ok(())
}

fn prompt_line(prompt: &str) -> anyhow::Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input)
}

fn load_env_file(path: &PathBuf) -> anyhow::Result<HashMap<String, String>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let mut map = HashMap::new();
    for line in std::fs::read_to_string(path)?.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            map.insert(k.trim().to_string(), v.trim().to_string());
        }
    }
    Ok(map)
}

fn write_env_file(path: &PathBuf, env_map: &HashMap<String, String>) -> anyhow::Result<()> {
    let mut keys = env_map.keys().cloned().collect::<Vec<_>>();
    keys.sort();

    let mut out = String::from("# agentcore provider secrets\n");
    for key in keys {
        if let Some(value) = env_map.get(&key) {
            out.push_str(&format!("{key}={value}\n"));
        }
    }

    std::fs::write(path, out)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)?;
    }

    Ok(())
}

fn default_config_toml() -> String {
    r#"[llm]
provider = "echo"
model = "claude-sonnet-4-5-20250929"
max_tokens = 4096

[loop_driver]
max_steps_per_run = 50
approval_timeout_seconds = 120

[permissions]
bypass_approvals = false

[compaction]
enabled = true
# threshold_token_limit = 180000
threshold_ratio = 0.9
"#
    .to_string()
}
