use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Settings for the link checker, fixed at construction time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// Probe attempts per URL before the correction engine takes over.
    pub max_retries: u32,
    /// Base retry delay; attempt N waits N times this.
    pub retry_delay_ms: u64,
    /// Where unmatched broken links are pointed.
    pub fallback_path: String,
    /// Emit a log line per applied correction.
    pub log_corrections: bool,
    /// Hard deadline per probe request.
    pub timeout_secs: u64,
    /// Upper bound on simultaneous probes.
    pub concurrency: usize,
    /// Minutes between periodic rescans in watch mode.
    pub interval_minutes: u64,
    /// Site origin; links to other hosts get the opaque-response trust rule.
    pub base_url: Option<String>,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 1000,
            fallback_path: "/404.html".to_string(),
            log_corrections: true,
            timeout_secs: 5,
            concurrency: 32,
            interval_minutes: 30,
            base_url: None,
        }
    }
}

impl CheckConfig {
    /// Load configuration from a JSON file; missing fields fall back to
    /// the defaults above.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config {}: {}", path.display(), e))?;
        serde_json::from_str(&content)
            .map_err(|e| format!("Invalid config {}: {}", path.display(), e))
    }

    /// Host component of `base_url`, if any.
    pub fn base_host(&self) -> Option<String> {
        self.base_url
            .as_deref()
            .and_then(|raw| url::Url::parse(raw).ok())
            .and_then(|u| u.host_str().map(String::from))
    }
}

/// Settings for the deploy pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Project root containing the marker file and package manifest.
    pub project_dir: PathBuf,
    /// Marker configuration file that must exist before anything runs.
    pub marker_file: String,
    /// Environment variable holding the hosting provider auth token.
    pub token_var: String,
    /// Package manager used for install/build/export.
    pub package_manager: String,
    /// Directory of exported static assets handed to the provider CLI.
    pub publish_dir: String,
    /// Attempts for the final deploy step. Earlier steps never retry.
    pub deploy_retries: u32,
    /// Fixed pause between deploy attempts.
    pub retry_pause_secs: u64,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            project_dir: PathBuf::from("."),
            marker_file: "netlify.toml".to_string(),
            token_var: "NETLIFY_AUTH_TOKEN".to_string(),
            package_manager: "npm".to_string(),
            publish_dir: "out".to_string(),
            deploy_retries: 3,
            retry_pause_secs: 5,
        }
    }
}
