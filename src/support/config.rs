// SPDX-License-Identifier: MIT

//! Settings loading - YAML file plus environment overrides
//!
//! API keys are never read from the file; see [`crate::llm::build_client`].

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::service::SupportService;
use super::store::{InMemoryTranscriptStore, JsonlTranscriptStore, TranscriptStore};
use super::workflow::{SupportWorkflow, ESCALATION_NOTICE};
use crate::error::SupportError;
use crate::llm::{self, CompletionSettings, Provider};

/// Settings file picked up when no path is given
pub const DEFAULT_SETTINGS_FILE: &str = "support.yaml";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub completion: CompletionSettings,
    pub workflow: WorkflowSettings,
    pub server: ServerSettings,
    pub transcripts: TranscriptSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkflowSettings {
    /// Deadline for each backend call; a run that hits it is cancelled
    pub call_timeout_secs: Option<u64>,
    pub escalation_notice: String,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            call_timeout_secs: None,
            escalation_notice: ESCALATION_NOTICE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TranscriptSettings {
    /// JSON-lines file; transcripts stay in memory when unset
    pub path: Option<PathBuf>,
}

impl Settings {
    /// Load settings from `path` (or `support.yaml` if it exists), then apply
    /// environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, SupportError> {
        let mut settings = match path {
            Some(path) => Self::load_file(path)?,
            None if Path::new(DEFAULT_SETTINGS_FILE).exists() => {
                Self::load_file(Path::new(DEFAULT_SETTINGS_FILE))?
            }
            None => Self::default(),
        };
        settings.apply_overrides(|key| env::var(key).ok())?;
        Ok(settings)
    }

    fn load_file(path: &Path) -> Result<Self, SupportError> {
        log::info!("Loading settings from {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::parse_yaml(&content)
    }

    pub fn parse_yaml(content: &str) -> Result<Self, SupportError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Apply overrides from a key lookup (the process environment in `load`)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), SupportError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = lookup("SUPPORT_PROVIDER").or_else(|| lookup("MODEL_PROVIDER")) {
            let provider = provider
                .parse::<Provider>()
                .map_err(SupportError::config)?;
            self.completion.provider = Some(provider);
        }
        if let Some(model) = lookup("SUPPORT_MODEL") {
            self.completion.model = model;
        }
        if let Some(secs) = lookup("SUPPORT_REQUEST_TIMEOUT_SECS") {
            self.completion.request_timeout_secs =
                parse_number("SUPPORT_REQUEST_TIMEOUT_SECS", &secs)?;
        }
        if let Some(secs) = lookup("SUPPORT_CALL_TIMEOUT_SECS") {
            self.workflow.call_timeout_secs =
                Some(parse_number("SUPPORT_CALL_TIMEOUT_SECS", &secs)?);
        }
        if let Some(host) = lookup("SUPPORT_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = parse_number("PORT", &port)?;
        }
        if let Some(origins) = lookup("SUPPORT_ALLOWED_ORIGINS") {
            self.server.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(path) = lookup("SUPPORT_TRANSCRIPTS_PATH") {
            self.transcripts.path = Some(PathBuf::from(path));
        }
        Ok(())
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.workflow.call_timeout_secs.map(Duration::from_secs)
    }

    /// Build the workflow engine, including its completion client
    pub fn build_workflow(&self) -> Result<SupportWorkflow, SupportError> {
        // an escalated run answers with the notice, so it must not be blank
        if self.workflow.escalation_notice.trim().is_empty() {
            return Err(SupportError::config("workflow.escalation_notice must not be blank"));
        }

        let client = llm::build_client(&self.completion)?;
        Ok(SupportWorkflow::new(client)
            .with_escalation_notice(self.workflow.escalation_notice.clone())
            .with_call_timeout(self.call_timeout()))
    }

    pub fn build_store(&self) -> Arc<dyn TranscriptStore> {
        match &self.transcripts.path {
            Some(path) => {
                log::info!("Saving transcripts to {}", path.display());
                Arc::new(JsonlTranscriptStore::new(path.clone()))
            }
            None => Arc::new(InMemoryTranscriptStore::new()),
        }
    }

    pub fn build_service(&self) -> Result<SupportService, SupportError> {
        let workflow = self.build_workflow()?;
        Ok(SupportService::new(Arc::new(workflow)).with_store(self.build_store()))
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, SupportError> {
    value
        .trim()
        .parse()
        .map_err(|_| SupportError::config(format!("{} must be a number, got '{}'", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 8000);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.allowed_origins.len(), 2);
        assert_eq!(settings.workflow.escalation_notice, ESCALATION_NOTICE);
        assert!(settings.call_timeout().is_none());
        assert!(settings.transcripts.path.is_none());
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(Settings::parse_yaml("").unwrap(), Settings::default());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
completion:
  provider: openai
  model: gpt-4o-mini
  temperature: 0.2
workflow:
  call_timeout_secs: 30
  escalation_notice: "A specialist will contact you shortly."
server:
  port: 9000
transcripts:
  path: data/transcripts.jsonl
"#;
        let settings = Settings::parse_yaml(yaml).unwrap();
        assert_eq!(settings.completion.provider(), Provider::OpenAI);
        assert_eq!(settings.completion.temperature, Some(0.2));
        assert_eq!(settings.call_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(
            settings.workflow.escalation_notice,
            "A specialist will contact you shortly."
        );
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(
            settings.transcripts.path,
            Some(PathBuf::from("data/transcripts.jsonl"))
        );
    }

    #[test]
    fn test_blank_escalation_notice_is_rejected() {
        for notice in ["\"\"", "\"   \""] {
            let yaml = format!("workflow:\n  escalation_notice: {}\n", notice);
            let settings = Settings::parse_yaml(&yaml).unwrap();
            match settings.build_workflow() {
                Err(SupportError::Config(message)) => {
                    assert!(message.contains("escalation_notice"))
                }
                Err(other) => panic!("Expected config error, got {:?}", other),
                Ok(_) => panic!("Expected blank escalation notice to be rejected"),
            }
        }
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        let err = Settings::parse_yaml("server: [").unwrap_err();
        assert!(matches!(err, SupportError::Yaml(_)));
    }

    #[test]
    fn test_overrides() {
        let mut settings = Settings::default();
        settings
            .apply_overrides(lookup(&[
                ("MODEL_PROVIDER", "Anthropic"),
                ("SUPPORT_MODEL", "claude-3-5-haiku-latest"),
                ("PORT", "8080"),
                ("SUPPORT_CALL_TIMEOUT_SECS", "15"),
                ("SUPPORT_ALLOWED_ORIGINS", "https://a.example, https://b.example,"),
            ]))
            .unwrap();

        assert_eq!(settings.completion.provider(), Provider::Anthropic);
        assert_eq!(settings.completion.model, "claude-3-5-haiku-latest");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.call_timeout(), Some(Duration::from_secs(15)));
        assert_eq!(
            settings.server.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
    }

    #[test]
    fn test_support_provider_takes_precedence() {
        let mut settings = Settings::default();
        settings
            .apply_overrides(lookup(&[
                ("SUPPORT_PROVIDER", "groq"),
                ("MODEL_PROVIDER", "openai"),
            ]))
            .unwrap();
        assert_eq!(settings.completion.provider, Some(Provider::Groq));
    }

    #[test]
    fn test_bad_overrides_are_config_errors() {
        let mut settings = Settings::default();
        let err = settings
            .apply_overrides(lookup(&[("PORT", "eighty")]))
            .unwrap_err();
        assert!(matches!(err, SupportError::Config(_)));

        let err = settings
            .apply_overrides(lookup(&[("SUPPORT_PROVIDER", "mystery")]))
            .unwrap_err();
        assert!(matches!(err, SupportError::Config(_)));
    }
}
