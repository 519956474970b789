//! Sampler configuration and registry

pub mod chat_completion;

use crate::error::{Result, SimpEvalError};
use crate::types::Sampler;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;

/// Environment variable holding the provider access token
pub const TOKEN_ENV_VAR: &str = "OCTOAI_TOKEN";

pub const DEFAULT_SYSTEM_MESSAGE: &str = "You are a helpful assistant.";

/// Configuration shared by chat-completion style samplers
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerConfig {
    pub model_name: String,
    pub url: String,
    pub system_message: Option<String>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub max_retries: u32,
    pub timeout_seconds: u64,
}

impl SamplerConfig {
    /// Parse a flat `key=value,key=value` argument string.
    ///
    /// Unknown keys fail closed rather than being forwarded, and
    /// `model_name` and `url` are required.
    pub fn from_arg_string(args: &str) -> Result<Self> {
        let mut model_name = None;
        let mut url = None;
        let mut config = Self {
            model_name: String::new(),
            url: String::new(),
            system_message: Some(DEFAULT_SYSTEM_MESSAGE.to_string()),
            temperature: 0.0,
            max_tokens: 1024,
            max_retries: 3,
            timeout_seconds: 120,
        };
        config.apply_arg_string(args, &mut model_name, &mut url)?;

        config.model_name =
            model_name.ok_or_else(|| SimpEvalError::MissingField("model_name".to_string()))?;
        config.url = url.ok_or_else(|| SimpEvalError::MissingField("url".to_string()))?;
        Ok(config)
    }

    /// Parse `args` as overrides on an existing configuration.
    ///
    /// Used for the judge model, which typically only swaps `model_name`
    /// while keeping the endpoint of the primary sampler.
    pub fn with_overrides(&self, args: &str) -> Result<Self> {
        let mut model_name = Some(self.model_name.clone());
        let mut url = Some(self.url.clone());
        let mut config = self.clone();
        config.apply_arg_string(args, &mut model_name, &mut url)?;
        config.model_name = model_name.unwrap();
        config.url = url.unwrap();
        Ok(config)
    }

    fn apply_arg_string(
        &mut self,
        args: &str,
        model_name: &mut Option<String>,
        url: &mut Option<String>,
    ) -> Result<()> {
        for part in args.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            let (key, value) = part.split_once('=').ok_or_else(|| {
                SimpEvalError::InvalidModelArgs(format!("Invalid format: {}", part))
            })?;
            let key = key.trim();
            let value = value.trim();

            match key {
                "model_name" => *model_name = Some(value.to_string()),
                "url" => *url = Some(value.to_string()),
                "system_message" => {
                    self.system_message = if value.is_empty() {
                        None
                    } else {
                        Some(value.to_string())
                    }
                }
                "temperature" => {
                    self.temperature = value.parse().map_err(|_| {
                        SimpEvalError::ParseError(format!("Invalid temperature: {}", value))
                    })?
                }
                "max_tokens" => {
                    self.max_tokens = value.parse().map_err(|_| {
                        SimpEvalError::ParseError(format!("Invalid max_tokens: {}", value))
                    })?
                }
                "max_retries" => {
                    self.max_retries = value.parse().map_err(|_| {
                        SimpEvalError::ParseError(format!("Invalid max_retries: {}", value))
                    })?
                }
                "timeout" => {
                    self.timeout_seconds = value.parse().map_err(|_| {
                        SimpEvalError::ParseError(format!("Invalid timeout: {}", value))
                    })?
                }
                _ => return Err(SimpEvalError::UnrecognizedOption(key.to_string())),
            }
        }
        Ok(())
    }

    /// Serialize back to the `key=value` argument format
    pub fn to_arg_string(&self) -> String {
        let mut parts = vec![
            format!("model_name={}", self.model_name),
            format!("url={}", self.url),
        ];
        if let Some(ref msg) = self.system_message {
            parts.push(format!("system_message={}", msg));
        }
        parts.push(format!("temperature={}", self.temperature));
        parts.push(format!("max_tokens={}", self.max_tokens));
        parts.push(format!("max_retries={}", self.max_retries));
        parts.push(format!("timeout={}", self.timeout_seconds));
        parts.join(",")
    }
}

/// Sampler factory function type
type SamplerFactory = fn(SamplerConfig, String) -> Arc<dyn Sampler>;

static SAMPLER_REGISTRY: Lazy<HashMap<&'static str, SamplerFactory>> = Lazy::new(|| {
    let mut m: HashMap<&'static str, SamplerFactory> = HashMap::new();
    m.insert("chat_completion", |config, api_key| {
        Arc::new(chat_completion::ChatCompletionSampler::new(config, api_key))
    });
    m
});

/// Build a sampler by registry name from a raw argument string
pub fn get_sampler(name: &str, model_args: &str, api_key: &str) -> Result<Arc<dyn Sampler>> {
    let factory = SAMPLER_REGISTRY.get(name).ok_or_else(|| {
        let mut available: Vec<&str> = SAMPLER_REGISTRY.keys().copied().collect();
        available.sort_unstable();
        SimpEvalError::UnknownSampler(name.to_string(), available.join(", "))
    })?;
    let config = SamplerConfig::from_arg_string(model_args)?;
    Ok(factory(config, api_key.to_string()))
}

/// Build a sampler from an already-resolved configuration
pub fn get_sampler_with_config(
    name: &str,
    config: SamplerConfig,
    api_key: &str,
) -> Result<Arc<dyn Sampler>> {
    let factory = SAMPLER_REGISTRY.get(name).ok_or_else(|| {
        let mut available: Vec<&str> = SAMPLER_REGISTRY.keys().copied().collect();
        available.sort_unstable();
        SimpEvalError::UnknownSampler(name.to_string(), available.join(", "))
    })?;
    Ok(factory(config, api_key.to_string()))
}

/// All registered sampler names, sorted
pub fn available_samplers() -> Vec<&'static str> {
    let mut names: Vec<&str> = SAMPLER_REGISTRY.keys().copied().collect();
    names.sort_unstable();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_arg_string_defaults() {
        let config =
            SamplerConfig::from_arg_string("model_name=llama-3-8b,url=http://localhost:8000")
                .unwrap();
        assert_eq!(config.model_name, "llama-3-8b");
        assert_eq!(config.url, "http://localhost:8000");
        assert_eq!(config.temperature, 0.0);
        assert_eq!(config.max_tokens, 1024);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.timeout_seconds, 120);
        assert_eq!(
            config.system_message.as_deref(),
            Some(DEFAULT_SYSTEM_MESSAGE)
        );
    }

    #[test]
    fn test_from_arg_string_all_options() {
        let config = SamplerConfig::from_arg_string(
            "model_name=m,url=http://h,temperature=0.7,max_tokens=256,max_retries=5,timeout=30",
        )
        .unwrap();
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.max_tokens, 256);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.timeout_seconds, 30);
    }

    #[test]
    fn test_from_arg_string_rejects_unknown_key() {
        let err =
            SamplerConfig::from_arg_string("model_name=m,url=u,top_p=0.9").unwrap_err();
        assert!(matches!(err, SimpEvalError::UnrecognizedOption(ref k) if k == "top_p"));
    }

    #[test]
    fn test_from_arg_string_requires_model_and_url() {
        let err = SamplerConfig::from_arg_string("url=http://h").unwrap_err();
        assert!(matches!(err, SimpEvalError::MissingField(ref f) if f == "model_name"));
        let err = SamplerConfig::from_arg_string("model_name=m").unwrap_err();
        assert!(matches!(err, SimpEvalError::MissingField(ref f) if f == "url"));
    }

    #[test]
    fn test_from_arg_string_rejects_malformed_pair() {
        let err = SamplerConfig::from_arg_string("model_name=m,url=u,bogus").unwrap_err();
        assert!(matches!(err, SimpEvalError::InvalidModelArgs(_)));
    }

    #[test]
    fn test_parse_reserialize_roundtrip() {
        let original = SamplerConfig::from_arg_string(
            "model_name=m,url=http://h,temperature=0.5,max_tokens=64,max_retries=2,timeout=10",
        )
        .unwrap();
        let reparsed = SamplerConfig::from_arg_string(&original.to_arg_string()).unwrap();
        assert_eq!(original, reparsed);
    }

    #[test]
    fn test_with_overrides_swaps_model_only() {
        let base = SamplerConfig::from_arg_string("model_name=m,url=http://h,temperature=0.3")
            .unwrap();
        let judge = base.with_overrides("model_name=judge-model").unwrap();
        assert_eq!(judge.model_name, "judge-model");
        assert_eq!(judge.url, "http://h");
        assert_eq!(judge.temperature, 0.3);
    }

    #[test]
    fn test_get_sampler_unknown_name() {
        let err = get_sampler("nonexistent", "model_name=m,url=u", "token")
            .err()
            .unwrap();
        assert!(matches!(err, SimpEvalError::UnknownSampler(..)));
    }

    #[test]
    fn test_available_samplers() {
        assert!(available_samplers().contains(&"chat_completion"));
    }
}
