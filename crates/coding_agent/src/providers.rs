use agent_provider::{ModelTransport, ProviderInitError};
use agent_provider_chat_api::{ChatApiProviderConfig, ChatApiTransport};
use agent_provider_mock::MockTransport;

use crate::config::{AgentConfig, ProviderKind};

/// Builds the transport selected by `config.provider`.
pub fn transport_for(config: &AgentConfig) -> Result<Box<dyn ModelTransport>, ProviderInitError> {
    match config.provider {
        ProviderKind::Mock => Ok(Box::new(MockTransport::new(config.model.as_str()))),
        ProviderKind::ChatApi => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                ProviderInitError::new(
                    "LLM_API_KEY is required for the chat-api provider (use --provider mock to run offline)",
                )
            })?;

            let mut provider_config = ChatApiProviderConfig::new(api_key, config.model.as_str())
                .with_connect_timeout(config.request_timeout);
            if let Some(base_url) = &config.base_url {
                provider_config = provider_config.with_base_url(base_url.as_str());
            }
            Ok(Box::new(ChatApiTransport::new(provider_config)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn config(provider: ProviderKind, api_key: Option<&str>) -> AgentConfig {
        AgentConfig {
            workspace: std::env::temp_dir(),
            model: "gpt-test".to_string(),
            auto_approve: false,
            api_key: api_key.map(str::to_string),
            base_url: None,
            request_timeout: Duration::from_secs(5),
            truncate_lines: 10,
            verbose: false,
            autosave: true,
            session: None,
            sessions_dir: None,
            provider,
            max_iterations: 12,
            log_level: None,
        }
    }

    #[test]
    fn mock_provider_needs_no_credentials() {
        let transport = transport_for(&config(ProviderKind::Mock, None)).expect("mock transport");
        let profile = transport.profile();
        assert_eq!(profile.provider_id, "mock");
        assert_eq!(profile.model_id, "gpt-test");
    }

    #[test]
    fn chat_api_requires_an_api_key() {
        let error = match transport_for(&config(ProviderKind::ChatApi, None)) {
            Ok(_) => panic!("missing key should fail"),
            Err(error) => error,
        };
        assert!(error.message().contains("LLM_API_KEY"));
    }

    #[test]
    fn chat_api_builds_with_key() {
        let transport =
            transport_for(&config(ProviderKind::ChatApi, Some("sk-test"))).expect("transport");
        assert_eq!(transport.profile().provider_id, "chat-api");
    }
}
