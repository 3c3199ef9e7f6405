//! services/api/src/adapters/tts.rs
//!
//! Spoken replies for the care assistant, synthesized by OpenAI speech models.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::audio::{CreateSpeechRequest, SpeechModel, Voice},
    Client,
};
use async_trait::async_trait;
use mindi_core::ports::{PortError, PortResult, TextToSpeechService};
use tracing::debug;

/// Longest input the speech endpoint accepts, in characters.
pub const MAX_SPEECH_CHARS: usize = 4096;

fn parse_model(name: &str) -> Option<SpeechModel> {
    match name.trim().to_ascii_lowercase().as_str() {
        "tts-1" => Some(SpeechModel::Tts1),
        "tts-1-hd" => Some(SpeechModel::Tts1Hd),
        _ => None,
    }
}

fn parse_voice(name: &str) -> Option<Voice> {
    let voice = match name.trim().to_ascii_lowercase().as_str() {
        "alloy" => Voice::Alloy,
        "echo" => Voice::Echo,
        "fable" => Voice::Fable,
        "onyx" => Voice::Onyx,
        "nova" => Voice::Nova,
        "shimmer" => Voice::Shimmer,
        _ => return None,
    };
    Some(voice)
}

/// `TextToSpeechService` backed by the OpenAI audio API.
#[derive(Clone)]
pub struct OpenAiTtsAdapter {
    client: Client<OpenAIConfig>,
    model: SpeechModel,
    voice: Voice,
}

impl OpenAiTtsAdapter {
    pub fn new(client: Client<OpenAIConfig>, model: SpeechModel, voice: Voice) -> Self {
        Self {
            client,
            model,
            voice,
        }
    }

    /// Builds the adapter from the `TTS_MODEL` / `TTS_VOICE` settings.
    pub fn from_names(client: Client<OpenAIConfig>, model: &str, voice: &str) -> PortResult<Self> {
        let speech_model = parse_model(model)
            .ok_or_else(|| PortError::Unexpected(format!("Unsupported TTS model '{model}'")))?;
        let speech_voice = parse_voice(voice)
            .ok_or_else(|| PortError::Unexpected(format!("Unsupported TTS voice '{voice}'")))?;
        Ok(Self::new(client, speech_model, speech_voice))
    }
}

#[async_trait]
impl TextToSpeechService for OpenAiTtsAdapter {
    /// Returns MP3 bytes, the endpoint's default format.
    async fn generate_audio(&self, text: &str) -> PortResult<Vec<u8>> {
        let chars = text.chars().count();
        if chars > MAX_SPEECH_CHARS {
            return Err(PortError::Unexpected(format!(
                "Text of {chars} characters exceeds the {MAX_SPEECH_CHARS} character speech limit"
            )));
        }

        let request = CreateSpeechRequest {
            model: self.model.clone(),
            input: text.to_string(),
            voice: self.voice.clone(),
            ..Default::default()
        };
        let audio = self
            .client
            .audio()
            .speech()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(format!("Speech synthesis failed: {e}")))?;

        debug!(chars, bytes = audio.bytes.len(), "Synthesized speech");
        Ok(audio.bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_and_voice_names_are_case_insensitive() {
        assert!(matches!(parse_model("TTS-1-HD"), Some(SpeechModel::Tts1Hd)));
        assert!(matches!(parse_model(" tts-1 "), Some(SpeechModel::Tts1)));
        assert!(parse_model("gpt-4o").is_none());

        assert!(matches!(parse_voice("Nova"), Some(Voice::Nova)));
        assert!(parse_voice("baritone").is_none());
    }

    #[test]
    fn unknown_settings_are_rejected_at_construction() {
        let client = Client::with_config(OpenAIConfig::new().with_api_key("sk-test"));
        assert!(OpenAiTtsAdapter::from_names(client.clone(), "tts-1", "alloy").is_ok());
        assert!(OpenAiTtsAdapter::from_names(client.clone(), "tts-2", "alloy").is_err());
        assert!(OpenAiTtsAdapter::from_names(client, "tts-1", "robot").is_err());
    }
}
