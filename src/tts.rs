//! Google Cloud Text-to-Speech client.
//!
//! Only validated story text may be handed to `synthesize`; the caller
//! enforces that before submitting anything.

use std::path::PathBuf;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::warn;

const TTS_API_BASE: &str = "https://texttospeech.googleapis.com/v1";
const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;
const AUDIO_DIR: &str = "audio_files";

// Slightly slower pace reads better for young listeners.
const SPEAKING_RATE: f64 = 0.95;

/// A curated voice from the synthesis catalog.
pub struct Voice {
    pub key: &'static str,
    pub name: &'static str,
    pub gender: &'static str,
    pub description: &'static str,
}

pub const VOICES: &[Voice] = &[
    Voice {
        key: "chirp_female_1",
        name: "en-US-Journey-F",
        gender: "FEMALE",
        description: "Natural, warm female voice - great for storytelling",
    },
    Voice {
        key: "chirp_male_1",
        name: "en-US-Journey-D",
        gender: "MALE",
        description: "Clear, engaging male voice - excellent for narration",
    },
    Voice {
        key: "chirp_female_2",
        name: "en-US-Journey-O",
        gender: "FEMALE",
        description: "Expressive female voice - perfect for character stories",
    },
    Voice {
        key: "studio_female",
        name: "en-US-Studio-O",
        gender: "FEMALE",
        description: "Studio quality female voice",
    },
    Voice {
        key: "studio_male",
        name: "en-US-Studio-M",
        gender: "MALE",
        description: "Studio quality male voice",
    },
];

pub fn voice_by_key(key: &str) -> Option<&'static Voice> {
    VOICES.iter().find(|v| v.key == key)
}

pub fn voice_keys() -> Vec<&'static str> {
    VOICES.iter().map(|v| v.key).collect()
}

// ── Wire types ──

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeRequest<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    audio_config: AudioConfig<'a>,
}

#[derive(Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig<'a> {
    audio_encoding: &'a str,
    speaking_rate: f64,
    pitch: f64,
    volume_gain_db: f64,
    effects_profile_id: &'a [&'a str],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: String,
}

#[derive(Deserialize)]
struct VoicesResponse {
    #[serde(default)]
    voices: Vec<VoiceInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceInfo {
    pub name: String,
    #[serde(default)]
    pub language_codes: Vec<String>,
    #[serde(default)]
    pub ssml_gender: String,
}

// ── Client ──

pub struct TtsClient {
    http: reqwest::Client,
    api_key: String,
}

impl TtsClient {
    pub fn new() -> Result<Self> {
        let api_key = std::env::var("GOOGLE_TTS_API_KEY")
            .map_err(|_| anyhow::anyhow!("GOOGLE_TTS_API_KEY environment variable must be set"))?;
        Ok(Self {
            http: reqwest::Client::new(),
            api_key,
        })
    }

    /// Synthesize one story body to MP3 bytes, retrying on rate limits and
    /// server errors with exponential backoff.
    pub async fn synthesize(&self, text: &str, voice: &Voice) -> Result<Vec<u8>> {
        let body = SynthesizeRequest {
            input: SynthesisInput { text },
            voice: VoiceSelection {
                language_code: "en-US",
                name: voice.name,
            },
            audio_config: AudioConfig {
                audio_encoding: "MP3",
                speaking_rate: SPEAKING_RATE,
                pitch: 0.0,
                volume_gain_db: 0.0,
                effects_profile_id: &["headphone-class-device"],
            },
        };
        let url = format!("{}/text:synthesize?key={}", TTS_API_BASE, self.api_key);

        let mut attempt = 0;
        loop {
            let response = self.http.post(&url).json(&body).send().await?;
            let status = response.status();

            let retryable = status.as_u16() == 429 || status.is_server_error();
            if retryable && attempt < MAX_RETRIES {
                let backoff =
                    std::time::Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
                warn!(
                    "Synthesis returned {} (attempt {}/{}), backing off {:.1}s",
                    status,
                    attempt + 1,
                    MAX_RETRIES,
                    backoff.as_secs_f64()
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
                continue;
            }

            if !status.is_success() {
                let detail = response.text().await.unwrap_or_default();
                anyhow::bail!("Synthesis request failed: {} {}", status, detail);
            }

            let parsed: SynthesizeResponse =
                response.json().await.context("Invalid synthesis response")?;
            return BASE64
                .decode(parsed.audio_content)
                .context("Invalid audio content encoding");
        }
    }

    /// Full voice catalog from the API.
    pub async fn list_voices(&self) -> Result<Vec<VoiceInfo>> {
        let url = format!("{}/voices?key={}", TTS_API_BASE, self.api_key);
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Voice listing failed: {}", status);
        }
        let parsed: VoicesResponse = response.json().await.context("Invalid voices response")?;
        Ok(parsed.voices)
    }
}

/// Write synthesized audio under the local audio directory.
pub fn save_audio(story_id: &str, audio: &[u8]) -> Result<PathBuf> {
    std::fs::create_dir_all(AUDIO_DIR)?;
    let path = PathBuf::from(AUDIO_DIR).join(format!("{}.mp3", story_id));
    std::fs::write(&path, audio)
        .with_context(|| format!("Failed to write audio file {}", path.display()))?;
    Ok(path)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_lookup() {
        assert_eq!(voice_by_key("chirp_female_1").unwrap().name, "en-US-Journey-F");
        assert!(voice_by_key("nope").is_none());
    }

    #[test]
    fn voice_keys_are_unique() {
        let keys = voice_keys();
        let mut deduped = keys.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(keys.len(), deduped.len());
    }

    #[test]
    fn synthesize_request_wire_shape() {
        let body = SynthesizeRequest {
            input: SynthesisInput { text: "Once upon a time" },
            voice: VoiceSelection {
                language_code: "en-US",
                name: "en-US-Journey-F",
            },
            audio_config: AudioConfig {
                audio_encoding: "MP3",
                speaking_rate: SPEAKING_RATE,
                pitch: 0.0,
                volume_gain_db: 0.0,
                effects_profile_id: &["headphone-class-device"],
            },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["input"]["text"], "Once upon a time");
        assert_eq!(value["voice"]["languageCode"], "en-US");
        assert_eq!(value["audioConfig"]["audioEncoding"], "MP3");
        assert_eq!(value["audioConfig"]["speakingRate"], 0.95);
        assert_eq!(
            value["audioConfig"]["effectsProfileId"][0],
            "headphone-class-device"
        );
    }

    #[test]
    fn voices_response_parses_partial_fields() {
        let json = r#"{"voices":[{"name":"en-US-Journey-F","languageCodes":["en-US"],"ssmlGender":"FEMALE"},{"name":"bare"}]}"#;
        let parsed: VoicesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.voices.len(), 2);
        assert_eq!(parsed.voices[0].ssml_gender, "FEMALE");
        assert!(parsed.voices[1].language_codes.is_empty());
    }

    #[test]
    fn audio_content_round_trip() {
        let decoded = BASE64.decode("SUQzBA==").unwrap();
        assert_eq!(decoded, vec![0x49, 0x44, 0x33, 0x04]);
    }
}
