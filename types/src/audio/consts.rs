use std::convert::Infallible;
use std::str::FromStr;

/// Synthesized voices offered by the realtime service. Names it does not know yet are kept
/// as `Custom`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Voice {
    Alloy,
    Ash,
    Ballad,
    Coral,
    Echo,
    Sage,
    Shimmer,
    Verse,
    Custom(String),
}

static VOICES: [(&str, Voice); 8] = [
    ("alloy", Voice::Alloy),
    ("ash", Voice::Ash),
    ("ballad", Voice::Ballad),
    ("coral", Voice::Coral),
    ("echo", Voice::Echo),
    ("sage", Voice::Sage),
    ("shimmer", Voice::Shimmer),
    ("verse", Voice::Verse),
];

impl Voice {
    pub fn as_str(&self) -> &str {
        match self {
            Voice::Custom(name) => name,
            known => VOICES
                .iter()
                .find(|(_, voice)| voice == known)
                .map(|(name, _)| *name)
                .unwrap_or_default(),
        }
    }
}

impl From<&str> for Voice {
    fn from(name: &str) -> Self {
        VOICES
            .iter()
            .find(|(known, _)| *known == name)
            .map(|(_, voice)| voice.clone())
            .unwrap_or_else(|| Voice::Custom(name.to_string()))
    }
}

impl From<String> for Voice {
    fn from(name: String) -> Self {
        Voice::from(name.as_str())
    }
}

impl From<Voice> for String {
    fn from(voice: Voice) -> Self {
        voice.as_str().to_string()
    }
}

impl FromStr for Voice {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Voice::from(s))
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum AudioFormat {
    #[serde(rename = "pcm16")]
    Pcm16,
    #[serde(rename = "g711_ulaw")]
    Mulaw,
    #[serde(rename = "g711_alaw")]
    Alaw,
}

/// Input transcription model; `whisper-1` unless told otherwise.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TranscriptionModel {
    Whisper,
    Custom(String),
}

impl From<&str> for TranscriptionModel {
    fn from(name: &str) -> Self {
        match name {
            "whisper-1" => TranscriptionModel::Whisper,
            _ => TranscriptionModel::Custom(name.to_string()),
        }
    }
}

impl From<String> for TranscriptionModel {
    fn from(name: String) -> Self {
        TranscriptionModel::from(name.as_str())
    }
}

impl From<TranscriptionModel> for String {
    fn from(model: TranscriptionModel) -> Self {
        match model {
            TranscriptionModel::Whisper => "whisper-1".to_string(),
            TranscriptionModel::Custom(name) => name,
        }
    }
}

impl FromStr for TranscriptionModel {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(TranscriptionModel::from(s))
    }
}

#[cfg(test)]
mod test {
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    struct AudioConsts {
        #[serde(skip_serializing_if = "Option::is_none")]
        voice: Option<super::Voice>,
        #[serde(skip_serializing_if = "Option::is_none")]
        audio_format: Option<super::AudioFormat>,
    }

    #[test]
    fn test_serialize() {
        let consts = AudioConsts {
            voice: Some(super::Voice::Alloy),
            audio_format: Some(super::AudioFormat::Pcm16),
        };
        let json = serde_json::to_string(&consts).unwrap();
        assert_eq!(json, r#"{"voice":"alloy","audio_format":"pcm16"}"#);

        let consts = AudioConsts {
            voice: Some(super::Voice::Custom("marin".to_string())),
            audio_format: None,
        };
        let json = serde_json::to_string(&consts).unwrap();
        assert_eq!(json, r#"{"voice":"marin"}"#);
    }

    #[test]
    fn test_deserialize() {
        let json = r#"{"voice":"verse","audio_format":"g711_ulaw"}"#;
        let consts: AudioConsts = serde_json::from_str(json).unwrap();
        assert_eq!(consts.voice, Some(super::Voice::Verse));
        assert_eq!(consts.audio_format, Some(super::AudioFormat::Mulaw));

        let json = r#"{"voice":"cedar"}"#;
        let consts: AudioConsts = serde_json::from_str(json).unwrap();
        assert_eq!(consts.voice, Some(super::Voice::Custom("cedar".to_string())));
        assert_eq!(consts.audio_format, None);
    }
}
