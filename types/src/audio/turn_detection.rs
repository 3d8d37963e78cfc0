/// How the service decides that the user has finished speaking.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnDetection {
    ServerVad(ServerVadTurnDetection),
}

/// Server-side voice activity detection.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ServerVadTurnDetection {
    /// Activation threshold, 0.0 to 1.0. Higher needs louder speech.
    threshold: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    prefix_padding_ms: Option<u32>,
    /// Silence that ends a turn, in milliseconds.
    silence_duration_ms: u32,
}

impl ServerVadTurnDetection {
    pub fn new(threshold: f32, silence_duration_ms: u32) -> Self {
        Self {
            threshold,
            prefix_padding_ms: None,
            silence_duration_ms,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn silence_duration_ms(&self) -> u32 {
        self.silence_duration_ms
    }
}
