//! Text-safe encoding of PCM16 audio for the JSON-only upstream transport.

use base64::Engine;

use crate::types::audio::Base64EncodedAudioBytes;

pub fn encode(pcm16: &[u8]) -> Base64EncodedAudioBytes {
    base64::engine::general_purpose::STANDARD.encode(pcm16)
}

pub fn decode(fragment: &str) -> Result<Vec<u8>, base64::DecodeError> {
    base64::engine::general_purpose::STANDARD.decode(fragment)
}
