pub const BASE_URL: &str = "wss://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-realtime-preview-2024-10-01";
pub const AZURE_API_VERSION: &str = "2024-10-01-preview";
pub const AZURE_TOKEN_SCOPE: &str = "https://cognitiveservices.azure.com/.default";
pub const OPENAI_TOKEN_SCOPE: &str = "openai";

pub const AUTHORIZATION_HEADER: &str = "Authorization";
pub const OPENAI_BETA_HEADER: &str = "OpenAI-Beta";
pub const OPENAI_BETA_VALUE: &str = "realtime=v1";

pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
pub const DEFAULT_CLOSE_GRACE_MS: u64 = 3000;
pub const DEFAULT_MAX_PENDING_CALLS: usize = 64;
pub const DEFAULT_PENDING_CALL_TTL_SECS: u64 = 300;

pub const VAD_THRESHOLD: f32 = 0.4;
pub const VAD_SILENCE_DURATION_MS: u32 = 600;

pub const TOOL_NAME: &str = "get_json_object";
pub const TOOL_DESCRIPTION: &str = "Converts text into a JSON object based upon a JSON schema";
