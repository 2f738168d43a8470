//! Core types shared by the client and the conversation layer

use serde::{Deserialize, Serialize};

/// Model requested from the proxy
pub const DEFAULT_MODEL: &str = "llama3.1";

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

impl Sender {
    /// Display label for this sender
    pub fn label(&self) -> &'static str {
        match self {
            Sender::User => "You",
            Sender::Bot => "Assistant",
        }
    }
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub text: String,
    pub sender: Sender,
}

impl Message {
    /// Create a user message
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::User,
        }
    }

    /// Create a bot message
    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::Bot,
        }
    }

    pub fn is_bot(&self) -> bool {
        self.sender == Sender::Bot
    }
}

/// Nested `options` object of the request body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateOptions {
    pub num_predict: i32,
}

/// Fixed generation policy sent with every prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub seed: i64,
    pub num_predict: i32,
    pub mirostat: u8,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub typical_p: f32,
    pub min_p: f32,
    pub repeat_last_n: i32,
    pub repeat_penalty: f32,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
    pub penalize_newline: bool,
    pub stop: Vec<String>,
    pub num_ctx: u32,
    pub num_keep: i32,
    pub numa: bool,
    pub num_thread: u32,
    pub num_batch: u32,
    pub num_gpu: i32,
    pub main_gpu: u32,
    pub low_vram: bool,
    pub use_mmap: bool,
    pub use_mlock: bool,
    pub vocab_only: bool,
    pub options: GenerateOptions,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            seed: 42,
            num_predict: 10,
            mirostat: 0,
            temperature: 0.2,
            top_k: 0,
            top_p: 1.0,
            typical_p: 1.0,
            min_p: 0.0,
            repeat_last_n: 64,
            repeat_penalty: 1.05,
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
            penalize_newline: false,
            stop: vec!["user:".to_string()],
            num_ctx: 10,
            num_keep: -1,
            numa: false,
            num_thread: 8,
            num_batch: 128,
            num_gpu: -1,
            main_gpu: 0,
            low_vram: false,
            use_mmap: true,
            use_mlock: false,
            vocab_only: false,
            options: GenerateOptions { num_predict: 512 },
        }
    }
}

/// Body of `POST /stream`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    #[serde(flatten)]
    pub params: GenerationParams,
}

impl GenerateRequest {
    /// Build the streaming request for a prompt
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            prompt: prompt.into(),
            stream: true,
            params: GenerationParams::default(),
        }
    }
}

/// Body of `POST /generate`
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            prompt: prompt.into(),
            stream: false,
        }
    }
}

/// Response of `POST /generate`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub response: String,
}
