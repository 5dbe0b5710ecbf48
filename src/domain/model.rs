use crate::utils::error::{RelayError, Result};
use serde::{Deserialize, Serialize};

/// 對話中的一則歷史訊息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireTurn")]
pub struct ChatTurn {
    pub role: String,
    pub text: String,
}

impl ChatTurn {
    pub fn new(role: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            text: text.into(),
        }
    }
}

// 前端送的是 {role, parts: [{text}]}，其他呼叫端可能直接送 {role, text}
#[derive(Deserialize)]
struct WireTurn {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Deserialize)]
struct WirePart {
    #[serde(default)]
    text: Option<String>,
}

impl From<WireTurn> for ChatTurn {
    fn from(wire: WireTurn) -> Self {
        let text = wire
            .text
            .or_else(|| wire.parts.into_iter().next().and_then(|p| p.text))
            .unwrap_or_default();
        Self {
            role: wire.role.unwrap_or_else(|| "user".to_string()),
            text,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
    #[serde(default)]
    pub context: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub text: String,
}

/// 上傳的影像與其 MIME 類型
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    /// 優先採用 multipart 標示的 image/* 類型，否則以檔頭判斷
    pub fn from_upload(declared_type: Option<&str>, bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(RelayError::invalid_request("Uploaded file is empty"));
        }

        let mime_type = match declared_type {
            Some(declared) if declared.starts_with("image/") => declared.to_string(),
            _ => sniff_image_mime(&bytes)
                .ok_or_else(|| RelayError::invalid_request("Unsupported image format"))?
                .to_string(),
        };

        Ok(Self { mime_type, bytes })
    }
}

pub fn sniff_image_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}
