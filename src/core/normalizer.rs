//! Response normalization for free-form model output.
//!
//! Models frequently wrap JSON in markdown fences or surround it with prose.
//! [`normalize`] strips the fences, locates the outermost `{ ... }` span and
//! decodes it. Output that cannot be decoded is not an error: it comes back as
//! [`Normalized::Fallback`] carrying the original text.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

// 語言標記後必須接換行或結尾，否則視為正文
static LEADING_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*```(?:[A-Za-z0-9_+.\-]*[ \t]*(\r?\n|$))?")
        .expect("leading fence pattern is valid")
});

static TRAILING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```\s*$").expect("trailing fence pattern is valid"));

/// Field name used when a fallback record is serialized.
pub const RAW_TEXT_FIELD: &str = "rawText";

#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Structured(Map<String, Value>),
    /// 解析失敗時保留原始回應（去除前後空白）
    Fallback { raw_text: String },
}

impl Normalized {
    pub fn is_structured(&self) -> bool {
        matches!(self, Normalized::Structured(_))
    }

    pub fn into_value(self) -> Value {
        match self {
            Normalized::Structured(object) => Value::Object(object),
            Normalized::Fallback { raw_text } => {
                serde_json::json!({ RAW_TEXT_FIELD: raw_text })
            }
        }
    }
}

/// Removes one leading fence (with optional language tag) and one trailing fence.
///
/// A tag only counts as a language hint when the fence line ends right after
/// it, so text glued to the backticks is kept.
pub fn strip_fences(text: &str) -> String {
    let without_leading = LEADING_FENCE.replace(text, "${1}");
    TRAILING_FENCE.replace(&without_leading, "").into_owned()
}

/// 取第一個 `{` 到最後一個 `}`；找不到時回傳去除空白後的全文
pub fn locate_payload(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text.trim(),
    }
}

pub fn normalize(text: &str) -> Normalized {
    let stripped = strip_fences(text);
    let candidate = locate_payload(&stripped);

    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(object)) => Normalized::Structured(object),
        _ => Normalized::Fallback {
            raw_text: text.trim().to_string(),
        },
    }
}
