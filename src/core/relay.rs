use crate::config::profile::RelayProfile;
use crate::core::normalizer::{self, Normalized};
use crate::core::prompt;
use crate::domain::model::{ChatRequest, ImagePayload};
use crate::domain::ports::ModelClient;
use crate::utils::error::{RelayError, Result};
use serde_json::{json, Value};

pub struct LabRelay<M: ModelClient> {
    client: M,
    profile: RelayProfile,
}

impl<M: ModelClient> LabRelay<M> {
    pub fn new(client: M, profile: RelayProfile) -> Self {
        Self { client, profile }
    }

    pub fn profile(&self) -> &RelayProfile {
        &self.profile
    }

    /// 影像 -> 結構化擷取 ->（可選）分析，合併成單一 JSON 回應
    pub async fn analyze(&self, image: &ImagePayload) -> Result<Value> {
        tracing::info!(
            "🔬 Analyzing report: profile={}, model={}, {} bytes ({})",
            self.profile.name,
            self.profile.model_id,
            image.bytes.len(),
            image.mime_type
        );

        let extraction_prompt = prompt::extraction_prompt(&self.profile);
        let extracted_text = self
            .client
            .generate_vision(&self.profile.model_id, &extraction_prompt, image)
            .await
            .map_err(|e| {
                tracing::error!("❌ Extraction call failed: {}", e);
                RelayError::upstream("Failed to extract text from image", e)
            })?;
        tracing::debug!("Extraction returned {} chars", extracted_text.len());

        let extracted = normalizer::normalize(&extracted_text);

        let Some(analysis_prompt) =
            prompt::analysis_prompt(&self.profile, &normalizer::strip_fences(&extracted_text))
        else {
            return self.single_stage_result(extracted);
        };

        let analysis_text = self
            .client
            .generate_text(&self.profile.model_id, &analysis_prompt)
            .await
            .map_err(|e| {
                tracing::error!("❌ Analysis call failed: {}", e);
                RelayError::upstream("Failed to analyze lab results", e)
            })?;
        tracing::debug!("Analysis returned {} chars", analysis_text.len());

        let analysis = normalizer::normalize(&analysis_text);
        self.two_stage_result(extracted, analysis)
    }

    fn single_stage_result(&self, extracted: Normalized) -> Result<Value> {
        if !extracted.is_structured() {
            tracing::warn!("⚠️ Model output was not valid JSON");
            if self.profile.strict_output {
                return Err(RelayError::ParseError);
            }
        }
        Ok(extracted.into_value())
    }

    fn two_stage_result(&self, extracted: Normalized, analysis: Normalized) -> Result<Value> {
        match (extracted, analysis) {
            (Normalized::Structured(mut report), Normalized::Structured(insights)) => {
                report.insert("analysis".to_string(), Value::Object(insights));
                Ok(Value::Object(report))
            }
            (extracted, analysis) => {
                tracing::warn!("⚠️ Model output was not valid JSON, returning raw text");
                if self.profile.strict_output {
                    return Err(RelayError::ParseError);
                }
                Ok(json!({
                    "extractedText": raw_or_value(extracted),
                    "analysis": raw_or_value(analysis),
                }))
            }
        }
    }

    pub async fn chat(&self, request: &ChatRequest) -> Result<String> {
        if request.message.trim().is_empty() {
            return Err(RelayError::invalid_request("Message cannot be empty"));
        }

        tracing::info!(
            "💬 Chat request: {} history turns, context={}",
            request.history.len(),
            request.context.is_some()
        );

        let chat_prompt = prompt::chat_prompt(&self.profile, request);
        let reply = self
            .client
            .generate_text(&self.profile.model_id, &chat_prompt)
            .await
            .map_err(|e| {
                tracing::error!("❌ Chat call failed: {}", e);
                RelayError::upstream("Chat service unavailable", e)
            })?;

        Ok(normalizer::strip_fences(&reply).trim().to_string())
    }
}

fn raw_or_value(normalized: Normalized) -> Value {
    match normalized {
        Normalized::Structured(object) => Value::Object(object),
        Normalized::Fallback { raw_text } => Value::String(raw_text),
    }
}
