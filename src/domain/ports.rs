use crate::domain::model::ImagePayload;
use crate::utils::error::Result;
use async_trait::async_trait;

/// 外部生成式模型。回傳未經處理的文字，是否為 JSON 由呼叫端決定。
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn generate_text(&self, model_id: &str, prompt: &str) -> Result<String>;

    async fn generate_vision(
        &self,
        model_id: &str,
        prompt: &str,
        image: &ImagePayload,
    ) -> Result<String>;
}
