use crate::config::profile::RelayProfile;
use crate::domain::model::{ChatRequest, ChatTurn};
use serde_json::Value;
use std::fmt::Write;

/// 只保留最近幾則對話放進提示
pub const HISTORY_WINDOW: usize = 5;

const NOT_AVAILABLE: &str = "Not available";

pub fn extraction_prompt(profile: &RelayProfile) -> String {
    profile
        .extraction_prompt
        .replace("{schema}", &profile.response_schema_hint)
}

/// Second-stage prompt, or `None` when the profile has a single stage.
pub fn analysis_prompt(profile: &RelayProfile, extracted: &str) -> Option<String> {
    profile
        .analysis_prompt
        .as_ref()
        .map(|template| template.replace("{extracted}", extracted.trim()))
}

pub fn recent_history(history: &[ChatTurn]) -> &[ChatTurn] {
    let start = history.len().saturating_sub(HISTORY_WINDOW);
    &history[start..]
}

pub fn chat_prompt(profile: &RelayProfile, request: &ChatRequest) -> String {
    let mut prompt = String::from(
        "You are a helpful health assistant. You have access to the user's lab report context.\n\n",
    );

    if let Some(Value::Object(context)) = &request.context {
        if !context.is_empty() {
            prompt.push_str(
                "Context: The user has uploaded a lab report with the following information:\n",
            );
            for field in &profile.context_fields {
                let _ = writeln!(
                    prompt,
                    "- {}: {}",
                    field.label,
                    render_context_value(context.get(&field.key))
                );
            }
            prompt.push('\n');
        }
    }

    prompt.push_str("Recent conversation:\n");
    for turn in recent_history(&request.history) {
        let _ = writeln!(prompt, "{}: {}", turn.role, turn.text);
    }

    let _ = write!(
        prompt,
        "\nUser's current message: {}\n\n\
         Please provide a helpful, informative response about their health questions.\n\
         If discussing lab results, be informative but always recommend consulting with a healthcare provider\n\
         for medical advice. Do not provide definitive medical diagnoses.\n",
        request.message.trim()
    );

    prompt
}

fn render_context_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => NOT_AVAILABLE.to_string(),
        Some(Value::String(text)) if text.trim().is_empty() => NOT_AVAILABLE.to_string(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn history(count: usize) -> Vec<ChatTurn> {
        (1..=count)
            .map(|i| {
                let role = if i % 2 == 0 { "model" } else { "user" };
                ChatTurn::new(role, format!("turn-{}", i))
            })
            .collect()
    }

    #[test]
    fn test_extraction_prompt_embeds_schema() {
        let profile = RelayProfile::healthwise();
        let prompt = extraction_prompt(&profile);
        assert!(prompt.contains("\"testResults\""));
        assert!(!prompt.contains("{schema}"));
    }

    #[test]
    fn test_analysis_prompt_only_for_two_stage_profiles() {
        let healthwise = RelayProfile::healthwise();
        let prompt = analysis_prompt(&healthwise, "  {\"testResults\": []}\n").unwrap();
        assert!(prompt.contains("{\"testResults\": []}"));
        assert!(!prompt.contains("{extracted}"));

        assert!(analysis_prompt(&RelayProfile::clinical(), "{}").is_none());
    }

    #[test]
    fn test_recent_history_keeps_last_five() {
        let turns = history(8);
        let recent = recent_history(&turns);
        assert_eq!(recent.len(), HISTORY_WINDOW);
        assert_eq!(recent[0].text, "turn-4");
        assert_eq!(recent[4].text, "turn-8");

        assert_eq!(recent_history(&turns[..2]).len(), 2);
        assert!(recent_history(&[]).is_empty());
    }

    #[test]
    fn test_chat_prompt_includes_window_and_message() {
        let request = ChatRequest {
            message: "Is my glucose high?".to_string(),
            history: history(7),
            context: None,
        };
        let prompt = chat_prompt(&RelayProfile::healthwise(), &request);

        assert!(!prompt.contains("turn-1\n"));
        assert!(!prompt.contains("turn-2\n"));
        assert!(prompt.contains("user: turn-3\n"));
        assert!(prompt.contains("user: turn-7\n"));
        assert!(prompt.contains("User's current message: Is my glucose high?"));
        assert!(!prompt.contains("Context:"));
    }

    #[test]
    fn test_chat_prompt_renders_profile_context_fields() {
        let request = ChatRequest {
            message: "Explain".to_string(),
            history: vec![],
            context: Some(json!({
                "results": [{"testName": "LDL", "value": 160}],
                "summary": "Mildly elevated cholesterol"
            })),
        };
        let prompt = chat_prompt(&RelayProfile::clinical(), &request);

        assert!(prompt.contains(r#"- Test Results: [{"testName":"LDL","value":160}]"#));
        assert!(prompt.contains("- Summary: Mildly elevated cholesterol"));
        assert!(prompt.contains("- Abnormalities: Not available"));
    }

    #[test]
    fn test_empty_context_is_omitted() {
        let request = ChatRequest {
            message: "Hello".to_string(),
            history: vec![],
            context: Some(json!({})),
        };
        let prompt = chat_prompt(&RelayProfile::healthwise(), &request);
        assert!(!prompt.contains("Context:"));
    }
}
