use crate::utils::error::{RelayError, Result};
use crate::utils::validation::{validate_non_empty_string, Validate};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PROFILE: &str = "healthwise";
pub const BUILTIN_PROFILES: &[&str] = &["healthwise", "clinical"];

/// 聊天提示中要從 context 帶入的欄位
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextField {
    pub label: String,
    pub key: String,
}

impl ContextField {
    fn new(label: &str, key: &str) -> Self {
        Self {
            label: label.to_string(),
            key: key.to_string(),
        }
    }
}

/// Everything that distinguishes one relay variant from another.
///
/// `extraction_prompt` may contain `{schema}`, which is replaced by
/// `response_schema_hint`. `analysis_prompt`, when present, enables a second
/// text-only stage and must contain `{extracted}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayProfile {
    pub name: String,
    pub model_id: String,
    pub extraction_prompt: String,
    pub response_schema_hint: String,
    pub analysis_prompt: Option<String>,
    pub context_fields: Vec<ContextField>,
    /// 嚴格模式下，無法解析成 JSON 物件的回應會變成 5xx
    pub strict_output: bool,
}

impl RelayProfile {
    pub fn builtin(name: &str) -> Result<Self> {
        match name {
            "healthwise" => Ok(Self::healthwise()),
            "clinical" => Ok(Self::clinical()),
            other => Err(RelayError::InvalidConfigValueError {
                field: "profile".to_string(),
                value: other.to_string(),
                reason: format!("Unknown profile. Available: {}", BUILTIN_PROFILES.join(", ")),
            }),
        }
    }

    /// Two-stage profile: structured extraction followed by a health-insight analysis.
    pub fn healthwise() -> Self {
        Self {
            name: "healthwise".to_string(),
            model_id: "gemini-2.0-flash-exp".to_string(),
            extraction_prompt: HEALTHWISE_EXTRACTION.to_string(),
            response_schema_hint: HEALTHWISE_SCHEMA.to_string(),
            analysis_prompt: Some(HEALTHWISE_ANALYSIS.to_string()),
            context_fields: vec![
                ContextField::new("Test Results", "testResults"),
                ContextField::new("Summary", "summary"),
            ],
            strict_output: false,
        }
    }

    /// Single-stage profile producing the front-end's lab report shape directly.
    pub fn clinical() -> Self {
        Self {
            name: "clinical".to_string(),
            model_id: "gemini-2.5-flash".to_string(),
            extraction_prompt: CLINICAL_EXTRACTION.to_string(),
            response_schema_hint: CLINICAL_SCHEMA.to_string(),
            analysis_prompt: None,
            context_fields: vec![
                ContextField::new("Test Results", "results"),
                ContextField::new("Summary", "summary"),
                ContextField::new("Abnormalities", "abnormalities"),
            ],
            strict_output: true,
        }
    }

    pub fn has_analysis_stage(&self) -> bool {
        self.analysis_prompt.is_some()
    }
}

impl Validate for RelayProfile {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("profile.name", &self.name)?;
        validate_non_empty_string("profile.model_id", &self.model_id)?;
        validate_non_empty_string("profile.extraction_prompt", &self.extraction_prompt)?;

        if let Some(analysis) = &self.analysis_prompt {
            if !analysis.contains("{extracted}") {
                return Err(RelayError::ConfigValidationError {
                    field: "profile.analysis_prompt".to_string(),
                    message: "Analysis prompt must contain the {extracted} placeholder".to_string(),
                });
            }
        }

        Ok(())
    }
}

const HEALTHWISE_SCHEMA: &str = r#"{
    "patientInfo": {
        "name": "",
        "age": "",
        "gender": "",
        "date": ""
    },
    "testResults": [
        {
            "testName": "",
            "value": "",
            "unit": "",
            "referenceRange": "",
            "status": "normal/abnormal"
        }
    ],
    "abnormalFindings": [],
    "notes": ""
}"#;

const HEALTHWISE_EXTRACTION: &str = "Please extract all text from this medical lab report image.
Return the text in a structured format that includes:
1. Patient information
2. Test results with values and reference ranges
3. Any abnormal findings
4. Doctor's notes if present

Format the response as JSON with the following structure:
{schema}";

const HEALTHWISE_ANALYSIS: &str = r#"Analyze the following lab report data and provide health insights:

{extracted}

Please provide:
1. Summary of overall health status
2. Key findings and their implications
3. Recommendations for follow-up
4. Any concerning values that need immediate attention

Format as JSON:
{
    "summary": "",
    "keyFindings": [],
    "recommendations": [],
    "concerningValues": []
}"#;

const CLINICAL_SCHEMA: &str = r#"{
    "patientName": "",
    "reportDate": "",
    "labName": "",
    "results": [
        {
            "testName": "",
            "value": "",
            "unit": "",
            "referenceRange": "",
            "category": "Complete Blood Count | Liver Function | Kidney Function | Lipid Profile | Electrolytes | Inflammation Markers | Thyroid Function | Other",
            "status": "Normal | High | Low | Critical | Unknown",
            "interpretation": "",
            "clinicalSignificance": "",
            "possibleCauses": []
        }
    ],
    "summary": "",
    "abnormalities": [],
    "clinicalInterpretation": {
        "keyFindings": [],
        "clinicalImplications": [],
        "recommendedActions": []
    },
    "dietaryRecommendations": [
        {
            "topic": "",
            "priority": "High | Medium | Low",
            "action": "",
            "items": []
        }
    ]
}"#;

const CLINICAL_EXTRACTION: &str = "You are a clinical laboratory assistant. Read every test on this lab report image.
For each test give the measured value, unit, reference range, category and status,
then interpret the report as a whole: a plain-language summary, the abnormal results,
their clinical implications and practical dietary recommendations.

Return only JSON, no markdown, matching this structure:
{schema}";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_profiles_validate() {
        for name in BUILTIN_PROFILES {
            let profile = RelayProfile::builtin(name).unwrap();
            assert_eq!(&profile.name, name);
            assert!(profile.validate().is_ok());
        }
    }

    #[test]
    fn test_unknown_profile_is_rejected() {
        let err = RelayProfile::builtin("veterinary").unwrap_err();
        assert!(err.to_string().contains("healthwise"));
    }

    #[test]
    fn test_variants_differ_in_schema_model_and_stages() {
        let healthwise = RelayProfile::healthwise();
        let clinical = RelayProfile::clinical();

        assert_ne!(healthwise.model_id, clinical.model_id);
        assert!(healthwise.response_schema_hint.contains("patientInfo"));
        assert!(clinical.response_schema_hint.contains("patientName"));
        assert!(healthwise.has_analysis_stage());
        assert!(!clinical.has_analysis_stage());
        assert!(clinical.strict_output);
    }

    #[test]
    fn test_analysis_prompt_requires_placeholder() {
        let mut profile = RelayProfile::healthwise();
        profile.analysis_prompt = Some("Analyze this".to_string());
        assert!(profile.validate().is_err());
    }
}
