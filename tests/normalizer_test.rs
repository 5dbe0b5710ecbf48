use lab_relay::core::normalizer::{normalize, strip_fences, Normalized};
use serde_json::{json, Value};

fn sample_payloads() -> Vec<Value> {
    vec![
        json!({}),
        json!({"a": 1}),
        json!({"patientName": "Jane", "results": []}),
        json!({
            "patientInfo": {"name": "O'Brien", "age": "54", "gender": "F", "date": "2024-03-01"},
            "testResults": [
                {"testName": "Hemoglobin", "value": 11.2, "unit": "g/dL", "referenceRange": "12-16", "status": "abnormal"},
                {"testName": "WBC", "value": "6.1", "unit": "10^3/uL", "referenceRange": "4-11", "status": "normal"}
            ],
            "abnormalFindings": ["Low hemoglobin"],
            "notes": "Braces in text: {not an object}"
        }),
        json!({"flags": [true, false, null], "nested": {"deeper": {"n": -1.5e3}}}),
    ]
}

#[test]
fn test_fenced_payloads_decode_like_unwrapped() {
    for payload in sample_payloads() {
        let plain = serde_json::to_string_pretty(&payload).unwrap();
        for fence in ["```json\n", "```\n", "  ```JSON\n", "```javascript\n"] {
            let wrapped = format!("{}{}\n```", fence, plain);
            assert_eq!(normalize(&wrapped), normalize(&plain), "fence {fence:?}");
            assert_eq!(normalize(&wrapped).into_value(), payload);
        }
    }
}

#[test]
fn test_prose_wrapped_payloads_are_extracted() {
    for payload in sample_payloads() {
        let text = format!(
            "Sure, here is the data: {} Hope that helps!",
            serde_json::to_string(&payload).unwrap()
        );
        assert_eq!(normalize(&text).into_value(), payload);
    }
}

#[test]
fn test_text_without_braces_falls_back_to_trimmed_original() {
    let inputs = [
        "not json at all",
        "   padded reply \n",
        "I am unable to read this image.",
        "[1, 2, 3]",
        "",
    ];
    for input in inputs {
        assert_eq!(
            normalize(input),
            Normalized::Fallback {
                raw_text: input.trim().to_string()
            }
        );
    }
}

#[test]
fn test_normalizing_is_stable_for_plain_json() {
    for payload in sample_payloads() {
        let text = serde_json::to_string(&payload).unwrap();
        let direct: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(normalize(&text).into_value(), direct);
    }
}

#[test]
fn test_chat_replies_lose_only_the_outer_fences() {
    assert_eq!(
        strip_fences("```\nEat more leafy greens.\n```").trim(),
        "Eat more leafy greens."
    );
    assert_eq!(
        strip_fences("Use `code` inline and ``` in the middle").trim(),
        "Use `code` inline and ``` in the middle"
    );
}

#[test]
fn test_chat_reply_starting_on_fence_line_keeps_first_word() {
    let cases = [
        ("```Drink more water.```", "Drink more water."),
        ("```Rest well tonight.\n```", "Rest well tonight."),
        ("```markdown\nStay hydrated.\n```", "Stay hydrated."),
    ];
    for (reply, expected) in cases {
        assert_eq!(strip_fences(reply).trim(), expected, "reply {reply:?}");
    }
}
