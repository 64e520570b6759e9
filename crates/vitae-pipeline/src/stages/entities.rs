//! NER stage: CV entity extraction through an Ollama model.

use crate::processor::{ProcessorError, StageInput, StageOutput, StagePayload, StageProcessor};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};
use vitae_config::OllamaConfig;
use vitae_core::Stage;
use vitae_ollama::{GenerateOptions, GenerateRequest, OllamaClient, OllamaResult};

/// Longest CV text sent to the model, in characters.
const MAX_INPUT_CHARS: usize = 12_000;

const SYSTEM_PROMPT: &str = "\
You extract entities from Curriculum Vitae text.
Identify and organise the information into these categories:

- Personal data: name, email, phone, address.
- Work experience: company, position, period (start and end dates), main achievements.
- Education: institution, degree, period (start and end dates).
- Technical skills: programming languages, tools, frameworks, technologies.
- Languages: language and proficiency level.
- Certifications and courses.
- Other: publications, awards, relevant projects.

Rules:
- ALWAYS return valid JSON.
- Do not invent data that is not explicitly in the text.
- If a field is absent, use an empty list or null.
- Keep key names in the language of the CV.
- Respond ONLY with JSON, no additional text.";

/// Sends the OCR text to the model and stores the parsed JSON object.
pub struct EntityExtractor {
    client: OllamaClient,
    model: String,
    num_predict: i32,
}

impl EntityExtractor {
    pub fn from_config(config: &OllamaConfig) -> OllamaResult<Self> {
        Ok(Self {
            client: OllamaClient::from_config(config)?,
            model: config.model.clone(),
            num_predict: config.num_predict,
        })
    }
}

#[async_trait]
impl StageProcessor for EntityExtractor {
    fn stage(&self) -> Stage {
        Stage::Ner
    }

    async fn run(&self, input: StageInput) -> Result<StageOutput, ProcessorError> {
        let StagePayload::Data(Value::String(text)) = input.payload else {
            return Err(ProcessorError::Permanent(
                "OCR result is not text".to_string(),
            ));
        };

        if text.trim().is_empty() {
            info!("{} has no text; recording empty entities", input.file_id);
            return Ok(StageOutput::new(Value::Object(Default::default()))
                .with_meta("model", self.model.as_str()));
        }

        let prompt = format!(
            "Extract the entities from the following text:\n{}",
            truncate_chars(&text, MAX_INPUT_CHARS)
        );
        let request = GenerateRequest::new(&self.model, prompt)
            .with_system(SYSTEM_PROMPT)
            .with_json_format()
            .with_options(
                GenerateOptions::new()
                    .with_temperature(0.0)
                    .with_num_predict(self.num_predict),
            );

        let response = self.client.generate(request).await?;
        debug!("Model answered with {} chars", response.response.len());

        let entities = coerce_json_object(&response.response).ok_or_else(|| {
            ProcessorError::Retryable("model response contains no JSON object".to_string())
        })?;

        Ok(StageOutput::new(entities).with_meta("model", self.model.as_str()))
    }
}

/// Parse a model reply into a JSON object, tolerating code fences or chatter
/// around it by falling back to the outermost `{...}` span.
pub fn coerce_json_object(reply: &str) -> Option<Value> {
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(reply.trim()) {
        return Some(value);
    }

    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&reply[start..=end]) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vitae_core::ContentType;

    #[test]
    fn test_coerce_plain_json() {
        let value = coerce_json_object(r#"{"nombre": "Ana"}"#).unwrap();
        assert_eq!(value, json!({"nombre": "Ana"}));
    }

    #[test]
    fn test_coerce_fenced_json() {
        let reply = "Here you go:\n```json\n{\"skills\": [\"Rust\", \"SQL\"]}\n```";
        let value = coerce_json_object(reply).unwrap();
        assert_eq!(value["skills"][0], "Rust");
    }

    #[test]
    fn test_coerce_rejects_non_objects() {
        assert!(coerce_json_object("[1, 2]").is_none());
        assert!(coerce_json_object("no json here").is_none());
        assert!(coerce_json_object("} broken {").is_none());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("áéíóú", 2), "áé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[tokio::test]
    async fn test_non_text_input_is_permanent() {
        let extractor = EntityExtractor::from_config(&OllamaConfig::default()).unwrap();
        let err = extractor
            .run(StageInput {
                file_id: "f1".into(),
                file_name: "cv.pdf".into(),
                content_type: ContentType::Pdf,
                payload: StagePayload::Data(json!({"unexpected": true})),
            })
            .await
            .unwrap_err();
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn test_empty_text_skips_the_model() {
        let extractor = EntityExtractor::from_config(&OllamaConfig {
            host: "http://127.0.0.1:9".into(),
            ..OllamaConfig::default()
        })
        .unwrap();
        let output = extractor
            .run(StageInput {
                file_id: "f1".into(),
                file_name: "scan.pdf".into(),
                content_type: ContentType::Pdf,
                payload: StagePayload::Data(json!("   ")),
            })
            .await
            .unwrap();
        assert_eq!(output.data, json!({}));
    }
}
