//! OpenAI-backed query generator.
//!
//! One [`OpenAiQueryGenerator`] per generation strategy; the three factory
//! constructors differ only in producer id, model, temperature, and prompt
//! strategy. Responses are constrained to the [`GeneratedQuery`] JSON schema
//! via structured output, with a code-fence-tolerant fallback parse for
//! models that wrap JSON in markdown anyway.
//!
//! Uses [`async_openai`] for type-safe request/response handling.

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest, ResponseFormat,
    ResponseFormatJsonSchema,
};
use secrecy::{ExposeSecret, SecretString};
use tracing::Instrument;

use queryloom_core::query::flow::{PRODUCER_ADVANCED, PRODUCER_BASIC, PRODUCER_OPTIMIZED};
use queryloom_core::query::generator::{GenerationContext, GeneratorError, QueryGenerator};
use queryloom_observe::genai_attrs;
use queryloom_types::config::LlmSettings;
use queryloom_types::query::{GeneratedQuery, add_additional_properties_false};

use super::prompts::{self, PromptSet, QueryStrategy};

/// Output token cap per generation call. A single query plus a handful of
/// suggestions fits well under this.
const MAX_COMPLETION_TOKENS: u32 = 1024;

/// One generation strategy backed by an OpenAI chat model.
///
/// # API Key Security
///
/// Does NOT derive Debug to prevent accidental exposure of the API key
/// stored inside the `async_openai::Client`.
pub struct OpenAiQueryGenerator {
    client: Client<OpenAIConfig>,
    producer: &'static str,
    model: String,
    temperature: f32,
    template: String,
}

impl OpenAiQueryGenerator {
    fn new(
        api_key: &SecretString,
        producer: &'static str,
        model: String,
        temperature: f32,
        template: String,
    ) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key.expose_secret());
        Self {
            client: Client::with_config(config),
            producer,
            model,
            temperature,
            template,
        }
    }

    /// The plain strategy on the query model.
    pub fn basic(api_key: &SecretString, llm: &LlmSettings, prompts: &PromptSet) -> Self {
        Self::new(
            api_key,
            PRODUCER_BASIC,
            llm.query_model.clone(),
            llm.query_temperature,
            prompts.template(QueryStrategy::Basic).to_string(),
        )
    }

    /// The index-aware strategy on the query model.
    pub fn optimized(api_key: &SecretString, llm: &LlmSettings, prompts: &PromptSet) -> Self {
        Self::new(
            api_key,
            PRODUCER_OPTIMIZED,
            llm.query_model.clone(),
            llm.query_temperature,
            prompts.template(QueryStrategy::Optimized).to_string(),
        )
    }

    /// The suggestion-emitting strategy on the smart model.
    pub fn advanced(api_key: &SecretString, llm: &LlmSettings, prompts: &PromptSet) -> Self {
        Self::new(
            api_key,
            PRODUCER_ADVANCED,
            llm.smart_model.clone(),
            llm.smart_temperature,
            prompts.template(QueryStrategy::Advanced).to_string(),
        )
    }

    /// Generate the JSON schema for `GeneratedQuery` with
    /// `additionalProperties: false`, as OpenAI strict mode requires.
    fn response_schema() -> serde_json::Value {
        let schema = schemars::schema_for!(GeneratedQuery);
        let mut schema_value = serde_json::to_value(schema)
            .expect("GeneratedQuery schema serialization should not fail");
        add_additional_properties_false(&mut schema_value);
        schema_value
    }

    fn response_format() -> ResponseFormat {
        ResponseFormat::JsonSchema {
            json_schema: ResponseFormatJsonSchema {
                description: None,
                name: "GeneratedQuery".to_string(),
                schema: Some(Self::response_schema()),
                strict: Some(true),
            },
        }
    }

    /// Build a [`CreateChatCompletionRequest`] for one generation call.
    fn build_request(
        &self,
        question: &str,
        feedback: &str,
        context: &GenerationContext,
    ) -> CreateChatCompletionRequest {
        let messages = vec![
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: ChatCompletionRequestSystemMessageContent::Text(prompts::render(
                    &self.template,
                    context,
                    feedback,
                )),
                name: None,
            }),
            ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(prompts::user_message(
                    question,
                )),
                name: None,
            }),
        ];

        CreateChatCompletionRequest {
            model: self.model.clone(),
            messages,
            max_completion_tokens: Some(MAX_COMPLETION_TOKENS),
            temperature: Some(self.temperature),
            response_format: Some(Self::response_format()),
            ..Default::default()
        }
    }
}

// OpenAiQueryGenerator intentionally does NOT derive Debug to prevent
// accidental exposure of internal state including the API key inside the
// async-openai Client.

impl QueryGenerator for OpenAiQueryGenerator {
    fn name(&self) -> &str {
        self.producer
    }

    async fn generate(
        &self,
        question: &str,
        feedback: &str,
        context: &GenerationContext,
    ) -> Result<GeneratedQuery, GeneratorError> {
        let span = tracing::info_span!(
            "chat",
            { genai_attrs::GEN_AI_OPERATION_NAME } = genai_attrs::OP_CHAT,
            { genai_attrs::GEN_AI_PROVIDER_NAME } = genai_attrs::PROVIDER_OPENAI,
            { genai_attrs::GEN_AI_REQUEST_MODEL } = self.model.as_str(),
            { genai_attrs::GEN_AI_REQUEST_TEMPERATURE } = self.temperature as f64,
            { genai_attrs::GEN_AI_REQUEST_MAX_TOKENS } = MAX_COMPLETION_TOKENS as u64,
            { genai_attrs::GEN_AI_USAGE_INPUT_TOKENS } = tracing::field::Empty,
            { genai_attrs::GEN_AI_USAGE_OUTPUT_TOKENS } = tracing::field::Empty,
            { genai_attrs::GEN_AI_RESPONSE_ID } = tracing::field::Empty,
        );

        let request = self.build_request(question, feedback, context);

        async {
            let response = self
                .client
                .chat()
                .create(request)
                .await
                .map_err(map_openai_error)?;

            let span = tracing::Span::current();
            if let Some(usage) = &response.usage {
                span.record(
                    genai_attrs::GEN_AI_USAGE_INPUT_TOKENS,
                    usage.prompt_tokens as u64,
                );
                span.record(
                    genai_attrs::GEN_AI_USAGE_OUTPUT_TOKENS,
                    usage.completion_tokens as u64,
                );
            }
            span.record(genai_attrs::GEN_AI_RESPONSE_ID, response.id.as_str());

            let content = response
                .choices
                .first()
                .and_then(|c| c.message.content.clone())
                .unwrap_or_default();

            parse_content(&content)
        }
        .instrument(span)
        .await
    }
}

/// Parse the model's reply into a [`GeneratedQuery`].
///
/// Tries the raw content first, then once more with markdown code fences
/// stripped. Structured output makes fences rare but some models still emit
/// them.
fn parse_content(content: &str) -> Result<GeneratedQuery, GeneratorError> {
    let trimmed = content.trim();
    if let Ok(generated) = serde_json::from_str::<GeneratedQuery>(trimmed) {
        return Ok(generated);
    }

    serde_json::from_str::<GeneratedQuery>(strip_code_fence(trimmed)).map_err(|e| {
        GeneratorError::Malformed(format!(
            "failed to parse GeneratedQuery: {e}\nraw content: {trimmed}"
        ))
    })
}

fn strip_code_fence(content: &str) -> &str {
    let Some(rest) = content.strip_prefix("```") else {
        return content;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_end();
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

/// Map an `async_openai::error::OpenAIError` to a [`GeneratorError`].
fn map_openai_error(err: async_openai::error::OpenAIError) -> GeneratorError {
    use async_openai::error::OpenAIError;

    match &err {
        OpenAIError::JSONDeserialize(_, content) => {
            GeneratorError::Malformed(format!("failed to parse response: {content}"))
        }
        _ => GeneratorError::Backend(err.to_string()),
    }
}
