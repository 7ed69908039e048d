//! OpenAI Function Calling Integration
//!
//! Converts capability descriptors and chat context into async-openai request
//! types, and parses completions (including tool calls) back into
//! [`ModelResponse`]s. Shared by every OpenAI-compatible provider.

use crate::agent::model::{
    parse_thinking_tokens, ChatMessage, ChatRequest, GenerationConfig, ModelResponse, TokenUsage,
    ToolCall,
};
use crate::tools::ToolDescriptor;
use anyhow::{anyhow, Result};
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionTool, ChatCompletionToolType, CreateChatCompletionRequest,
    CreateChatCompletionRequestArgs, CreateChatCompletionResponse, FunctionCall, FunctionObject,
};
use serde_json::{json, Value};

/// Converts parameters to OpenAI function schema format
fn parameters_to_openai_schema(params: &Value) -> Value {
    // Extract properties and required fields from the input
    let properties = params
        .get("properties")
        .and_then(|p| p.as_object())
        .cloned()
        .unwrap_or_default();

    let required: Vec<String> = params
        .get("required")
        .and_then(|r| r.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();

    json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}

/// Converts a capability descriptor into OpenAI ChatCompletionTool format
pub fn descriptor_to_openai_function(descriptor: &ToolDescriptor) -> ChatCompletionTool {
    ChatCompletionTool {
        r#type: ChatCompletionToolType::Function,
        function: FunctionObject {
            name: descriptor.name.clone(),
            description: Some(descriptor.description.clone()),
            parameters: Some(parameters_to_openai_schema(&descriptor.parameters)),
            strict: Some(false),
        },
    }
}

/// Parses the JSON argument string of a tool call.
///
/// Models occasionally emit malformed JSON; the raw text is kept under a
/// `raw` key so the request still receives a result.
pub fn parse_arguments(arguments: &str) -> Value {
    if arguments.trim().is_empty() {
        return json!({});
    }
    serde_json::from_str(arguments).unwrap_or_else(|_| json!({ "raw": arguments }))
}

fn to_openai_tool_call(call: &ToolCall) -> ChatCompletionMessageToolCall {
    ChatCompletionMessageToolCall {
        id: call.id.clone(),
        r#type: ChatCompletionToolType::Function,
        function: FunctionCall {
            name: call.function_name.clone(),
            arguments: call.arguments.to_string(),
        },
    }
}

/// Converts one chat message into the async-openai request representation
pub fn to_openai_message(message: &ChatMessage) -> Result<ChatCompletionRequestMessage> {
    let converted = match message {
        ChatMessage::System { content } => ChatCompletionRequestMessage::System(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(content.clone())
                .build()
                .map_err(|e| anyhow!("Failed to build system message: {}", e))?,
        ),
        ChatMessage::User { content } => ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessageArgs::default()
                .content(content.clone())
                .build()
                .map_err(|e| anyhow!("Failed to build user message: {}", e))?,
        ),
        ChatMessage::Assistant {
            content,
            tool_calls,
        } => {
            let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
            if !content.is_empty() || tool_calls.is_empty() {
                builder.content(content.clone());
            }
            if !tool_calls.is_empty() {
                builder.tool_calls(tool_calls.iter().map(to_openai_tool_call).collect::<Vec<_>>());
            }
            ChatCompletionRequestMessage::Assistant(
                builder
                    .build()
                    .map_err(|e| anyhow!("Failed to build assistant message: {}", e))?,
            )
        }
        ChatMessage::Tool {
            tool_call_id,
            content,
        } => ChatCompletionRequestMessage::Tool(
            ChatCompletionRequestToolMessageArgs::default()
                .tool_call_id(tool_call_id.clone())
                .content(content.clone())
                .build()
                .map_err(|e| anyhow!("Failed to build tool message: {}", e))?,
        ),
    };
    Ok(converted)
}

/// Builds a chat completion request for an OpenAI-compatible endpoint
pub fn build_chat_request(
    model: &str,
    request: &ChatRequest,
    config: &GenerationConfig,
) -> Result<CreateChatCompletionRequest> {
    let messages = request
        .messages
        .iter()
        .map(to_openai_message)
        .collect::<Result<Vec<_>>>()?;

    let mut request_builder = CreateChatCompletionRequestArgs::default();
    request_builder.model(model).messages(messages);

    if let Some(temp) = config.temperature {
        request_builder.temperature(temp);
    }
    if let Some(max_tokens) = config.max_tokens {
        request_builder.max_completion_tokens(max_tokens);
    }
    if let Some(top_p) = config.top_p {
        request_builder.top_p(top_p);
    }
    if !request.tools.is_empty() {
        request_builder.tools(
            request
                .tools
                .iter()
                .map(descriptor_to_openai_function)
                .collect::<Vec<_>>(),
        );
    }

    request_builder
        .build()
        .map_err(|e| anyhow!("Failed to build request: {}", e))
}

/// Converts the first choice of a completion into a [`ModelResponse`]
pub fn parse_completion(response: CreateChatCompletionResponse) -> Result<ModelResponse> {
    let choice = response
        .choices
        .first()
        .ok_or_else(|| anyhow!("No response choices returned"))?;

    let raw_content = choice.message.content.clone().unwrap_or_default();
    let (reasoning, content) = parse_thinking_tokens(&raw_content);

    let tool_calls = choice
        .message
        .tool_calls
        .as_ref()
        .map(|calls| {
            calls
                .iter()
                .map(|call| ToolCall {
                    id: call.id.clone(),
                    function_name: call.function.name.clone(),
                    arguments: parse_arguments(&call.function.arguments),
                })
                .collect::<Vec<_>>()
        })
        .filter(|calls| !calls.is_empty());

    let usage = response.usage.as_ref().map(|u| TokenUsage {
        prompt_tokens: u.prompt_tokens,
        completion_tokens: u.completion_tokens,
        total_tokens: u.total_tokens,
    });

    let finish_reason = choice.finish_reason.as_ref().and_then(|reason| {
        serde_json::to_value(reason)
            .ok()
            .and_then(|v| v.as_str().map(String::from))
    });

    Ok(ModelResponse {
        content,
        model: response.model.clone(),
        usage,
        finish_reason,
        tool_calls,
        reasoning,
    })
}
