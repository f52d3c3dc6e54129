//! Flattening MCP tool results into agent-readable text

use rmcp::model::{RawContent, ResourceContents};
use serde_json::Value;

use crate::mcp::McpToolResult;
use crate::types::ToolOutput;

/// A tool result reduced to text, with the error flag and raw payload kept
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedResult {
    pub text: String,
    pub is_error: bool,
    pub raw: Value,
}

impl NormalizedResult {
    pub fn into_output(self) -> ToolOutput {
        ToolOutput::with_raw(self.text, self.raw)
    }
}

/// Render every content item as text, one item per line.
///
/// Non-text items become short placeholders. A result with no content but
/// structured content renders the structured JSON instead.
pub fn normalize_result(result: &McpToolResult) -> NormalizedResult {
    let mut parts: Vec<String> = Vec::with_capacity(result.content.len());

    for content in &result.content {
        let part = match &content.raw {
            RawContent::Text(t) => t.text.clone(),
            RawContent::Image(img) => format!("[image: {}]", img.mime_type),
            RawContent::Audio(audio) => format!("[audio: {}]", audio.mime_type),
            RawContent::Resource(embedded) => match &embedded.resource {
                ResourceContents::TextResourceContents { text, .. } => text.clone(),
                ResourceContents::BlobResourceContents { uri, .. } => format!("[resource: {}]", uri),
            },
            RawContent::ResourceLink(link) => format!("[resource link: {}]", link.uri),
        };
        parts.push(part);
    }

    let mut text = parts.join("\n");
    if text.is_empty() {
        if let Some(structured) = &result.structured_content {
            text = structured.to_string();
        }
    }

    NormalizedResult {
        text,
        is_error: result.is_error.unwrap_or(false),
        raw: serde_json::to_value(result).unwrap_or(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcp::model::Content;

    #[test]
    fn test_text_items_are_joined() {
        let result = McpToolResult::success(vec![
            Content::text("first line"),
            Content::text("second line"),
        ]);
        let normalized = normalize_result(&result);
        assert_eq!(normalized.text, "first line\nsecond line");
        assert!(!normalized.is_error);
        assert!(normalized.raw.get("content").is_some());
    }

    #[test]
    fn test_non_text_items_become_placeholders() {
        let result = McpToolResult::success(vec![
            Content::text("chart below"),
            Content::image("aGVsbG8=", "image/png"),
        ]);
        let normalized = normalize_result(&result);
        assert_eq!(normalized.text, "chart below\n[image: image/png]");
    }

    #[test]
    fn test_error_flag_is_kept() {
        let result = McpToolResult::error(vec![Content::text("file not found")]);
        let normalized = normalize_result(&result);
        assert!(normalized.is_error);
        assert_eq!(normalized.text, "file not found");

        let output = normalized.into_output();
        assert_eq!(output.text, "file not found");
        assert!(!output.raw.is_null());
    }
}
