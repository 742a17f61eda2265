use crate::commands::Out;
use crate::Error;
use rmcp::model::{CallToolResult, Content};
use rmcp::ErrorData;
use serde::Serialize;
use serde_json::json;
use std::fmt::Debug;
use tracing::error;

fn push_json<T: Serialize>(content: &mut Vec<Content>, value: &T) {
    match Content::json(value) {
        Ok(json) => content.push(json),
        Err(e) => error!("Unable to serialize JSON output: {e}"),
    }
}

pub(super) fn to_content<T>(out: Out<T>) -> Vec<Content>
where
    T: Debug + Clone + Serialize,
{
    let mut content = vec![Content::text(out.message())];
    if let Some(object) = out.structure() {
        push_json(&mut content, object);
    }
    content
}

/// The message, followed by the error type and, for store faults, the resource and operation,
/// so that an agent can tell a denied write from an overdrawn goal without parsing text.
pub(super) fn error_content(e: &Error) -> Vec<Content> {
    let mut content = vec![Content::text(e.to_string())];
    let details = match e.context() {
        Some(context) => json!({
            "errorType": e.error_type(),
            "resourcePath": context.resource_path,
            "operation": context.operation,
        }),
        None => json!({ "errorType": e.error_type() }),
    };
    push_json(&mut content, &details);
    content
}

pub(super) fn tool_result<T>(result: crate::Result<Out<T>>) -> Result<CallToolResult, ErrorData>
where
    T: Debug + Clone + Serialize,
{
    Ok(match result {
        Ok(out) => CallToolResult::success(to_content(out)),
        Err(e) => CallToolResult::error(error_content(&e)),
    })
}
