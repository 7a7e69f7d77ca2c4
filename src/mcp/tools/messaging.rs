//! Messaging tools.
//!
//! Delivery is simulated: the handlers only summarize what would have been
//! sent. Targets are always lists; a single recipient is a list of one and an
//! empty list is a valid no-op that reports a count of 0.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::mcp::registry::{ToolDefinition, ToolHandler, ToolOutput};
use crate::mcp::schema::{ParamType, ParameterSchema, ScalarType};

const STRING: ParamType = ParamType::Scalar(ScalarType::String);
const STRING_LIST: ParamType = ParamType::List(ScalarType::String);

/// Send an email to every address in the list
pub struct SendEmailTool;

impl SendEmailTool {
    pub fn definition() -> ToolDefinition {
        ToolDefinition::new(
            "send_email",
            "Send an email to the specified addresses with the given subject and body.",
            ParameterSchema::new()
                .required("emails", STRING_LIST, "Recipient email addresses")
                .required("subject", STRING, "Email subject")
                .required("body", STRING, "Email body"),
            Arc::new(Self),
        )
    }
}

#[async_trait]
impl ToolHandler for SendEmailTool {
    async fn execute(&self, args: Value) -> Result<ToolOutput, String> {
        #[derive(Deserialize)]
        struct Args {
            emails: Vec<String>,
            subject: String,
            #[allow(dead_code)]
            body: String,
        }

        let params: Args =
            serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {}", e))?;

        tracing::info!(recipients = params.emails.len(), "Simulated email delivery");

        Ok(ToolOutput::text(format!(
            "Emails sent to {} recipients ({}) with subject '{}'",
            params.emails.len(),
            params.emails.join(", "),
            params.subject
        ))
        .with_structured(json!({
            "count": params.emails.len(),
            "recipients": params.emails,
        })))
    }
}

/// Send an SMS to every phone number in the list
pub struct SendSmsTool;

impl SendSmsTool {
    pub fn definition() -> ToolDefinition {
        ToolDefinition::new(
            "send_sms",
            "Send an SMS to the specified phone numbers with the given message.",
            ParameterSchema::new()
                .required("phone_numbers", STRING_LIST, "Recipient phone numbers")
                .required("message", STRING, "Message text"),
            Arc::new(Self),
        )
    }
}

#[async_trait]
impl ToolHandler for SendSmsTool {
    async fn execute(&self, args: Value) -> Result<ToolOutput, String> {
        #[derive(Deserialize)]
        struct Args {
            phone_numbers: Vec<String>,
            message: String,
        }

        let params: Args =
            serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {}", e))?;

        tracing::info!(numbers = params.phone_numbers.len(), "Simulated SMS delivery");

        Ok(ToolOutput::text(format!(
            "SMS sent to {} numbers ({}) with message '{}'",
            params.phone_numbers.len(),
            params.phone_numbers.join(", "),
            params.message
        ))
        .with_structured(json!({
            "count": params.phone_numbers.len(),
            "numbers": params.phone_numbers,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn email_summary_lists_recipients_in_order() {
        let output = SendEmailTool
            .execute(json!({
                "emails": ["a@x.com", "b@x.com"],
                "subject": "Hi",
                "body": "Hello"
            }))
            .await
            .unwrap();

        assert_eq!(
            output.text,
            "Emails sent to 2 recipients (a@x.com, b@x.com) with subject 'Hi'"
        );
        assert_eq!(
            output.structured,
            Some(json!({ "count": 2, "recipients": ["a@x.com", "b@x.com"] }))
        );
    }

    #[tokio::test]
    async fn empty_recipient_list_reports_zero() {
        let output = SendEmailTool
            .execute(json!({ "emails": [], "subject": "Hi", "body": "Hello" }))
            .await
            .unwrap();

        assert_eq!(output.text, "Emails sent to 0 recipients () with subject 'Hi'");
        assert_eq!(output.structured.unwrap()["count"], 0);
    }

    #[tokio::test]
    async fn sms_summary_lists_numbers_in_order() {
        let output = SendSmsTool
            .execute(json!({ "phone_numbers": ["+1", "+2"], "message": "Ping" }))
            .await
            .unwrap();

        assert_eq!(output.text, "SMS sent to 2 numbers (+1, +2) with message 'Ping'");
        assert_eq!(output.structured.unwrap()["numbers"], json!(["+1", "+2"]));
    }

    #[test]
    fn schemas_declare_list_targets() {
        let email = SendEmailTool::definition().to_tool();
        assert_eq!(email.input_schema["properties"]["emails"]["type"], "array");
        assert_eq!(
            email.input_schema["required"],
            json!(["emails", "subject", "body"])
        );

        let sms = SendSmsTool::definition().to_tool();
        assert_eq!(sms.input_schema["properties"]["phone_numbers"]["type"], "array");
    }
}
