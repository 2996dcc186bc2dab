//! The deployed flow's test endpoint.
//!
//! The harness answers every request with a JSON body carrying the two
//! assertion results:
//!
//! ```json
//! {"flow_attributes_match": "true", "flow_content_match": "match"}
//! ```

use crate::error::{FlowTestError, Result};
use serde_json::Value;
use tracing::debug;

/// Multipart field the input file is uploaded under.
pub const UPLOAD_FIELD: &str = "filename";

/// Content-match value meaning the output content matched.
pub const CONTENT_MATCH: &str = "match";

const BOUNDARY: &str = "flowtest-boundary-7d3c9a41";

/// How a test case is submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Bare GET; the harness injects the input itself.
    Get,
    /// Multipart upload of the input file.
    Upload {
        /// File name sent with the part.
        file_name: String,
        /// Raw file content.
        content: Vec<u8>,
    },
}

/// Something that runs a test case against the deployed flow and returns
/// the raw response body.
pub trait TestEndpoint {
    /// Submits the test input.
    fn submit(&self, submission: &Submission) -> Result<String>;
}

/// HTTP test endpoint.
pub struct HttpTestEndpoint {
    agent: ureq::Agent,
    url: String,
}

impl HttpTestEndpoint {
    /// Creates an endpoint client for `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
            url: url.into(),
        }
    }

    /// Endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl TestEndpoint for HttpTestEndpoint {
    fn submit(&self, submission: &Submission) -> Result<String> {
        let response = match submission {
            Submission::Get => {
                debug!(url = self.url.as_str(), "GET test endpoint");
                self.agent.get(&self.url).call()
            }
            Submission::Upload { file_name, content } => {
                debug!(url = self.url.as_str(), bytes = content.len(), "Uploading test input");
                let body = multipart_body(file_name, content);
                self.agent
                    .post(&self.url)
                    .header(
                        "Content-Type",
                        &format!("multipart/form-data; boundary={}", BOUNDARY),
                    )
                    .send(&body)
            }
        }
        .map_err(|e| FlowTestError::Endpoint(e.to_string()))?;

        response
            .into_body()
            .read_to_string()
            .map_err(|e| FlowTestError::Endpoint(format!("failed to read response: {}", e)))
    }
}

/// Builds a single-part multipart body.
///
/// ureq does not bundle multipart support, so the body is assembled by hand.
fn multipart_body(file_name: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(content.len() + 256);
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{UPLOAD_FIELD}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// The two assertion results reported by the harness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointResponse {
    /// `"true"` when every expected attribute matched.
    pub flow_attributes_match: String,
    /// `"match"` when the content matched.
    pub flow_content_match: String,
}

impl EndpointResponse {
    /// Parses a response body.
    ///
    /// `flow_content_match` may be absent only when content checking is
    /// skipped, in which case it reads as `"match"`.
    pub fn parse(body: &str, skip_content_check: bool) -> Result<Self> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| FlowTestError::MalformedResponse(format!("{}: {}", e, preview(body))))?;
        let object = value.as_object().ok_or_else(|| {
            FlowTestError::MalformedResponse(format!("expected a JSON object: {}", preview(body)))
        })?;

        let field = |name: &'static str| -> Result<Option<String>> {
            match object.get(name) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::String(s)) => Ok(Some(s.clone())),
                Some(Value::Bool(b)) => Ok(Some(b.to_string())),
                Some(other) => Err(FlowTestError::MalformedResponse(format!(
                    "field '{}' is not a string: {}",
                    name, other
                ))),
            }
        };

        let flow_attributes_match = field("flow_attributes_match")?
            .ok_or(FlowTestError::MissingResponseField("flow_attributes_match"))?;
        let flow_content_match = if skip_content_check {
            CONTENT_MATCH.to_string()
        } else {
            field("flow_content_match")?
                .ok_or(FlowTestError::MissingResponseField("flow_content_match"))?
        };

        Ok(Self {
            flow_attributes_match,
            flow_content_match,
        })
    }

    /// Both assertions hold.
    pub fn passed(&self) -> bool {
        self.flow_attributes_match == "true" && self.flow_content_match == CONTENT_MATCH
    }
}

fn preview(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() <= MAX {
        body.to_string()
    } else {
        let cut: String = body.chars().take(MAX).collect();
        format!("{}...", cut)
    }
}
