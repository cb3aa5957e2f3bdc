//! Request description and payload encoding.
//!
//! # Design
//! A `Request` names the remote operation (`uri`), what the caller wants
//! back (`accept`, `json_parse`), and an optional `Payload`. The payload is a
//! closed set of shapes resolved once here: no body, an empty multipart form,
//! a single file part carrying text or raw bytes, or a value that cannot be
//! sent at all. Encoding is pure apart from drawing a random boundary.

use uuid::Uuid;

use crate::error::GatewayError;
use crate::http::{HttpMethod, HttpRequest};
use crate::provider::Provider;

const BOUNDARY_PREFIX: &str = "gateway-boundary-";
const FIELD_NAME: &str = "file";

/// Body content of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Payload {
    /// No body at all.
    #[default]
    Absent,
    /// An explicit "nothing": encodes to a multipart form without parts.
    Null,
    Text(String),
    Bytes(Vec<u8>),
    /// A value with no wire representation; names what was rejected.
    Unsupported(String),
}

impl Payload {
    /// Mark a value of type `T` as unsendable.
    pub fn unsupported<T: ?Sized>(_value: &T) -> Self {
        Payload::Unsupported(std::any::type_name::<T>().to_string())
    }

    /// Map a dynamically typed value onto a payload. Only strings and `null`
    /// have a wire form; everything else is `Unsupported`.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Payload::Null,
            serde_json::Value::String(text) => Payload::Text(text.clone()),
            serde_json::Value::Bool(_) => Payload::Unsupported("boolean".to_string()),
            serde_json::Value::Number(_) => Payload::Unsupported("number".to_string()),
            serde_json::Value::Array(_) => Payload::Unsupported("array".to_string()),
            serde_json::Value::Object(_) => Payload::Unsupported("object".to_string()),
        }
    }

    fn file_bytes(&self) -> Option<&[u8]> {
        match self {
            Payload::Text(text) => Some(text.as_bytes()),
            Payload::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Payload::Bytes(bytes.to_vec())
    }
}

impl<T: Into<Payload>> From<Option<T>> for Payload {
    fn from(value: Option<T>) -> Self {
        value.map_or(Payload::Null, Into::into)
    }
}

/// One call against the gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    /// Appended verbatim to the provider's base path.
    pub uri: String,
    pub payload: Payload,
    /// Value of the `Accept` header, if any.
    pub accept: Option<String>,
    /// Parse a successful body as JSON instead of returning it as text.
    pub json_parse: bool,
}

impl Request {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Self::default()
        }
    }

    pub fn payload(mut self, payload: impl Into<Payload>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    pub fn json_parse(mut self, json_parse: bool) -> Self {
        self.json_parse = json_parse;
        self
    }
}

/// A `multipart/form-data` body with at most one file part.
#[derive(Debug, Clone, PartialEq, Eq)]
struct MultipartBody {
    boundary: String,
    file: Option<Vec<u8>>,
}

impl MultipartBody {
    fn content_type_header(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    fn into_bytes(self) -> Vec<u8> {
        let mut out = Vec::new();
        if let Some(file) = self.file {
            out.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{FIELD_NAME}\"; filename=\"{FIELD_NAME}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n",
                    self.boundary
                )
                .as_bytes(),
            );
            out.extend_from_slice(&file);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        out
    }
}

/// Build the wire request for `request` against `provider`.
pub fn encode(provider: &Provider, request: &Request) -> Result<HttpRequest, GatewayError> {
    encode_with(provider, request, random_boundary)
}

pub(crate) fn encode_with(
    provider: &Provider,
    request: &Request,
    next_boundary: impl FnMut() -> String,
) -> Result<HttpRequest, GatewayError> {
    let multipart = match &request.payload {
        Payload::Absent => None,
        Payload::Unsupported(what) => {
            return Err(GatewayError::Encoding(format!("unsupported payload type '{what}'")));
        }
        payload => {
            let file = payload.file_bytes();
            Some(MultipartBody {
                boundary: choose_boundary(file.unwrap_or_default(), next_boundary),
                file: file.map(<[u8]>::to_vec),
            })
        }
    };

    let mut headers = Vec::new();
    if let Some(accept) = &request.accept {
        headers.push(("Accept".to_string(), accept.clone()));
    }
    let body = multipart.map(|multipart| {
        headers.push(("Content-Type".to_string(), multipart.content_type_header()));
        multipart.into_bytes()
    });

    Ok(HttpRequest {
        method: HttpMethod::Post,
        url: provider.url_for(&request.uri),
        headers,
        body,
    })
}

fn random_boundary() -> String {
    format!("{BOUNDARY_PREFIX}{}", Uuid::new_v4().simple())
}

/// Draw boundaries until one does not occur inside `data`.
fn choose_boundary(data: &[u8], mut next_boundary: impl FnMut() -> String) -> String {
    loop {
        let boundary = next_boundary();
        if !contains(data, boundary.as_bytes()) {
            return boundary;
        }
        tracing::debug!(%boundary, "boundary collides with payload, drawing another");
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|window| window == needle)
}
