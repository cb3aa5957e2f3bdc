//! Response classification.
//!
//! Any status outside 2xx is an `HttpStatus` error no matter what the body
//! says. A 2xx body is parsed as JSON only when the request asked for it;
//! otherwise it is handed back untouched, as text when it is valid UTF-8 and
//! as raw bytes when it is not.

use crate::error::GatewayError;
use crate::http::HttpResponse;
use crate::payload::Request;

/// Successful outcome of a call.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Text(String),
    Binary(Vec<u8>),
    Json(serde_json::Value),
}

impl Decoded {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Decoded::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Decoded::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Raw body bytes. JSON values are re-serialized.
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Decoded::Text(text) => text.into_bytes(),
            Decoded::Binary(bytes) => bytes,
            Decoded::Json(value) => value.to_string().into_bytes(),
        }
    }
}

pub fn decode(response: HttpResponse, request: &Request) -> Result<Decoded, GatewayError> {
    if !response.is_success() {
        return Err(GatewayError::HttpStatus {
            status: response.status,
            body: response.body_text(),
        });
    }

    if request.json_parse {
        return serde_json::from_slice(&response.body)
            .map(Decoded::Json)
            .map_err(|e| GatewayError::Decode {
                message: e.to_string(),
                body: response.body_text(),
            });
    }

    Ok(match String::from_utf8(response.body) {
        Ok(text) => Decoded::Text(text),
        Err(e) => Decoded::Binary(e.into_bytes()),
    })
}
