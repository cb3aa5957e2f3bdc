//! Gateway client: provider state, the send pipeline, and named operations.
//!
//! # Design
//! `GatewayClient` owns exactly one piece of mutable state, the active
//! `Provider`, held as an `Arc` behind a lock. Building a request clones the
//! `Arc` once, so a call keeps the provider it started with even if
//! `set_provider` runs while it is in flight. Every call runs
//! encode → dispatch → decode; encoding failures end the call before any
//! network I/O.

use std::sync::{Arc, PoisonError, RwLock};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::decode::{decode, Decoded};
use crate::error::{GatewayError, TransportErrorKind};
use crate::http::HttpRequest;
use crate::payload::{encode, Payload, Request};
use crate::provider::{Provider, ProviderOptions};
use crate::transport::{dispatch, ReqwestTransport, Transport};
use crate::types::Added;

const JSON: &str = "application/json";

/// Asynchronous client for a content-addressed storage gateway.
pub struct GatewayClient {
    provider: RwLock<Arc<Provider>>,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("provider", &self.provider())
            .finish_non_exhaustive()
    }
}

impl GatewayClient {
    /// Client over the default `reqwest` transport.
    pub fn new(provider: Provider) -> Result<Self, GatewayError> {
        Ok(Self::with_transport(provider, Arc::new(ReqwestTransport::new()?)))
    }

    /// Client from optional settings; `None` means all defaults.
    pub fn from_options(options: Option<ProviderOptions>) -> Result<Self, GatewayError> {
        Self::new(Provider::from_options(options.unwrap_or_default())?)
    }

    /// Client from a dynamically shaped provider value.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, GatewayError> {
        Self::new(Provider::from_value(value)?)
    }

    pub fn with_transport(provider: Provider, transport: Arc<dyn Transport>) -> Self {
        Self {
            provider: RwLock::new(Arc::new(provider)),
            transport,
        }
    }

    /// Snapshot of the active provider.
    pub fn provider(&self) -> Arc<Provider> {
        Arc::clone(&self.provider.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Replace the active provider. Fields missing from `options` take their
    /// defaults, not their current values.
    pub fn set_provider(&self, options: ProviderOptions) -> Result<(), GatewayError> {
        self.replace_provider(Provider::from_options(options)?);
        Ok(())
    }

    /// Like `set_provider`, for dynamically shaped input.
    pub fn set_provider_value(&self, value: &serde_json::Value) -> Result<(), GatewayError> {
        self.replace_provider(Provider::from_value(value)?);
        Ok(())
    }

    pub fn replace_provider(&self, provider: Provider) {
        tracing::debug!(base = %provider.request_base(), "provider replaced");
        *self.provider.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(provider);
    }

    /// Encode `request` against the current provider.
    pub fn build_request(&self, request: &Request) -> Result<HttpRequest, GatewayError> {
        encode(&self.provider(), request)
    }

    /// Run one call to completion.
    pub async fn send(&self, request: Request) -> Result<Decoded, GatewayError> {
        let encoded = self.build_request(&request)?;
        execute(self.transport.as_ref(), encoded, &request).await
    }

    /// Start one call on the current Tokio runtime and return immediately.
    ///
    /// The request is encoded before this returns, so the provider in effect
    /// now is the one used. `callback`, when given, receives the outcome;
    /// without one the outcome is dropped and failures are only logged.
    ///
    /// Returns `None` when there is no runtime to run the call on. The call
    /// is not started and the `Transport` error goes through the same path
    /// as any other outcome.
    pub fn send_with<F>(&self, request: Request, callback: Option<F>) -> Option<JoinHandle<()>>
    where
        F: FnOnce(Result<Decoded, GatewayError>) + Send + 'static,
    {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                let err = GatewayError::Transport {
                    kind: TransportErrorKind::Request,
                    message: format!("no async runtime to run the call on: {e}"),
                };
                complete(&request, callback, Err(err));
                return None;
            }
        };

        let encoded = self.build_request(&request);
        let transport = Arc::clone(&self.transport);
        Some(runtime.spawn(async move {
            let result = match encoded {
                Ok(encoded) => execute(transport.as_ref(), encoded, &request).await,
                Err(e) => Err(e),
            };
            complete(&request, callback, result);
        }))
    }

    /// `send_with` without a callback.
    pub fn send_detached(&self, request: Request) -> Option<JoinHandle<()>> {
        self.send_with(request, None::<fn(Result<Decoded, GatewayError>)>)
    }

    /// Store `data` and return its content identifier.
    pub async fn add(&self, data: impl Into<Payload>) -> Result<String, GatewayError> {
        let request = Request::new("/add").payload(data).accept(JSON).json_parse(true);
        let value = expect_json(self.send(request).await?)?;
        let added: Added = from_json_value(value)?;
        Ok(added.hash)
    }

    /// Serialize `value` as JSON and store it.
    pub async fn add_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, GatewayError> {
        let text = serde_json::to_string(value).map_err(|e| GatewayError::Encoding(e.to_string()))?;
        self.add(text).await
    }

    /// Retrieve content as text.
    pub async fn cat(&self, hash: &str) -> Result<String, GatewayError> {
        match self.send(Request::new(format!("/cat/{hash}"))).await? {
            Decoded::Text(text) => Ok(text),
            other => Err(GatewayError::Decode {
                message: "content is not valid UTF-8".to_string(),
                body: String::from_utf8_lossy(&other.into_bytes()).into_owned(),
            }),
        }
    }

    /// Retrieve content as raw bytes.
    pub async fn cat_bytes(&self, hash: &str) -> Result<Vec<u8>, GatewayError> {
        Ok(self.send(Request::new(format!("/cat/{hash}"))).await?.into_bytes())
    }

    /// Retrieve content and parse it as JSON into `T`.
    pub async fn cat_json<T: DeserializeOwned>(&self, hash: &str) -> Result<T, GatewayError> {
        let request = Request::new(format!("/cat/{hash}")).json_parse(true);
        from_json_value(expect_json(self.send(request).await?)?)
    }

    /// Gateway-reported metadata for a content identifier.
    pub async fn stat(&self, hash: &str) -> Result<serde_json::Value, GatewayError> {
        let request = Request::new(format!("/object/stat/{hash}")).accept(JSON).json_parse(true);
        expect_json(self.send(request).await?)
    }
}

fn complete<F>(request: &Request, callback: Option<F>, result: Result<Decoded, GatewayError>)
where
    F: FnOnce(Result<Decoded, GatewayError>),
{
    match callback {
        Some(callback) => callback(result),
        None => {
            if let Err(e) = result {
                tracing::warn!(uri = %request.uri, error = %e, "detached gateway call failed");
            }
        }
    }
}

async fn execute(
    transport: &dyn Transport,
    encoded: HttpRequest,
    request: &Request,
) -> Result<Decoded, GatewayError> {
    let response = dispatch(transport, encoded).await?;
    decode(response, request)
}

fn expect_json(decoded: Decoded) -> Result<serde_json::Value, GatewayError> {
    match decoded {
        Decoded::Json(value) => Ok(value),
        other => Err(GatewayError::Decode {
            message: "expected a JSON body".to_string(),
            body: String::from_utf8_lossy(&other.into_bytes()).into_owned(),
        }),
    }
}

fn from_json_value<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, GatewayError> {
    let body = value.to_string();
    serde_json::from_value(value).map_err(|e| GatewayError::Decode {
        message: e.to_string(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::oneshot;

    use super::*;
    use crate::error::ErrorKind;
    use crate::http::HttpResponse;

    struct Scripted {
        seen: Mutex<Vec<HttpRequest>>,
        status: u16,
        body: Vec<u8>,
    }

    impl Scripted {
        fn new(status: u16, body: &[u8]) -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
                status,
                body: body.to_vec(),
            })
        }

        fn urls(&self) -> Vec<String> {
            self.seen.lock().unwrap().iter().map(|r| r.url.clone()).collect()
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, GatewayError> {
            self.seen.lock().unwrap().push(request);
            Ok(HttpResponse {
                status: self.status,
                headers: Vec::new(),
                body: self.body.clone(),
            })
        }
    }

    fn client(transport: Arc<Scripted>) -> GatewayClient {
        GatewayClient::with_transport(Provider::default(), transport)
    }

    #[test]
    fn set_provider_replaces_every_field() {
        let c = client(Scripted::new(200, b""));
        c.set_provider_value(&json!({ "host": "something", "port": 2001 })).unwrap();
        let p = c.provider();
        assert_eq!((p.host.as_str(), p.port, p.base.as_str()), ("something", 2001, "/api/v0"));

        c.set_provider_value(&json!({ "host": "something", "protocol": "https" })).unwrap();
        let p = c.provider();
        assert_eq!(p.port, 5001);
        assert_eq!(p.request_base(), "https://something:5001/api/v0");
    }

    #[test]
    fn invalid_provider_leaves_current_one_in_place() {
        let c = client(Scripted::new(200, b""));
        c.set_provider(ProviderOptions {
            host: Some("kept".into()),
            ..ProviderOptions::default()
        })
        .unwrap();
        let err = c.set_provider_value(&json!(2342353535u64)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert_eq!(c.provider().host, "kept");
    }

    #[tokio::test]
    async fn send_returns_text_by_default() {
        let transport = Scripted::new(200, b"hello world!");
        let c = client(transport.clone());
        let decoded = c
            .send(Request::new("/cat/Qm1").payload("").accept(JSON))
            .await
            .unwrap();
        assert_eq!(decoded.as_text(), Some("hello world!"));
        assert_eq!(transport.urls(), ["http://localhost:5001/api/v0/cat/Qm1"]);
    }

    #[tokio::test]
    async fn unsupported_payload_never_reaches_transport() {
        let transport = Scripted::new(200, b"ok");
        let c = client(transport.clone());
        let request = Request::new("/cat/Qm1").payload(Payload::unsupported(&GatewayClient::send_detached));
        let err = c.send(request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encoding);
        assert!(transport.urls().is_empty());
    }

    #[tokio::test]
    async fn error_status_wins_over_valid_body() {
        let c = client(Scripted::new(500, br#"{"Hash":"QmAbc"}"#));
        let err = c.add("hello").await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        let err = c.stat("QmAbc").await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        let err = c.cat("QmAbc").await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        let err = c.cat_json::<serde_json::Value>("QmAbc").await.unwrap_err();
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    async fn add_extracts_hash_and_pins() {
        let transport = Scripted::new(200, br#"{"Name":"file","Hash":"QmAbc","Size":"5"}"#);
        let c = client(transport.clone());
        assert_eq!(c.add("hello").await.unwrap(), "QmAbc");
        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].url, "http://localhost:5001/api/v0/add?pin=true");
        assert_eq!(seen[0].header("Accept"), Some(JSON));
        assert!(seen[0]
            .header("Content-Type")
            .unwrap()
            .starts_with("multipart/form-data; boundary="));
    }

    #[tokio::test]
    async fn add_without_hash_is_a_decode_error() {
        let c = client(Scripted::new(200, br#"{"Name":"file"}"#));
        let err = c.add("hello").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[tokio::test]
    async fn add_json_sends_serialized_value() {
        let transport = Scripted::new(200, br#"{"Hash":"QmJson"}"#);
        let c = client(transport.clone());
        let hash = c.add_json(&json!({ "hello": "world!!!" })).await.unwrap();
        assert_eq!(hash, "QmJson");
        let body = transport.seen.lock().unwrap()[0].body.clone().unwrap();
        let body = String::from_utf8(body).unwrap();
        assert!(body.contains(r#"{"hello":"world!!!"}"#));
    }

    #[tokio::test]
    async fn cat_json_rejects_non_json_content() {
        let c = client(Scripted::new(200, b"hello world!"));
        let err = c.cat_json::<serde_json::Value>("QmText").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[tokio::test]
    async fn cat_json_reports_shape_mismatch_as_decode_error() {
        #[derive(Debug, serde::Deserialize)]
        struct Greeting {
            #[allow(dead_code)]
            hello: String,
        }
        let c = client(Scripted::new(200, br#"{"bye":1}"#));
        let err = c.cat_json::<Greeting>("QmOther").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[tokio::test]
    async fn cat_of_binary_content_needs_cat_bytes() {
        let c = client(Scripted::new(200, &[0xff, 0xd8, 0xff, 0xe0]));
        assert_eq!(c.cat("QmJpg").await.unwrap_err().kind(), ErrorKind::Decode);
        assert_eq!(c.cat_bytes("QmJpg").await.unwrap(), vec![0xff, 0xd8, 0xff, 0xe0]);
    }

    #[tokio::test]
    async fn stat_uses_object_stat_endpoint() {
        let transport = Scripted::new(200, br#"{"Hash":"QmAbc","NumLinks":0}"#);
        let c = client(transport.clone());
        let stat = c.stat("QmAbc").await.unwrap();
        assert_eq!(stat["NumLinks"], 0);
        assert_eq!(transport.urls(), ["http://localhost:5001/api/v0/object/stat/QmAbc"]);
    }

    #[tokio::test]
    async fn send_with_delivers_result_to_callback() {
        let c = client(Scripted::new(200, b"payload"));
        let (tx, rx) = oneshot::channel();
        c.send_with(
            Request::new("/cat/Qm1"),
            Some(move |result: Result<Decoded, GatewayError>| {
                let _ = tx.send(result);
            }),
        );
        let result = rx.await.unwrap();
        assert_eq!(result.unwrap().as_text(), Some("payload"));
    }

    #[tokio::test]
    async fn send_with_delivers_encoding_error_to_callback() {
        let transport = Scripted::new(200, b"payload");
        let c = client(transport.clone());
        let (tx, rx) = oneshot::channel();
        c.send_with(
            Request::new("/cat/Qm1").payload(Payload::Unsupported("symbol".into())),
            Some(move |result: Result<Decoded, GatewayError>| {
                let _ = tx.send(result);
            }),
        );
        assert_eq!(rx.await.unwrap().unwrap_err().kind(), ErrorKind::Encoding);
        assert!(transport.urls().is_empty());
    }

    #[tokio::test]
    async fn detached_send_without_callback_completes_quietly() {
        let c = client(Scripted::new(500, b"nope"));
        c.send_detached(Request::new("/cat/Qm1")).unwrap().await.unwrap();
    }

    #[test]
    fn detached_send_outside_runtime_is_not_started() {
        let transport = Scripted::new(200, b"ok");
        let c = client(transport.clone());
        assert!(c.send_detached(Request::new("/cat/Qm1")).is_none());
        assert!(transport.urls().is_empty());
    }

    #[test]
    fn send_with_outside_runtime_reports_to_callback() {
        let c = client(Scripted::new(200, b"ok"));
        let (tx, rx) = std::sync::mpsc::channel();
        let handle = c.send_with(
            Request::new("/cat/Qm1"),
            Some(move |result: Result<Decoded, GatewayError>| {
                tx.send(result).unwrap();
            }),
        );
        assert!(handle.is_none());
        let err = rx.recv().unwrap().unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Transport {
                kind: TransportErrorKind::Request,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn in_flight_call_keeps_its_provider() {
        let transport = Scripted::new(200, b"ok");
        let c = client(transport.clone());
        c.set_provider_value(&json!({ "host": "first" })).unwrap();
        let handle = c.send_detached(Request::new("/cat/Qm1")).unwrap();
        c.set_provider_value(&json!({ "host": "second" })).unwrap();
        handle.await.unwrap();
        c.send(Request::new("/cat/Qm2")).await.unwrap();
        assert_eq!(
            transport.urls(),
            [
                "http://first:5001/api/v0/cat/Qm1",
                "http://second:5001/api/v0/cat/Qm2"
            ]
        );
    }
}
