//! Conversion between hyper messages and the dispatch engine's types.

use crate::request::{MultiDict, Request};
use crate::response::{canonical_reason, Response, ResponseBody};
use bytes::Bytes;
use futures::TryStreamExt;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::{Frame, Incoming};
use hyper::ext::ReasonPhrase;
use hyper::header::{HeaderName, HeaderValue};
use hyper::StatusCode;
use std::borrow::Cow;
use std::io;
use tracing::warn;

pub type ServerBody = UnsyncBoxBody<Bytes, io::Error>;

/// Headers hyper derives from the body itself.
const FRAMING: &[&str] = &["content-length", "transfer-encoding"];

/// Percent-decode a URI path. `+` is literal in paths; undecodable input is kept raw.
fn decode_path(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| raw.to_string())
}

/// Read the whole request body and build a [`Request`].
pub async fn read_request(req: hyper::Request<Incoming>) -> Result<Request, hyper::Error> {
    let (parts, body) = req.into_parts();
    let body = body.collect().await?.to_bytes();

    let mut request = Request::new(parts.method.as_str(), decode_path(parts.uri.path()))
        .with_query(MultiDict::parse_query(parts.uri.query()))
        .with_body(body);
    for (name, value) in &parts.headers {
        request = request.with_header(name.as_str(), String::from_utf8_lossy(value.as_bytes()));
    }
    Ok(request)
}

/// Turn a [`Response`] into a hyper response, streaming bodies as they arrive.
pub fn into_hyper(response: Response) -> hyper::Response<ServerBody> {
    let (status, reason, headers, body) = response.into_parts();

    let body: ServerBody = match body {
        ResponseBody::Full(bytes) => Full::new(bytes)
            .map_err(|never| match never {})
            .boxed_unsync(),
        ResponseBody::Stream(stream) => StreamBody::new(stream.map_ok(Frame::data)).boxed_unsync(),
    };

    let mut out = hyper::Response::new(body);
    *out.status_mut() = StatusCode::from_u16(status).unwrap_or_else(|_| {
        warn!("Invalid status {} replaced with 500", status);
        StatusCode::INTERNAL_SERVER_ERROR
    });

    if let Some(reason) = reason.filter(|r| r.as_str() != canonical_reason(status)) {
        match ReasonPhrase::try_from(reason) {
            Ok(phrase) => {
                out.extensions_mut().insert(phrase);
            }
            Err(e) => warn!("Dropping invalid reason phrase: {}", e),
        }
    }

    for (name, value) in headers {
        if FRAMING.iter().any(|h| name.eq_ignore_ascii_case(h)) {
            continue;
        }
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                out.headers_mut().append(name, value);
            }
            _ => warn!("Dropping invalid response header {}: {:?}", name, value),
        }
    }
    out
}
