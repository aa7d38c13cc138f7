//! Native-messaging framing and the request/response records.
//!
//! Every message in either direction is a 4-byte **native-endian `i32`** length
//! followed by that many bytes of UTF-8 JSON.

use crate::error::FramingError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::{self, Read, Write};

/// Largest frame we will send to the browser (Chrome's documented limit).
pub const MAX_TO_BROWSER: usize = 1_048_576; // 1 MiB (host -> browser)
/// Largest frame we will accept from the browser.
pub const MAX_FROM_BROWSER: usize = 64 * 1_048_576; // 64 MiB (browser -> host)

/// Version string reported to the extension.
pub const VERSION: &str = concat!("v", env!("CARGO_PKG_VERSION"));

/// Message sent in the acknowledgement before the player is started.
pub const ACK_MESSAGE: &str = "About to spawn.";

/// A request from the extension, normalised from the raw JSON object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// True iff the `init` key was present, whatever its value.
    pub init: bool,
    pub url: Option<String>,
    pub debug: bool,
    /// Reuse a running player. Defaults to `true` when absent or `null`.
    pub single: bool,
}

impl Request {
    /// Normalise a decoded JSON object.
    pub fn from_object(message: &Map<String, Value>) -> Self {
        Self {
            init: message.contains_key("init"),
            url: message
                .get("url")
                .and_then(Value::as_str)
                .map(str::to_owned),
            debug: message
                .get("debug")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            single: message
                .get("single")
                .and_then(Value::as_bool)
                .unwrap_or(true),
        }
    }
}

/// Reply to an `init` request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InitResponse {
    pub version: String,
    pub log_path: String,
    pub socket_path: String,
}

/// Acknowledgement of a URL request, sent before the player is touched.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AckResponse {
    pub version: String,
    pub log_path: String,
    pub message: String,
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub macports: Option<bool>,
}

/// Any response the host writes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Response {
    Init(InitResponse),
    Ack(AckResponse),
}

impl From<InitResponse> for Response {
    fn from(value: InitResponse) -> Self {
        Self::Init(value)
    }
}

impl From<AckResponse> for Response {
    fn from(value: AckResponse) -> Self {
        Self::Ack(value)
    }
}

#[inline]
fn read_exact_i32_len<R: Read>(r: &mut R) -> io::Result<i32> {
    let mut len_buf = [0u8; 4];
    r.read_exact(&mut len_buf)?;
    Ok(i32::from_ne_bytes(len_buf))
}

/// Encode any serde-serializable value into a native-messaging frame:
/// 4-byte native-endian length + JSON bytes.
pub fn encode_message<T: Serialize>(msg: &T) -> Result<Vec<u8>, FramingError> {
    let json = serde_json::to_vec(msg).map_err(FramingError::InvalidJson)?;
    if json.len() > MAX_TO_BROWSER {
        return Err(FramingError::TooLarge {
            len: json.len(),
            max: MAX_TO_BROWSER,
        });
    }
    let mut out = Vec::with_capacity(4 + json.len());
    out.extend_from_slice(&(json.len() as i32).to_ne_bytes());
    out.extend_from_slice(&json);
    Ok(out)
}

/// Decode a single framed message from a reader into its raw JSON text.
pub fn decode_message<R: Read>(reader: &mut R, max_size: usize) -> Result<String, FramingError> {
    let len = read_exact_i32_len(&mut *reader).map_err(FramingError::Truncated)?;
    let len = usize::try_from(len).map_err(|_| FramingError::NegativeLength(len))?;
    let cap = max_size.min(MAX_FROM_BROWSER);
    if len > cap {
        return Err(FramingError::TooLarge { len, max: cap });
    }
    let mut buf = vec![0u8; len];
    reader
        .read_exact(&mut buf)
        .map_err(FramingError::Truncated)?;
    String::from_utf8(buf).map_err(|e| {
        FramingError::InvalidJson(serde::de::Error::custom(format!("invalid UTF-8: {e}")))
    })
}

/// Read one request frame.
pub fn decode_request<R: Read>(reader: &mut R) -> Result<Request, FramingError> {
    let raw = decode_message(reader, MAX_FROM_BROWSER)?;
    let value: Value = serde_json::from_str(&raw).map_err(FramingError::InvalidJson)?;
    let Value::Object(message) = value else {
        return Err(FramingError::NotAnObject);
    };
    Ok(Request::from_object(&message))
}

/// Write one response frame.
///
/// The frame is built in memory first so the length prefix and payload go out
/// in a single write, then flushed.
pub fn encode_response<W: Write>(writer: &mut W, response: &Response) -> Result<(), crate::HostError> {
    let frame = encode_message(response)?;
    writer.write_all(&frame)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;

    fn frame(body: &[u8]) -> Vec<u8> {
        let mut out = (body.len() as i32).to_ne_bytes().to_vec();
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn init_is_presence_only() {
        let req = decode_request(&mut Cursor::new(frame(br#"{"init": false}"#))).unwrap();
        assert!(req.init);
        assert_eq!(req.url, None);
    }

    #[test]
    fn defaults_apply_when_keys_absent_or_null() {
        let raw = br#"{"url": "https://example.com", "debug": null, "single": null}"#;
        let req = decode_request(&mut Cursor::new(frame(raw))).unwrap();
        assert!(!req.init);
        assert!(!req.debug);
        assert!(req.single);
        assert_eq!(req.url.as_deref(), Some("https://example.com"));
    }

    #[test]
    fn explicit_flags_are_honoured() {
        let raw = br#"{"url": "http://a", "debug": true, "single": false}"#;
        let req = decode_request(&mut Cursor::new(frame(raw))).unwrap();
        assert!(req.debug);
        assert!(!req.single);
    }

    #[test]
    fn short_prefix_is_framing_error() {
        let err = decode_request(&mut Cursor::new(vec![1u8, 0])).unwrap_err();
        assert!(matches!(err, FramingError::Truncated(_)));
    }

    #[test]
    fn negative_length_is_rejected() {
        let err = decode_request(&mut Cursor::new((-5i32).to_ne_bytes().to_vec())).unwrap_err();
        assert!(matches!(err, FramingError::NegativeLength(-5)));
    }

    #[test]
    fn truncated_body_is_framing_error() {
        let mut bytes = 10i32.to_ne_bytes().to_vec();
        bytes.extend_from_slice(b"{}");
        let err = decode_request(&mut Cursor::new(bytes)).unwrap_err();
        assert!(err.is_framing());
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let err = decode_request(&mut Cursor::new(frame(b"[1, 2]"))).unwrap_err();
        assert!(matches!(err, FramingError::NotAnObject));

        let err = decode_request(&mut Cursor::new(frame(b"{not json"))).unwrap_err();
        assert!(matches!(err, FramingError::InvalidJson(_)));
    }

    #[test]
    fn ack_omits_macports_when_unset() {
        let ack = AckResponse {
            version: VERSION.into(),
            log_path: "/tmp/main.log".into(),
            message: ACK_MESSAGE.into(),
            env: BTreeMap::new(),
            macports: None,
        };
        let v = serde_json::to_value(&ack).unwrap();
        assert!(v.get("macports").is_none());
        assert_eq!(v["logPath"], json!("/tmp/main.log"));
    }

    #[test]
    fn response_frame_is_length_then_json() {
        let resp = Response::Init(InitResponse {
            version: VERSION.into(),
            log_path: "l".into(),
            socket_path: "s".into(),
        });
        let mut out = Vec::new();
        encode_response(&mut out, &resp).unwrap();
        let len = i32::from_ne_bytes(out[0..4].try_into().unwrap()) as usize;
        assert_eq!(len, out.len() - 4);
        let v: Value = serde_json::from_slice(&out[4..]).unwrap();
        assert_eq!(v, json!({"version": VERSION, "logPath": "l", "socketPath": "s"}));
    }

    #[test]
    fn ack_response_survives_a_frame() {
        let resp = Response::Ack(AckResponse {
            version: VERSION.into(),
            log_path: "/l/main.log".into(),
            message: ACK_MESSAGE.into(),
            env: BTreeMap::from([
                ("PATH".to_string(), "/opt/local/bin:/usr/bin".to_string()),
                ("HOME".to_string(), "/home/u".to_string()),
            ]),
            macports: Some(true),
        });
        let mut out = Vec::new();
        encode_response(&mut out, &resp).unwrap();
        let raw = decode_message(&mut Cursor::new(out), MAX_TO_BROWSER).unwrap();
        let back: Response = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, resp);
        assert_eq!(serde_json::from_str::<Value>(&raw).unwrap()["macports"], json!(true));
    }
}
