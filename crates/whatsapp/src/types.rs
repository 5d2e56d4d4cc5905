//! JSON frames exchanged with the WhatsApp Web sidecar over its WebSocket.
//!
//! Every frame is a JSON object with a `type` tag. The sidecar pushes client
//! events (`qr`, `ready`, `message_create`, `message_revoke_everyone`,
//! `auth_failure`, `disconnected`) and answers our `request` frames with a
//! `response` carrying the same `request_id`.

use {
    revwatch_channels::{ClientEvent, InboundMessage, RevokedSnapshot},
    serde::{Deserialize, Serialize},
    serde_json::Value,
};

/// Message as serialized by the sidecar.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WireMessage {
    /// Short message id (`id.id` on the client side).
    pub id: String,
    /// Chat the message lives in (`id.remote`).
    #[serde(default)]
    pub remote: String,
    /// Sender reference with its chat-type suffix.
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub body: String,
    #[serde(default, rename = "hasMedia")]
    pub has_media: bool,
}

/// Frames pushed by the sidecar.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SidecarFrame {
    Qr {
        qr: String,
    },
    Ready,
    MessageCreate {
        message: WireMessage,
    },
    MessageRevokeEveryone {
        after: WireMessage,
        #[serde(default)]
        before: Option<WireMessage>,
    },
    AuthFailure {
        #[serde(default)]
        reason: String,
    },
    Disconnected {
        #[serde(default)]
        reason: String,
    },
    Response(ResponseFrame),
}

/// Answer to a [`RequestFrame`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResponseFrame {
    pub request_id: String,
    pub ok: bool,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Operations the sidecar performs on our behalf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SidecarRequest {
    /// Start the browser session. Answered once startup has begun, not once
    /// the session is ready; readiness arrives as a `ready` frame.
    Initialize,
    GetChat { chat_id: String },
    SendMessage { chat_id: String, text: String },
    /// Close the browser session.
    Destroy,
}

impl SidecarRequest {
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::GetChat { .. } => "get_chat",
            Self::SendMessage { .. } => "send_message",
            Self::Destroy => "destroy",
        }
    }
}

/// Envelope for an outbound request.
#[derive(Debug, Clone, Serialize)]
pub struct RequestFrame<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub request_id: &'a str,
    #[serde(flatten)]
    pub request: &'a SidecarRequest,
}

impl<'a> RequestFrame<'a> {
    pub fn new(request_id: &'a str, request: &'a SidecarRequest) -> Self {
        Self {
            kind: "request",
            request_id,
            request,
        }
    }
}

impl From<WireMessage> for InboundMessage {
    fn from(msg: WireMessage) -> Self {
        let remote_chat_id = if msg.remote.is_empty() {
            msg.from.clone()
        } else {
            msg.remote
        };
        Self {
            id: msg.id,
            chat_ref: msg.from,
            body: msg.body,
            has_media: msg.has_media,
            remote_chat_id,
        }
    }
}

impl From<WireMessage> for RevokedSnapshot {
    fn from(msg: WireMessage) -> Self {
        Self {
            id: Some(msg.id).filter(|id| !id.is_empty()),
            body: msg.body,
            remote_chat_id: Some(msg.remote).filter(|r| !r.is_empty()),
        }
    }
}

impl SidecarFrame {
    /// The client event this frame carries. Responses carry none.
    pub fn into_event(self) -> Option<ClientEvent> {
        Some(match self {
            Self::Qr { qr } => ClientEvent::Qr(qr),
            Self::Ready => ClientEvent::Ready,
            Self::MessageCreate { message } => ClientEvent::MessageCreated(message.into()),
            Self::MessageRevokeEveryone { after, before } => ClientEvent::MessageRevoked {
                message_id: after.id,
                before: before.map(Into::into),
            },
            Self::AuthFailure { reason } => ClientEvent::AuthFailure(reason),
            Self::Disconnected { reason } => ClientEvent::Disconnected(reason),
            Self::Response(_) => return None,
        })
    }
}

/// Chat label out of a `get_chat` result (`{"name": ...}` or `null`).
pub fn chat_name_from_result(result: Option<&Value>) -> Option<String> {
    result?
        .get("name")?
        .as_str()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn parse(json: &str) -> SidecarFrame {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn message_create_maps_to_inbound_message() {
        let frame = parse(
            r#"{"type":"message_create","message":{"id":"A1","remote":"15551234567@c.us",
                "from":"15551234567@c.us","body":"hello","hasMedia":false}}"#,
        );
        let Some(ClientEvent::MessageCreated(msg)) = frame.into_event() else {
            panic!("expected message event");
        };
        assert_eq!(msg.id, "A1");
        assert_eq!(msg.chat_ref, "15551234567@c.us");
        assert_eq!(msg.remote_chat_id, "15551234567@c.us");
        assert_eq!(msg.body, "hello");
    }

    #[test]
    fn missing_remote_falls_back_to_sender() {
        let frame = parse(r#"{"type":"message_create","message":{"id":"A1","from":"1@c.us"}}"#);
        let Some(ClientEvent::MessageCreated(msg)) = frame.into_event() else {
            panic!("expected message event");
        };
        assert_eq!(msg.remote_chat_id, "1@c.us");
        assert!(msg.body.is_empty());
    }

    #[test]
    fn revoke_carries_snapshot() {
        let frame = parse(
            r#"{"type":"message_revoke_everyone","after":{"id":"B2"},
                "before":{"id":"B2","remote":"9@c.us","body":"gone"}}"#,
        );
        let event = frame.into_event().unwrap();
        assert_eq!(
            event,
            ClientEvent::MessageRevoked {
                message_id: "B2".into(),
                before: Some(RevokedSnapshot {
                    id: Some("B2".into()),
                    body: "gone".into(),
                    remote_chat_id: Some("9@c.us".into()),
                }),
            }
        );
    }

    #[test]
    fn revoke_without_snapshot() {
        let frame = parse(r#"{"type":"message_revoke_everyone","after":{"id":"C3"},"before":null}"#);
        assert_eq!(
            frame.into_event(),
            Some(ClientEvent::MessageRevoked {
                message_id: "C3".into(),
                before: None,
            })
        );
    }

    #[test]
    fn lifecycle_frames() {
        assert_eq!(
            parse(r#"{"type":"qr","qr":"2@xyz"}"#).into_event(),
            Some(ClientEvent::Qr("2@xyz".into()))
        );
        assert_eq!(parse(r#"{"type":"ready"}"#).into_event(), Some(ClientEvent::Ready));
        assert_eq!(
            parse(r#"{"type":"disconnected","reason":"LOGOUT"}"#).into_event(),
            Some(ClientEvent::Disconnected("LOGOUT".into()))
        );
        assert_eq!(
            parse(r#"{"type":"auth_failure"}"#).into_event(),
            Some(ClientEvent::AuthFailure(String::new()))
        );
    }

    #[test]
    fn response_frame_is_not_an_event() {
        let frame = parse(r#"{"type":"response","request_id":"r1","ok":true,"result":{"name":"Alice"}}"#);
        let SidecarFrame::Response(resp) = frame.clone() else {
            panic!("expected response");
        };
        assert_eq!(resp.request_id, "r1");
        assert_eq!(chat_name_from_result(resp.result.as_ref()).as_deref(), Some("Alice"));
        assert!(frame.into_event().is_none());
    }

    #[test]
    fn request_frames_are_tagged_by_method() {
        let req = SidecarRequest::SendMessage {
            chat_id: "1@c.us".into(),
            text: "seen".into(),
        };
        let json = serde_json::to_value(RequestFrame::new("r9", &req)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "request",
                "request_id": "r9",
                "method": "send_message",
                "chat_id": "1@c.us",
                "text": "seen",
            })
        );

        let json = serde_json::to_value(RequestFrame::new("r1", &SidecarRequest::Destroy)).unwrap();
        assert_eq!(json["method"], "destroy");
    }

    #[test]
    fn blank_or_missing_chat_names_are_none() {
        assert!(chat_name_from_result(None).is_none());
        assert!(chat_name_from_result(Some(&Value::Null)).is_none());
        assert!(chat_name_from_result(Some(&serde_json::json!({"name": " "}))).is_none());
    }
}
