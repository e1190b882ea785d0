use serde::Deserialize;

/// Webhook payload as delivered by the WhatsApp gateway. Every field is
/// optional so arbitrary payloads deserialize cleanly and fail validation
/// instead of deserialization.
#[derive(Debug, Deserialize, Default)]
pub struct WebhookPayload {
    #[serde(default)]
    pub data: EventData,
}

#[derive(Debug, Deserialize, Default)]
pub struct EventData {
    #[serde(default)]
    pub key: MessageKey,
    #[serde(default)]
    pub message: MessageBody,
}

#[derive(Debug, Deserialize, Default)]
pub struct MessageKey {
    #[serde(rename = "remoteJid")]
    pub remote_jid: Option<String>,
    /// Present only on group messages; its value is irrelevant.
    #[serde(rename = "participantLid")]
    pub participant_lid: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, Default)]
pub struct MessageBody {
    pub conversation: Option<String>,
}

/// Why a payload was rejected by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reject {
    GroupMismatch,
    NotGroupMessage,
    NoTextBody,
}

impl std::fmt::Display for Reject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reject::GroupMismatch => write!(f, "message is not from the configured group"),
            Reject::NotGroupMessage => {
                write!(f, "participant marker missing, not a group message")
            }
            Reject::NoTextBody => write!(f, "no conversation text in message"),
        }
    }
}

/// Validate a webhook payload against the configured group and pull out the
/// conversation text. Checked in order: group JID match, participant marker
/// present (non-null), conversation body present.
pub fn validate<'a>(payload: &'a WebhookPayload, group_jid: &str) -> Result<&'a str, Reject> {
    let key = &payload.data.key;

    if key.remote_jid.as_deref() != Some(group_jid) {
        return Err(Reject::GroupMismatch);
    }

    match &key.participant_lid {
        None | Some(serde_json::Value::Null) => return Err(Reject::NotGroupMessage),
        Some(_) => {}
    }

    payload
        .data
        .message
        .conversation
        .as_deref()
        .ok_or(Reject::NoTextBody)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GROUP: &str = "120363403986445201@g.us";

    fn payload(body: serde_json::Value) -> WebhookPayload {
        serde_json::from_value(body).unwrap()
    }

    fn group_message(jid: &str, participant: Option<&str>, text: Option<&str>) -> WebhookPayload {
        payload(serde_json::json!({
            "data": {
                "key": {
                    "remoteJid": jid,
                    "participantLid": participant,
                },
                "message": { "conversation": text },
            }
        }))
    }

    #[test]
    fn test_valid_group_message_yields_text() {
        let p = group_message(GROUP, Some("57311@lid"), Some("hola"));
        assert_eq!(validate(&p, GROUP), Ok("hola"));
    }

    #[test]
    fn test_wrong_group_rejected() {
        let p = group_message("other@g.us", Some("57311@lid"), Some("hola"));
        assert_eq!(validate(&p, GROUP), Err(Reject::GroupMismatch));
    }

    #[test]
    fn test_missing_remote_jid_rejected() {
        let p = payload(serde_json::json!({
            "data": { "message": { "conversation": "hola" } }
        }));
        assert_eq!(validate(&p, GROUP), Err(Reject::GroupMismatch));
    }

    #[test]
    fn test_missing_participant_rejected() {
        let p = group_message(GROUP, None, Some("hola"));
        assert_eq!(validate(&p, GROUP), Err(Reject::NotGroupMessage));
    }

    #[test]
    fn test_null_participant_rejected() {
        let p = payload(serde_json::json!({
            "data": {
                "key": { "remoteJid": GROUP, "participantLid": null },
                "message": { "conversation": "hola" },
            }
        }));
        assert_eq!(validate(&p, GROUP), Err(Reject::NotGroupMessage));
    }

    #[test]
    fn test_non_string_participant_accepted() {
        // The marker only has to exist; the gateway sometimes sends objects.
        let p = payload(serde_json::json!({
            "data": {
                "key": { "remoteJid": GROUP, "participantLid": { "id": 7 } },
                "message": { "conversation": "hola" },
            }
        }));
        assert_eq!(validate(&p, GROUP), Ok("hola"));
    }

    #[test]
    fn test_missing_conversation_rejected() {
        let p = group_message(GROUP, Some("57311@lid"), None);
        assert_eq!(validate(&p, GROUP), Err(Reject::NoTextBody));
    }

    #[test]
    fn test_arbitrary_payload_rejected_not_panicking() {
        let p = payload(serde_json::json!({ "event": "status", "extra": [1, 2, 3] }));
        assert_eq!(validate(&p, GROUP), Err(Reject::GroupMismatch));
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let p = payload(serde_json::json!({
            "instance": "main",
            "data": {
                "key": { "remoteJid": GROUP, "participantLid": "x@lid", "fromMe": false },
                "message": { "conversation": "hola", "messageTimestamp": 1700000000 },
            }
        }));
        assert_eq!(validate(&p, GROUP), Ok("hola"));
    }
}
