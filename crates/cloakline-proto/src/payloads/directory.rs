//! Presence and contact-key payloads.

use serde::{Deserialize, Deserializer, Serialize};

/// An online user as reported by the server.
///
/// Ordering is by username, then id, which is the canonical display order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Contact {
    /// Display name, unique per server.
    pub username: String,
    /// Server-assigned identifier. Accepted as a JSON string or number.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
}

impl Contact {
    /// Create a contact.
    pub fn new(username: impl Into<String>, id: impl Into<String>) -> Self {
        Self { username: username.into(), id: id.into() }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(u64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(text) => text,
        Id::Number(n) => n.to_string(),
    })
}

/// Server reply to `onlineUsers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlineUsersResponse {
    /// Everyone currently online, in server order.
    pub users: Vec<Contact>,
}

/// Body of a `userPublicKey` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyRequest {
    /// Whose key to fetch.
    pub username: String,
}

/// Server reply to `userPublicKey`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyResponse {
    /// Whether the key was found.
    pub success: bool,
    /// PEM public key on success.
    #[serde(default, rename = "publicKey", skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    /// Failure reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Which request this answers. Servers that omit it answer in request order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_ids_accepted() {
        let response: OnlineUsersResponse =
            serde_json::from_str(r#"{"users": [{"username": "bob", "id": 7}, {"username": "amy", "id": "x1"}]}"#)
                .unwrap();
        assert_eq!(response.users, vec![Contact::new("bob", "7"), Contact::new("amy", "x1")]);
    }

    #[test]
    fn contacts_order_by_username_then_id() {
        let mut contacts =
            vec![Contact::new("carol", "1"), Contact::new("alice", "9"), Contact::new("alice", "2")];
        contacts.sort();
        assert_eq!(
            contacts,
            vec![Contact::new("alice", "2"), Contact::new("alice", "9"), Contact::new("carol", "1")]
        );
    }

    #[test]
    fn key_response_field_names() {
        let response: PublicKeyResponse =
            serde_json::from_str(r#"{"success": false, "message": "no such user"}"#).unwrap();
        assert!(!response.success);
        assert_eq!(response.public_key, None);
        assert_eq!(response.message.as_deref(), Some("no such user"));

        let response: PublicKeyResponse =
            serde_json::from_str(r#"{"success": true, "publicKey": "PEM"}"#).unwrap();
        assert_eq!(response.public_key.as_deref(), Some("PEM"));
    }
}
