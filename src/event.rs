//! Nostr event model shared by the collector and the classifier.

use serde::{Deserialize, Serialize};

/// Wrapper for a Nostr tag expressed as an array of strings.
///
/// Tags appear as small arrays where the first element denotes the type and
/// the following elements hold data. The tags this crate cares about:
///
/// - `p` – references another identity's public key
/// - `l` – a NIP-32 label; the third element names the label namespace
/// - `comment` – free-form annotation attached to an attestation
///
/// Each tag is stored verbatim so uncommon or custom tags are preserved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag(pub Vec<String>);

/// Raw event as delivered by a relay subscription.
///
/// ```json
/// {
///   "id": "aa11",
///   "pubkey": "npub...",
///   "kind": 1985,
///   "created_at": 1700000000,
///   "tags": [["p", "npub..."], ["l", "endorsement", "agent.trust"]],
///   "content": "",
///   "sig": "deadbeef"
/// }
/// ```
///
/// The signature is carried verbatim and never verified; structurally odd
/// events are passed through and sorted out by the classifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    /// Event identifier (hex of SHA-256 hash).
    pub id: String,
    /// Author public key (hex).
    pub pubkey: String,
    /// Kind number, e.g. `1985` or `6300`.
    pub kind: u32,
    /// Unix timestamp of creation, in seconds.
    pub created_at: u64,
    /// Arbitrary tags such as `p` (target) or `l` (label).
    #[serde(default)]
    pub tags: Vec<Tag>,
    /// Event content body.
    #[serde(default)]
    pub content: String,
    /// Schnorr signature over the event hash (opaque here).
    #[serde(default)]
    pub sig: String,
}

/// First-match scan over `tags`: returns the value slot (second field) of the
/// first tag whose name equals `name` and whose full field list satisfies
/// `pred`. Order of `tags` matters; ties resolve to the earliest match.
pub fn first_tag_value<'a>(
    tags: &'a [Tag],
    name: &str,
    pred: impl Fn(&[String]) -> bool,
) -> Option<&'a str> {
    tags.iter().find_map(|Tag(fields)| {
        if fields.len() >= 2 && fields[0] == name && pred(fields) {
            Some(fields[1].as_str())
        } else {
            None
        }
    })
}
