//! Attestation extraction and classification.
//!
//! Attestations ride on NIP-32 label events: the first `p` tag names the
//! target identity, an `l` tag under [`LABEL_NAMESPACE`] names the claim
//! type, and an optional `comment` tag annotates it.

use serde::{Deserialize, Serialize};

use crate::event::{first_tag_value, Event};

/// NIP-32 label namespace marking attestation events.
pub const LABEL_NAMESPACE: &str = "agent.trust";

/// Event kind carrying attestations (NIP-32 label events).
pub const ATTESTATION_KIND: u32 = 1985;

/// Whether the reference identity authored the attestation or is its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Given,
    Received,
}

/// Structured claim asserting a trust-relevant relationship between two
/// identities, derived deterministically from one raw event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attestation {
    /// Source event id.
    pub id: String,
    /// Author pubkey of the source event.
    pub from: String,
    /// Target pubkey (first `p` tag), absent when the event carries none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// Claim type (first `l` tag in the attestation namespace).
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Free-form comment, empty when the tag is absent.
    pub comment: String,
    /// Source event `created_at`, in seconds.
    pub timestamp: u64,
    pub direction: Direction,
}

/// Attestations partitioned by direction, each side newest-first.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AttestationBatch {
    pub received: Vec<Attestation>,
    pub given: Vec<Attestation>,
}

/// Derive one attestation from a raw event relative to `reference`.
///
/// Tag lookups are first-match; events lacking `p`, `l`, or `comment` tags
/// yield absent or empty fields rather than errors.
fn extract(ev: &Event, reference: &str) -> Attestation {
    let to = first_tag_value(&ev.tags, "p", |_| true).map(str::to_string);
    let kind = first_tag_value(&ev.tags, "l", |fields| {
        fields.get(2).map(String::as_str) == Some(LABEL_NAMESPACE)
    })
    .map(str::to_string);
    let comment = first_tag_value(&ev.tags, "comment", |_| true)
        .unwrap_or_default()
        .to_string();
    let direction = if ev.pubkey == reference {
        Direction::Given
    } else {
        Direction::Received
    };
    Attestation {
        id: ev.id.clone(),
        from: ev.pubkey.clone(),
        to,
        kind,
        comment,
        timestamp: ev.created_at,
        direction,
    }
}

/// Partition `events` into attestations given by and received by the
/// reference identity. Each side is sorted by timestamp descending; the
/// sort is stable, so equal timestamps keep their delivery order.
pub fn classify(events: &[Event], reference: &str) -> AttestationBatch {
    let mut batch = AttestationBatch::default();
    for ev in events {
        let att = extract(ev, reference);
        match att.direction {
            Direction::Given => batch.given.push(att),
            Direction::Received => batch.received.push(att),
        }
    }
    batch.given.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    batch.received.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Tag;

    fn tag(fields: &[&str]) -> Tag {
        Tag(fields.iter().map(|s| s.to_string()).collect())
    }

    fn event(id: &str, pubkey: &str, created_at: u64, tags: Vec<Tag>) -> Event {
        Event {
            id: id.into(),
            pubkey: pubkey.into(),
            kind: ATTESTATION_KIND,
            created_at,
            tags,
            content: String::new(),
            sig: String::new(),
        }
    }

    #[test]
    fn partitions_by_author() {
        let events = vec![
            event("aa11", "me", 1, vec![]),
            event("bb22", "alice", 2, vec![]),
            event("cc33", "me", 3, vec![]),
            event("dd44", "bob", 4, vec![]),
        ];
        let batch = classify(&events, "me");
        assert_eq!(batch.given.len(), 2);
        assert_eq!(batch.received.len(), 2);
        assert!(batch.given.iter().all(|a| a.from == "me"));
        assert!(batch.received.iter().all(|a| a.from != "me"));
        assert_eq!(batch.given.len() + batch.received.len(), events.len());
    }

    #[test]
    fn sorted_newest_first_with_stable_ties() {
        let events = vec![
            event("old", "alice", 1, vec![]),
            event("tie-a", "alice", 5, vec![]),
            event("tie-b", "bob", 5, vec![]),
            event("new", "carol", 9, vec![]),
        ];
        let batch = classify(&events, "me");
        let ids: Vec<&str> = batch.received.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "tie-a", "tie-b", "old"]);
    }

    #[test]
    fn extracts_tag_fields() {
        let ev = event(
            "aa11",
            "alice",
            7,
            vec![
                tag(&["p", "me"]),
                tag(&["l", "endorsement", LABEL_NAMESPACE]),
                tag(&["comment", "solid operator"]),
            ],
        );
        let batch = classify(&[ev], "me");
        let att = &batch.received[0];
        assert_eq!(att.to.as_deref(), Some("me"));
        assert_eq!(att.kind.as_deref(), Some("endorsement"));
        assert_eq!(att.comment, "solid operator");
        assert_eq!(att.timestamp, 7);
    }

    #[test]
    fn label_outside_namespace_is_ignored() {
        let ev = event(
            "aa11",
            "alice",
            1,
            vec![tag(&["l", "spam", "other.ns"])],
        );
        let batch = classify(&[ev], "me");
        assert_eq!(batch.received[0].kind, None);
    }

    #[test]
    fn first_p_tag_wins() {
        let ev = event(
            "aa11",
            "alice",
            1,
            vec![tag(&["p", "first"]), tag(&["p", "second"])],
        );
        let batch = classify(&[ev], "me");
        assert_eq!(batch.received[0].to.as_deref(), Some("first"));
    }

    #[test]
    fn missing_tags_yield_defaults() {
        let ev = event("aa11", "alice", 1, vec![]);
        let batch = classify(&[ev], "me");
        let att = &batch.received[0];
        assert_eq!(att.to, None);
        assert_eq!(att.kind, None);
        assert_eq!(att.comment, "");
    }

    #[test]
    fn absent_target_is_omitted_from_json() {
        let ev = event("aa11", "alice", 1, vec![]);
        let batch = classify(&[ev], "me");
        let json = serde_json::to_value(&batch.received[0]).unwrap();
        assert!(json.get("to").is_none());
        assert!(json.get("type").is_none());
        assert_eq!(json["direction"], "received");
    }
}
