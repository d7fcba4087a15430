//! ActivityPub activity JSON construction.

use serde_json::Value;

use crate::data::models::{Status, Visibility};

pub const PUBLIC_AUDIENCE: &str = "https://www.w3.org/ns/activitystreams#Public";

/// `to`/`cc` audiences for an actor's activity at a given visibility.
pub fn audience_for_visibility(actor_uri: &str, visibility: Visibility) -> (Vec<String>, Vec<String>) {
    let public = PUBLIC_AUDIENCE.to_string();
    let followers = format!("{}/followers", actor_uri);

    match visibility {
        Visibility::Public => (vec![public], vec![followers]),
        Visibility::Unlisted => (vec![followers], vec![public]),
        Visibility::Private => (vec![followers], Vec::new()),
        Visibility::Direct => (Vec::new(), Vec::new()),
    }
}

/// Build a Note object from a status.
pub fn note(status: &Status, actor_uri: &str, to: &[String], cc: &[String]) -> Value {
    let mut object = serde_json::json!({
        "type": "Note",
        "id": status.uri,
        "attributedTo": actor_uri,
        "content": status.content,
        "published": status.created_at.to_rfc3339(),
        "to": to,
        "cc": cc,
        "sensitive": false,
    });
    if let Some(ref in_reply_to) = status.in_reply_to_id {
        object["inReplyTo"] = serde_json::json!(in_reply_to);
    }
    object
}

/// Build a Create activity wrapping `object`.
pub fn create(id: &str, actor: &str, object: Value, to: &[String], cc: &[String]) -> Value {
    serde_json::json!({
        "@context": "https://www.w3.org/ns/activitystreams",
        "type": "Create",
        "id": id,
        "actor": actor,
        "object": object,
        "to": to,
        "cc": cc,
        "published": chrono::Utc::now().to_rfc3339()
    })
}

/// Build an Accept activity wrapping a Follow.
pub fn accept_follow(id: &str, actor: &str, follow_uri: &str, follower_uri: &str) -> Value {
    serde_json::json!({
        "@context": "https://www.w3.org/ns/activitystreams",
        "type": "Accept",
        "id": id,
        "actor": actor,
        "object": {
            "type": "Follow",
            "id": follow_uri,
            "actor": follower_uri,
            "object": actor
        }
    })
}

/// Build a Follow activity.
pub fn follow(id: &str, actor: &str, object: &str) -> Value {
    serde_json::json!({
        "@context": "https://www.w3.org/ns/activitystreams",
        "type": "Follow",
        "id": id,
        "actor": actor,
        "object": object
    })
}

/// Build a Block activity.
pub fn block(id: &str, actor: &str, object: &str) -> Value {
    serde_json::json!({
        "@context": "https://www.w3.org/ns/activitystreams",
        "type": "Block",
        "id": id,
        "actor": actor,
        "object": object
    })
}

/// Build a Reject activity wrapping a Follow.
pub fn reject_follow(id: &str, actor: &str, follow_uri: &str, follower_uri: &str) -> Value {
    serde_json::json!({
        "@context": "https://www.w3.org/ns/activitystreams",
        "type": "Reject",
        "id": id,
        "actor": actor,
        "object": {
            "type": "Follow",
            "id": follow_uri,
            "actor": follower_uri,
            "object": actor
        }
    })
}

/// Build an Update activity for a changed actor profile.
pub fn update_profile(id: &str, actor: &str) -> Value {
    serde_json::json!({
        "@context": "https://www.w3.org/ns/activitystreams",
        "type": "Update",
        "id": id,
        "actor": actor,
        "object": actor,
        "to": [PUBLIC_AUDIENCE]
    })
}

/// Build a Like activity.
pub fn like(id: &str, actor: &str, object: &str) -> Value {
    serde_json::json!({
        "@context": "https://www.w3.org/ns/activitystreams",
        "type": "Like",
        "id": id,
        "actor": actor,
        "object": object
    })
}

/// Build an Announce activity (boost).
pub fn announce(id: &str, actor: &str, object: &str, to: &[String], cc: &[String]) -> Value {
    serde_json::json!({
        "@context": "https://www.w3.org/ns/activitystreams",
        "type": "Announce",
        "id": id,
        "actor": actor,
        "object": object,
        "to": to,
        "cc": cc,
        "published": chrono::Utc::now().to_rfc3339()
    })
}

/// Build a Delete activity with a Tombstone object.
pub fn delete(id: &str, actor: &str, object: &str, to: &[String], cc: &[String]) -> Value {
    serde_json::json!({
        "@context": "https://www.w3.org/ns/activitystreams",
        "type": "Delete",
        "id": id,
        "actor": actor,
        "object": {
            "type": "Tombstone",
            "id": object
        },
        "to": to,
        "cc": cc
    })
}

/// Build an Undo activity wrapping an earlier activity by URI.
pub fn undo(id: &str, actor: &str, object_uri: &str, object_type: Option<&str>) -> Value {
    let mut object = serde_json::Map::new();
    object.insert("id".to_string(), serde_json::json!(object_uri));
    if let Some(object_type) = object_type {
        object.insert("type".to_string(), serde_json::json!(object_type));
    }
    serde_json::json!({
        "@context": "https://www.w3.org/ns/activitystreams",
        "type": "Undo",
        "id": id,
        "actor": actor,
        "object": Value::Object(object)
    })
}

/// Build a Flag activity forwarding a report.
///
/// The actor is the instance service account, never the reporting user, so
/// forwarded reports stay anonymous.
pub fn flag(id: &str, instance_actor: &str, target_uri: &str, status_uris: &[String], comment: &str) -> Value {
    let mut objects = vec![serde_json::json!(target_uri)];
    objects.extend(status_uris.iter().map(|uri| serde_json::json!(uri)));
    serde_json::json!({
        "@context": "https://www.w3.org/ns/activitystreams",
        "type": "Flag",
        "id": id,
        "actor": instance_actor,
        "content": comment,
        "object": objects
    })
}
