use serde_json::{json, Value};

use crate::database::Record;

/// Fields of a user record that never leave the server
pub const USER_PRIVATE_FIELDS: &[&str] = &["password", "resetToken", "resetTokenExpiry"];

/// Default public view: every stored field plus `id`/`_id`, `owner` and
/// timestamps
pub fn document_view(record: &Record) -> Value {
    let mut doc = record.to_document();
    doc.insert("_id".into(), Value::String(record.id.to_string()));
    Value::Object(doc)
}

/// User view: the document without credentials or reset state
pub fn user_view(record: &Record) -> Value {
    let mut doc = record.to_document();
    doc.insert("_id".into(), Value::String(record.id.to_string()));
    for field in USER_PRIVATE_FIELDS {
        doc.remove(*field);
    }
    Value::Object(doc)
}

/// Listing envelope
pub fn page_view(items: Vec<Value>, total: i64, page: i64, limit: i64) -> Value {
    json!({
        "items": items,
        "total": total,
        "page": page,
        "limit": limit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    #[test]
    fn user_view_hides_credentials() {
        let mut data = Map::new();
        data.insert("email".into(), json!("a@b.c"));
        data.insert("password".into(), json!("$argon2id$..."));
        data.insert("resetToken".into(), json!("abc"));
        data.insert("roles".into(), json!(["user"]));
        let record = Record::new(None, data);

        let view = user_view(&record);
        assert_eq!(view["email"], "a@b.c");
        assert_eq!(view["roles"], json!(["user"]));
        assert_eq!(view["id"], view["_id"]);
        assert!(view.get("password").is_none());
        assert!(view.get("resetToken").is_none());
    }

    #[test]
    fn document_view_carries_identity_and_owner() {
        let owner = uuid::Uuid::new_v4();
        let record = Record::new(Some(owner), Map::new());
        let view = document_view(&record);
        assert_eq!(view["id"], record.id.to_string());
        assert_eq!(view["owner"], owner.to_string());
        assert!(view.get("createdAt").is_some());
    }
}
