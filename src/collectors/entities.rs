use crate::errors::SourceError;
use crate::models::entity::TrackedEntity;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::warn;

/// Supplier of entities-with-deadlines. May fail; the coordinator treats a
/// failure as "no update this cycle".
#[async_trait]
pub trait EntitySource: Send + Sync {
    async fn fetch_tracked_entities(&self) -> Result<Vec<TrackedEntity>, SourceError>;
}

/// Reads a JSON array of entities from disk on every fetch, so an external
/// exporter can rewrite the file between cycles.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl EntitySource for JsonFileSource {
    async fn fetch_tracked_entities(&self) -> Result<Vec<TrackedEntity>, SourceError> {
        let text = tokio::fs::read_to_string(&self.path).await
            .map_err(|source| SourceError::Read { path: self.path.clone(), source })?;
        let raw: Vec<serde_json::Value> = serde_json::from_str(&text)
            .map_err(|source| SourceError::Parse { path: self.path.clone(), source })?;
        Ok(decode_entities(raw))
    }
}

/// Decode each element on its own; one bad record is skipped, not fatal.
pub fn decode_entities(raw: Vec<serde_json::Value>) -> Vec<TrackedEntity> {
    raw.into_iter()
        .enumerate()
        .filter_map(|(idx, value)| match serde_json::from_value::<TrackedEntity>(value) {
            Ok(e)  => Some(e),
            Err(e) => {
                warn!(index = idx, error = %e, "skipping malformed entity");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn reads_entities_from_file() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("entities.json");
        std::fs::write(&path, r#"[
            {"id":"1","requiresTracking":true,"isOverdue":true,"daysRemaining":-3,
             "owner":{"firstName":"Ada","lastName":"King"}},
            {"id":"2","requiresTracking":false,"daysRemaining":9}
        ]"#).unwrap();

        let list = JsonFileSource::new(&path).fetch_tracked_entities().await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].display_name(), "Ada King");
        assert_eq!(list[0].days_remaining, -3);
    }

    #[tokio::test]
    async fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = JsonFileSource::new(dir.path().join("nope.json"))
            .fetch_tracked_entities().await.unwrap_err();
        assert!(matches!(err, SourceError::Read { .. }));
    }

    #[tokio::test]
    async fn non_array_is_a_parse_error() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("entities.json");
        std::fs::write(&path, r#"{"id":"1"}"#).unwrap();
        let err = JsonFileSource::new(&path).fetch_tracked_entities().await.unwrap_err();
        assert!(matches!(err, SourceError::Parse { .. }));
    }

    #[test]
    fn bad_record_does_not_drop_the_rest() {
        let raw = vec![
            json!({"id":"ok-1","requiresTracking":true,"daysRemaining":1}),
            json!({"id":"bad","daysRemaining":"soon"}),
            json!("not an object"),
            json!({"id":"ok-2","owner":null}),
        ];
        let ids: Vec<_> = decode_entities(raw).into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["ok-1", "ok-2"]);
    }

    #[test]
    fn numeric_id_record_is_kept_and_alerts() {
        let raw = vec![json!({
            "id": 42, "requiresTracking": true, "isOverdue": true, "daysRemaining": -3,
            "owner": {"displayName": "Ada King"}
        })];
        let list = decode_entities(raw);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, "42");

        let alerts = crate::alerts::evaluate(&list, 3);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].message, "Ada King: overdue by 3 day(s)");
    }

    #[test]
    fn null_flags_degrade_instead_of_dropping() {
        let raw = vec![
            json!({"id":"a","requiresTracking":true,"isOverdue":null,"daysRemaining":2}),
            json!({"id":"b","requiresTracking":null,"isOverdue":true,"daysRemaining":null}),
        ];
        let list = decode_entities(raw);
        assert_eq!(list.len(), 2);
        assert!(!list[0].is_overdue);
        assert!(!list[1].requires_tracking);
        assert_eq!(list[1].days_remaining, 0);
    }
}
