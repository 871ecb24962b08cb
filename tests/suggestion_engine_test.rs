//! End-to-end tests of the suggestion engine over an on-disk SQLite store

use chrono::{DateTime, Duration, TimeZone, Utc};
use meta_suggest::learning::{MetadataDocument, RankingConfig, SuggestionService};
use serde_json::json;
use tempfile::TempDir;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

async fn service(dir: &TempDir) -> SuggestionService {
    SuggestionService::open(dir.path().join("learning.db"), RankingConfig::default())
        .await
        .unwrap()
}

fn document(value: serde_json::Value) -> MetadataDocument {
    value.as_object().cloned().unwrap()
}

#[tokio::test]
async fn test_frequent_value_ranks_first() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir).await;

    for hour in 0..3 {
        service
            .record_accepted_edit_at("EXIF", "Artist", "Jane Doe", t0() + Duration::hours(hour))
            .await
            .unwrap();
    }
    service
        .record_accepted_edit_at("EXIF", "Artist", "Bob", t0() + Duration::hours(4))
        .await
        .unwrap();

    let suggestions = service
        .get_suggestions_at("EXIF", "Artist", 5, t0() + Duration::hours(5))
        .await
        .unwrap();

    assert_eq!(suggestions.len(), 2);
    assert_eq!(suggestions[0].value, "Jane Doe");
    assert_eq!(suggestions[0].count, 3);
    assert_eq!(suggestions[1].value, "Bob");
    assert_eq!(suggestions[1].count, 1);
}

#[tokio::test]
async fn test_counts_match_number_of_commits() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir).await;

    let commits = [("Nikon", 4u64), ("Canon", 2), ("Sony", 1)];
    let mut at = t0();
    for (value, times) in commits {
        for _ in 0..times {
            service.record_accepted_edit_at("EXIF", "Make", value, at).await.unwrap();
            at += Duration::minutes(1);
        }
    }

    let suggestions = service.get_suggestions_at("EXIF", "Make", 10, at).await.unwrap();
    for (value, times) in commits {
        let found = suggestions.iter().find(|s| s.value == value).unwrap();
        assert_eq!(found.count, times, "count for {}", value);
    }
}

#[tokio::test]
async fn test_limit_truncates_ranking() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir).await;

    for i in 0..8 {
        let value = format!("Keyword {}", i);
        service
            .record_accepted_edit_at("IPTC", "Keywords", &value, t0() + Duration::minutes(i))
            .await
            .unwrap();
    }

    let now = t0() + Duration::hours(1);
    assert_eq!(service.get_suggestions_at("IPTC", "Keywords", 3, now).await.unwrap().len(), 3);
    assert_eq!(service.get_suggestions_at("IPTC", "Keywords", 100, now).await.unwrap().len(), 8);
    assert!(service.get_suggestions_at("IPTC", "Keywords", 0, now).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_ranking_is_deterministic() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir).await;

    // Same count and same timestamp: order falls back to the value text
    for value in ["Zulu", "Alpha", "Mike"] {
        service.record_accepted_edit_at("XMP", "Label", value, t0()).await.unwrap();
    }

    let now = t0() + Duration::days(1);
    let first = service.get_suggestions_at("XMP", "Label", 5, now).await.unwrap();
    let second = service.get_suggestions_at("XMP", "Label", 5, now).await.unwrap();

    assert_eq!(first, second);
    let values: Vec<_> = first.iter().map(|s| s.value.as_str()).collect();
    assert_eq!(values, vec!["Alpha", "Mike", "Zulu"]);
}

#[tokio::test]
async fn test_recent_value_beats_stale_value_of_equal_count() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir).await;

    service.record_accepted_edit_at("EXIF", "Artist", "Old Name", t0()).await.unwrap();
    service
        .record_accepted_edit_at("EXIF", "Artist", "New Name", t0() + Duration::days(200))
        .await
        .unwrap();

    let suggestions = service
        .get_suggestions_at("EXIF", "Artist", 5, t0() + Duration::days(201))
        .await
        .unwrap();
    assert_eq!(suggestions[0].value, "New Name");
}

#[tokio::test]
async fn test_history_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let service = service(&dir).await;
        service.record_accepted_edit("EXIF", "Copyright", "(c) Jane").await.unwrap();
    }

    let service = service(&dir).await;
    let suggestions = service.get_suggestions("EXIF", "Copyright", 5).await.unwrap();
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].value, "(c) Jane");
}

#[tokio::test]
async fn test_sections_are_learned_independently() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir).await;

    service.record_accepted_edit("EXIF", "Artist", "Jane").await.unwrap();

    assert!(service.get_suggestions("XMP", "Artist", 5).await.unwrap().is_empty());
    assert_eq!(service.get_suggestions("EXIF", "Artist", 5).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_invalid_requests_are_rejected() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir).await;

    assert!(service.get_suggestions("EXIF", "", 5).await.unwrap_err().is_validation());
    assert!(service.get_suggestions("", "Artist", 5).await.unwrap_err().is_validation());
    assert!(service.get_suggestions("EXIF", "Artist", -1).await.unwrap_err().is_validation());
    assert!(service.record_accepted_edit("EXIF", "", "x").await.unwrap_err().is_validation());
}

#[tokio::test]
async fn test_blank_edit_learns_nothing() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir).await;

    service.record_accepted_edit("EXIF", "Artist", "   ").await.unwrap();

    assert!(service.get_suggestions("EXIF", "Artist", 5).await.unwrap().is_empty());
    assert_eq!(service.stats().await.values, 0);
}

#[tokio::test]
async fn test_clear_forgets_everything() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir).await;

    service.record_accepted_edit("EXIF", "Artist", "Jane").await.unwrap();
    service.record_accepted_edit("IPTC", "City", "Oslo").await.unwrap();
    service.clear_learning_data().await.unwrap();

    assert!(service.get_suggestions("EXIF", "Artist", 5).await.unwrap().is_empty());
    assert!(service.get_suggestions("IPTC", "City", 5).await.unwrap().is_empty());
    assert_eq!(service.stats().await.fields, 0);
}

#[tokio::test]
async fn test_ingest_structured_document() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir).await;

    let doc = document(json!({
        "EXIF": { "Artist": "Jane", "ISO": 400, "Thumbnail": "(Binary data 2048 bytes)" },
        "IPTC": { "Keywords": ["a", "b"], "City": "" },
        "XMP": { "Rating": 5 }
    }));

    let report = service.record_document(&doc).await.unwrap();
    assert_eq!(report.learned, 3);
    assert_eq!(report.skipped, 3);

    let iso = service.get_suggestions("EXIF", "ISO", 5).await.unwrap();
    assert_eq!(iso[0].value, "400");
    assert!(service.get_suggestions("EXIF", "Thumbnail", 5).await.unwrap().is_empty());
    assert!(service.get_suggestions("IPTC", "Keywords", 5).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_document_suggestions_include_related_fields() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir).await;

    service.record_accepted_edit_at("EXIF", "Make", "Nikon", t0()).await.unwrap();
    for model in ["D850", "Z6", "Z7", "D750"] {
        service.record_accepted_edit_at("EXIF", "Model", model, t0()).await.unwrap();
    }

    let doc = document(json!({ "EXIF": { "Make": "Nikon" } }));
    let suggestions = service
        .suggest_for_document_at(&doc, 5, t0() + Duration::hours(1))
        .await
        .unwrap();

    assert_eq!(suggestions["EXIF.Make"].len(), 1);
    // Related fields are capped at three suggestions
    assert_eq!(suggestions["EXIF.Model"].len(), 3);
}

#[tokio::test]
async fn test_prune_stale_values() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir).await;

    let now = Utc::now();
    service
        .record_accepted_edit_at("EXIF", "Artist", "Ancient", now - Duration::days(400))
        .await
        .unwrap();
    service.record_accepted_edit_at("EXIF", "Artist", "Fresh", now).await.unwrap();

    assert_eq!(service.prune_stale(365).await.unwrap(), 1);

    let suggestions = service.get_suggestions("EXIF", "Artist", 5).await.unwrap();
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].value, "Fresh");
}

#[tokio::test]
async fn test_popular_and_recent_values() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir).await;

    let now = Utc::now();
    for _ in 0..3 {
        service.record_accepted_edit_at("IPTC", "City", "Oslo", now).await.unwrap();
    }
    service
        .record_accepted_edit_at("EXIF", "Artist", "Jane", now - Duration::days(30))
        .await
        .unwrap();

    let popular = service.popular_values(10).await.unwrap();
    assert_eq!(popular[0].field, "IPTC.City");
    assert_eq!(popular[0].count, 3);

    let recent = service.recent_values(7, 10).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].value, "Oslo");
}
