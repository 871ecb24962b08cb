//! Document-level context: related-field rules and missing-field recommendations

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::ingestor::MetadataDocument;
use super::FieldKey;

/// When every `requires` field is filled and `target` is not, suggestions for
/// `target` are offered alongside the document's own fields.
#[derive(Debug, Clone, Copy)]
pub struct RelatedFieldRule {
    pub name: &'static str,
    pub requires: &'static [(&'static str, &'static str)],
    pub target: (&'static str, &'static str),
}

pub const RELATED_FIELD_RULES: &[RelatedFieldRule] = &[
    RelatedFieldRule {
        name: "camera_info",
        requires: &[("EXIF", "Make")],
        target: ("EXIF", "Model"),
    },
    RelatedFieldRule {
        name: "location_info",
        requires: &[("EXIF", "GPSLatitude"), ("EXIF", "GPSLongitude")],
        target: ("XMP", "Location"),
    },
    RelatedFieldRule {
        name: "author_info",
        requires: &[("EXIF", "Artist")],
        target: ("EXIF", "Copyright"),
    },
];

/// Fields commonly expected on a finished image, with whether they matter most
const COMMON_FIELDS: &[(&str, &str, RecommendationPriority)] = &[
    ("EXIF", "Artist", RecommendationPriority::High),
    ("EXIF", "Copyright", RecommendationPriority::High),
    ("EXIF", "ImageDescription", RecommendationPriority::Medium),
    ("Custom", "Title", RecommendationPriority::Medium),
    ("Custom", "Description", RecommendationPriority::Medium),
    ("Custom", "Keywords", RecommendationPriority::Medium),
    ("Custom", "Author", RecommendationPriority::Medium),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationPriority {
    Medium,
    High,
}

/// A field the user should consider filling in
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldRecommendation {
    pub section: String,
    pub field: String,
    pub priority: RecommendationPriority,
    pub reason: String,
}

fn field_value<'a>(document: &'a MetadataDocument, section: &str, field: &str) -> Option<&'a Value> {
    document.get(section)?.as_object()?.get(field)
}

fn is_filled(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Number(_) | Value::Bool(_) => true,
    }
}

fn has_value(document: &MetadataDocument, section: &str, field: &str) -> bool {
    field_value(document, section, field).is_some_and(is_filled)
}

/// Targets of every related-field rule that fires for `document`
pub fn related_targets(document: &MetadataDocument) -> Vec<FieldKey> {
    RELATED_FIELD_RULES
        .iter()
        .filter(|rule| {
            rule.requires.iter().all(|(s, f)| has_value(document, s, f))
                && !has_value(document, rule.target.0, rule.target.1)
        })
        .filter_map(|rule| {
            let target = FieldKey::new(rule.target.0, rule.target.1).ok()?;
            debug!("Related-field rule {} suggests {}", rule.name, target);
            Some(target)
        })
        .collect()
}

/// Missing common fields, plus a camera model hint when the make is blank
pub fn recommend_fields(document: &MetadataDocument) -> Vec<FieldRecommendation> {
    let mut recommendations: Vec<FieldRecommendation> = COMMON_FIELDS
        .iter()
        .filter(|(section, field, _)| !has_value(document, section, field))
        .map(|(section, field, priority)| FieldRecommendation {
            section: section.to_string(),
            field: field.to_string(),
            priority: *priority,
            reason: format!("Missing {} information", field),
        })
        .collect();

    if field_value(document, "EXIF", "Make").is_some() && !has_value(document, "EXIF", "Make") {
        recommendations.push(FieldRecommendation {
            section: "EXIF".to_string(),
            field: "Model".to_string(),
            priority: RecommendationPriority::Medium,
            reason: "Camera model information is incomplete".to_string(),
        });
    }

    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> MetadataDocument {
        value.as_object().cloned().unwrap()
    }

    fn keys(targets: &[FieldKey]) -> Vec<String> {
        targets.iter().map(|k| k.storage_key()).collect()
    }

    #[test]
    fn test_camera_rule() {
        let d = doc(json!({"EXIF": {"Make": "FUJIFILM"}}));
        assert_eq!(keys(&related_targets(&d)), vec!["EXIF.Model"]);

        let d = doc(json!({"EXIF": {"Make": "FUJIFILM", "Model": "X100V"}}));
        assert!(related_targets(&d).is_empty());
    }

    #[test]
    fn test_location_rule_needs_both_coordinates() {
        let d = doc(json!({"EXIF": {"GPSLatitude": 59.91}}));
        assert!(related_targets(&d).is_empty());

        let d = doc(json!({"EXIF": {"GPSLatitude": 59.91, "GPSLongitude": 10.75}}));
        assert_eq!(keys(&related_targets(&d)), vec!["XMP.Location"]);
    }

    #[test]
    fn test_author_rule() {
        let d = doc(json!({"EXIF": {"Artist": "Jane", "Copyright": ""}}));
        assert_eq!(keys(&related_targets(&d)), vec!["EXIF.Copyright"]);
    }

    #[test]
    fn test_recommendations_for_empty_document() {
        let recs = recommend_fields(&MetadataDocument::new());
        assert_eq!(recs.len(), COMMON_FIELDS.len());
        assert_eq!(recs[0].field, "Artist");
        assert_eq!(recs[0].priority, RecommendationPriority::High);
        assert_eq!(recs[2].priority, RecommendationPriority::Medium);
        assert_eq!(recs[0].reason, "Missing Artist information");
    }

    #[test]
    fn test_recommendations_skip_filled_fields_and_flag_blank_make() {
        let d = doc(json!({
            "EXIF": {"Artist": "Jane", "Copyright": "(c) Jane", "ImageDescription": "Pier", "Make": ""},
            "Custom": {"Title": "Pier", "Description": "x", "Keywords": "sea", "Author": "Jane"}
        }));
        let recs = recommend_fields(&d);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].field, "Model");
        assert_eq!(recs[0].reason, "Camera model information is incomplete");
    }

    #[test]
    fn test_recommendation_serialization() {
        let recs = recommend_fields(&MetadataDocument::new());
        let json = serde_json::to_value(&recs[0]).unwrap();
        assert_eq!(json["priority"], "high");
        assert_eq!(json["section"], "EXIF");
    }
}
