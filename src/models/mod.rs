use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum preview length for post content returned in recommendations
pub const CONTENT_PREVIEW_CHARS: usize = 200;

/// Kind of user interaction with a post
///
/// Unknown kinds deserialize to `Unknown` and carry the documented default
/// weight delta instead of failing the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    View,
    Click,
    Upvote,
    Downvote,
    Save,
    Comment,
    Share,
    #[serde(other)]
    Unknown,
}

impl EventType {
    /// Weight delta applied to the (user, interest) pair for one event
    pub fn weight_delta(&self) -> f64 {
        match self {
            EventType::View => 0.1,
            EventType::Click => 0.3,
            EventType::Upvote => 0.5,
            EventType::Downvote => -0.3,
            EventType::Save => 0.7,
            EventType::Comment => 0.8,
            EventType::Share => 1.0,
            EventType::Unknown => 0.1,
        }
    }

    /// Normalizes a raw client event string; unrecognized values map to `Unknown`
    pub fn parse(raw: &str) -> Self {
        match raw {
            "view" => EventType::View,
            "click" => EventType::Click,
            "upvote" => EventType::Upvote,
            "downvote" => EventType::Downvote,
            "save" => EventType::Save,
            "comment" => EventType::Comment,
            "share" => EventType::Share,
            _ => EventType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::View => "view",
            EventType::Click => "click",
            EventType::Upvote => "upvote",
            EventType::Downvote => "downvote",
            EventType::Save => "save",
            EventType::Comment => "comment",
            EventType::Share => "share",
            EventType::Unknown => "unknown",
        }
    }
}

/// An interest taxonomy leaf a user can select during onboarding
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Interest {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub subcategory: String,
    pub description: Option<String>,
}

/// Lightweight interest reference attached to posts and weights
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterestRef {
    pub id: i64,
    pub name: String,
    pub category: String,
}

/// Interest summary carried on recommendation candidates
///
/// Posts without a primary interest are labeled with the "General" sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterestSummary {
    pub id: Option<i64>,
    pub name: String,
    pub category: String,
}

impl InterestSummary {
    pub fn general() -> Self {
        Self {
            id: None,
            name: "General".to_string(),
            category: "General".to_string(),
        }
    }
}

impl From<&InterestRef> for InterestSummary {
    fn from(interest: &InterestRef) -> Self {
        Self {
            id: Some(interest.id),
            name: interest.name.clone(),
            category: interest.category.clone(),
        }
    }
}

/// A stored post with its interest tags resolved
#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub is_deleted: bool,
    pub primary_interest: Option<InterestRef>,
    pub secondary_interest_ids: Vec<i64>,
}

/// A recommendation candidate produced fresh per request, never persisted
#[derive(Debug, Clone, Serialize)]
pub struct CandidatePost {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub primary_interest: InterestSummary,
    pub relevance_score: f64,
}

impl CandidatePost {
    pub fn from_post(post: &Post, relevance_score: f64) -> Self {
        let primary_interest = post
            .primary_interest
            .as_ref()
            .map(InterestSummary::from)
            .unwrap_or_else(InterestSummary::general);

        Self {
            id: post.id,
            title: post.title.clone(),
            content: content_preview(&post.content),
            author: post.author.clone(),
            created_at: post.created_at,
            primary_interest,
            relevance_score,
        }
    }
}

/// Truncates post content to the preview length, appending an ellipsis when cut
pub fn content_preview(content: &str) -> String {
    let mut chars = content.char_indices();
    match chars.nth(CONTENT_PREVIEW_CHARS) {
        Some((byte_idx, _)) => format!("{}...", &content[..byte_idx]),
        None => content.to_string(),
    }
}

/// Parses a stored secondary-interest list (JSON text column)
///
/// Malformed or missing encodings normalize to an empty list at this boundary;
/// nothing deeper in the pipeline sees the raw text.
pub fn parse_secondary_interests(raw: Option<&str>) -> Vec<i64> {
    match raw {
        Some(text) => serde_json::from_str(text).unwrap_or_default(),
        None => Vec::new(),
    }
}

/// A learned per-(user, interest) preference weight
#[derive(Debug, Clone, Serialize)]
pub struct InterestWeight {
    pub interest: InterestRef,
    pub weight: f64,
    pub updated_at: DateTime<Utc>,
}

/// Engagement tracking for a (user, interest) pair
#[derive(Debug, Clone, Serialize)]
pub struct BehaviorScore {
    pub score: f64,
    pub interaction_count: i32,
    pub last_interaction: Option<DateTime<Utc>>,
}

/// A registered user
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub has_completed_onboarding: bool,
    pub created_at: DateTime<Utc>,
}

/// An append-only interaction record
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserEvent {
    pub id: i64,
    pub user_id: i64,
    pub post_id: i64,
    pub event_type: String,
    pub engagement_score: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Which strategy produced a recommendation response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationType {
    Popular,
    Initial,
    Personalized,
}

impl RecommendationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationType::Popular => "popular",
            RecommendationType::Initial => "initial",
            RecommendationType::Personalized => "personalized",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_delta_table() {
        assert_eq!(EventType::View.weight_delta(), 0.1);
        assert_eq!(EventType::Click.weight_delta(), 0.3);
        assert_eq!(EventType::Upvote.weight_delta(), 0.5);
        assert_eq!(EventType::Downvote.weight_delta(), -0.3);
        assert_eq!(EventType::Save.weight_delta(), 0.7);
        assert_eq!(EventType::Comment.weight_delta(), 0.8);
        assert_eq!(EventType::Share.weight_delta(), 1.0);
    }

    #[test]
    fn test_unknown_event_type_defaults() {
        let event: EventType = serde_json::from_str("\"bookmark\"").unwrap();
        assert_eq!(event, EventType::Unknown);
        assert_eq!(event.weight_delta(), 0.1);
    }

    #[test]
    fn test_event_parse_matches_wire_names() {
        for event in [
            EventType::View,
            EventType::Click,
            EventType::Upvote,
            EventType::Downvote,
            EventType::Save,
            EventType::Comment,
            EventType::Share,
        ] {
            assert_eq!(EventType::parse(event.as_str()), event);
        }
    }

    #[test]
    fn test_event_parse_unrecognized_is_unknown() {
        assert_eq!(EventType::parse("bookmark"), EventType::Unknown);
        assert_eq!(EventType::parse(""), EventType::Unknown);
        assert_eq!(EventType::parse("bookmark").weight_delta(), 0.1);
    }

    #[test]
    fn test_event_type_roundtrip() {
        let event: EventType = serde_json::from_str("\"upvote\"").unwrap();
        assert_eq!(event, EventType::Upvote);
        assert_eq!(event.as_str(), "upvote");
    }

    #[test]
    fn test_content_preview_short_content_unchanged() {
        assert_eq!(content_preview("hello"), "hello");
    }

    #[test]
    fn test_content_preview_exact_length_unchanged() {
        let content = "a".repeat(200);
        assert_eq!(content_preview(&content), content);
    }

    #[test]
    fn test_content_preview_truncates_with_ellipsis() {
        let content = "a".repeat(250);
        let preview = content_preview(&content);
        assert_eq!(preview.chars().count(), 203);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn test_content_preview_multibyte_safe() {
        let content = "é".repeat(300);
        let preview = content_preview(&content);
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), 203);
    }

    #[test]
    fn test_parse_secondary_interests_valid() {
        assert_eq!(parse_secondary_interests(Some("[1, 2, 3]")), vec![1, 2, 3]);
    }

    #[test]
    fn test_parse_secondary_interests_malformed() {
        assert!(parse_secondary_interests(Some("not json")).is_empty());
        assert!(parse_secondary_interests(Some("{\"a\": 1}")).is_empty());
        assert!(parse_secondary_interests(None).is_empty());
    }

    #[test]
    fn test_candidate_without_primary_interest_is_general() {
        let post = Post {
            id: 1,
            title: "t".to_string(),
            content: "c".to_string(),
            author: "a".to_string(),
            created_at: Utc::now(),
            is_deleted: false,
            primary_interest: None,
            secondary_interest_ids: vec![],
        };

        let candidate = CandidatePost::from_post(&post, 0.5);
        assert_eq!(candidate.primary_interest, InterestSummary::general());
        assert_eq!(candidate.relevance_score, 0.5);
    }
}
