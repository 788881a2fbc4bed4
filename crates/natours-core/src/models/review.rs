use super::User;
use crate::entity::{Entity, Relation, UniqueKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A user's rating of a tour; at most one per (tour, user)
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    #[validate(length(min = 1, message = "Review can not be empty"))]
    pub review: String,

    #[validate(range(min = 1.0, max = 5.0, message = "Rating must be between 1.0 and 5.0"))]
    pub rating: f64,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    pub tour: Uuid,

    pub user: Uuid,
}

static REVIEW_RELATIONS: [Relation; 1] = [Relation::reference("user", User::COLLECTION, "user")
    .select(&["name", "photo"])
    .filtered(<User as Entity>::base_filter)];

impl Entity for Review {
    const COLLECTION: &'static str = "reviews";
    const NAME: &'static str = "review";
    const PROTECTED_FIELDS: &'static [&'static str] = &["user"];

    fn id(&self) -> Uuid {
        self.id
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new("(tour, user)", format!("({}, {})", self.tour, self.user))]
    }

    fn relations() -> &'static [Relation] {
        &REVIEW_RELATIONS
    }

    fn normalize(&mut self) {
        self.review = self.review.trim().to_string();
    }
}
