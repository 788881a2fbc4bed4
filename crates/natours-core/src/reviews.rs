//! Review lifecycle
//!
//! Every review write is followed by an explicit rating recompute of the
//! affected tour(s). Updates and deletes read the review first so the tour it
//! belonged to is known even after the write changes or removes it.

use crate::entity::{self, Entity};
use crate::factory::ResourceFactory;
use crate::models::{Review, Role, Tour, User};
use crate::query::FilterClause;
use crate::rating::RatingAggregator;
use crate::store::{Document, DocumentStore};
use crate::{parse_id, NatoursError, Result};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct ReviewService {
    reviews: ResourceFactory<Review>,
    tours: ResourceFactory<Tour>,
    aggregator: RatingAggregator,
}

impl ReviewService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_aggregator(
            Arc::clone(&store),
            RatingAggregator::for_store(store),
        )
    }

    pub fn with_aggregator(store: Arc<dyn DocumentStore>, aggregator: RatingAggregator) -> Self {
        Self {
            reviews: ResourceFactory::new(Arc::clone(&store)),
            tours: ResourceFactory::new(store),
            aggregator,
        }
    }

    /// List reviews, restricted to one tour on nested routes
    pub async fn list(
        &self,
        params: &[(String, String)],
        tour_id: Option<Uuid>,
    ) -> Result<Vec<Document>> {
        let scope = tour_id
            .map(|id| vec![FilterClause::eq("tour", id.to_string())])
            .unwrap_or_default();
        self.reviews.get_all(params, scope).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Document> {
        self.reviews.get_one(id, true).await
    }

    /// Create a review written by `author`
    ///
    /// `tour_id` (from a nested route) is used when the payload names no tour.
    pub async fn create(
        &self,
        mut payload: Document,
        tour_id: Option<Uuid>,
        author: &User,
    ) -> Result<Document> {
        entity::strip_protected::<Review>(&mut payload);
        if let Some(tour_id) = tour_id {
            let missing = payload.get("tour").map_or(true, Value::is_null);
            if missing {
                payload.insert("tour".to_string(), Value::String(tour_id.to_string()));
            }
        }
        payload.insert("user".to_string(), Value::String(author.id.to_string()));

        let review: Review = entity::from_payload(payload)?;
        self.tours.find_raw(review.tour).await?;

        let created = self.reviews.insert(review).await?;
        self.aggregator.recompute(created.tour).await?;
        ResourceFactory::render(&created)
    }

    pub async fn update(&self, id: Uuid, patch: Document, actor: &User) -> Result<Document> {
        let before = self.reviews.find_raw(id).await?;
        ensure_can_modify(&before, actor)?;

        if let Some(raw) = patch.get("tour").and_then(Value::as_str) {
            self.tours.find_raw(parse_id(raw)?).await?;
        }

        let after = self.reviews.patch(id, patch).await?;
        self.aggregator.recompute(before.tour).await?;
        if after.tour != before.tour {
            self.aggregator.recompute(after.tour).await?;
        }
        ResourceFactory::render(&after)
    }

    pub async fn delete(&self, id: Uuid, actor: &User) -> Result<()> {
        let before = self.reviews.find_raw(id).await?;
        ensure_can_modify(&before, actor)?;

        let removed = self.reviews.delete_one(id).await?;
        self.aggregator.recompute(removed.tour).await?;
        Ok(())
    }
}

/// Admins may touch any review, everyone else only their own
fn ensure_can_modify(review: &Review, actor: &User) -> Result<()> {
    if actor.role == Role::Admin || review.user == actor.id {
        return Ok(());
    }
    Err(NatoursError::AccessDenied {
        reason: format!(
            "Only the {}'s owner or an admin can modify it",
            Review::NAME
        ),
    })
}
