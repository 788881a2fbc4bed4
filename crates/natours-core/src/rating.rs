//! Tour rating statistics
//!
//! A tour's `ratingsQuantity` and `ratingsAverage` are derived from its
//! reviews. The aggregator recomputes them from scratch after every review
//! write, so repeated runs over the same reviews converge on the same value.
//! It only sees two narrow capabilities: reading rating stats of a tour's
//! reviews and writing the summary back onto the tour.

use crate::entity::Entity;
use crate::models::{Review, Tour};
use crate::query::FilterClause;
use crate::store::{Document, DocumentStore, GroupStats};
use crate::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// Average reported for a tour nobody has reviewed yet
pub const DEFAULT_RATINGS_AVERAGE: f64 = 4.5;

/// Clamp to the rating scale and round to one decimal place
pub fn round_rating(mean: f64) -> f64 {
    (mean.clamp(1.0, 5.0) * 10.0).round() / 10.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingSummary {
    pub quantity: u64,
    pub average: f64,
}

impl RatingSummary {
    pub fn from_stats(stats: Option<GroupStats>) -> Self {
        match stats {
            Some(stats) if stats.count > 0 => Self {
                quantity: stats.count,
                average: round_rating(stats.mean),
            },
            _ => Self {
                quantity: 0,
                average: DEFAULT_RATINGS_AVERAGE,
            },
        }
    }
}

/// Reads rating statistics over a tour's reviews
#[async_trait]
pub trait ChildRowReader: Send + Sync {
    async fn rating_stats(&self, tour_id: Uuid) -> Result<Option<GroupStats>>;
}

/// Writes a rating summary onto a tour; `false` when the tour is gone
#[async_trait]
pub trait ParentAggregateUpdater: Send + Sync {
    async fn set_rating_summary(&self, tour_id: Uuid, summary: RatingSummary) -> Result<bool>;
}

/// Review ratings from a document store
pub struct ReviewRatings {
    store: Arc<dyn DocumentStore>,
}

impl ReviewRatings {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ChildRowReader for ReviewRatings {
    async fn rating_stats(&self, tour_id: Uuid) -> Result<Option<GroupStats>> {
        self.store
            .group_stats(
                Review::COLLECTION,
                &[FilterClause::eq("tour", tour_id.to_string())],
                "rating",
            )
            .await
    }
}

/// Tour rating fields in a document store
pub struct TourRatings {
    store: Arc<dyn DocumentStore>,
}

impl TourRatings {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ParentAggregateUpdater for TourRatings {
    async fn set_rating_summary(&self, tour_id: Uuid, summary: RatingSummary) -> Result<bool> {
        let mut fields = Document::new();
        fields.insert("ratingsQuantity".to_string(), Value::from(summary.quantity));
        fields.insert("ratingsAverage".to_string(), Value::from(summary.average));
        Ok(self
            .store
            .update_fields(Tour::COLLECTION, tour_id, fields)
            .await?
            .is_some())
    }
}

#[derive(Clone)]
pub struct RatingAggregator {
    reader: Arc<dyn ChildRowReader>,
    updater: Arc<dyn ParentAggregateUpdater>,
}

impl RatingAggregator {
    pub fn new(reader: Arc<dyn ChildRowReader>, updater: Arc<dyn ParentAggregateUpdater>) -> Self {
        Self { reader, updater }
    }

    /// Aggregator reading reviews from and writing tours to one store
    pub fn for_store(store: Arc<dyn DocumentStore>) -> Self {
        Self::new(
            Arc::new(ReviewRatings::new(Arc::clone(&store))),
            Arc::new(TourRatings::new(store)),
        )
    }

    /// Recompute and persist the rating summary of one tour
    pub async fn recompute(&self, tour_id: Uuid) -> Result<RatingSummary> {
        let summary = RatingSummary::from_stats(self.reader.rating_stats(tour_id).await?);
        if self.updater.set_rating_summary(tour_id, summary).await? {
            tracing::debug!(%tour_id, quantity = summary.quantity, average = summary.average, "tour ratings recomputed");
        } else {
            tracing::warn!(%tour_id, "ratings recomputed for a tour that no longer exists");
        }
        Ok(summary)
    }
}
