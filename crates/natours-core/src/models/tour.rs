use super::User;
use crate::entity::{Entity, Relation, UniqueKey};
use crate::query::FilterClause;
use crate::rating::DEFAULT_RATINGS_AVERAGE;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Difficult,
}

/// GeoJSON point with an optional label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoPoint {
    #[serde(rename = "type", default = "GeoPoint::point")]
    pub kind: String,
    /// Longitude, latitude
    #[serde(default)]
    pub coordinates: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<u32>,
}

impl GeoPoint {
    fn point() -> String {
        "Point".to_string()
    }
}

fn default_ratings_average() -> f64 {
    DEFAULT_RATINGS_AVERAGE
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_pricing"))]
pub struct Tour {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    #[validate(length(
        min = 10,
        max = 40,
        message = "A tour name must have between 10 and 40 characters"
    ))]
    pub name: String,

    #[serde(default)]
    pub slug: String,

    #[validate(range(min = 1, message = "A tour must have a duration"))]
    pub duration: u32,

    #[validate(range(min = 1, message = "A tour must have a group size"))]
    pub max_group_size: u32,

    pub difficulty: Difficulty,

    pub price: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_discount: Option<f64>,

    #[serde(default = "default_ratings_average")]
    #[validate(range(min = 1.0, max = 5.0, message = "Rating must be between 1.0 and 5.0"))]
    pub ratings_average: f64,

    #[serde(default)]
    pub ratings_quantity: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[validate(length(min = 1, message = "A tour must have a description"))]
    pub description: String,

    #[validate(length(min = 1, message = "A tour must have a cover image"))]
    pub image_cover: String,

    #[serde(default)]
    pub images: Vec<String>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub start_dates: Vec<DateTime<Utc>>,

    #[serde(default)]
    pub secret_tour: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_location: Option<GeoPoint>,

    #[serde(default)]
    pub locations: Vec<GeoPoint>,

    /// User ids of the guides leading the tour
    #[serde(default)]
    pub guides: Vec<Uuid>,
}

fn validate_pricing(tour: &Tour) -> Result<(), ValidationError> {
    if !(tour.price.is_finite() && tour.price > 0.0) {
        let mut err = ValidationError::new("price");
        err.message = Some(Cow::from("A tour must have a positive price"));
        return Err(err);
    }
    if let Some(discount) = tour.price_discount {
        if !(0.0..tour.price).contains(&discount) {
            let mut err = ValidationError::new("priceDiscount");
            err.message = Some(Cow::from(format!(
                "Discount price ({discount}) should be below regular price"
            )));
            return Err(err);
        }
    }
    Ok(())
}

/// Lowercase, ASCII alphanumerics separated by single dashes
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

static TOUR_RELATIONS: [Relation; 2] = [
    Relation::reference("guides", User::COLLECTION, "guides")
        .select(&["name", "email", "photo", "role"])
        .filtered(<User as Entity>::base_filter),
    Relation::virtual_children("reviews", "reviews", "tour"),
];

impl Entity for Tour {
    const COLLECTION: &'static str = "tours";
    const NAME: &'static str = "tour";
    const PROTECTED_FIELDS: &'static [&'static str] = &["slug", "ratingsAverage", "ratingsQuantity"];

    fn id(&self) -> Uuid {
        self.id
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new("name", self.name.clone())]
    }

    fn base_filter() -> Vec<FilterClause> {
        vec![FilterClause::ne("secretTour", true)]
    }

    fn relations() -> &'static [Relation] {
        &TOUR_RELATIONS
    }

    fn normalize(&mut self) {
        self.name = self.name.trim().to_string();
        self.slug = slugify(&self.name);
        self.summary = self.summary.take().map(|s| s.trim().to_string());
        self.description = self.description.trim().to_string();
        if self.ratings_average.is_finite() {
            self.ratings_average = (self.ratings_average * 10.0).round() / 10.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{from_payload, validate_entity};
    use serde_json::json;

    fn sample() -> Tour {
        let payload = json!({
            "name": "The Forest Hiker",
            "duration": 5,
            "maxGroupSize": 25,
            "difficulty": "easy",
            "price": 397,
            "summary": "  Breathtaking hike through the Canadian Banff National Park ",
            "description": "Lorem ipsum",
            "imageCover": "tour-1-cover.jpg"
        });
        let mut tour: Tour = from_payload(payload.as_object().cloned().unwrap()).unwrap();
        tour.normalize();
        tour
    }

    #[test]
    fn test_defaults_and_slug() {
        let tour = sample();
        assert_eq!(tour.slug, "the-forest-hiker");
        assert_eq!(tour.ratings_average, 4.5);
        assert_eq!(tour.ratings_quantity, 0);
        assert!(!tour.secret_tour);
        assert_eq!(
            tour.summary.as_deref(),
            Some("Breathtaking hike through the Canadian Banff National Park")
        );
        assert!(validate_entity(&tour).is_ok());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("The Sea Explorer!"), "the-sea-explorer");
        assert_eq!(slugify("  The  Snow   Adventurer "), "the-snow-adventurer");
    }

    #[test]
    fn test_discount_must_be_below_price() {
        let mut tour = sample();
        tour.price_discount = Some(100.0);
        assert!(validate_entity(&tour).is_ok());

        tour.price_discount = Some(0.0);
        assert!(validate_entity(&tour).is_ok());

        tour.price_discount = Some(397.0);
        let err = validate_entity(&tour).unwrap_err();
        assert!(err.to_string().contains("should be below regular price"));

        tour.price_discount = Some(-1.0);
        assert!(validate_entity(&tour).is_err());
    }

    #[test]
    fn test_name_length_bounds() {
        let mut tour = sample();
        tour.name = "Short".to_string();
        let err = validate_entity(&tour).unwrap_err();
        assert!(err.to_string().contains("between 10 and 40 characters"));
    }

    #[test]
    fn test_unknown_difficulty_rejected() {
        let payload = json!({
            "name": "The Forest Hiker",
            "duration": 5,
            "maxGroupSize": 25,
            "difficulty": "extreme",
            "price": 397,
            "description": "Lorem ipsum",
            "imageCover": "tour-1-cover.jpg"
        });
        assert!(from_payload::<Tour>(payload.as_object().cloned().unwrap()).is_err());
    }
}
