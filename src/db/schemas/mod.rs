//! Document schemas for the three collections

pub mod query;
pub mod recommendation;
pub mod review;

pub use query::{Query, QueryEdit, QueryFilter, EDITABLE_QUERY_FIELDS, QUERY_COLLECTION};
pub use recommendation::{
    canonical_query_id, Recommendation, RecommendationFilter, RECOMMENDATION_COLLECTION,
};
pub use review::{Review, REVIEW_COLLECTION};

use serde::{Deserialize, Deserializer};

/// Read an explicit `null` as the field's default
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
