//! Document store abstraction
//!
//! Everything the service needs from storage, expressed as single-document
//! operations over the three collections. Implementations guarantee
//! per-document atomicity (in particular for counter increments) and
//! nothing more: no operation spans two documents atomically.

use async_trait::async_trait;
use serde::Serialize;

use crate::db::schemas::{
    Query, QueryEdit, QueryFilter, Recommendation, RecommendationFilter, Review,
};
use crate::types::Result;

/// Result of a single insert
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertOutcome {
    pub acknowledged: bool,
    pub inserted_id: String,
}

/// Result of a single update
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOutcome {
    pub acknowledged: bool,
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_id: Option<String>,
}

/// Result of a delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    pub acknowledged: bool,
    pub deleted_count: u64,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short backend name for health reporting
    fn backend(&self) -> &'static str;

    /// Queries matching the filter, newest first
    async fn list_queries(&self, filter: QueryFilter) -> Result<Vec<Query>>;

    /// The `limit` newest queries by `currentDate`
    async fn recent_queries(&self, limit: i64) -> Result<Vec<Query>>;

    async fn find_query(&self, id: &str) -> Result<Option<Query>>;

    async fn insert_query(&self, query: Query) -> Result<InsertOutcome>;

    /// Apply whitelisted edits, creating the document if absent
    async fn upsert_query_fields(&self, id: &str, edit: QueryEdit) -> Result<UpdateOutcome>;

    async fn delete_query(&self, id: &str) -> Result<DeleteOutcome>;

    /// Atomically add one to the query's recommendation counter
    async fn increment_recommendation_count(&self, query_id: &str) -> Result<UpdateOutcome>;

    /// Atomically subtract one from the query's recommendation counter.
    ///
    /// The counter never goes below zero: when it is already zero (or the
    /// query is gone) nothing is matched and `matched_count` is 0.
    async fn decrement_recommendation_count(&self, query_id: &str) -> Result<UpdateOutcome>;

    async fn insert_recommendation(&self, rec: Recommendation) -> Result<InsertOutcome>;

    async fn list_recommendations(
        &self,
        filter: RecommendationFilter,
    ) -> Result<Vec<Recommendation>>;

    async fn find_recommendation(&self, id: &str) -> Result<Option<Recommendation>>;

    async fn delete_recommendation(&self, id: &str) -> Result<DeleteOutcome>;

    /// Remove every recommendation referencing the query
    async fn delete_recommendations_for_query(&self, query_id: &str) -> Result<DeleteOutcome>;

    async fn list_reviews(&self) -> Result<Vec<Review>>;

    /// Release the underlying connection; called once at process shutdown
    async fn shutdown(&self) {}
}
