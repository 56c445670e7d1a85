//! Timeout wrapper for document stores
//!
//! Bounds every store call. A call that does not finish in time fails with
//! `AppError::Store`, exactly like a rejected operation; the caller never
//! assumes the write happened.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::db::schemas::{
    Query, QueryEdit, QueryFilter, Recommendation, RecommendationFilter, Review,
};
use crate::db::store::{DeleteOutcome, DocumentStore, InsertOutcome, UpdateOutcome};
use crate::types::{AppError, Result};

pub struct TimedStore {
    inner: Arc<dyn DocumentStore>,
    timeout: Duration,
}

impl TimedStore {
    pub fn new(inner: Arc<dyn DocumentStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T>> + Send,
    ) -> Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    operation,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Store operation timed out"
                );
                Err(AppError::Store(format!(
                    "{} timed out after {}ms",
                    operation,
                    self.timeout.as_millis()
                )))
            }
        }
    }
}

#[async_trait]
impl DocumentStore for TimedStore {
    fn backend(&self) -> &'static str {
        self.inner.backend()
    }

    async fn list_queries(&self, filter: QueryFilter) -> Result<Vec<Query>> {
        self.bounded("list_queries", self.inner.list_queries(filter)).await
    }

    async fn recent_queries(&self, limit: i64) -> Result<Vec<Query>> {
        self.bounded("recent_queries", self.inner.recent_queries(limit)).await
    }

    async fn find_query(&self, id: &str) -> Result<Option<Query>> {
        self.bounded("find_query", self.inner.find_query(id)).await
    }

    async fn insert_query(&self, query: Query) -> Result<InsertOutcome> {
        self.bounded("insert_query", self.inner.insert_query(query)).await
    }

    async fn upsert_query_fields(&self, id: &str, edit: QueryEdit) -> Result<UpdateOutcome> {
        self.bounded("upsert_query_fields", self.inner.upsert_query_fields(id, edit))
            .await
    }

    async fn delete_query(&self, id: &str) -> Result<DeleteOutcome> {
        self.bounded("delete_query", self.inner.delete_query(id)).await
    }

    async fn increment_recommendation_count(&self, query_id: &str) -> Result<UpdateOutcome> {
        self.bounded(
            "increment_recommendation_count",
            self.inner.increment_recommendation_count(query_id),
        )
        .await
    }

    async fn decrement_recommendation_count(&self, query_id: &str) -> Result<UpdateOutcome> {
        self.bounded(
            "decrement_recommendation_count",
            self.inner.decrement_recommendation_count(query_id),
        )
        .await
    }

    async fn insert_recommendation(&self, rec: Recommendation) -> Result<InsertOutcome> {
        self.bounded("insert_recommendation", self.inner.insert_recommendation(rec))
            .await
    }

    async fn list_recommendations(
        &self,
        filter: RecommendationFilter,
    ) -> Result<Vec<Recommendation>> {
        self.bounded("list_recommendations", self.inner.list_recommendations(filter))
            .await
    }

    async fn find_recommendation(&self, id: &str) -> Result<Option<Recommendation>> {
        self.bounded("find_recommendation", self.inner.find_recommendation(id))
            .await
    }

    async fn delete_recommendation(&self, id: &str) -> Result<DeleteOutcome> {
        self.bounded("delete_recommendation", self.inner.delete_recommendation(id))
            .await
    }

    async fn delete_recommendations_for_query(&self, query_id: &str) -> Result<DeleteOutcome> {
        self.bounded(
            "delete_recommendations_for_query",
            self.inner.delete_recommendations_for_query(query_id),
        )
        .await
    }

    async fn list_reviews(&self) -> Result<Vec<Review>> {
        self.bounded("list_reviews", self.inner.list_reviews()).await
    }

    async fn shutdown(&self) {
        self.inner.shutdown().await
    }
}
