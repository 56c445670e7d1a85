//! Fault-injecting store for tests
//!
//! Wraps a `MemoryStore` and lets a test make named operations fail,
//! stall past any timeout, or lose a race against a concurrent writer.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::db::memory::MemoryStore;
use crate::db::schemas::{
    Query, QueryEdit, QueryFilter, Recommendation, RecommendationFilter, Review,
};
use crate::db::store::{DeleteOutcome, DocumentStore, InsertOutcome, UpdateOutcome};
use crate::types::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Reject the operation
    Fail,
    /// Never finish in any reasonable time
    Stall,
    /// Another writer gets there first: a delete is repeated, or the
    /// counted query is removed before an increment
    Preempt,
}

pub struct FaultyStore {
    inner: MemoryStore,
    faults: Mutex<HashMap<&'static str, Fault>>,
}

impl FaultyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            faults: Mutex::new(HashMap::new()),
        }
    }

    pub fn inject(&self, operation: &'static str, fault: Fault) {
        self.faults.lock().unwrap().insert(operation, fault);
    }

    fn fault(&self, operation: &'static str) -> Option<Fault> {
        self.faults.lock().unwrap().get(operation).copied()
    }

    async fn gate(&self, operation: &'static str) -> Result<()> {
        match self.fault(operation) {
            Some(Fault::Fail) => Err(AppError::Store(format!("{} rejected", operation))),
            Some(Fault::Stall) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
            Some(Fault::Preempt) | None => Ok(()),
        }
    }
}

#[async_trait]
impl DocumentStore for FaultyStore {
    fn backend(&self) -> &'static str {
        "faulty"
    }

    async fn list_queries(&self, filter: QueryFilter) -> Result<Vec<Query>> {
        self.gate("list_queries").await?;
        self.inner.list_queries(filter).await
    }

    async fn recent_queries(&self, limit: i64) -> Result<Vec<Query>> {
        self.gate("recent_queries").await?;
        self.inner.recent_queries(limit).await
    }

    async fn find_query(&self, id: &str) -> Result<Option<Query>> {
        self.gate("find_query").await?;
        self.inner.find_query(id).await
    }

    async fn insert_query(&self, query: Query) -> Result<InsertOutcome> {
        self.gate("insert_query").await?;
        self.inner.insert_query(query).await
    }

    async fn upsert_query_fields(&self, id: &str, edit: QueryEdit) -> Result<UpdateOutcome> {
        self.gate("upsert_query_fields").await?;
        self.inner.upsert_query_fields(id, edit).await
    }

    async fn delete_query(&self, id: &str) -> Result<DeleteOutcome> {
        self.gate("delete_query").await?;
        self.inner.delete_query(id).await
    }

    async fn increment_recommendation_count(&self, query_id: &str) -> Result<UpdateOutcome> {
        self.gate("increment_recommendation_count").await?;
        if self.fault("increment_recommendation_count") == Some(Fault::Preempt) {
            self.inner.delete_query(query_id).await?;
        }
        self.inner.increment_recommendation_count(query_id).await
    }

    async fn decrement_recommendation_count(&self, query_id: &str) -> Result<UpdateOutcome> {
        self.gate("decrement_recommendation_count").await?;
        self.inner.decrement_recommendation_count(query_id).await
    }

    async fn insert_recommendation(&self, rec: Recommendation) -> Result<InsertOutcome> {
        self.gate("insert_recommendation").await?;
        self.inner.insert_recommendation(rec).await
    }

    async fn list_recommendations(
        &self,
        filter: RecommendationFilter,
    ) -> Result<Vec<Recommendation>> {
        self.gate("list_recommendations").await?;
        self.inner.list_recommendations(filter).await
    }

    async fn find_recommendation(&self, id: &str) -> Result<Option<Recommendation>> {
        self.gate("find_recommendation").await?;
        self.inner.find_recommendation(id).await
    }

    async fn delete_recommendation(&self, id: &str) -> Result<DeleteOutcome> {
        self.gate("delete_recommendation").await?;
        if self.fault("delete_recommendation") == Some(Fault::Preempt) {
            self.inner.delete_recommendation(id).await?;
        }
        self.inner.delete_recommendation(id).await
    }

    async fn delete_recommendations_for_query(&self, query_id: &str) -> Result<DeleteOutcome> {
        self.gate("delete_recommendations_for_query").await?;
        self.inner.delete_recommendations_for_query(query_id).await
    }

    async fn list_reviews(&self) -> Result<Vec<Review>> {
        self.gate("list_reviews").await?;
        self.inner.list_reviews().await
    }
}
