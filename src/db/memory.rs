//! In-process document store
//!
//! Backs development mode when MongoDB is unavailable, and the test suite.
//! Ids are hex ObjectIds like the Mongo adapter's, and malformed ids are
//! rejected the same way. Each operation takes the collection lock once,
//! which gives the per-document atomicity the service relies on.

use async_trait::async_trait;
use bson::oid::ObjectId;
use std::cmp::Reverse;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::db::schemas::{
    Query, QueryEdit, QueryFilter, Recommendation, RecommendationFilter, Review,
};
use crate::db::store::{DeleteOutcome, DocumentStore, InsertOutcome, UpdateOutcome};
use crate::types::Result;

#[derive(Default)]
struct Collections {
    queries: Vec<Query>,
    recommendations: Vec<Recommendation>,
    reviews: Vec<Review>,
}

/// Simple in-memory document store
#[derive(Default, Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<Collections>>,
    operations: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-loaded with review documents
    pub fn with_reviews(reviews: Vec<Review>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Collections {
                reviews,
                ..Default::default()
            })),
            operations: Arc::default(),
        }
    }

    /// Number of store operations performed so far
    pub fn operation_count(&self) -> usize {
        self.operations.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.operations.fetch_add(1, Ordering::SeqCst);
    }
}

/// Reject ids the Mongo adapter would reject
fn checked_id(id: &str) -> Result<String> {
    Ok(ObjectId::parse_str(id)?.to_hex())
}

fn fresh_id() -> String {
    ObjectId::new().to_hex()
}

fn newest_first(queries: &mut [Query]) {
    // Undated documents sort last
    queries.sort_by_key(|q| Reverse(q.current_date));
}

fn updated(matched: u64, modified: u64, upserted_id: Option<String>) -> UpdateOutcome {
    UpdateOutcome {
        acknowledged: true,
        matched_count: matched,
        modified_count: modified,
        upserted_id,
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn list_queries(&self, filter: QueryFilter) -> Result<Vec<Query>> {
        self.touch();
        let collections = self.inner.read().await;
        let mut found: Vec<Query> = collections
            .queries
            .iter()
            .filter(|q| filter.matches(q))
            .cloned()
            .collect();
        newest_first(&mut found);
        Ok(found)
    }

    async fn recent_queries(&self, limit: i64) -> Result<Vec<Query>> {
        let mut found = self.list_queries(QueryFilter::All).await?;
        found.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(found)
    }

    async fn find_query(&self, id: &str) -> Result<Option<Query>> {
        self.touch();
        let id = checked_id(id)?;
        let collections = self.inner.read().await;
        Ok(collections
            .queries
            .iter()
            .find(|q| q.id.as_deref() == Some(id.as_str()))
            .cloned())
    }

    async fn insert_query(&self, mut query: Query) -> Result<InsertOutcome> {
        self.touch();
        let id = fresh_id();
        query.id = Some(id.clone());
        self.inner.write().await.queries.push(query);
        Ok(InsertOutcome {
            acknowledged: true,
            inserted_id: id,
        })
    }

    async fn upsert_query_fields(&self, id: &str, edit: QueryEdit) -> Result<UpdateOutcome> {
        self.touch();
        let id = checked_id(id)?;
        let mut collections = self.inner.write().await;

        if let Some(query) = collections
            .queries
            .iter_mut()
            .find(|q| q.id.as_deref() == Some(id.as_str()))
        {
            let before = query.clone();
            edit.apply(query);
            let modified = u64::from(*query != before);
            return Ok(updated(1, modified, None));
        }

        let mut query = Query {
            id: Some(id.clone()),
            ..Default::default()
        };
        edit.apply(&mut query);
        collections.queries.push(query);
        Ok(updated(0, 0, Some(id)))
    }

    async fn delete_query(&self, id: &str) -> Result<DeleteOutcome> {
        self.touch();
        let id = checked_id(id)?;
        let mut collections = self.inner.write().await;
        let before = collections.queries.len();
        if let Some(pos) = collections
            .queries
            .iter()
            .position(|q| q.id.as_deref() == Some(id.as_str()))
        {
            collections.queries.remove(pos);
        }
        Ok(DeleteOutcome {
            acknowledged: true,
            deleted_count: (before - collections.queries.len()) as u64,
        })
    }

    async fn increment_recommendation_count(&self, query_id: &str) -> Result<UpdateOutcome> {
        self.touch();
        let id = checked_id(query_id)?;
        let mut collections = self.inner.write().await;
        match collections
            .queries
            .iter_mut()
            .find(|q| q.id.as_deref() == Some(id.as_str()))
        {
            Some(query) => {
                query.recommendation_count += 1;
                Ok(updated(1, 1, None))
            }
            None => Ok(updated(0, 0, None)),
        }
    }

    async fn decrement_recommendation_count(&self, query_id: &str) -> Result<UpdateOutcome> {
        self.touch();
        let id = checked_id(query_id)?;
        let mut collections = self.inner.write().await;
        match collections
            .queries
            .iter_mut()
            .find(|q| q.id.as_deref() == Some(id.as_str()) && q.recommendation_count > 0)
        {
            Some(query) => {
                query.recommendation_count -= 1;
                Ok(updated(1, 1, None))
            }
            None => Ok(updated(0, 0, None)),
        }
    }

    async fn insert_recommendation(&self, mut rec: Recommendation) -> Result<InsertOutcome> {
        self.touch();
        let id = fresh_id();
        rec.id = Some(id.clone());
        self.inner.write().await.recommendations.push(rec);
        Ok(InsertOutcome {
            acknowledged: true,
            inserted_id: id,
        })
    }

    async fn list_recommendations(
        &self,
        filter: RecommendationFilter,
    ) -> Result<Vec<Recommendation>> {
        self.touch();
        let collections = self.inner.read().await;
        Ok(collections
            .recommendations
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn find_recommendation(&self, id: &str) -> Result<Option<Recommendation>> {
        self.touch();
        let id = checked_id(id)?;
        let collections = self.inner.read().await;
        Ok(collections
            .recommendations
            .iter()
            .find(|r| r.id.as_deref() == Some(id.as_str()))
            .cloned())
    }

    async fn delete_recommendation(&self, id: &str) -> Result<DeleteOutcome> {
        self.touch();
        let id = checked_id(id)?;
        let mut collections = self.inner.write().await;
        let before = collections.recommendations.len();
        if let Some(pos) = collections
            .recommendations
            .iter()
            .position(|r| r.id.as_deref() == Some(id.as_str()))
        {
            collections.recommendations.remove(pos);
        }
        Ok(DeleteOutcome {
            acknowledged: true,
            deleted_count: (before - collections.recommendations.len()) as u64,
        })
    }

    async fn delete_recommendations_for_query(&self, query_id: &str) -> Result<DeleteOutcome> {
        self.touch();
        let mut collections = self.inner.write().await;
        let before = collections.recommendations.len();
        collections.recommendations.retain(|r| r.query_id != query_id);
        Ok(DeleteOutcome {
            acknowledged: true,
            deleted_count: (before - collections.recommendations.len()) as u64,
        })
    }

    async fn list_reviews(&self) -> Result<Vec<Review>> {
        self.touch();
        Ok(self.inner.read().await.reviews.clone())
    }
}
