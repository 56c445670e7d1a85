//! Recommendation consistency manager
//!
//! Keeps `Query.recommendationCount` in step with the recommendations that
//! reference the query. Every workflow is a two-step saga over independent
//! single-document writes:
//!
//! - create: insert the recommendation, then `$inc` the counter by one
//! - delete: remove the recommendation, then `$inc` the counter by minus one
//!
//! The store offers no cross-document transaction, so a failure in the
//! second step is not retried or rolled back. It is reported alongside the
//! first step's result as an [`Inconsistency`] and logged.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::db::schemas::{canonical_query_id, Recommendation};
use crate::db::store::{DeleteOutcome, DocumentStore, InsertOutcome, UpdateOutcome};
use crate::types::{AppError, Result};

/// What went wrong in the second step of a workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InconsistencyKind {
    /// The counter increment failed or timed out
    IncrementFailed,
    /// The increment matched no query; it was deleted in between
    IncrementUnmatched,
    /// The counter decrement failed or timed out
    DecrementFailed,
    /// The decrement matched nothing; the counter was already zero or the query is gone
    DecrementClamped,
    /// The query was removed but its recommendations were not
    CascadeFailed,
}

impl InconsistencyKind {
    /// Whether the second step errored, as opposed to matching nothing
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Self::IncrementFailed | Self::DecrementFailed | Self::CascadeFailed
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Inconsistency {
    pub kind: InconsistencyKind,
    pub query_id: String,
    pub detail: String,
}

impl Inconsistency {
    fn new(kind: InconsistencyKind, query_id: &str, detail: impl Into<String>) -> Self {
        let inconsistency = Self {
            kind,
            query_id: query_id.to_string(),
            detail: detail.into(),
        };
        warn!(
            kind = ?inconsistency.kind,
            query_id = %inconsistency.query_id,
            "Recommendation counter inconsistency: {}",
            inconsistency.detail
        );
        inconsistency
    }
}

/// Result of the create workflow
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddRecommendationOutcome {
    pub result: InsertOutcome,
    pub update_result: Option<UpdateOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inconsistency: Option<Inconsistency>,
}

/// Result of the delete workflow
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRecommendationOutcome {
    pub delete_result: DeleteOutcome,
    pub update_result: Option<UpdateOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inconsistency: Option<Inconsistency>,
}

/// Result of deleting a query together with its recommendations
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteQueryOutcome {
    pub acknowledged: bool,
    pub deleted_count: u64,
    pub recommendations_deleted: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inconsistency: Option<Inconsistency>,
}

/// Common view of a workflow's second-step health
pub trait SagaOutcome {
    fn inconsistency(&self) -> Option<&Inconsistency>;

    fn is_consistent(&self) -> bool {
        self.inconsistency().is_none()
    }

    /// The second step errored after the first one committed
    fn is_partial_failure(&self) -> bool {
        self.inconsistency().is_some_and(|i| i.kind.is_failure())
    }
}

impl SagaOutcome for AddRecommendationOutcome {
    fn inconsistency(&self) -> Option<&Inconsistency> {
        self.inconsistency.as_ref()
    }
}

impl SagaOutcome for DeleteRecommendationOutcome {
    fn inconsistency(&self) -> Option<&Inconsistency> {
        self.inconsistency.as_ref()
    }
}

impl SagaOutcome for DeleteQueryOutcome {
    fn inconsistency(&self) -> Option<&Inconsistency> {
        self.inconsistency.as_ref()
    }
}

#[derive(Clone)]
pub struct RecommendationManager {
    store: Arc<dyn DocumentStore>,
}

impl RecommendationManager {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Create a recommendation and count it against its query
    pub async fn add_recommendation(&self, rec: Recommendation) -> Result<AddRecommendationOutcome> {
        let rec = rec.prepare_new()?;
        let query_id = rec.query_id.clone();

        if self.store.find_query(&query_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Query {} does not exist", query_id)));
        }

        let result = self.store.insert_recommendation(rec).await?;
        debug!(id = %result.inserted_id, query_id = %query_id, "Recommendation inserted");

        let (update_result, inconsistency) =
            match self.store.increment_recommendation_count(&query_id).await {
                Ok(update) if update.matched_count == 1 => (Some(update), None),
                Ok(update) => (
                    Some(update),
                    Some(Inconsistency::new(
                        InconsistencyKind::IncrementUnmatched,
                        &query_id,
                        format!(
                            "query disappeared before recommendation {} was counted",
                            result.inserted_id
                        ),
                    )),
                ),
                Err(e) => (
                    None,
                    Some(Inconsistency::new(
                        InconsistencyKind::IncrementFailed,
                        &query_id,
                        e.to_string(),
                    )),
                ),
            };

        info!(id = %result.inserted_id, query_id = %query_id, "Recommendation added");

        Ok(AddRecommendationOutcome {
            result,
            update_result,
            inconsistency,
        })
    }

    /// Delete a recommendation and uncount it from its query
    pub async fn delete_recommendation(&self, id: &str) -> Result<DeleteRecommendationOutcome> {
        let rec = self
            .store
            .find_recommendation(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Recommendation {} not found", id)))?;
        let query_id = rec.query_id;

        let delete_result = self.store.delete_recommendation(id).await?;
        if delete_result.deleted_count == 0 {
            // Lost a race with another delete; that delete owns the decrement
            warn!(id, "Recommendation vanished between lookup and delete");
            return Err(AppError::Internal("Failed to delete recommendation".into()));
        }

        let (update_result, inconsistency) =
            match self.store.decrement_recommendation_count(&query_id).await {
                Ok(update) if update.matched_count == 1 => (Some(update), None),
                Ok(update) => (
                    Some(update),
                    Some(Inconsistency::new(
                        InconsistencyKind::DecrementClamped,
                        &query_id,
                        "counter already zero or query missing; left unchanged",
                    )),
                ),
                Err(e) => (
                    None,
                    Some(Inconsistency::new(
                        InconsistencyKind::DecrementFailed,
                        &query_id,
                        e.to_string(),
                    )),
                ),
            };

        info!(id, query_id = %query_id, "Recommendation deleted");

        Ok(DeleteRecommendationOutcome {
            delete_result,
            update_result,
            inconsistency,
        })
    }

    /// Delete a query, then every recommendation that references it
    pub async fn delete_query_cascade(&self, id: &str) -> Result<DeleteQueryOutcome> {
        let deleted = self.store.delete_query(id).await?;
        let id = canonical_query_id(id);

        let (recommendations_deleted, inconsistency) =
            match self.store.delete_recommendations_for_query(&id).await {
                Ok(cascade) => (cascade.deleted_count, None),
                Err(e) => (
                    0,
                    Some(Inconsistency::new(
                        InconsistencyKind::CascadeFailed,
                        &id,
                        e.to_string(),
                    )),
                ),
            };

        info!(
            id = %id,
            deleted = deleted.deleted_count,
            recommendations_deleted,
            "Query deleted"
        );

        Ok(DeleteQueryOutcome {
            acknowledged: deleted.acknowledged,
            deleted_count: deleted.deleted_count,
            recommendations_deleted,
            inconsistency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::faulty::{Fault, FaultyStore};
    use crate::db::memory::MemoryStore;
    use crate::db::schemas::{Query, RecommendationFilter};
    use bson::oid::ObjectId;

    async fn seeded_query(store: &MemoryStore) -> String {
        let query = Query {
            email: "owner@example.com".into(),
            product_name: "Cola".into(),
            ..Default::default()
        }
        .prepare_new()
        .unwrap();
        store.insert_query(query).await.unwrap().inserted_id
    }

    fn recommendation_for(query_id: &str) -> Recommendation {
        Recommendation {
            query_id: query_id.into(),
            recommender_email: "r@example.com".into(),
            user_email: "owner@example.com".into(),
            recommendation_title: "Try the local brand".into(),
            ..Default::default()
        }
    }

    async fn count(store: &MemoryStore, query_id: &str) -> i64 {
        store
            .find_query(query_id)
            .await
            .unwrap()
            .unwrap()
            .recommendation_count
    }

    #[tokio::test]
    async fn test_add_increments_counter() {
        let store = MemoryStore::new();
        let query_id = seeded_query(&store).await;
        let manager = RecommendationManager::new(Arc::new(store.clone()));

        let outcome = manager
            .add_recommendation(recommendation_for(&query_id))
            .await
            .unwrap();

        assert!(outcome.is_consistent());
        assert_eq!(outcome.update_result.unwrap().modified_count, 1);
        assert_eq!(count(&store, &query_id).await, 1);
    }

    #[tokio::test]
    async fn test_add_for_missing_query_writes_nothing() {
        let store = MemoryStore::new();
        let manager = RecommendationManager::new(Arc::new(store.clone()));

        let err = manager
            .add_recommendation(recommendation_for(&ObjectId::new().to_hex()))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        let all = store
            .list_recommendations(RecommendationFilter::All)
            .await
            .unwrap();
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn test_add_without_query_id_is_bad_request() {
        let store = MemoryStore::new();
        let manager = RecommendationManager::new(Arc::new(store.clone()));

        let err = manager
            .add_recommendation(recommendation_for(""))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(store.operation_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_decrements_counter() {
        let store = MemoryStore::new();
        let query_id = seeded_query(&store).await;
        let manager = RecommendationManager::new(Arc::new(store.clone()));
        let added = manager
            .add_recommendation(recommendation_for(&query_id))
            .await
            .unwrap();

        let outcome = manager
            .delete_recommendation(&added.result.inserted_id)
            .await
            .unwrap();

        assert!(outcome.is_consistent());
        assert_eq!(outcome.delete_result.deleted_count, 1);
        assert_eq!(count(&store, &query_id).await, 0);
    }

    #[tokio::test]
    async fn test_delete_unknown_id_leaves_counters() {
        let store = MemoryStore::new();
        let query_id = seeded_query(&store).await;
        let manager = RecommendationManager::new(Arc::new(store.clone()));
        manager
            .add_recommendation(recommendation_for(&query_id))
            .await
            .unwrap();

        let err = manager
            .delete_recommendation(&ObjectId::new().to_hex())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(count(&store, &query_id).await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_adds_both_count() {
        let store = MemoryStore::new();
        let query_id = seeded_query(&store).await;
        let manager = RecommendationManager::new(Arc::new(store.clone()));

        let (a, b) = tokio::join!(
            manager.add_recommendation(recommendation_for(&query_id)),
            manager.add_recommendation(recommendation_for(&query_id)),
        );
        a.unwrap();
        b.unwrap();

        assert_eq!(count(&store, &query_id).await, 2);
    }

    #[tokio::test]
    async fn test_create_then_delete_round_trip() {
        let store = MemoryStore::new();
        let query_id = seeded_query(&store).await;
        let manager = RecommendationManager::new(Arc::new(store.clone()));
        assert_eq!(count(&store, &query_id).await, 0);

        let added = manager
            .add_recommendation(recommendation_for(&query_id))
            .await
            .unwrap();
        assert_eq!(count(&store, &query_id).await, 1);

        manager
            .delete_recommendation(&added.result.inserted_id)
            .await
            .unwrap();
        assert_eq!(count(&store, &query_id).await, 0);
    }

    #[tokio::test]
    async fn test_failed_increment_is_reported_not_rolled_back() {
        let memory = MemoryStore::new();
        let query_id = seeded_query(&memory).await;
        let faulty = FaultyStore::new(memory.clone());
        faulty.inject("increment_recommendation_count", Fault::Fail);
        let manager = RecommendationManager::new(Arc::new(faulty));

        let outcome = manager
            .add_recommendation(recommendation_for(&query_id))
            .await
            .unwrap();

        assert!(outcome.is_partial_failure());
        assert!(outcome.update_result.is_none());
        let inconsistency = outcome.inconsistency.unwrap();
        assert_eq!(inconsistency.kind, InconsistencyKind::IncrementFailed);
        assert_eq!(inconsistency.query_id, query_id);

        // The insert stands
        let stored = memory
            .list_recommendations(RecommendationFilter::ForQuery(query_id.clone()))
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(count(&memory, &query_id).await, 0);
    }

    #[tokio::test]
    async fn test_lost_delete_race_leaves_counter() {
        let memory = MemoryStore::new();
        let query_id = seeded_query(&memory).await;
        let setup = RecommendationManager::new(Arc::new(memory.clone()));
        let added = setup
            .add_recommendation(recommendation_for(&query_id))
            .await
            .unwrap();

        let faulty = FaultyStore::new(memory.clone());
        faulty.inject("delete_recommendation", Fault::Preempt);
        let manager = RecommendationManager::new(Arc::new(faulty));

        let err = manager
            .delete_recommendation(&added.result.inserted_id)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Internal(ref msg) if msg == "Failed to delete recommendation"));
        assert_eq!(count(&memory, &query_id).await, 1);
    }

    #[tokio::test]
    async fn test_decrement_at_zero_is_clamped_and_flagged() {
        let store = MemoryStore::new();
        let query_id = seeded_query(&store).await;
        // A recommendation that was never counted
        let orphan = store
            .insert_recommendation(recommendation_for(&query_id))
            .await
            .unwrap();
        let manager = RecommendationManager::new(Arc::new(store.clone()));

        let outcome = manager
            .delete_recommendation(&orphan.inserted_id)
            .await
            .unwrap();

        assert!(!outcome.is_consistent());
        assert!(!outcome.is_partial_failure());
        assert_eq!(
            outcome.inconsistency.map(|i| i.kind),
            Some(InconsistencyKind::DecrementClamped)
        );
        assert_eq!(count(&store, &query_id).await, 0);
    }

    #[tokio::test]
    async fn test_delete_query_cascades() {
        let store = MemoryStore::new();
        let query_id = seeded_query(&store).await;
        let other_id = seeded_query(&store).await;
        let manager = RecommendationManager::new(Arc::new(store.clone()));
        for id in [&query_id, &query_id, &other_id] {
            manager.add_recommendation(recommendation_for(id)).await.unwrap();
        }

        let outcome = manager.delete_query_cascade(&query_id).await.unwrap();

        assert_eq!(outcome.deleted_count, 1);
        assert_eq!(outcome.recommendations_deleted, 2);
        assert!(store.find_query(&query_id).await.unwrap().is_none());
        let left = store
            .list_recommendations(RecommendationFilter::All)
            .await
            .unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].query_id, other_id);
    }

    #[tokio::test]
    async fn test_uppercase_query_id_is_listed_and_cascaded() {
        let store = MemoryStore::new();
        let query_id = seeded_query(&store).await;
        let manager = RecommendationManager::new(Arc::new(store.clone()));

        let outcome = manager
            .add_recommendation(recommendation_for(&query_id.to_uppercase()))
            .await
            .unwrap();
        assert!(outcome.is_consistent());
        assert_eq!(count(&store, &query_id).await, 1);

        let listed = store
            .list_recommendations(RecommendationFilter::for_query(&query_id))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].query_id, query_id);

        let deleted = manager
            .delete_query_cascade(&query_id.to_uppercase())
            .await
            .unwrap();
        assert_eq!(deleted.deleted_count, 1);
        assert_eq!(deleted.recommendations_deleted, 1);
        let left = store
            .list_recommendations(RecommendationFilter::All)
            .await
            .unwrap();
        assert!(left.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_insert_leaves_counter() {
        let memory = MemoryStore::new();
        let query_id = seeded_query(&memory).await;
        let faulty = FaultyStore::new(memory.clone());
        faulty.inject("insert_recommendation", Fault::Fail);
        let manager = RecommendationManager::new(Arc::new(faulty));

        let err = manager
            .add_recommendation(recommendation_for(&query_id))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Store(_)));
        assert_eq!(count(&memory, &query_id).await, 0);
        let stored = memory
            .list_recommendations(RecommendationFilter::All)
            .await
            .unwrap();
        assert!(stored.is_empty());
    }

    #[tokio::test]
    async fn test_query_removed_before_increment_is_flagged() {
        let memory = MemoryStore::new();
        let query_id = seeded_query(&memory).await;
        let faulty = FaultyStore::new(memory.clone());
        faulty.inject("increment_recommendation_count", Fault::Preempt);
        let manager = RecommendationManager::new(Arc::new(faulty));

        let outcome = manager
            .add_recommendation(recommendation_for(&query_id))
            .await
            .unwrap();

        assert!(!outcome.is_consistent());
        assert!(!outcome.is_partial_failure());
        assert_eq!(outcome.update_result.as_ref().map(|u| u.matched_count), Some(0));
        assert_eq!(
            outcome.inconsistency.map(|i| i.kind),
            Some(InconsistencyKind::IncrementUnmatched)
        );
    }

    #[tokio::test]
    async fn test_failed_decrement_is_reported_not_rolled_back() {
        let memory = MemoryStore::new();
        let query_id = seeded_query(&memory).await;
        let setup = RecommendationManager::new(Arc::new(memory.clone()));
        let added = setup
            .add_recommendation(recommendation_for(&query_id))
            .await
            .unwrap();

        let faulty = FaultyStore::new(memory.clone());
        faulty.inject("decrement_recommendation_count", Fault::Fail);
        let manager = RecommendationManager::new(Arc::new(faulty));

        let outcome = manager
            .delete_recommendation(&added.result.inserted_id)
            .await
            .unwrap();

        assert!(outcome.is_partial_failure());
        assert_eq!(outcome.delete_result.deleted_count, 1);
        assert!(outcome.update_result.is_none());
        assert_eq!(
            outcome.inconsistency.map(|i| i.kind),
            Some(InconsistencyKind::DecrementFailed)
        );
        // The delete stands and the counter is stale
        assert!(memory
            .find_recommendation(&added.result.inserted_id)
            .await
            .unwrap()
            .is_none());
        assert_eq!(count(&memory, &query_id).await, 1);
    }

    #[tokio::test]
    async fn test_failed_cascade_is_reported() {
        let memory = MemoryStore::new();
        let query_id = seeded_query(&memory).await;
        let setup = RecommendationManager::new(Arc::new(memory.clone()));
        setup
            .add_recommendation(recommendation_for(&query_id))
            .await
            .unwrap();

        let faulty = FaultyStore::new(memory.clone());
        faulty.inject("delete_recommendations_for_query", Fault::Fail);
        let manager = RecommendationManager::new(Arc::new(faulty));

        let outcome = manager.delete_query_cascade(&query_id).await.unwrap();

        assert!(outcome.is_partial_failure());
        assert_eq!(outcome.deleted_count, 1);
        assert_eq!(outcome.recommendations_deleted, 0);
        assert_eq!(
            outcome.inconsistency.map(|i| i.kind),
            Some(InconsistencyKind::CascadeFailed)
        );
        let orphans = memory
            .list_recommendations(RecommendationFilter::All)
            .await
            .unwrap();
        assert_eq!(orphans.len(), 1);
    }

    #[test]
    fn test_outcome_wire_shape() {
        let outcome = AddRecommendationOutcome {
            result: InsertOutcome {
                acknowledged: true,
                inserted_id: "r1".into(),
            },
            update_result: None,
            inconsistency: Some(Inconsistency {
                kind: InconsistencyKind::IncrementFailed,
                query_id: "q1".into(),
                detail: "timed out".into(),
            }),
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["result"]["insertedId"], "r1");
        assert!(value["updateResult"].is_null());
        assert_eq!(value["inconsistency"]["kind"], "increment_failed");
        assert_eq!(value["inconsistency"]["queryId"], "q1");
    }
}
