//! MongoDB client and document store adapter
//!
//! Documents are kept as raw `bson::Document`s at the driver boundary and
//! converted to the typed schemas here, so the rest of the service sees
//! ids as hex strings rather than `ObjectId`s.

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Bson, Document};
use futures_util::TryStreamExt;
use mongodb::{
    options::IndexOptions,
    results::{DeleteResult, UpdateResult},
    Client, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{error, info, warn};

use crate::db::schemas::{
    Query, QueryEdit, QueryFilter, Recommendation, RecommendationFilter, Review,
    QUERY_COLLECTION, RECOMMENDATION_COLLECTION, REVIEW_COLLECTION,
};
use crate::db::store::{DeleteOutcome, DocumentStore, InsertOutcome, UpdateOutcome};
use crate::types::{AppError, Result};

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Connect and verify the deployment answers a ping
    pub async fn new(uri: &str, db_name: &str) -> Result<Self> {
        // Use serverSelectionTimeoutMS to avoid hanging on unreachable MongoDB
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}/?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri.trim_end_matches('/'))
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| AppError::Store(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| AppError::Store(format!("MongoDB ping failed: {}", e)))?;

        info!("Pinged deployment; connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get an untyped collection handle
    pub fn collection(&self, name: &str) -> Collection<Document> {
        self.client.database(&self.db_name).collection(name)
    }

    /// Create the schema-defined indexes on a collection
    pub async fn apply_indexes<T: IntoIndexes>(&self, name: &str) -> Result<()> {
        let schema_indices = T::into_indices();

        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.collection(name)
            .create_indexes(indices)
            .await
            .map_err(|e| AppError::Store(format!("Failed to create indexes on {}: {}", name, e)))?;

        Ok(())
    }

    /// Get the raw MongoDB client
    pub fn inner(&self) -> &Client {
        &self.client
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

/// Document store backed by MongoDB
pub struct MongoStore {
    client: MongoClient,
    queries: Collection<Document>,
    recommendations: Collection<Document>,
    reviews: Collection<Document>,
}

impl MongoStore {
    /// Connect, then create indexes. Index failures are logged, not fatal.
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self> {
        let client = MongoClient::new(uri, db_name).await?;

        if let Err(e) = client.apply_indexes::<Query>(QUERY_COLLECTION).await {
            warn!("{}", e);
        }
        if let Err(e) = client
            .apply_indexes::<Recommendation>(RECOMMENDATION_COLLECTION)
            .await
        {
            warn!("{}", e);
        }

        Ok(Self {
            queries: client.collection(QUERY_COLLECTION),
            recommendations: client.collection(RECOMMENDATION_COLLECTION),
            reviews: client.collection(REVIEW_COLLECTION),
            client,
        })
    }

    async fn find_many<T: DeserializeOwned>(
        collection: &Collection<Document>,
        filter: Document,
        sort: Option<Document>,
        limit: Option<i64>,
    ) -> Result<Vec<T>> {
        let mut find = collection.find(filter);
        if let Some(sort) = sort {
            find = find.sort(sort);
        }
        if let Some(limit) = limit {
            find = find.limit(limit);
        }
        let docs: Vec<Document> = find.await?.try_collect().await?;

        // One unreadable document fails the listing, as it would a lookup
        docs.into_iter()
            .map(|doc| {
                from_stored(doc).inspect_err(|e| {
                    error!("Error reading document from {}: {}", collection.name(), e)
                })
            })
            .collect()
    }

    async fn find_by_id<T: DeserializeOwned>(
        collection: &Collection<Document>,
        id: &str,
    ) -> Result<Option<T>> {
        let filter = doc! { "_id": ObjectId::parse_str(id)? };
        match collection.find_one(filter).await? {
            Some(doc) => Ok(Some(from_stored(doc)?)),
            None => Ok(None),
        }
    }

    async fn insert<T: Serialize>(collection: &Collection<Document>, item: &T) -> Result<InsertOutcome> {
        let result = collection.insert_one(to_stored(item)?).await?;
        Ok(InsertOutcome {
            acknowledged: true,
            inserted_id: id_string(&result.inserted_id),
        })
    }
}

/// Typed record from a stored document; `_id` becomes a hex string
fn from_stored<T: DeserializeOwned>(doc: Document) -> Result<T> {
    Ok(bson::from_document(normalized(doc))?)
}

/// Stored document from a typed record; the store assigns `_id`
fn to_stored<T: Serialize>(item: &T) -> Result<Document> {
    let mut doc = bson::to_document(item)?;
    doc.remove("_id");
    Ok(doc)
}

/// Flatten driver-native values the schemas hold as strings
fn normalized(mut doc: Document) -> Document {
    if let Some(Bson::ObjectId(oid)) = doc.get("_id") {
        let hex = oid.to_hex();
        doc.insert("_id", hex);
    }
    // Documents written by other clients may carry a BSON date
    if let Some(Bson::DateTime(date)) = doc.get("currentDate") {
        let rfc3339 = date.to_chrono().to_rfc3339();
        doc.insert("currentDate", rfc3339);
    }
    doc
}

fn id_string(id: &Bson) -> String {
    match id {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn update_outcome(result: UpdateResult) -> UpdateOutcome {
    UpdateOutcome {
        acknowledged: true,
        matched_count: result.matched_count,
        modified_count: result.modified_count,
        upserted_id: result.upserted_id.as_ref().map(id_string),
    }
}

fn delete_outcome(result: DeleteResult) -> DeleteOutcome {
    DeleteOutcome {
        acknowledged: true,
        deleted_count: result.deleted_count,
    }
}

fn newest_first() -> Document {
    doc! { "currentDate": -1 }
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn backend(&self) -> &'static str {
        "mongodb"
    }

    async fn list_queries(&self, filter: QueryFilter) -> Result<Vec<Query>> {
        Self::find_many(&self.queries, filter.to_document(), Some(newest_first()), None).await
    }

    async fn recent_queries(&self, limit: i64) -> Result<Vec<Query>> {
        Self::find_many(&self.queries, doc! {}, Some(newest_first()), Some(limit)).await
    }

    async fn find_query(&self, id: &str) -> Result<Option<Query>> {
        Self::find_by_id(&self.queries, id).await
    }

    async fn insert_query(&self, query: Query) -> Result<InsertOutcome> {
        Self::insert(&self.queries, &query).await
    }

    async fn upsert_query_fields(&self, id: &str, edit: QueryEdit) -> Result<UpdateOutcome> {
        if edit.is_empty() {
            return Err(AppError::BadRequest("No editable fields supplied".into()));
        }
        let filter = doc! { "_id": ObjectId::parse_str(id)? };
        let update = doc! { "$set": edit.to_set_document() };
        let result = self.queries.update_one(filter, update).upsert(true).await?;
        Ok(update_outcome(result))
    }

    async fn delete_query(&self, id: &str) -> Result<DeleteOutcome> {
        let filter = doc! { "_id": ObjectId::parse_str(id)? };
        Ok(delete_outcome(self.queries.delete_one(filter).await?))
    }

    async fn increment_recommendation_count(&self, query_id: &str) -> Result<UpdateOutcome> {
        let filter = doc! { "_id": ObjectId::parse_str(query_id)? };
        let update = doc! { "$inc": { "recommendationCount": 1 } };
        Ok(update_outcome(self.queries.update_one(filter, update).await?))
    }

    async fn decrement_recommendation_count(&self, query_id: &str) -> Result<UpdateOutcome> {
        let filter = doc! {
            "_id": ObjectId::parse_str(query_id)?,
            "recommendationCount": { "$gt": 0 },
        };
        let update = doc! { "$inc": { "recommendationCount": -1 } };
        Ok(update_outcome(self.queries.update_one(filter, update).await?))
    }

    async fn insert_recommendation(&self, rec: Recommendation) -> Result<InsertOutcome> {
        Self::insert(&self.recommendations, &rec).await
    }

    async fn list_recommendations(
        &self,
        filter: RecommendationFilter,
    ) -> Result<Vec<Recommendation>> {
        Self::find_many(&self.recommendations, filter.to_document(), None, None).await
    }

    async fn find_recommendation(&self, id: &str) -> Result<Option<Recommendation>> {
        Self::find_by_id(&self.recommendations, id).await
    }

    async fn delete_recommendation(&self, id: &str) -> Result<DeleteOutcome> {
        let filter = doc! { "_id": ObjectId::parse_str(id)? };
        Ok(delete_outcome(self.recommendations.delete_one(filter).await?))
    }

    async fn delete_recommendations_for_query(&self, query_id: &str) -> Result<DeleteOutcome> {
        let filter = doc! { "queryId": query_id };
        Ok(delete_outcome(self.recommendations.delete_many(filter).await?))
    }

    async fn list_reviews(&self) -> Result<Vec<Review>> {
        let docs: Vec<Document> = Self::find_many(&self.reviews, doc! {}, None, None).await?;
        Ok(docs
            .into_iter()
            .filter_map(|doc| match Bson::Document(doc).into_relaxed_extjson() {
                serde_json::Value::Object(fields) => Some(Review(fields)),
                _ => None,
            })
            .collect())
    }

    async fn shutdown(&self) {
        info!("Closing MongoDB connection to '{}'", self.client.db_name());
        self.client.inner().clone().shutdown().await;
    }
}
