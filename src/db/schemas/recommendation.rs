//! Recommendation document schema
//!
//! A recommendation suggests an alternative product for a query. It holds
//! a weak reference (`queryId`) to the query; no ownership is implied.

use bson::{doc, oid::ObjectId, Document};
use chrono::{DateTime, Utc};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;
use crate::db::schemas::null_as_default;
use crate::types::AppError;

/// Collection name for recommendations
pub const RECOMMENDATION_COLLECTION: &str = "recommendations";

/// Recommendation document
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Recommendation {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Id of the query this recommendation answers
    #[serde(rename = "queryId", default, deserialize_with = "null_as_default")]
    pub query_id: String,

    #[serde(rename = "recommenderEmail", default, deserialize_with = "null_as_default")]
    pub recommender_email: String,

    #[serde(rename = "recommenderName", default, skip_serializing_if = "Option::is_none")]
    pub recommender_name: Option<String>,

    /// Email of the query owner
    #[serde(rename = "userEmail", default, deserialize_with = "null_as_default")]
    pub user_email: String,

    #[serde(rename = "userName", default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub recommendation_title: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub recommended_product_name: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub recommended_product_image: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub recommendation_reason: String,

    #[serde(rename = "currentDate", default, skip_serializing_if = "Option::is_none")]
    pub current_date: Option<DateTime<Utc>>,
}

impl Recommendation {
    /// Validate a client-submitted recommendation and prepare it for insertion
    pub fn prepare_new(mut self) -> Result<Self, AppError> {
        let query_id = self.query_id.trim();
        if query_id.is_empty() {
            return Err(AppError::BadRequest(
                "Recommendation requires a queryId".into(),
            ));
        }
        let query_id = ObjectId::parse_str(query_id).map_err(|_| {
            AppError::BadRequest(format!("queryId is not a valid id: {}", query_id))
        })?;

        // Stored lowercase so listings and the cascade match it by value
        self.query_id = query_id.to_hex();
        self.id = None;
        if self.current_date.is_none() {
            self.current_date = Some(Utc::now());
        }
        Ok(self)
    }
}

/// Canonical form of a query id as held in `queryId`.
///
/// ObjectIds are written lowercase; anything else is only trimmed.
pub fn canonical_query_id(id: &str) -> String {
    let id = id.trim();
    ObjectId::parse_str(id)
        .map(|oid| oid.to_hex())
        .unwrap_or_else(|_| id.to_string())
}

/// Which recommendations a listing returns
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecommendationFilter {
    All,
    /// Recommendations attached to a query
    ForQuery(String),
    /// Recommendations written by a user
    Recommender(String),
    /// Recommendations on the user's own queries
    Target(String),
}

impl RecommendationFilter {
    pub fn for_query(query_id: &str) -> Self {
        Self::ForQuery(canonical_query_id(query_id))
    }

    pub fn matches(&self, rec: &Recommendation) -> bool {
        match self {
            Self::All => true,
            Self::ForQuery(id) => &rec.query_id == id,
            Self::Recommender(email) => &rec.recommender_email == email,
            Self::Target(email) => &rec.user_email == email,
        }
    }

    pub fn to_document(&self) -> Document {
        match self {
            Self::All => doc! {},
            Self::ForQuery(id) => doc! { "queryId": id },
            Self::Recommender(email) => doc! { "recommenderEmail": email },
            Self::Target(email) => doc! { "userEmail": email },
        }
    }
}

impl IntoIndexes for Recommendation {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "queryId": 1 },
                Some(IndexOptions::builder().name("query_id_index".to_string()).build()),
            ),
            (
                doc! { "recommenderEmail": 1 },
                Some(
                    IndexOptions::builder()
                        .name("recommender_email_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "userEmail": 1 },
                Some(
                    IndexOptions::builder()
                        .name("user_email_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}
