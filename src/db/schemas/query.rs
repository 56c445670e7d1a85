//! Query document schema
//!
//! A query is a user's boycott report for a product. It carries a
//! denormalized `recommendationCount` that must equal the number of live
//! recommendations referencing it.

use bson::{doc, Document};
use chrono::{DateTime, Utc};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;
use crate::db::schemas::null_as_default;
use crate::types::AppError;

/// Collection name for queries
pub const QUERY_COLLECTION: &str = "query";

/// Fields a client may change through the update route
pub const EDITABLE_QUERY_FIELDS: [&str; 5] = [
    "product_name",
    "product_brand",
    "query_title",
    "boycotting_reason",
    "image",
];

/// Query document
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Query {
    /// Store-assigned identifier (hex ObjectId)
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Owner email
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,

    #[serde(rename = "userName", default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,

    #[serde(rename = "userImage", default, skip_serializing_if = "Option::is_none")]
    pub user_image: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub product_name: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub product_brand: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub query_title: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub boycotting_reason: String,

    /// Product image URL
    #[serde(default, deserialize_with = "null_as_default")]
    pub image: String,

    /// Creation timestamp
    #[serde(rename = "currentDate", default, skip_serializing_if = "Option::is_none")]
    pub current_date: Option<DateTime<Utc>>,

    #[serde(rename = "recommendationCount", default, deserialize_with = "null_as_default")]
    pub recommendation_count: i64,
}

impl Query {
    /// Prepare a client-submitted query for insertion.
    ///
    /// The store assigns the id and the counter always starts at zero.
    pub fn prepare_new(mut self) -> Result<Self, AppError> {
        if self.email.trim().is_empty() {
            return Err(AppError::BadRequest("Query requires an owner email".into()));
        }

        self.id = None;
        self.recommendation_count = 0;
        if self.current_date.is_none() {
            self.current_date = Some(Utc::now());
        }
        Ok(self)
    }
}

/// Whitelisted field edits; absent fields are left untouched
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub struct QueryEdit {
    pub product_name: Option<String>,
    pub product_brand: Option<String>,
    pub query_title: Option<String>,
    pub boycotting_reason: Option<String>,
    pub image: Option<String>,
}

impl QueryEdit {
    /// Present fields as (name, value) pairs, in whitelist order
    pub fn fields(&self) -> Vec<(&'static str, &str)> {
        let values = [
            &self.product_name,
            &self.product_brand,
            &self.query_title,
            &self.boycotting_reason,
            &self.image,
        ];
        EDITABLE_QUERY_FIELDS
            .iter()
            .zip(values)
            .filter_map(|(name, value)| value.as_deref().map(|v| (*name, v)))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    /// `$set` body for the present fields
    pub fn to_set_document(&self) -> Document {
        let mut set = Document::new();
        for (name, value) in self.fields() {
            set.insert(name, value);
        }
        set
    }

    /// Apply the edit to an in-memory document
    pub fn apply(&self, query: &mut Query) {
        if let Some(ref v) = self.product_name {
            query.product_name = v.clone();
        }
        if let Some(ref v) = self.product_brand {
            query.product_brand = v.clone();
        }
        if let Some(ref v) = self.query_title {
            query.query_title = v.clone();
        }
        if let Some(ref v) = self.boycotting_reason {
            query.boycotting_reason = v.clone();
        }
        if let Some(ref v) = self.image {
            query.image = v.clone();
        }
    }
}

/// Which queries a listing returns
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryFilter {
    All,
    Owner(String),
}

impl QueryFilter {
    pub fn matches(&self, query: &Query) -> bool {
        match self {
            QueryFilter::All => true,
            QueryFilter::Owner(email) => &query.email == email,
        }
    }

    pub fn to_document(&self) -> Document {
        match self {
            QueryFilter::All => doc! {},
            QueryFilter::Owner(email) => doc! { "email": email },
        }
    }
}

impl IntoIndexes for Query {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "email": 1 },
                Some(IndexOptions::builder().name("email_index".to_string()).build()),
            ),
            // Recent queries view sorts on this
            (
                doc! { "currentDate": -1 },
                Some(
                    IndexOptions::builder()
                        .name("current_date_desc".to_string())
                        .build(),
                ),
            ),
        ]
    }
}
