use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use threadline_llm::Source;

use crate::models::{Thread, Turn, TurnMetadata, TurnStatus, User};

/// MongoDB-specific User model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoUser {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

/// MongoDB-specific Thread model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoThread {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

/// MongoDB-specific Turn model; dates are native BSON dates so range
/// queries and sorts work server-side
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoTurn {
    #[serde(rename = "_id")]
    pub id: String,
    pub thread_id: String,
    pub user_prompt: String,
    #[serde(default)]
    pub llm_response: Option<String>,
    pub status: TurnStatus,
    pub llm_model: String,
    #[serde(default)]
    pub metadata: Option<TurnMetadata>,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

// Conversions between database-agnostic and MongoDB-specific models

impl From<MongoUser> for User {
    fn from(user: MongoUser) -> Self {
        Self {
            id: user.id,
            name: user.name,
            created_at: user.created_at,
        }
    }
}

impl From<Thread> for MongoThread {
    fn from(thread: Thread) -> Self {
        Self {
            id: thread.id,
            user_id: thread.user_id,
            title: thread.title,
            created_at: thread.created_at,
        }
    }
}

impl From<MongoThread> for Thread {
    fn from(thread: MongoThread) -> Self {
        Self {
            id: thread.id,
            user_id: thread.user_id,
            title: thread.title,
            created_at: thread.created_at,
        }
    }
}

impl From<Turn> for MongoTurn {
    fn from(turn: Turn) -> Self {
        Self {
            id: turn.id,
            thread_id: turn.thread_id,
            user_prompt: turn.user_prompt,
            llm_response: turn.llm_response,
            status: turn.status,
            llm_model: turn.llm_model,
            metadata: turn.metadata,
            sources: turn.sources,
            created_at: turn.created_at,
            updated_at: turn.updated_at,
        }
    }
}

impl From<MongoTurn> for Turn {
    fn from(turn: MongoTurn) -> Self {
        Self {
            id: turn.id,
            thread_id: turn.thread_id,
            user_prompt: turn.user_prompt,
            llm_response: turn.llm_response,
            status: turn.status,
            llm_model: turn.llm_model,
            metadata: turn.metadata,
            sources: turn.sources,
            created_at: turn.created_at,
            updated_at: turn.updated_at,
        }
    }
}
