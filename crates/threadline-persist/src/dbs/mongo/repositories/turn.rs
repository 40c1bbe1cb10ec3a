use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{self, doc, Document},
    options::ReturnDocument,
    Client, ClientSession, Collection,
};

use crate::dbs::mongo::models::MongoTurn;
use crate::error::Result;
use crate::models::{TurnStatus, TurnUpdate};

#[derive(Clone)]
pub struct MongoTurnRepository {
    collection: Collection<MongoTurn>,
}

impl MongoTurnRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("turns");
        Self { collection }
    }

    pub async fn insert_in(&self, session: &mut ClientSession, turn: &MongoTurn) -> Result<()> {
        self.collection.insert_one(turn).session(session).await?;
        Ok(())
    }

    /// Get turn by ID
    pub async fn get_turn(&self, turn_id: &str) -> Result<Option<MongoTurn>> {
        Ok(self.collection.find_one(doc! { "_id": turn_id }).await?)
    }

    /// Turns of a thread in creation order
    pub async fn list_turns(
        &self,
        thread_id: &str,
        status: Option<TurnStatus>,
    ) -> Result<Vec<MongoTurn>> {
        let mut filter = doc! { "thread_id": thread_id };
        if let Some(status) = status {
            filter.insert("status", status.as_str());
        }
        let turns = self
            .collection
            .find(filter)
            .sort(doc! { "created_at": 1 })
            .await?
            .try_collect()
            .await?;
        Ok(turns)
    }

    /// Apply `update` only while the stored status equals `expected`.
    /// Returns `None` when no document matched.
    pub async fn transition(
        &self,
        turn_id: &str,
        expected: TurnStatus,
        update: TurnUpdate,
        at: DateTime<Utc>,
    ) -> Result<Option<MongoTurn>> {
        let filter = doc! { "_id": turn_id, "status": expected.as_str() };
        let set = update_document(update, at)?;

        let updated = self
            .collection
            .find_one_and_update(filter, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await?;
        Ok(updated)
    }

    /// `processing` turns whose last update is older than `before`
    pub async fn list_stale(&self, before: DateTime<Utc>) -> Result<Vec<MongoTurn>> {
        let filter = doc! {
            "status": TurnStatus::Processing.as_str(),
            "updated_at": { "$lt": bson::DateTime::from_chrono(before) },
        };
        let turns = self.collection.find(filter).await?.try_collect().await?;
        Ok(turns)
    }
}

fn update_document(update: TurnUpdate, at: DateTime<Utc>) -> Result<Document> {
    let mut set = doc! {
        "status": update.status().as_str(),
        "updated_at": bson::DateTime::from_chrono(at),
    };
    match update {
        TurnUpdate::Completed {
            response,
            metadata,
            sources,
        } => {
            set.insert("llm_response", response);
            set.insert("metadata", bson::to_bson(&metadata)?);
            set.insert("sources", bson::to_bson(&sources)?);
        }
        TurnUpdate::Failed { metadata } => {
            set.insert("metadata", bson::to_bson(&metadata)?);
        }
    }
    Ok(set)
}
