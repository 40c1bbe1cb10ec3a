use futures::TryStreamExt;
use mongodb::{bson::doc, Client, ClientSession, Collection};

use crate::dbs::mongo::models::MongoThread;
use crate::error::Result;

#[derive(Clone)]
pub struct MongoThreadRepository {
    collection: Collection<MongoThread>,
}

impl MongoThreadRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("threads");
        Self { collection }
    }

    /// Get thread by ID
    pub async fn get_thread(&self, thread_id: &str) -> Result<Option<MongoThread>> {
        Ok(self.collection.find_one(doc! { "_id": thread_id }).await?)
    }

    /// Get thread by ID inside a transaction
    pub async fn get_thread_in(
        &self,
        session: &mut ClientSession,
        thread_id: &str,
    ) -> Result<Option<MongoThread>> {
        Ok(self
            .collection
            .find_one(doc! { "_id": thread_id })
            .session(session)
            .await?)
    }

    pub async fn insert_in(&self, session: &mut ClientSession, thread: &MongoThread) -> Result<()> {
        self.collection.insert_one(thread).session(session).await?;
        Ok(())
    }

    /// List threads for a user, newest first
    pub async fn list_threads(&self, user_id: &str) -> Result<Vec<MongoThread>> {
        let threads = self
            .collection
            .find(doc! { "user_id": user_id })
            .sort(doc! { "created_at": -1 })
            .await?
            .try_collect()
            .await?;
        Ok(threads)
    }
}
