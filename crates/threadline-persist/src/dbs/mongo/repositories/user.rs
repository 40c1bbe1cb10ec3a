use mongodb::{bson::doc, Client, ClientSession, Collection};

use crate::dbs::mongo::models::MongoUser;
use crate::error::Result;

#[derive(Clone)]
pub struct MongoUserRepository {
    collection: Collection<MongoUser>,
}

impl MongoUserRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("users");
        Self { collection }
    }

    /// Get user by ID
    pub async fn get_user(&self, user_id: &str) -> Result<Option<MongoUser>> {
        Ok(self.collection.find_one(doc! { "_id": user_id }).await?)
    }

    pub async fn exists_in(&self, session: &mut ClientSession, user_id: &str) -> Result<bool> {
        let user = self
            .collection
            .find_one(doc! { "_id": user_id })
            .session(session)
            .await?;
        Ok(user.is_some())
    }
}
