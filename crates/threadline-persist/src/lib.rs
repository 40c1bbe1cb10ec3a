pub mod dbs;
pub mod error;
pub mod models;
pub mod trait_client;

pub use dbs::memory::InMemoryPersistenceClient;
#[cfg(feature = "mongodb")]
pub use dbs::mongo::MongoPersistenceClient;
pub use error::{PersistError, Result};
pub use models::{
    CompletionMetadata, FailureMetadata, StartTurn, StartedTurn, Thread, Turn, TurnMetadata,
    TurnStatus, TurnUpdate, User,
};
pub use trait_client::PersistenceClient;
