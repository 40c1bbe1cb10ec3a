pub mod thread;
pub mod turn;
pub mod user;

pub use thread::MongoThreadRepository;
pub use turn::MongoTurnRepository;
pub use user::MongoUserRepository;
