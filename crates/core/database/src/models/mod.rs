mod conversations;
mod messages;
mod migrations;
mod notifications;
mod users;

pub use conversations::*;
pub use messages::*;
pub use migrations::*;
pub use notifications::*;
pub use users::*;

pub trait AbstractDatabase:
    Sync
    + Send
    + conversations::AbstractConversations
    + messages::AbstractMessages
    + migrations::AbstractMigrations
    + notifications::AbstractNotifications
    + users::AbstractUsers
{
}

impl AbstractDatabase for crate::ReferenceDb {}

#[cfg(feature = "mongodb")]
impl AbstractDatabase for crate::MongoDb {}

impl std::ops::Deref for crate::Database {
    type Target = dyn AbstractDatabase;

    fn deref(&self) -> &Self::Target {
        match self {
            crate::Database::Reference(dummy) => dummy,
            #[cfg(feature = "mongodb")]
            crate::Database::MongoDb(mongo) => mongo,
        }
    }
}
