use once_cell::sync::OnceCell;
use quad_database::{Database, DatabaseInfo};

static DBCONN: OnceCell<Database> = OnceCell::new();

/// Connect to the database and run any pending migrations
pub async fn connect() {
    let database = DatabaseInfo::Auto
        .connect()
        .await
        .expect("Failed to connect to the database.");

    database
        .migrate_database()
        .await
        .expect("Failed to migrate the database.");

    if DBCONN.set(database).is_err() {
        panic!("Database connection already established.");
    }
}

/// Get a reference to the established database connection
pub fn get_db() -> &'static Database {
    DBCONN.get().expect("Valid `Database`")
}
