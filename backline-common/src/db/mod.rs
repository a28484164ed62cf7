//! Database access
//!
//! Pool construction and idempotent schema initialization. All consistency
//! and durability guarantees are the database's; the application performs
//! no retries and no caching on top.

mod init;

pub use init::init_database;
