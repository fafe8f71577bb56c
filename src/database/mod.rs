// Database module
// One SQLite file per markdown document: a chunk table plus a sqlite-vec index

pub mod paths;
pub mod sqlite;

pub use paths::{db_path_for, expand_home};
pub use sqlite::*;
