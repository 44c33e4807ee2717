mod credentials;
pub mod db;
mod tables;

pub use credentials::StoredCredential;
pub use db::{Database, DatabaseError};
pub use tables::*;
