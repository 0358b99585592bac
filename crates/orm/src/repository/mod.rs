//! Repository Module - generic CRUD over declared entities

pub mod crud;
pub mod integrity;
pub mod result;

pub use crud::{CrudRepository, Page};
pub use integrity::IntegrityTranslator;
pub use result::{Category, RepoResult};
