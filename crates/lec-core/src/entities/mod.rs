//! Entity structs for the course domain.
//!
//! Each entity is stored as one document in a store collection (see
//! [`Entity::COLLECTION`](crate::documents::Entity)). All structs derive
//! `Serialize`, `Deserialize`, and `JsonSchema` for JSON roundtrip and schema
//! validation.

mod assignment;
mod course;
mod instance;

pub use assignment::Assignment;
pub use course::Course;
pub use instance::AssignmentInstance;
