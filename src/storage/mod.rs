pub mod collection;
pub mod document;
pub mod engine;
pub mod functions;

pub use collection::{
    Acknowledged, Collection, DeleteResult, IndexOptions, InsertManyResult, InsertOneResult,
    UpdateResult,
};
pub use document::generate_id;
pub use engine::DocStore;
