//! Persistence for Wriders
//!
//! `store` defines the storage traits; `mongo` and `memory` implement them.

pub mod memory;
pub mod mongo;
pub mod schemas;
pub mod store;

pub use memory::MemoryStore;
pub use mongo::{IntoIndexes, MongoClient, MongoCollection, MongoStore};
pub use store::{
    ActivityStore, BookQuery, BookStore, ChapterStore, CharacterStore, CommentStore, Page,
    SeriesStore, Store, UserStore,
};
