pub mod error;
pub mod memory;
pub mod post_repo;

pub use error::RepoError;
pub use memory::InMemoryPostStore;
pub use post_repo::{
    NewPost, PgPostStore, PostChanges, PostOwnership, PostRow, PostStore, ResourceStore,
};
