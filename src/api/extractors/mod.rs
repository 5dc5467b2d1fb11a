pub mod identity;
pub mod json_body;
pub mod post_id;

pub use identity::{CurrentIdentity, MaybeIdentity};
pub use json_body::JsonBody;
pub use post_id::PostId;
