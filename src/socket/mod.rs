pub mod handle;
pub mod schema;

pub use handle::*;
pub use schema::*;
