pub mod errors;
pub mod models;
pub mod pagination;
pub mod protocol;

pub use errors::*;
pub use models::*;
pub use pagination::*;
pub use protocol::*;
