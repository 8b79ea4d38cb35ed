pub mod error;
pub mod handlers;
pub mod models;
pub mod resolver;

pub use error::*;
pub use handlers::*;
pub use models::*;
pub use resolver::*;
