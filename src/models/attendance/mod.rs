mod queries;
mod types;
pub mod window;

pub use queries::*;
pub use types::*;
