mod export;
pub mod qr;
mod queries;
mod types;

pub use export::*;
pub use queries::*;
pub use types::*;
