pub mod config;
pub mod executor;
pub mod harvest;
pub mod index;
pub mod model;
pub mod store;
pub mod traits;

// Re-export common types for convenience
pub use config::*;
pub use executor::*;
pub use model::*;
pub use store::*;
pub use traits::*;
