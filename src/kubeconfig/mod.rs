pub mod store;
pub mod types;

pub use store::KubeconfigStore;
pub use types::*;
