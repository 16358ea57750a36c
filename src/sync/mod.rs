pub mod canonical;
pub mod credential;
pub mod exec_args;
pub mod normalize;
pub mod reconcile;

pub use exec_args::ExecHelper;
pub use normalize::{normalize, NormalizedConfig};
pub use reconcile::{reconcile, ReconcileOptions, ReconcileReport};
