pub mod api;
pub mod file;
pub mod types;

use anyhow::Result;

pub use api::ApiSource;
pub use file::FileSource;
pub use types::*;

/// Somewhere ClusterKubeconfig records can be fetched from.
pub trait RecordSource {
    fn describe(&self) -> String;
    fn fetch(&self) -> Result<Vec<ClusterKubeconfig>>;
}
