//! Deterministic ROAS regression models
//!
//! A [`ModelBundle`] pairs a fixed-point gradient-boosted [`Ensemble`] with
//! the [`FeatureEncoder`] and column layout it was fitted on. Bundles are
//! persisted by [`ModelStore`] as canonical JSON carrying its blake3 digest and
//! served through the read-mostly [`ModelCache`].

pub mod bundle;
pub mod cache;
pub mod canon;
pub mod encoder;
pub mod ensemble;
pub mod errors;
pub mod store;
pub mod tree;

pub use bundle::{Loss, ModelBundle, Regressor, TrainingSummary};
pub use cache::ModelCache;
pub use encoder::{to_fixed, FeatureEncoder, Vocabulary, MISSING_CODE, UNSEEN_CODE};
pub use ensemble::{Ensemble, FORMAT_VERSION, SCALE};
pub use errors::{ModelError, Result};
pub use store::ModelStore;
pub use tree::{Node, Tree};
