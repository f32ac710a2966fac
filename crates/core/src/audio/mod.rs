pub mod analysis;
pub mod io;
pub mod normalize;

pub use normalize::{normalize, NormalizeConfig, NormalizedAudio};
