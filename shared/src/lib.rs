pub mod api;
pub mod util;

pub use api::*;
pub use util::{clamp01, fast_sin_cos, wrap_angle};
