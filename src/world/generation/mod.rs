//! Height field generation
//!
//! Pure functions from noise parameters and a sample origin to a bordered
//! height grid. Nothing here holds state between calls.

mod falloff;
mod height_grid;
mod noise_field;


pub use falloff::{FalloffMap, HeightBias};
pub use height_grid::{generate_height_grid, HeightGrid};
pub use noise_field::{generate_noise_map, NoiseConfig, NormalizeMode};
