// Endless Terrain Constants - SINGLE SOURCE OF TRUTH
//
// Defaults and tuning values shared by generation, meshing and streaming.
// Config files override the session values; these are the fallbacks.

/// Noise field constants
pub mod noise {
    /// Smallest usable noise scale. Scales at or below zero are replaced by this.
    pub const MIN_SCALE: f32 = 0.0001;

    /// Per-octave random offsets are drawn from [-RANGE, RANGE)
    pub const OCTAVE_OFFSET_RANGE: f64 = 100_000.0;

    /// Fraction of the theoretical amplitude sum used as the global range estimate.
    /// Summed octaves almost never reach the full sum.
    pub const GLOBAL_AMPLITUDE_FRACTION: f32 = 0.9;

    pub const DEFAULT_SCALE: f32 = 50.0;
    pub const DEFAULT_OCTAVES: i32 = 4;
    pub const DEFAULT_PERSISTENCE: f32 = 0.5;
    pub const DEFAULT_LACUNARITY: f32 = 2.0;
    pub const DEFAULT_SEED: i64 = 1;
}

/// Tile geometry constants
pub mod tile {
    /// Interior tile resolution at full detail. `N - 1 = 240` is divisible by every
    /// LOD step from 1 through 12.
    pub const DEFAULT_TILE_RESOLUTION: u32 = 241;

    /// Interior resolution of the alternate flat-shaded layout
    pub const FLAT_SHADED_TILE_RESOLUTION: u32 = 95;

    /// One-cell margin on each side of a height grid
    pub const BORDER: usize = 1;

    pub const DEFAULT_HEIGHT_MULTIPLIER: f32 = 30.0;
}

/// Streaming constants
pub mod streaming {
    /// Observer displacement that triggers a window recompute (world units, compared squared)
    pub const MOVE_THRESHOLD: f32 = 25.0;

    /// Default LOD table as (lod, visible distance threshold)
    pub const DEFAULT_LODS: [(u32, f32); 3] = [(0, 200.0), (1, 400.0), (3, 600.0)];

    /// Bound on queued-but-not-started computations per worker thread
    pub const QUEUE_DEPTH_PER_WORKER: usize = 16;
}

/// Mesh constants
pub mod mesh {
    /// Tolerance used when checking that normals are unit length
    pub const NORMAL_TOLERANCE: f32 = 1.0e-4;

    /// Falloff curve shape parameters
    pub const FALLOFF_EXPONENT: f32 = 3.0;
    pub const FALLOFF_SHIFT: f32 = 2.2;
}
