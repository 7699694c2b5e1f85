//! Sensor bounds used when validating configurations and deriving metadata.

/// Distance between two consecutive points of an Envelope, IQ or Power Bins sweep.
pub const BASE_STEP_M: f32 = 0.000_484;
/// Distance between two consecutive Sparse points.
pub const SPARSE_BASE_STEP_M: f32 = 0.06;
/// Largest multiple of the base step a configuration may request.
pub const MAX_STEP_FACTOR: u32 = 16;

pub const MIN_START_M: f32 = -0.7;
pub const MAX_RANGE_M: f32 = 7.0;

/// Depth covered by one hardware sub-sweep; longer ranges are stitched.
pub const SUBSWEEP_LENGTH_M: f32 = 0.06;

pub const MIN_SWEEP_RATE_HZ: f32 = 1.0;
pub const MAX_SWEEP_RATE_HZ: f32 = 10_000.0;

pub const MAX_BIN_COUNT: u16 = 32;
pub const MAX_SWEEPS_PER_FRAME: u8 = 16;
pub const MAX_CUTOFF_RATIO: f32 = 0.5;

/// Upper bound on values delivered in a single result.
pub const MAX_DATA_LENGTH: usize = 8192;

/// The direct leakage profile only looks at the antenna coupling region.
pub const DIRECT_LEAKAGE_MAX_START_M: f32 = 0.1;

/// Sparse point throughput in sampling mode A; mode B runs at half rate.
pub const SPARSE_POINT_RATE_HZ: f32 = 60_000.0;

/// Tolerance for float quantization when rounding lengths onto the step grid.
pub const GRID_EPSILON: f32 = 1e-4;
