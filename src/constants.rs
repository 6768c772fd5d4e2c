// Shared constants for track assembly and pairing

/// Metres to feet.
pub const MTOF: f64 = 1.0 / 0.3048;

/// Metres in one international nautical mile.
pub const METRES_PER_NM: f64 = 1852.0;

/// Feet in one nautical mile (~6076.1).
pub const FEET_PER_NM: f64 = METRES_PER_NM * MTOF;

// --- Assembler defaults ---

/// Maximum horizontal jump between consecutive points of one track (NM).
pub const DEFAULT_MAX_DISTANCE_NM: f64 = 5.0;

/// Maximum time between consecutive points of one track (s).
pub const DEFAULT_MAX_POINT_GAP_SECS: u64 = 45;

/// Maximum duration of one track before it is force-closed (s).
pub const DEFAULT_MAX_TRACK_AGE_SECS: u64 = 2 * 60 * 60;

// --- Pairing defaults ---

/// Sliding window used by the point-pair finder (s).
pub const DEFAULT_PAIRING_WINDOW_SECS: u64 = 13;

/// Horizontal component of the pairing threshold (NM).
pub const DEFAULT_PAIRING_DISTANCE_NM: f64 = 7.5;

/// Time component of the pairing threshold (s).
pub const DEFAULT_TIME_PENALTY_SECS: f64 = 13.0;

/// Weight applied to elapsed seconds in the space-time metric.
pub const DEFAULT_TIME_COEF: f64 = 1.0;

/// Weight applied to horizontal feet in the space-time metric.
pub const DEFAULT_DISTANCE_COEF: f64 = 1.0;

// --- Buffer defaults ---

/// Maximum out-of-orderness absorbed by the time-ordering buffer (s).
pub const DEFAULT_MAX_LAG_SECS: u64 = 5;

/// Capacity of each lane's input queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 4096;
