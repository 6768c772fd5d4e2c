// Close-pair detection and track pairing

pub mod finder;
pub mod metric;
pub mod open_pair;
pub mod pairer;
pub mod predicate;

pub use finder::{ClosePair, FinderStats, PointPairFinder};
pub use metric::SpaceTimeMetric;
pub use open_pair::{KeyPair, OpenTrackPair, SlotState};
pub use pairer::{Emitted, PairerStats, TrackPairer};
pub use predicate::{AcceptAll, PairPredicate, ValidGeometry, VerticalSeparation};
