mod fixtures;
pub use fixtures::*;

// Only what every suite touches lives here; suite-specific imports stay
// in the test files themselves.
pub use spotter::core::db::{DetectionRecordRepository, NewDetectionRecord, UserRepository};
