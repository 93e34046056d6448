#![forbid(unsafe_code)]

//! Domain model and pure course-progress logic for the LMS client.
//!
//! Everything in this crate works on already-fetched snapshots. Nothing here
//! performs I/O; the `services` crate owns fetching, caching and persistence.

pub mod error;
pub mod gate;
pub mod grading;
pub mod inbox;
pub mod model;
pub mod progress;
pub mod time;

pub use error::Error;
pub use gate::{Certificate, CertificateError, is_eligible_for_certificate};
pub use grading::{GradingError, PASS_THRESHOLD_PERCENT, QuizGrade, grade_quiz};
pub use progress::{CourseProgress, ItemKind, ItemState, compute_progress, item_states};
pub use time::Clock;
