pub mod activity;
pub mod router;

pub use activity::ActivityRecorder;
pub use router::Router;
