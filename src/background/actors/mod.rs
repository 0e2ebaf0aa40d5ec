pub mod capture;
pub mod prune;

pub use capture::CaptureWorker;
pub use prune::PruneWorker;
