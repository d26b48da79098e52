pub mod alerts;
pub mod deriv;
pub mod lifecycle;
pub mod signal_engine;

pub use alerts::AlertFormatter;
pub use deriv::DerivClient;
pub use lifecycle::{Cadence, EngineHandle, Scheduler};
pub use signal_engine::{EngineSettings, ReconcileReport, ScanReport, SignalEngine};
