pub mod metrics;
mod observer;

pub use observer::{make_observer_app, run_observer_server, ObserverState};
