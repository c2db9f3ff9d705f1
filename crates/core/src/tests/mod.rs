//! Deterministic host doubles for exercising the lifecycle without a browser


pub use activity::ManualActivitySource;
pub use renewer::ScriptedRenewer;
pub use runtime::ManualRuntime;
