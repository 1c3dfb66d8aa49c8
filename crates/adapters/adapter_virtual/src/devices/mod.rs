//! Simulated devices.

mod damper;

pub use damper::VirtualDamper;
