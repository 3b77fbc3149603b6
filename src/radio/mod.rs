//! RTL-SDR receive path: magnitude lookup, envelope slicing, device control.

pub mod magnitude;
pub mod rtlsdr;
pub mod slicer;

pub use magnitude::MagnitudeLut;
pub use slicer::EnvelopeSlicer;
