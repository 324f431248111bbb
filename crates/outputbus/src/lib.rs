pub mod bus;
pub mod envelope;

pub use bus::OutputBus;
pub use envelope::{Envelope, EnvelopeType};
