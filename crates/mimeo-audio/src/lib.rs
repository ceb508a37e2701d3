//! Audio device backends for the mimeo looper.
//!
//! Input and output streams run on cpal's callback threads and exchange
//! stereo frames with the engine thread through lock-free SPSC rings.

mod cpal_backend;
mod traits;

pub use cpal_backend::{CpalInput, CpalOutput};
pub use traits::{AudioError, AudioInput, AudioOutput};
