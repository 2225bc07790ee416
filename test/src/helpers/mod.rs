pub mod assertions;
pub mod logging;
pub mod recorder;
pub mod wait;

pub use logging::init_logger;
pub use recorder::{Received, Recorder};
pub use test_pair::TestPair;
pub use wait::{wait_until, DEFAULT_WAIT};
