pub mod accumulator;
mod clock;
mod machine;

pub use accumulator::Interval;
pub use clock::{Clock, ManualClock, SystemClock};
pub use machine::{TimerService, Transition};
