pub mod async_task;
pub mod file_io;
pub mod id;
pub mod time;

pub use id::*;
pub use time::Clock;
pub use time::SystemClock;
pub use time::TokioClock;

#[cfg(test)]
mod file_io_test;
#[cfg(test)]
mod time_test;
