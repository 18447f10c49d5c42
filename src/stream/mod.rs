//! Stream combinators for packet subscriptions

mod throttle;

pub use throttle::{Throttle, ThrottleExt};
