//! Bounded retry for individual actions
//!
//! [`ActionRetrier`] is the single retry engine; [`Interactions`] layers
//! click/fill/wait policies on top of it.

mod action;
mod interaction;

pub use action::{backoff_delay, retry_with_backoff, ActionOutcome, ActionRetrier, ErrorCallback, RetryOptions};
pub use interaction::{Checks, InteractionOptions, Interactions, NetworkResponse, Page};
