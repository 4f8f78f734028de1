//! Reusable utils for the relay services, like bringing up the tracing
//! framework.

pub mod logging;
