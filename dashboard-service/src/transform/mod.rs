//! Typed loading and time bucketing of raw readings.

pub mod aggregate;
pub mod load;

pub use aggregate::{aggregate, BucketWidth, BucketWidthError};
pub use load::{load, LoadError};
