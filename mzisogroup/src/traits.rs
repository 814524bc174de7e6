use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

/// An error that might occur while grouping isotopic features
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IsotopeGroupingError {
    #[error("Isotope grouping requires a feature list from exactly one raw data source, found {0}")]
    RawDataSourceCount(usize),
    #[error("The maximum charge must be at least 1, got {0}")]
    InvalidMaximumCharge(i32),
    #[error("Invalid tolerance: {0}")]
    InvalidTolerance(String),
    #[error("Feature {feature_id} has a non-finite {field}")]
    NonFiniteValue { feature_id: u32, field: &'static str },
    #[error("Feature {feature_id} at m/z {mz} was present in the intensity ordering but missing from the m/z ordering")]
    IndexInvariantViolated { feature_id: u32, mz: f64 },
    #[error("Feature {feature_id} was consumed more than once")]
    FeatureAlreadyConsumed { feature_id: u32 },
}

/// A source of cooperative cancellation requests, polled once per seed
pub trait CancellationSignal {
    fn is_cancelled(&self) -> bool;
}

/// A [`CancellationSignal`] that never fires
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

impl CancellationSignal for NeverCancel {
    #[inline(always)]
    fn is_cancelled(&self) -> bool {
        false
    }
}

impl CancellationSignal for AtomicBool {
    fn is_cancelled(&self) -> bool {
        self.load(Ordering::Acquire)
    }
}

impl<T: CancellationSignal + ?Sized> CancellationSignal for Arc<T> {
    fn is_cancelled(&self) -> bool {
        self.as_ref().is_cancelled()
    }
}

impl<T: CancellationSignal + ?Sized> CancellationSignal for &T {
    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }
}
