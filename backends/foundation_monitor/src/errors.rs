pub type QueueResult<T> = core::result::Result<T, QueueError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The caller's wait was interrupted by its [`crate::CancelToken`]
    /// before the queue reached the state it was waiting for.
    /// The queue is left exactly as it was before the call.
    Cancelled,

    /// A queue cannot be built with a capacity of zero.
    InvalidCapacity(usize),

    /// More seed items were supplied than the queue can hold.
    SeedOverflow { capacity: usize, supplied: usize },
}

impl QueueError {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, QueueError::Cancelled)
    }
}

impl core::error::Error for QueueError {}

impl core::fmt::Display for QueueError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            QueueError::Cancelled => write!(f, "QueueError::Cancelled"),
            QueueError::InvalidCapacity(capacity) => {
                write!(f, "QueueError::InvalidCapacity({capacity})")
            }
            QueueError::SeedOverflow { capacity, supplied } => write!(
                f,
                "QueueError::SeedOverflow(capacity={capacity}, supplied={supplied})"
            ),
        }
    }
}

#[cfg(test)]
mod test_queue_errors {
    use super::QueueError;

    #[test]
    fn only_cancelled_reports_cancellation() {
        assert!(QueueError::Cancelled.is_cancelled());
        assert!(!QueueError::InvalidCapacity(0).is_cancelled());
        assert!(!QueueError::SeedOverflow {
            capacity: 1,
            supplied: 2
        }
        .is_cancelled());
    }

    #[test]
    fn displays_variant_details() {
        assert_eq!(
            QueueError::InvalidCapacity(0).to_string(),
            "QueueError::InvalidCapacity(0)"
        );
        assert_eq!(
            QueueError::SeedOverflow {
                capacity: 2,
                supplied: 5
            }
            .to_string(),
            "QueueError::SeedOverflow(capacity=2, supplied=5)"
        );
    }
}
