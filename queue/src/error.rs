use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    #[error("no queue")]
    InvalidQueue,

    #[error("could not allocate memory")]
    AllocationFailure,

    #[error("queue is empty")]
    EmptyQueue,
}
