//! Flag-style operations on optional queues.
//!
//! These mirror the classic queue interface: a missing queue is accepted everywhere and reported
//! as a `false` result or treated as a no-op, and failures are reported as `false` instead of an
//! error value.

use alloc::boxed::Box;

use crate::{Queue, QueueError};

fn resolve(queue: Option<&mut Queue>) -> Result<&mut Queue, QueueError> {
    queue.ok_or(QueueError::InvalidQueue)
}

/// Create an empty queue, or `None` if it could not be allocated.
pub fn create() -> Option<Box<Queue>> {
    Queue::try_new_boxed().ok()
}

/// Release a queue with all of its elements.
pub fn destroy(queue: Option<Box<Queue>>) {
    drop(queue);
}

pub fn insert_head(queue: Option<&mut Queue>, value: &str) -> bool {
    resolve(queue).and_then(|q| q.insert_head(value)).is_ok()
}

pub fn insert_tail(queue: Option<&mut Queue>, value: &str) -> bool {
    resolve(queue).and_then(|q| q.insert_tail(value)).is_ok()
}

/// Remove the head element, copying it into `out` if given. The capacity of `out` is its length,
/// terminator included.
pub fn remove_head(queue: Option<&mut Queue>, out: Option<&mut [u8]>) -> bool {
    resolve(queue).and_then(|q| q.remove_head(out)).is_ok()
}

pub fn size(queue: Option<&Queue>) -> usize {
    queue.map_or(0, Queue::size)
}

pub fn reverse(queue: Option<&mut Queue>) {
    if let Some(q) = queue {
        q.reverse();
    }
}

pub fn sort(queue: Option<&mut Queue>) {
    if let Some(q) = queue {
        q.sort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::tests::{assert_consistent, values};

    #[test]
    fn missing_queue() {
        let mut buf = [0xffu8; 4];
        assert!(!insert_head(None, "a"));
        assert!(!insert_tail(None, "a"));
        assert!(!remove_head(None, Some(&mut buf[..])));
        assert_eq!(buf, [0xff; 4]);
        assert_eq!(size(None), 0);
        reverse(None);
        sort(None);
        destroy(None);
        assert_eq!(resolve(None).err(), Some(QueueError::InvalidQueue));
    }

    #[test]
    fn remove_from_new_queue_fails() {
        let mut q = create().unwrap();
        assert!(!remove_head(Some(&mut *q), None));
        assert_eq!(size(Some(&*q)), 0);
        destroy(Some(q));
    }

    #[test]
    fn fruit_scenario() {
        let mut q = create().unwrap();
        assert!(insert_tail(Some(&mut *q), "banana"));
        assert!(insert_tail(Some(&mut *q), "apple"));
        assert!(insert_head(Some(&mut *q), "cherry"));
        assert_eq!(values(&q), ["cherry", "banana", "apple"]);
        assert_eq!(size(Some(&*q)), 3);

        sort(Some(&mut *q));
        assert_eq!(values(&q), ["apple", "banana", "cherry"]);

        reverse(Some(&mut *q));
        assert_eq!(values(&q), ["cherry", "banana", "apple"]);

        let mut buf = [0u8; 3];
        assert!(remove_head(Some(&mut *q), Some(&mut buf[..])));
        assert_eq!(&buf, b"ch\0");
        assert_eq!(values(&q), ["banana", "apple"]);
        assert_eq!(size(Some(&*q)), 2);
        assert_consistent(&q);

        destroy(Some(q));
    }
}
