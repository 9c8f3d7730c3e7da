use core::{alloc::Layout, fmt, mem, ptr::NonNull};

use alloc::{alloc::alloc, boxed::Box};
use tracing::trace;

use crate::{
    QueueError,
    node::{Link, Node, copy_truncated},
};

/// A FIFO queue of owned strings.
///
/// `head` and `tail` are both `None` exactly when `size` is zero. Following `next` from `head`
/// reaches `tail` after `size - 1` steps, and `tail.next` is always `None`.
pub struct Queue {
    pub(crate) head: Link,
    pub(crate) tail: Link,
    pub(crate) size: usize,
}

// The queue is the only owner of its nodes.
unsafe impl Send for Queue {}

impl Queue {
    /// Create a new empty queue.
    pub const fn new() -> Self {
        Queue {
            head: None,
            tail: None,
            size: 0,
        }
    }

    /// Create a new empty queue on the heap, reporting allocation failure instead of aborting.
    pub fn try_new_boxed() -> Result<Box<Queue>, QueueError> {
        let layout = Layout::new::<Queue>();

        let queue = NonNull::new(unsafe { alloc(layout) } as *mut Queue)
            .ok_or(QueueError::AllocationFailure)?;

        unsafe {
            queue.as_ptr().write(Queue::new());
            Ok(Box::from_raw(queue.as_ptr()))
        }
    }

    /// Number of elements, without walking the list.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Insert a copy of `value` at the head of the queue.
    pub fn insert_head(&mut self, value: &str) -> Result<(), QueueError> {
        let node = Node::alloc(value)?;

        unsafe { (*node.as_ptr()).next = self.head };

        if self.tail.is_none() {
            self.tail = Some(node);
        }
        self.head = Some(node);
        self.size += 1;

        Ok(())
    }

    /// Insert a copy of `value` at the tail of the queue.
    pub fn insert_tail(&mut self, value: &str) -> Result<(), QueueError> {
        let node = Node::alloc(value)?;

        match self.tail {
            Some(tail) => unsafe { (*tail.as_ptr()).next = Some(node) },
            None => self.head = Some(node),
        }
        self.tail = Some(node);
        self.size += 1;

        Ok(())
    }

    /// Remove the head element.
    ///
    /// If `out` is given, the removed value is copied into it: at most `out.len() - 1` bytes,
    /// followed by a zero terminator. Longer values are silently truncated.
    pub fn remove_head(&mut self, out: Option<&mut [u8]>) -> Result<(), QueueError> {
        let Some(head) = self.head else {
            return Err(QueueError::EmptyQueue);
        };

        if let Some(out) = out {
            copy_truncated(unsafe { head.as_ref() }.value.as_bytes(), out);
        }

        self.head = unsafe { Node::free(head) };
        if self.head.is_none() {
            self.tail = None;
        }
        self.size -= 1;

        Ok(())
    }

    /// Reverse the queue in place. No node is allocated or freed.
    pub fn reverse(&mut self) {
        if self.size < 2 {
            return;
        }

        let mut prev: Link = None;
        let mut current = self.head;
        while let Some(node) = current {
            unsafe {
                current = (*node.as_ptr()).next;
                (*node.as_ptr()).next = prev;
            }
            prev = Some(node);
        }

        mem::swap(&mut self.head, &mut self.tail);

        trace!(size = self.size, "reversed queue");
    }
}

impl Default for Queue {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Queue {
    fn drop(&mut self) {
        let mut current = self.head.take();
        self.tail = None;
        while let Some(node) = current {
            current = unsafe { Node::free(node) };
        }
        self.size = 0;
    }
}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        let mut current = self.head;
        while let Some(node) = current {
            let node = unsafe { node.as_ref() };
            list.entry(&node.value);
            current = node.next;
        }
        list.finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Walk the list and check every structural invariant of the queue.
    pub(crate) fn assert_consistent(q: &Queue) {
        assert_eq!(q.size == 0, q.head.is_none());
        assert_eq!(q.size == 0, q.tail.is_none());

        let mut steps = 0;
        let mut last = None;
        let mut current = q.head;
        while let Some(node) = current {
            steps += 1;
            assert!(steps <= q.size, "chain is longer than size (cycle?)");
            last = Some(node);
            current = unsafe { node.as_ref() }.next;
        }
        assert_eq!(steps, q.size);
        assert_eq!(last, q.tail);
    }

    pub(crate) fn values(q: &Queue) -> Vec<String> {
        let mut out = Vec::new();
        let mut current = q.head;
        while let Some(node) = current {
            let node = unsafe { node.as_ref() };
            out.push(node.value.clone());
            current = node.next;
        }
        out
    }

    fn queue_of(items: &[&str]) -> Queue {
        let mut q = Queue::new();
        for item in items {
            q.insert_tail(item).unwrap();
        }
        q
    }

    fn pop(q: &mut Queue) -> String {
        let mut buf = [0u8; 64];
        q.remove_head(Some(&mut buf[..])).unwrap();
        let len = buf.iter().position(|&b| b == 0).unwrap();
        String::from_utf8(buf[..len].to_vec()).unwrap()
    }

    #[test]
    fn new_queue_is_empty() {
        let q = Queue::new();
        assert_eq!(q.size(), 0);
        assert!(q.is_empty());
        assert_consistent(&q);

        let boxed = Queue::try_new_boxed().unwrap();
        assert!(boxed.is_empty());
        assert_consistent(&boxed);
    }

    #[test]
    fn size_counts_inserts() {
        let mut q = Queue::new();
        for k in 1..=10 {
            if k % 2 == 0 {
                q.insert_head("x").unwrap();
            } else {
                q.insert_tail("y").unwrap();
            }
            assert_eq!(q.size(), k);
            assert_consistent(&q);
        }
    }

    #[test]
    fn insert_tail_remove_head_is_fifo() {
        let mut q = queue_of(&["a", "b", "c", "d"]);
        for expected in ["a", "b", "c", "d"] {
            assert_eq!(pop(&mut q), expected);
            assert_consistent(&q);
        }
        assert!(q.is_empty());
    }

    #[test]
    fn insert_head_remove_head_is_lifo() {
        let mut q = Queue::new();
        for value in ["a", "b", "c"] {
            q.insert_head(value).unwrap();
        }
        for expected in ["c", "b", "a"] {
            assert_eq!(pop(&mut q), expected);
        }
        assert_consistent(&q);
    }

    #[test]
    fn insert_tail_after_draining() {
        let mut q = queue_of(&["a"]);
        q.remove_head(None).unwrap();
        assert_consistent(&q);

        // The tail must have been cleared, otherwise this would link onto a freed node.
        q.insert_tail("b").unwrap();
        q.insert_head("a").unwrap();
        assert_eq!(values(&q), ["a", "b"]);
        assert_consistent(&q);
    }

    #[test]
    fn remove_from_empty_fails() {
        let mut q = Queue::new();
        let mut buf = [0xffu8; 4];
        assert_eq!(q.remove_head(Some(&mut buf[..])), Err(QueueError::EmptyQueue));
        assert_eq!(buf, [0xff; 4]);
        assert_eq!(q.size(), 0);
        assert_consistent(&q);
    }

    #[test]
    fn remove_without_buffer_discards() {
        let mut q = queue_of(&["a", "b"]);
        q.remove_head(None).unwrap();
        assert_eq!(values(&q), ["b"]);
        assert_consistent(&q);
    }

    #[test]
    fn reverse_flips_order() {
        let mut q = queue_of(&["a", "b", "c", "d", "e"]);
        q.reverse();
        assert_eq!(values(&q), ["e", "d", "c", "b", "a"]);
        assert_consistent(&q);

        q.insert_tail("z").unwrap();
        assert_eq!(values(&q), ["e", "d", "c", "b", "a", "z"]);
    }

    #[test]
    fn reverse_twice_restores() {
        let mut q = queue_of(&["one", "two", "three", "four"]);
        q.reverse();
        q.reverse();
        assert_eq!(values(&q), ["one", "two", "three", "four"]);
        assert_eq!(q.size(), 4);
        assert_consistent(&q);
    }

    #[test]
    fn reverse_small_queues_is_noop() {
        let mut empty = Queue::new();
        empty.reverse();
        assert_consistent(&empty);

        let mut single = queue_of(&["only"]);
        let head = single.head;
        single.reverse();
        assert_eq!(single.head, head);
        assert_eq!(single.tail, head);
        assert_consistent(&single);

        let mut pair = queue_of(&["a", "b"]);
        pair.reverse();
        assert_eq!(values(&pair), ["b", "a"]);
        assert_consistent(&pair);
    }

    #[test]
    fn debug_lists_values() {
        let q = queue_of(&["cherry", "banana"]);
        assert_eq!(format!("{q:?}"), r#"["cherry", "banana"]"#);
        assert_eq!(format!("{:?}", Queue::new()), "[]");
    }

    #[test]
    fn fruit_scenario() {
        let mut q = Queue::new();
        q.insert_tail("banana").unwrap();
        q.insert_tail("apple").unwrap();
        q.insert_head("cherry").unwrap();
        assert_eq!(values(&q), ["cherry", "banana", "apple"]);
        assert_eq!(q.size(), 3);

        q.sort();
        assert_eq!(values(&q), ["apple", "banana", "cherry"]);

        q.reverse();
        assert_eq!(values(&q), ["cherry", "banana", "apple"]);

        let mut buf = [0xffu8; 3];
        q.remove_head(Some(&mut buf[..])).unwrap();
        assert_eq!(&buf, b"ch\0");
        assert_eq!(values(&q), ["banana", "apple"]);
        assert_eq!(q.size(), 2);
        assert_consistent(&q);
    }
}
