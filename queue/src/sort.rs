//! In-place merge sort over the queue's own nodes.
//!
//! Only links are rearranged: no node or value is allocated or freed while sorting. Values are
//! compared byte-wise. When two values are equal, the node from the front half is taken first, so
//! the sort is stable.

use core::ptr::NonNull;

use tracing::trace;

use crate::{
    Queue,
    node::{Link, Node},
};

impl Queue {
    /// Sort the queue in ascending order.
    pub fn sort(&mut self) {
        if self.size < 2 {
            return;
        }

        self.head = unsafe { merge_sort(self.head) };

        // The head is known, but the tail has to be found again.
        let mut tail = self.head;
        while let Some(node) = tail {
            match unsafe { node.as_ref() }.next {
                Some(next) => tail = Some(next),
                None => break,
            }
        }
        self.tail = tail;

        trace!(size = self.size, "sorted queue");
    }
}

/// Cut the chain starting at `head` in two halves. The front half keeps `head`.
///
/// `fast` starts one node ahead of `slow` and moves two nodes per step, so `slow` stops at the
/// last node of the front half.
unsafe fn split(head: NonNull<Node>) -> (NonNull<Node>, Link) {
    unsafe {
        let mut slow = head;
        let mut fast = (*head.as_ptr()).next;

        while let Some(node) = fast {
            fast = (*node.as_ptr()).next;
            if let Some(node) = fast {
                // `fast` is ahead, so `slow` always has a successor here.
                slow = match (*slow.as_ptr()).next {
                    Some(next) => next,
                    None => unreachable!("slow pointer overtook fast pointer"),
                };
                fast = (*node.as_ptr()).next;
            }
        }

        let back = (*slow.as_ptr()).next.take();
        (head, back)
    }
}

/// Merge two sorted chains. Ties take the node from `front`.
unsafe fn merge(mut front: Link, mut back: Link) -> Link {
    unsafe {
        let mut head: Link = None;
        let mut cursor: *mut Link = &raw mut head;

        while let (Some(a), Some(b)) = (front, back) {
            let taken = if (*a.as_ptr()).value <= (*b.as_ptr()).value {
                front = (*a.as_ptr()).next;
                a
            } else {
                back = (*b.as_ptr()).next;
                b
            };

            *cursor = Some(taken);
            cursor = &raw mut (*taken.as_ptr()).next;
        }

        // One side is exhausted, append whatever is left of the other.
        *cursor = front.or(back);

        head
    }
}

unsafe fn merge_sort(head: Link) -> Link {
    unsafe {
        let Some(node) = head else {
            return None;
        };
        if (*node.as_ptr()).next.is_none() {
            return head;
        }

        let (front, back) = split(node);
        let front = merge_sort(Some(front));
        let back = merge_sort(back);

        merge(front, back)
    }
}
