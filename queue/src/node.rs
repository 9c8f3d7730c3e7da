use core::{alloc::Layout, ptr::NonNull};

use alloc::{
    alloc::{alloc, dealloc},
    string::String,
};

use crate::QueueError;

pub(crate) type Link = Option<NonNull<Node>>;

/// A single queued element.
#[derive(Debug)]
pub(crate) struct Node {
    pub value: String,
    pub next: Link,
}

impl Node {
    /// Allocate a detached node holding a copy of `value`.
    pub fn alloc(value: &str) -> Result<NonNull<Node>, QueueError> {
        let layout = Layout::new::<Node>();

        let Some(node) = NonNull::new(unsafe { alloc(layout) } as *mut Node) else {
            return Err(QueueError::AllocationFailure);
        };

        let mut copy = String::new();
        if copy.try_reserve_exact(value.len()).is_err() {
            // The node block is still uninitialized, just give it back.
            unsafe { dealloc(node.as_ptr() as *mut u8, layout) };
            return Err(QueueError::AllocationFailure);
        }
        copy.push_str(value);

        unsafe {
            node.as_ptr().write(Node {
                value: copy,
                next: None,
            })
        };

        Ok(node)
    }

    /// Release a node and its value, returning the link it held.
    ///
    /// The node must have come from [`Node::alloc`] and must not be reachable from anywhere else.
    pub unsafe fn free(node: NonNull<Node>) -> Link {
        unsafe {
            let next = (*node.as_ptr()).next.take();
            node.as_ptr().drop_in_place();
            dealloc(node.as_ptr() as *mut u8, Layout::new::<Node>());
            next
        }
    }
}

/// Copy at most `out.len() - 1` bytes of `value` into `out` and terminate them with a zero byte.
pub(crate) fn copy_truncated(value: &[u8], out: &mut [u8]) {
    let Some(room) = out.len().checked_sub(1) else {
        return;
    };

    let len = value.len().min(room);
    out[..len].copy_from_slice(&value[..len]);
    out[len] = 0;
}
