use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ptr::{self, NonNull};

/// A node in the doubly linked list.
///
/// Contains a value and pointers to the previous and next entries.
/// This structure is not meant to be used directly by users of the `List`.
pub struct Entry<T> {
    /// The value stored in this entry. Uses MaybeUninit to allow for sigil nodes.
    val: mem::MaybeUninit<T>,
    /// Pointer to the previous entry in the list.
    prev: *mut Entry<T>,
    /// Pointer to the next entry in the list.
    next: *mut Entry<T>,
}

impl<T> Entry<T> {
    fn new(val: T) -> Self {
        Entry {
            val: mem::MaybeUninit::new(val),
            prev: ptr::null_mut(),
            next: ptr::null_mut(),
        }
    }

    /// Creates a sentinel entry without initializing the value.
    fn new_sigil() -> Self {
        Entry {
            val: mem::MaybeUninit::uninit(),
            prev: ptr::null_mut(),
            next: ptr::null_mut(),
        }
    }

    /// Returns the value stored in this entry.
    ///
    /// # Safety
    ///
    /// The value must be initialized, i.e. this must not be a sigil node.
    pub unsafe fn get_value(&self) -> &T {
        // SAFETY: caller guarantees this is a non-sigil node
        unsafe { self.val.assume_init_ref() }
    }

    /// Consumes a detached entry and returns its value.
    ///
    /// # Safety
    ///
    /// The value must be initialized, i.e. this must not be a sigil node.
    pub unsafe fn into_value(self: Box<Self>) -> T {
        // SAFETY: caller guarantees this is a non-sigil node
        unsafe { self.val.assume_init() }
    }
}

/// An unbounded doubly linked list ordered from newest (front) to oldest (back).
///
/// Capacity is enforced by the eviction policy rather than by the list, since a
/// pinned entry may legitimately keep the cache above its configured bound.
/// Sentinel nodes (sigils) at both ends keep every splice branch-free.
///
/// # Examples
///
/// ```ignore
/// let mut list = List::new();
/// let a = list.push_front("a");
/// let _b = list.push_front("b");
///
/// // "a" is the oldest until it is touched
/// assert_eq!(list.iter_oldest_first().next(), Some(&"a"));
/// unsafe { list.move_to_front(a) };
/// assert_eq!(list.iter_oldest_first().next(), Some(&"b"));
/// ```
pub struct List<T> {
    /// Current number of items in the list.
    len: usize,
    /// Pointer to the head sentinel node (newest side).
    head: *mut Entry<T>,
    /// Pointer to the tail sentinel node (oldest side).
    tail: *mut Entry<T>,
}

impl<T> List<T> {
    /// Creates an empty list.
    pub fn new() -> List<T> {
        let head = Box::into_raw(Box::new(Entry::new_sigil()));
        let tail = Box::into_raw(Box::new(Entry::new_sigil()));

        // SAFETY: head and tail are newly allocated and valid pointers
        unsafe {
            (*head).next = tail;
            (*tail).prev = head;
        }

        List { len: 0, head, tail }
    }

    /// Returns the current number of items in the list.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the list contains no items.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Adds a value at the front (newest position) and returns its node.
    pub fn push_front(&mut self, v: T) -> *mut Entry<T> {
        // SAFETY: Box::into_raw never returns null
        let node = unsafe { NonNull::new_unchecked(Box::into_raw(Box::new(Entry::new(v)))) };
        // SAFETY: node is a newly allocated entry that is not part of any list yet
        unsafe { self.attach(node.as_ptr()) };
        self.len += 1;
        node.as_ptr()
    }

    /// Removes the oldest item from the list.
    pub fn pop_back(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        // SAFETY: tail is valid and the list is not empty, so tail.prev is a value node
        unsafe {
            let prev = (*self.tail).prev;
            self.remove(prev)
        }
    }

    /// Detaches a node from the list and returns its value.
    ///
    /// # Safety
    ///
    /// `node` must be a pointer returned by `push_front` on this list that has
    /// not been removed yet.
    pub unsafe fn remove(&mut self, node: *mut Entry<T>) -> Option<T> {
        if self.is_empty() || node.is_null() || node == self.head || node == self.tail {
            return None;
        }

        // SAFETY: caller guarantees node is valid and part of this list
        unsafe {
            self.detach(node);
            self.len -= 1;
            Some(Box::from_raw(node).into_value())
        }
    }

    /// Moves a node to the front of the list.
    ///
    /// Nodes already at the front stay where they are.
    ///
    /// # Safety
    ///
    /// `node` must point to a valid value entry of this list.
    pub unsafe fn move_to_front(&mut self, node: *mut Entry<T>) {
        if node.is_null() || node == self.head || node == self.tail {
            return;
        }

        // SAFETY: head is valid; caller guarantees node is a member of this list
        unsafe {
            if (*self.head).next == node {
                return;
            }
            self.detach(node);
            self.attach(node);
        }
    }

    /// Returns `true` if `node` is the newest entry.
    ///
    /// # Safety
    ///
    /// `node` must point to a valid value entry of this list.
    pub unsafe fn is_front(&self, node: *mut Entry<T>) -> bool {
        // SAFETY: head is valid for the lifetime of the list
        unsafe { (*self.head).next == node }
    }

    /// Iterates values from the oldest to the newest.
    pub fn iter_oldest_first(&self) -> OldestFirst<'_, T> {
        // SAFETY: tail is valid for the lifetime of the list
        let cursor = unsafe { (*self.tail).prev };
        OldestFirst {
            cursor,
            head: self.head,
            remaining: self.len,
            _marker: PhantomData,
        }
    }

    /// Clears the list, removing all entries.
    pub fn clear(&mut self) {
        while self.pop_back().is_some() {}
    }

    /// # Safety
    ///
    /// `node` must be a valid entry currently linked into this list.
    unsafe fn detach(&mut self, node: *mut Entry<T>) {
        // SAFETY: node is linked, so its neighbours are valid entries
        unsafe {
            (*(*node).prev).next = (*node).next;
            (*(*node).next).prev = (*node).prev;
        }
    }

    /// # Safety
    ///
    /// `node` must be valid and not currently linked into any list.
    unsafe fn attach(&mut self, node: *mut Entry<T>) {
        // SAFETY: head is valid and caller guarantees node is unlinked
        unsafe {
            (*node).next = (*self.head).next;
            (*node).prev = self.head;
            (*self.head).next = node;
            (*(*node).next).prev = node;
        }
    }
}

impl<T> Default for List<T> {
    fn default() -> Self {
        List::new()
    }
}

impl<T> Drop for List<T> {
    fn drop(&mut self) {
        self.clear();

        // SAFETY: head and tail were allocated in `new` and are freed exactly once here
        unsafe {
            drop(Box::from_raw(self.head));
            drop(Box::from_raw(self.tail));
        }
    }
}

impl<T> fmt::Debug for List<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("List").field("length", &self.len).finish()
    }
}

/// Iterator over list values from oldest to newest.
pub struct OldestFirst<'a, T> {
    cursor: *mut Entry<T>,
    head: *mut Entry<T>,
    remaining: usize,
    _marker: PhantomData<&'a T>,
}

impl<'a, T> Iterator for OldestFirst<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        if self.remaining == 0 || self.cursor == self.head {
            return None;
        }
        // SAFETY: the list is borrowed for 'a, so every node between the
        // sentinels stays alive and initialized while the iterator exists
        unsafe {
            let node = self.cursor;
            self.cursor = (*node).prev;
            self.remaining -= 1;
            Some((*node).get_value())
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> fmt::Debug for OldestFirst<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OldestFirst")
            .field("remaining", &self.remaining)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect<T: Clone>(list: &List<T>) -> Vec<T> {
        list.iter_oldest_first().cloned().collect()
    }

    #[test]
    fn test_push_and_order() {
        let mut list = List::new();
        list.push_front(10);
        list.push_front(20);
        list.push_front(30);
        assert_eq!(list.len(), 3);
        assert_eq!(collect(&list), vec![10, 20, 30]);
    }

    #[test]
    fn test_pop_back_removes_oldest() {
        let mut list = List::new();
        assert!(list.pop_back().is_none());

        list.push_front(1);
        list.push_front(2);
        assert_eq!(list.pop_back(), Some(1));
        assert_eq!(list.pop_back(), Some(2));
        assert_eq!(list.pop_back(), None);
        assert!(list.is_empty());
    }

    #[test]
    fn test_move_to_front() {
        let mut list = List::new();
        let node1 = list.push_front(10);
        let _node2 = list.push_front(20);
        let node3 = list.push_front(30);

        unsafe {
            assert!(list.is_front(node3));
            list.move_to_front(node1);
            assert!(list.is_front(node1));
        }
        assert_eq!(collect(&list), vec![20, 30, 10]);

        // Already at the front: order is unchanged
        unsafe { list.move_to_front(node1) };
        assert_eq!(collect(&list), vec![20, 30, 10]);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_remove_middle_node() {
        let mut list = List::new();
        let _a = list.push_front(String::from("a"));
        let b = list.push_front(String::from("b"));
        let _c = list.push_front(String::from("c"));

        assert_eq!(unsafe { list.remove(b) }, Some(String::from("b")));
        assert_eq!(list.len(), 2);
        assert_eq!(collect(&list), vec![String::from("a"), String::from("c")]);
    }

    #[test]
    fn test_remove_rejects_sentinels() {
        let mut list = List::<u32>::new();
        let head = list.head;
        let tail = list.tail;
        list.push_front(1);
        unsafe {
            assert!(list.remove(head).is_none());
            assert!(list.remove(tail).is_none());
            assert!(list.remove(ptr::null_mut()).is_none());
        }
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_clear_and_reuse() {
        let mut list = List::new();
        for i in 0..5 {
            list.push_front(i);
        }
        list.clear();
        assert!(list.is_empty());
        assert_eq!(list.iter_oldest_first().count(), 0);

        list.push_front(42);
        assert_eq!(collect(&list), vec![42]);
    }

    #[test]
    fn test_drop_frees_values() {
        use std::rc::Rc;

        let value = Rc::new(());
        {
            let mut list = List::new();
            list.push_front(Rc::clone(&value));
            list.push_front(Rc::clone(&value));
            assert_eq!(Rc::strong_count(&value), 3);
        }
        assert_eq!(Rc::strong_count(&value), 1);
    }

    #[test]
    fn test_iterator_size_hint() {
        let mut list = List::new();
        list.push_front(1);
        list.push_front(2);
        let mut iter = list.iter_oldest_first();
        assert_eq!(iter.size_hint(), (2, Some(2)));
        iter.next();
        assert_eq!(iter.size_hint(), (1, Some(1)));
    }
}
