use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

type ParentCloseHandler<P, C> = Box<dyn FnOnce(&PageLink<P, C>, &P)>;
type ChildCloseHandler<P, C> = Box<dyn FnOnce(&PageLink<P, C>, &C)>;

/// The side of a [`PageLink`] that closed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkSide {
    Parent,
    Child,
}

struct LinkSlots<P, C> {
    on_parent_close: Option<ParentCloseHandler<P, C>>,
    on_child_close: Option<ChildCloseHandler<P, C>>,
    closed_by: Option<LinkSide>,
}

/// Close handshake shared between a parent page and the child page it
/// opened.
///
/// The parent creates the link before opening the child and hands the child
/// a clone; both clones refer to the same slots. The child registers
/// [`PageLink::set_on_parent_close`] to learn that the parent went away, the
/// parent registers [`PageLink::set_on_child_close`] for the reverse
/// direction. Whichever side closes first fires its handler once and clears
/// both slots, after which every notification is a no-op.
///
/// `P` is the payload the parent passes on close, `C` the child's.
pub struct PageLink<P = (), C = ()> {
    slots: Rc<RefCell<LinkSlots<P, C>>>,
}

impl<P, C> PageLink<P, C> {
    pub fn new() -> Self {
        Self {
            slots: Rc::new(RefCell::new(LinkSlots {
                on_parent_close: None,
                on_child_close: None,
                closed_by: None,
            })),
        }
    }

    /// Registers the handler run when the parent closes. Returns `false`
    /// and drops the handler if the link is already closed.
    pub fn set_on_parent_close<F>(&self, handler: F) -> bool
    where
        F: FnOnce(&PageLink<P, C>, &P) + 'static,
    {
        let replaced = {
            let mut slots = self.slots.borrow_mut();
            if slots.closed_by.is_some() {
                return false;
            }
            slots.on_parent_close.replace(Box::new(handler))
        };
        drop(replaced);
        true
    }

    /// Registers the handler run when the child closes. Returns `false`
    /// and drops the handler if the link is already closed.
    pub fn set_on_child_close<F>(&self, handler: F) -> bool
    where
        F: FnOnce(&PageLink<P, C>, &C) + 'static,
    {
        let replaced = {
            let mut slots = self.slots.borrow_mut();
            if slots.closed_by.is_some() {
                return false;
            }
            slots.on_child_close.replace(Box::new(handler))
        };
        drop(replaced);
        true
    }

    /// Called by the parent when it is about to become unusable. Returns
    /// whether a parent-close handler ran.
    pub fn notify_parent_closing(&self, payload: &P) -> bool {
        let (handler, _) = self.close(LinkSide::Parent);
        match handler {
            Some(handler) => {
                handler(self, payload);
                true
            }
            None => false,
        }
    }

    /// Called by the child when it is about to become unusable. Returns
    /// whether a child-close handler ran.
    pub fn notify_child_closing(&self, payload: &C) -> bool {
        let (_, handler) = self.close(LinkSide::Child);
        match handler {
            Some(handler) => {
                handler(self, payload);
                true
            }
            None => false,
        }
    }

    // Both handlers leave the slots before either runs, so a handler that
    // re-enters the link finds it closed.
    fn close(
        &self,
        side: LinkSide,
    ) -> (
        Option<ParentCloseHandler<P, C>>,
        Option<ChildCloseHandler<P, C>>,
    ) {
        let mut slots = self.slots.borrow_mut();
        if slots.closed_by.is_none() {
            slots.closed_by = Some(side);
        }
        (slots.on_parent_close.take(), slots.on_child_close.take())
    }

    pub fn has_parent_handler(&self) -> bool {
        self.slots.borrow().on_parent_close.is_some()
    }

    pub fn has_child_handler(&self) -> bool {
        self.slots.borrow().on_child_close.is_some()
    }

    /// True while at least one handler is registered.
    pub fn is_armed(&self) -> bool {
        let slots = self.slots.borrow();
        slots.on_parent_close.is_some() || slots.on_child_close.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.slots.borrow().closed_by.is_some()
    }

    pub fn closed_by(&self) -> Option<LinkSide> {
        self.slots.borrow().closed_by
    }

    /// Whether both handles refer to the same link.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.slots, &other.slots)
    }

    #[cfg(test)]
    pub(crate) fn handle_count(&self) -> usize {
        Rc::strong_count(&self.slots)
    }
}

impl<P, C> Clone for PageLink<P, C> {
    fn clone(&self) -> Self {
        Self {
            slots: Rc::clone(&self.slots),
        }
    }
}

impl<P, C> Default for PageLink<P, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, C> fmt::Debug for PageLink<P, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.borrow();
        f.debug_struct("PageLink")
            .field("on_parent_close", &slots.on_parent_close.is_some())
            .field("on_child_close", &slots.on_child_close.is_some())
            .field("closed_by", &slots.closed_by)
            .finish()
    }
}
