//! The event-handler bridge: a host callback paired with opaque user data.

use std::os::raw::c_void;

/// Host-supplied callback signature. The stored user-data pointer is the
/// only argument; widget state is read back through the regular exports.
pub type EventHandlerFn = unsafe extern "C" fn(user_data: *mut c_void);

/// A (function pointer, user data) pair attached to one widget-level
/// notification. Replaced wholesale on each set call; invoking an empty
/// handler is a no-op.
#[derive(Clone, Copy)]
pub struct EventHandler {
    function: Option<EventHandlerFn>,
    user_data: *mut c_void,
}

impl EventHandler {
    pub const fn empty() -> Self {
        Self {
            function: None,
            user_data: std::ptr::null_mut(),
        }
    }

    pub fn new(function: EventHandlerFn, user_data: *mut c_void) -> Self {
        Self {
            function: Some(function),
            user_data,
        }
    }

    pub fn invoke(&self) {
        if let Some(f) = self.function {
            unsafe { f(self.user_data) };
        }
    }

    /// Swap the binding out, leaving an empty one behind. Used by re-entry
    /// guards that must fire a handler at most once.
    pub fn take(&mut self) -> EventHandler {
        std::mem::replace(self, EventHandler::empty())
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Bumps the u32 behind `user_data`. Shared by widget firing tests.
    pub unsafe extern "C" fn count_calls(user_data: *mut c_void) {
        *(user_data as *mut u32) += 1;
    }

    #[test]
    fn empty_handler_is_a_noop() {
        EventHandler::empty().invoke();
    }

    #[test]
    fn invoke_passes_user_data() {
        let mut count = 0u32;
        let handler = EventHandler::new(count_calls, &mut count as *mut u32 as *mut c_void);
        handler.invoke();
        handler.invoke();
        assert_eq!(count, 2);
    }

    #[test]
    fn take_leaves_empty_binding() {
        let mut count = 0u32;
        let mut handler = EventHandler::new(count_calls, &mut count as *mut u32 as *mut c_void);
        handler.take().invoke();
        handler.invoke(); // now empty
        assert_eq!(count, 1);
    }
}
