//! Global application state.
//!
//! Two pieces of process-wide state live here. The desktop registry
//! tracks shown forms in z-order and is always available, so forms can
//! be shown before the run loop starts. The application context owns
//! the terminal backend and the screen buffers and exists only between
//! run start and run end.

use std::ops::{Deref, DerefMut};
use std::sync::{OnceLock, RwLock, RwLockWriteGuard};

use crate::error::Error;
use crate::screen::Buffer;
use crate::terminal::TerminalBackend;
use crate::view::ViewCore;

// ============================================================================
// Desktop registry
// ============================================================================

/// Shown forms in z-order, bottom first. The host owns the form
/// instances; this list only borrows them between Show and Close.
struct DesktopState {
    forms: Vec<*mut ViewCore>,
    quit_requested: bool,
}

// SAFETY: the form pointers are only dereferenced by the run loop,
// which is single-threaded. The lock guards the list itself.
unsafe impl Send for DesktopState {}
unsafe impl Sync for DesktopState {}

static DESKTOP: RwLock<DesktopState> = RwLock::new(DesktopState {
    forms: Vec::new(),
    quit_requested: false,
});

/// Adds a form to the top of the desktop. Idempotent.
pub fn insert_form(form: *mut ViewCore) {
    if let Ok(mut desktop) = DESKTOP.write() {
        if !desktop.forms.iter().any(|&f| std::ptr::eq(f, form)) {
            desktop.forms.push(form);
        }
    }
}

/// Removes a form from the desktop. Closing the last shown form
/// requests loop exit.
pub fn remove_form(form: *mut ViewCore) {
    if let Ok(mut desktop) = DESKTOP.write() {
        let before = desktop.forms.len();
        desktop.forms.retain(|&f| !std::ptr::eq(f, form));
        if before > 0 && desktop.forms.is_empty() {
            desktop.quit_requested = true;
        }
    }
}

/// The topmost shown form, if any.
pub fn active_form() -> Option<*mut ViewCore> {
    DESKTOP
        .read()
        .ok()
        .and_then(|desktop| desktop.forms.last().copied())
}

/// Snapshot of the desktop in z-order, bottom first.
pub fn desktop_forms() -> Vec<*mut ViewCore> {
    DESKTOP
        .read()
        .map(|desktop| desktop.forms.clone())
        .unwrap_or_default()
}

pub fn request_quit() {
    if let Ok(mut desktop) = DESKTOP.write() {
        desktop.quit_requested = true;
    }
}

pub fn quit_requested() -> bool {
    DESKTOP
        .read()
        .map(|desktop| desktop.quit_requested)
        .unwrap_or(true)
}

/// Clears a stale quit request at the start of a run.
pub fn reset_quit() {
    if let Ok(mut desktop) = DESKTOP.write() {
        desktop.quit_requested = false;
    }
}

// ============================================================================
// Application context
// ============================================================================

pub struct AppContext {
    pub backend: Box<dyn TerminalBackend>,
    pub front_buffer: Buffer,
    pub back_buffer: Buffer,
}

// SAFETY: the run loop is single-threaded and cooperative; the lock
// exists for aliasing safety at the FFI boundary, not for sharing the
// context across threads.
unsafe impl Send for AppContext {}
unsafe impl Sync for AppContext {}

impl AppContext {
    fn new(backend: Box<dyn TerminalBackend>) -> Self {
        let (w, h) = backend.size();
        Self {
            backend,
            front_buffer: Buffer::new(w, h),
            back_buffer: Buffer::new(w, h),
        }
    }
}

static CONTEXT: OnceLock<RwLock<Option<AppContext>>> = OnceLock::new();

fn context_lock() -> &'static RwLock<Option<AppContext>> {
    CONTEXT.get_or_init(|| RwLock::new(None))
}

fn lock_poisoned(detail: impl std::fmt::Display) -> Error {
    Error::native(format!("context lock poisoned after panic: {detail}"))
}

pub struct ContextWriteGuard<'a> {
    guard: RwLockWriteGuard<'a, Option<AppContext>>,
}

impl Deref for ContextWriteGuard<'_> {
    type Target = AppContext;

    fn deref(&self) -> &Self::Target {
        self.guard
            .as_ref()
            .expect("ContextWriteGuard is only constructed for initialized context")
    }
}

impl DerefMut for ContextWriteGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.guard
            .as_mut()
            .expect("ContextWriteGuard is only constructed for initialized context")
    }
}

/// Acquire the context for mutation. Fails outside a run.
pub fn context_write() -> Result<ContextWriteGuard<'static>, Error> {
    let guard = context_lock().write().map_err(lock_poisoned)?;
    if guard.is_none() {
        return Err(Error::native("application context not initialized"));
    }
    Ok(ContextWriteGuard { guard })
}

/// Installs a fresh context around an already-initialized backend.
pub fn init_context(backend: Box<dyn TerminalBackend>) -> Result<(), Error> {
    let mut guard = context_lock().write().map_err(lock_poisoned)?;
    if guard.is_some() {
        return Err(Error::native("application context already initialized"));
    }
    *guard = Some(AppContext::new(backend));
    Ok(())
}

pub fn is_context_initialized() -> bool {
    context_lock()
        .read()
        .map(|guard| guard.is_some())
        .unwrap_or(false)
}

/// Tears the context down, returning the backend so the caller can shut
/// it down outside the lock.
pub fn destroy_context() -> Result<Option<Box<dyn TerminalBackend>>, Error> {
    let mut guard = context_lock().write().map_err(lock_poisoned)?;
    Ok(guard.take().map(|ctx| ctx.backend))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Other tests show and close forms concurrently, so these only make
    // assertions about their own entries.
    #[test]
    fn desktop_tracks_forms_in_z_order() {
        let mut a = ViewCore::new(crate::view::ViewKind::Form);
        let mut b = ViewCore::new(crate::view::ViewKind::Form);
        let pa = &mut a as *mut ViewCore;
        let pb = &mut b as *mut ViewCore;
        insert_form(pa);
        insert_form(pb);
        insert_form(pa); // idempotent

        let forms = desktop_forms();
        let ia = forms.iter().position(|&f| std::ptr::eq(f, pa)).unwrap();
        let ib = forms.iter().position(|&f| std::ptr::eq(f, pb)).unwrap();
        assert!(ia < ib);
        assert_eq!(forms.iter().filter(|&&f| std::ptr::eq(f, pa)).count(), 1);

        remove_form(pb);
        assert!(!desktop_forms().iter().any(|&f| std::ptr::eq(f, pb)));
        remove_form(pa);
    }

    #[test]
    fn request_quit_is_observable() {
        request_quit();
        assert!(quit_requested());
        reset_quit();
    }

    #[test]
    fn context_write_fails_uninitialized() {
        if !is_context_initialized() {
            assert!(context_write().is_err());
        }
    }
}
