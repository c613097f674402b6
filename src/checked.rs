//! Checked lifecycle primitives and per-type boundary policies.
//!
//! Every exported operation funnels through these helpers so that no panic
//! or native fault ever crosses the FFI boundary. Unwinding through a
//! function-pointer call into a foreign runtime is undefined behavior, so
//! [`ffi_guard`] is the outermost safety net around every entry point, and
//! inner code reports failures as `Result<_, Error>` instead of relying on
//! unwinding.

use std::hash::{Hash, Hasher};
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::{set_last_error_message, Error, ErrorCode};

/// ABI boolean. The managed side marshals `bool` as a 32-bit value.
pub type Bool = i32;
pub const TRUE: Bool = 1;
pub const FALSE: Bool = 0;

// ============================================================================
// Boundary guard
// ============================================================================

/// Run an entry-point body, converting internal errors to ABI codes and
/// catching panics as `Unknown | HasMessage`.
pub fn ffi_guard(f: impl FnOnce() -> Result<(), Error>) -> ErrorCode {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => ErrorCode::SUCCESS,
        Ok(Err(e)) => e.into_code(),
        Err(payload) => {
            set_last_error_message(panic_message(&*payload));
            ErrorCode::unknown_with_message()
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "internal panic".to_string()
    }
}

// ============================================================================
// Per-type policies
// ============================================================================

/// Per-type policy hooks for every type exposed across the boundary.
///
/// The defaults give reference semantics: two distinct instances are never
/// equal, and the hash is derived from the address so it agrees with
/// equality. Value types (geometry, event payloads) override both
/// `boundary_eq` and `boundary_hash` field-wise; the two must stay
/// consistent — equal objects hash identically.
pub trait Boundary: Sized {
    /// Patch fields the default constructor leaves indeterminate. Invoked
    /// only on argument-less construction, never when explicit constructor
    /// arguments were supplied.
    fn initialize(&mut self) {}

    fn boundary_eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }

    fn boundary_hash(&self) -> i32 {
        let mut seed = 0i32;
        combine_hash(self as *const Self as usize, &mut seed);
        seed
    }
}

/// Mix one field into a running 32-bit seed. Call repeatedly to build up a
/// composite hash.
pub fn combine_hash<T: Hash>(v: T, seed: &mut i32) {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    v.hash(&mut hasher);
    let h = hasher.finish() as i32;
    let x = *seed;
    *seed = x ^ h
        .wrapping_add(0x9e3779b9u32 as i32)
        .wrapping_add(x << 6)
        .wrapping_add(x >> 2);
}

// ============================================================================
// Lifecycle primitives
// ============================================================================

/// Heap-construct a default `T` and hand the caller an owned pointer.
pub fn checked_new<T: Boundary + Default>(out: *mut *mut T) -> ErrorCode {
    ffi_guard(|| {
        if out.is_null() {
            return Err(Error::ArgumentNull);
        }
        let mut boxed = Box::new(T::default());
        boxed.initialize();
        unsafe { *out = Box::into_raw(boxed) };
        Ok(())
    })
}

/// Heap-construct from an explicit value. `initialize` is skipped: explicit
/// constructor arguments already fully determine the state.
pub fn checked_new_with<T: Boundary>(out: *mut *mut T, value: T) -> ErrorCode {
    ffi_guard(|| {
        if out.is_null() {
            return Err(Error::ArgumentNull);
        }
        unsafe { *out = Box::into_raw(Box::new(value)) };
        Ok(())
    })
}

/// Destroy a heap-owned `T`. Deleting null is defined as success, matching
/// the host's `free(null)` expectations.
pub fn checked_delete<T>(this: *mut T) -> ErrorCode {
    ffi_guard(|| {
        if this.is_null() {
            return Ok(());
        }
        drop(unsafe { Box::from_raw(this) });
        Ok(())
    })
}

/// Construct a default `T` inside caller-supplied storage. The address is
/// checked for alignment before anything is constructed; a misaligned slot
/// fails without touching the memory.
pub fn checked_placement_new<T: Boundary + Default>(slot: *mut T) -> ErrorCode {
    ffi_guard(|| {
        if slot.is_null() {
            return Err(Error::ArgumentNull);
        }
        if (slot as usize) % std::mem::align_of::<T>() != 0 {
            return Err(Error::UnalignedPlacement);
        }
        unsafe {
            slot.write(T::default());
            (*slot).initialize();
        }
        Ok(())
    })
}

/// Run the destructor in place without freeing; the caller owns and will
/// reclaim the backing storage. Null is success, as with `checked_delete`.
pub fn checked_placement_delete<T>(slot: *mut T) -> ErrorCode {
    ffi_guard(|| {
        if slot.is_null() {
            return Ok(());
        }
        unsafe { std::ptr::drop_in_place(slot) };
        Ok(())
    })
}

/// Size/alignment introspection so the host can allocate placement storage.
pub fn checked_size<T>(out_size: *mut i32, out_alignment: *mut i32) -> ErrorCode {
    ffi_guard(|| {
        if out_size.is_null() || out_alignment.is_null() {
            return Err(Error::ArgumentNull);
        }
        unsafe {
            *out_size = std::mem::size_of::<T>() as i32;
            *out_alignment = std::mem::align_of::<T>() as i32;
        }
        Ok(())
    })
}

/// Compare two handles under the type's policy. Null/identity cases are
/// resolved before the policy runs: both-null is equal, one-null is not,
/// and the same pointer short-circuits so a stateful type never compares
/// itself structurally.
pub fn checked_equals<T: Boundary>(this: *const T, other: *const T, out: *mut Bool) -> ErrorCode {
    ffi_guard(|| {
        if out.is_null() {
            return Err(Error::ArgumentNull);
        }
        let result = match (this.is_null(), other.is_null()) {
            (true, true) => true,
            (true, false) | (false, true) => false,
            (false, false) => {
                std::ptr::eq(this, other) || unsafe { (*this).boundary_eq(&*other) }
            }
        };
        unsafe { *out = if result { TRUE } else { FALSE } };
        Ok(())
    })
}

/// Hash a handle under the type's policy, truncated to 32 bits for the
/// managed hash-code contract.
pub fn checked_hash<T: Boundary>(this: *const T, out: *mut i32) -> ErrorCode {
    ffi_guard(|| {
        if this.is_null() || out.is_null() {
            return Err(Error::ArgumentNull);
        }
        unsafe { *out = (*this).boundary_hash() };
        Ok(())
    })
}

// ============================================================================
// Export macros
// ============================================================================

/// The boilerplate every exposed type must export: checked construction,
/// destruction, equality, and hashing.
macro_rules! boundary_exports {
    ($ty:ty, $new:ident, $delete:ident, $equals:ident, $hash:ident) => {
        #[no_mangle]
        pub extern "C" fn $new(out: *mut *mut $ty) -> $crate::error::ErrorCode {
            $crate::checked::checked_new(out)
        }

        #[no_mangle]
        pub extern "C" fn $delete(this: *mut $ty) -> $crate::error::ErrorCode {
            $crate::checked::checked_delete(this)
        }

        #[no_mangle]
        pub extern "C" fn $equals(
            this: *const $ty,
            other: *const $ty,
            out: *mut $crate::checked::Bool,
        ) -> $crate::error::ErrorCode {
            $crate::checked::checked_equals(this, other, out)
        }

        #[no_mangle]
        pub extern "C" fn $hash(this: *const $ty, out: *mut i32) -> $crate::error::ErrorCode {
            $crate::checked::checked_hash(this, out)
        }
    };
}

/// The placement trio exported by value types the host constructs inside
/// its own storage.
macro_rules! placement_exports {
    ($ty:ty, $size:ident, $new:ident, $delete:ident) => {
        #[no_mangle]
        pub extern "C" fn $size(
            out_size: *mut i32,
            out_alignment: *mut i32,
        ) -> $crate::error::ErrorCode {
            $crate::checked::checked_size::<$ty>(out_size, out_alignment)
        }

        #[no_mangle]
        pub extern "C" fn $new(slot: *mut $ty) -> $crate::error::ErrorCode {
            $crate::checked::checked_placement_new(slot)
        }

        #[no_mangle]
        pub extern "C" fn $delete(slot: *mut $ty) -> $crate::error::ErrorCode {
            $crate::checked::checked_placement_delete(slot)
        }
    };
}

pub(crate) use boundary_exports;
pub(crate) use placement_exports;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::with_last_error_message;

    #[derive(Default)]
    struct RefThing {
        flag: i32,
    }

    impl Boundary for RefThing {
        fn initialize(&mut self) {
            self.flag = 7;
        }
    }

    #[derive(Default, PartialEq, Hash)]
    struct ValThing {
        a: i32,
        b: i32,
    }

    impl Boundary for ValThing {
        fn boundary_eq(&self, other: &Self) -> bool {
            self == other
        }

        fn boundary_hash(&self) -> i32 {
            let mut seed = 0;
            combine_hash(self.a, &mut seed);
            combine_hash(self.b, &mut seed);
            seed
        }
    }

    #[test]
    fn new_runs_initialize_and_delete_frees() {
        let mut ptr: *mut RefThing = std::ptr::null_mut();
        assert!(checked_new(&mut ptr).is_success());
        assert_eq!(unsafe { (*ptr).flag }, 7);
        assert!(checked_delete(ptr).is_success());
    }

    #[test]
    fn new_with_skips_initialize() {
        let mut ptr: *mut RefThing = std::ptr::null_mut();
        assert!(checked_new_with(&mut ptr, RefThing { flag: 1 }).is_success());
        assert_eq!(unsafe { (*ptr).flag }, 1);
        assert!(checked_delete(ptr).is_success());
    }

    #[test]
    fn new_with_null_out_is_argument_null() {
        assert_eq!(
            checked_new::<RefThing>(std::ptr::null_mut()),
            ErrorCode::ARGUMENT_NULL
        );
    }

    #[test]
    fn delete_null_is_success() {
        assert_eq!(checked_delete::<RefThing>(std::ptr::null_mut()), ErrorCode::SUCCESS);
        assert_eq!(
            checked_placement_delete::<RefThing>(std::ptr::null_mut()),
            ErrorCode::SUCCESS
        );
    }

    #[test]
    fn placement_new_rejects_misaligned_address_without_constructing() {
        let mut backing = [0u8; 16];
        let base = backing.as_mut_ptr();
        let misaligned = unsafe { base.add(1) } as *mut ValThing;
        if (misaligned as usize) % std::mem::align_of::<ValThing>() != 0 {
            assert_eq!(
                checked_placement_new(misaligned),
                ErrorCode::UNALIGNED_OBJECT_PLACEMENT
            );
        }
    }

    #[test]
    fn placement_round_trip() {
        let mut slot = std::mem::MaybeUninit::<ValThing>::uninit();
        assert!(checked_placement_new(slot.as_mut_ptr()).is_success());
        assert_eq!(unsafe { (*slot.as_ptr()).a }, 0);
        assert!(checked_placement_delete(slot.as_mut_ptr()).is_success());
    }

    #[test]
    fn size_reports_layout() {
        let (mut size, mut align) = (0i32, 0i32);
        assert!(checked_size::<ValThing>(&mut size, &mut align).is_success());
        assert_eq!(size as usize, std::mem::size_of::<ValThing>());
        assert_eq!(align as usize, std::mem::align_of::<ValThing>());
    }

    #[test]
    fn reference_equality_distinguishes_identical_state() {
        let a = RefThing { flag: 7 };
        let b = RefThing { flag: 7 };
        let mut out = -1;
        assert!(checked_equals(&a, &b, &mut out).is_success());
        assert_eq!(out, FALSE);
        assert!(checked_equals(&a, &a, &mut out).is_success());
        assert_eq!(out, TRUE);
    }

    #[test]
    fn reference_hash_is_stable_per_object() {
        let a = RefThing { flag: 7 };
        let (mut first, mut second) = (0, 0);
        assert!(checked_hash(&a, &mut first).is_success());
        assert!(checked_hash(&a, &mut second).is_success());
        assert_eq!(first, second);
    }

    #[test]
    fn null_combinations() {
        let a = RefThing::default();
        let null = std::ptr::null::<RefThing>();
        let mut out = -1;
        assert!(checked_equals(null, null, &mut out).is_success());
        assert_eq!(out, TRUE);
        assert!(checked_equals(&a, null, &mut out).is_success());
        assert_eq!(out, FALSE);
        assert!(checked_equals(null, &a, &mut out).is_success());
        assert_eq!(out, FALSE);
    }

    #[test]
    fn value_equality_agrees_with_hash() {
        let a = ValThing { a: 3, b: 9 };
        let b = ValThing { a: 3, b: 9 };
        let mut eq = FALSE;
        assert!(checked_equals(&a, &b, &mut eq).is_success());
        assert_eq!(eq, TRUE);

        let (mut ha, mut hb) = (0, 0);
        assert!(checked_hash(&a, &mut ha).is_success());
        assert!(checked_hash(&b, &mut hb).is_success());
        assert_eq!(ha, hb);
    }

    #[test]
    fn hash_null_arguments_rejected() {
        let a = ValThing::default();
        let mut out = 0;
        assert_eq!(
            checked_hash::<ValThing>(std::ptr::null(), &mut out),
            ErrorCode::ARGUMENT_NULL
        );
        assert_eq!(
            checked_hash(&a, std::ptr::null_mut()),
            ErrorCode::ARGUMENT_NULL
        );
    }

    #[test]
    fn guard_converts_panic_to_unknown_with_message() {
        let code = ffi_guard(|| panic!("widget exploded"));
        assert_eq!(code, ErrorCode::unknown_with_message());
        with_last_error_message(|m| assert_eq!(m, "widget exploded"));

        // Formatted panics carry a String payload; it must survive too.
        let kind = "button";
        let code = ffi_guard(|| panic!("{kind} exploded"));
        assert_eq!(code, ErrorCode::unknown_with_message());
        with_last_error_message(|m| assert_eq!(m, "button exploded"));
    }
}
