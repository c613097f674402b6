//! Point and Rect: the value-semantics geometry types.
//!
//! Both are exposed with the full boilerplate plus the placement trio, so
//! the host can either heap-allocate them or construct them inside its own
//! correctly-aligned storage.

use crate::checked::{self, boundary_exports, combine_hash, placement_exports, Bool, Boundary, FALSE, TRUE};
use crate::error::{Error, ErrorCode};

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn add(self, other: Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }

    pub fn subtract(self, other: Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }
}

impl Boundary for Point {
    fn boundary_eq(&self, other: &Self) -> bool {
        self == other
    }

    fn boundary_hash(&self) -> i32 {
        let mut seed = 0;
        combine_hash(self.x, &mut seed);
        combine_hash(self.y, &mut seed);
        seed
    }
}

/// A rectangle as two corner points: `a` inclusive top-left, `b` exclusive
/// bottom-right.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub a: Point,
    pub b: Point,
}

impl Rect {
    pub fn new(ax: i32, ay: i32, bx: i32, by: i32) -> Self {
        Self {
            a: Point::new(ax, ay),
            b: Point::new(bx, by),
        }
    }

    pub fn width(&self) -> i32 {
        self.b.x - self.a.x
    }

    pub fn height(&self) -> i32 {
        self.b.y - self.a.y
    }

    pub fn move_by(&mut self, dx: i32, dy: i32) {
        self.a.x += dx;
        self.a.y += dy;
        self.b.x += dx;
        self.b.y += dy;
    }

    pub fn grow(&mut self, dx: i32, dy: i32) {
        self.a.x -= dx;
        self.a.y -= dy;
        self.b.x += dx;
        self.b.y += dy;
    }

    pub fn intersect(&mut self, r: Rect) {
        self.a.x = self.a.x.max(r.a.x);
        self.a.y = self.a.y.max(r.a.y);
        self.b.x = self.b.x.min(r.b.x);
        self.b.y = self.b.y.min(r.b.y);
    }

    pub fn union_with(&mut self, r: Rect) {
        self.a.x = self.a.x.min(r.a.x);
        self.a.y = self.a.y.min(r.a.y);
        self.b.x = self.b.x.max(r.b.x);
        self.b.y = self.b.y.max(r.b.y);
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.a.x && p.x < self.b.x && p.y >= self.a.y && p.y < self.b.y
    }

    pub fn is_empty(&self) -> bool {
        self.a.x >= self.b.x || self.a.y >= self.b.y
    }
}

impl Boundary for Rect {
    fn boundary_eq(&self, other: &Self) -> bool {
        // Composes the Point policy so rectangle equality is exactly
        // pointwise corner equality.
        self.a.boundary_eq(&other.a) && self.b.boundary_eq(&other.b)
    }

    fn boundary_hash(&self) -> i32 {
        let mut seed = 0;
        combine_hash(self.a.boundary_hash(), &mut seed);
        combine_hash(self.b.boundary_hash(), &mut seed);
        seed
    }
}

// ============================================================================
// Point exports
// ============================================================================

boundary_exports!(Point, TfPointNew, TfPointDelete, TfPointEquals, TfPointHash);
placement_exports!(Point, TfPointPlacementSize, TfPointPlacementNew, TfPointPlacementDelete);

#[no_mangle]
pub extern "C" fn TfPointNew2(out: *mut *mut Point, x: i32, y: i32) -> ErrorCode {
    checked::checked_new_with(out, Point::new(x, y))
}

macro_rules! field_accessors {
    ($ty:ty, $field:ident: $fty:ty, $get:ident, $set:ident) => {
        #[no_mangle]
        pub extern "C" fn $get(this: *const $ty, out: *mut $fty) -> ErrorCode {
            checked::ffi_guard(|| {
                if this.is_null() || out.is_null() {
                    return Err(Error::ArgumentNull);
                }
                unsafe { *out = (*this).$field };
                Ok(())
            })
        }

        #[no_mangle]
        pub extern "C" fn $set(this: *mut $ty, value: $fty) -> ErrorCode {
            checked::ffi_guard(|| {
                if this.is_null() {
                    return Err(Error::ArgumentNull);
                }
                unsafe { (*this).$field = value };
                Ok(())
            })
        }
    };
}

pub(crate) use field_accessors;

field_accessors!(Point, x: i32, TfPointGetX, TfPointSetX);
field_accessors!(Point, y: i32, TfPointGetY, TfPointSetY);

#[no_mangle]
pub extern "C" fn TfPointAdd(one: *const Point, two: *const Point, dst: *mut Point) -> ErrorCode {
    checked::ffi_guard(|| {
        if one.is_null() || two.is_null() || dst.is_null() {
            return Err(Error::ArgumentNull);
        }
        unsafe { *dst = (*one).add(*two) };
        Ok(())
    })
}

#[no_mangle]
pub extern "C" fn TfPointSubtract(
    one: *const Point,
    two: *const Point,
    dst: *mut Point,
) -> ErrorCode {
    checked::ffi_guard(|| {
        if one.is_null() || two.is_null() || dst.is_null() {
            return Err(Error::ArgumentNull);
        }
        unsafe { *dst = (*one).subtract(*two) };
        Ok(())
    })
}

#[no_mangle]
pub extern "C" fn TfPointAddInPlace(this: *mut Point, adder: *const Point) -> ErrorCode {
    checked::ffi_guard(|| {
        if this.is_null() || adder.is_null() {
            return Err(Error::ArgumentNull);
        }
        unsafe { *this = (*this).add(*adder) };
        Ok(())
    })
}

#[no_mangle]
pub extern "C" fn TfPointSubtractInPlace(this: *mut Point, subber: *const Point) -> ErrorCode {
    checked::ffi_guard(|| {
        if this.is_null() || subber.is_null() {
            return Err(Error::ArgumentNull);
        }
        unsafe { *this = (*this).subtract(*subber) };
        Ok(())
    })
}

// ============================================================================
// Rect exports
// ============================================================================

boundary_exports!(Rect, TfRectNew, TfRectDelete, TfRectEquals, TfRectHash);
placement_exports!(Rect, TfRectPlacementSize, TfRectPlacementNew, TfRectPlacementDelete);

#[no_mangle]
pub extern "C" fn TfRectNew2(out: *mut *mut Rect, a: *const Point, b: *const Point) -> ErrorCode {
    if a.is_null() || b.is_null() {
        return ErrorCode::ARGUMENT_NULL;
    }
    let rect = unsafe { Rect { a: *a, b: *b } };
    checked::checked_new_with(out, rect)
}

field_accessors!(Rect, a: Point, TfRectGetA, TfRectSetA);
field_accessors!(Rect, b: Point, TfRectGetB, TfRectSetB);

#[no_mangle]
pub extern "C" fn TfRectMove(this: *mut Rect, dx: i32, dy: i32) -> ErrorCode {
    checked::ffi_guard(|| {
        if this.is_null() {
            return Err(Error::ArgumentNull);
        }
        unsafe { (*this).move_by(dx, dy) };
        Ok(())
    })
}

#[no_mangle]
pub extern "C" fn TfRectGrow(this: *mut Rect, dx: i32, dy: i32) -> ErrorCode {
    checked::ffi_guard(|| {
        if this.is_null() {
            return Err(Error::ArgumentNull);
        }
        unsafe { (*this).grow(dx, dy) };
        Ok(())
    })
}

#[no_mangle]
pub extern "C" fn TfRectIntersect(this: *mut Rect, r: *const Rect) -> ErrorCode {
    checked::ffi_guard(|| {
        if this.is_null() || r.is_null() {
            return Err(Error::ArgumentNull);
        }
        unsafe { (*this).intersect(*r) };
        Ok(())
    })
}

#[no_mangle]
pub extern "C" fn TfRectUnion(this: *mut Rect, r: *const Rect) -> ErrorCode {
    checked::ffi_guard(|| {
        if this.is_null() || r.is_null() {
            return Err(Error::ArgumentNull);
        }
        unsafe { (*this).union_with(*r) };
        Ok(())
    })
}

#[no_mangle]
pub extern "C" fn TfRectContains(this: *const Rect, p: *const Point, out: *mut Bool) -> ErrorCode {
    checked::ffi_guard(|| {
        if this.is_null() || p.is_null() || out.is_null() {
            return Err(Error::ArgumentNull);
        }
        unsafe { *out = if (*this).contains(*p) { TRUE } else { FALSE } };
        Ok(())
    })
}

#[no_mangle]
pub extern "C" fn TfRectIsEmpty(this: *const Rect, out: *mut Bool) -> ErrorCode {
    checked::ffi_guard(|| {
        if this.is_null() || out.is_null() {
            return Err(Error::ArgumentNull);
        }
        unsafe { *out = if (*this).is_empty() { TRUE } else { FALSE } };
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_value_equality_and_hash_agree() {
        let a = Point::new(3, 4);
        let b = Point::new(3, 4);
        let c = Point::new(4, 3);
        assert!(a.boundary_eq(&b));
        assert_eq!(a.boundary_hash(), b.boundary_hash());
        assert!(!a.boundary_eq(&c));
    }

    #[test]
    fn rect_equality_composes_point_equality() {
        let r1 = Rect::new(1, 2, 10, 20);
        let r2 = Rect::new(1, 2, 10, 20);
        assert_eq!(
            r1.boundary_eq(&r2),
            r1.a.boundary_eq(&r2.a) && r1.b.boundary_eq(&r2.b)
        );
        assert_eq!(r1.boundary_hash(), r2.boundary_hash());

        let r3 = Rect::new(1, 2, 10, 21);
        assert!(!r1.boundary_eq(&r3));
    }

    #[test]
    fn rect_from_two_points_round_trips() {
        let a = Point::new(2, 3);
        let b = Point::new(12, 8);
        let mut rect: *mut Rect = std::ptr::null_mut();
        assert!(TfRectNew2(&mut rect, &a, &b).is_success());

        let (mut ra, mut rb) = (Point::default(), Point::default());
        assert!(TfRectGetA(rect, &mut ra).is_success());
        assert!(TfRectGetB(rect, &mut rb).is_success());
        assert_eq!(ra, a);
        assert_eq!(rb, b);
        assert!(TfRectDelete(rect).is_success());
    }

    #[test]
    fn rect_operations() {
        let mut r = Rect::new(2, 2, 10, 6);
        r.move_by(1, -1);
        assert_eq!(r, Rect::new(3, 1, 11, 5));
        r.grow(1, 1);
        assert_eq!(r, Rect::new(2, 0, 12, 6));
        r.intersect(Rect::new(4, 2, 20, 20));
        assert_eq!(r, Rect::new(4, 2, 12, 6));
        r.union_with(Rect::new(0, 0, 5, 5));
        assert_eq!(r, Rect::new(0, 0, 12, 6));

        assert!(r.contains(Point::new(0, 0)));
        assert!(!r.contains(Point::new(12, 0)));
        assert!(!r.is_empty());
        assert!(Rect::new(5, 5, 5, 9).is_empty());
    }

    #[test]
    fn point_operator_exports() {
        let one = Point::new(1, 2);
        let two = Point::new(10, 20);
        let mut dst = Point::default();
        assert!(TfPointAdd(&one, &two, &mut dst).is_success());
        assert_eq!(dst, Point::new(11, 22));
        assert!(TfPointSubtract(&two, &one, &mut dst).is_success());
        assert_eq!(dst, Point::new(9, 18));

        let mut p = Point::new(5, 5);
        assert!(TfPointAddInPlace(&mut p, &one).is_success());
        assert_eq!(p, Point::new(6, 7));
        assert_eq!(
            TfPointAddInPlace(std::ptr::null_mut(), &one),
            ErrorCode::ARGUMENT_NULL
        );
    }

    #[test]
    fn placement_size_matches_layout() {
        let (mut size, mut align) = (0, 0);
        assert!(TfPointPlacementSize(&mut size, &mut align).is_success());
        assert_eq!(size as usize, std::mem::size_of::<Point>());
        assert_eq!(align as usize, std::mem::align_of::<Point>());
    }
}
