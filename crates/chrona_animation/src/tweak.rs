//! Value interpolation
//!
//! A [`Tweak`] knows how to blend two values of one type. Combined with a
//! [`Formula`] it produces the value a tween applies at a given progress.
//! Blend factors outside `[0, 1]` must extrapolate; continuing loops rely on it.

use crate::easing::Formula;

/// Interpolation strategy for a value type
pub trait Tweak<T>: 'static {
    /// Blend `from` toward `to` by `t`
    fn interpolate(&self, from: &T, to: &T, t: f32) -> T;

    /// Blend with `t` remapped through `formula` first
    fn evaluate(&self, from: &T, to: &T, t: f32, formula: Formula) -> T {
        self.interpolate(from, to, formula.apply(t))
    }
}

impl<T, F> Tweak<T> for F
where
    F: Fn(&T, &T, f32) -> T + 'static,
{
    fn interpolate(&self, from: &T, to: &T, t: f32) -> T {
        self(from, to, t)
    }
}

/// Types with a component-wise linear blend
pub trait Lerp: Clone + 'static {
    fn lerp(&self, to: &Self, t: f32) -> Self;
}

impl Lerp for f32 {
    #[inline]
    fn lerp(&self, to: &Self, t: f32) -> Self {
        self + (to - self) * t
    }
}

impl Lerp for f64 {
    #[inline]
    fn lerp(&self, to: &Self, t: f32) -> Self {
        self + (to - self) * t as f64
    }
}

impl<const N: usize> Lerp for [f32; N] {
    fn lerp(&self, to: &Self, t: f32) -> Self {
        std::array::from_fn(|i| self[i].lerp(&to[i], t))
    }
}

impl<const N: usize> Lerp for [f64; N] {
    fn lerp(&self, to: &Self, t: f32) -> Self {
        std::array::from_fn(|i| self[i].lerp(&to[i], t))
    }
}

/// Component-wise linear interpolation
#[derive(Clone, Copy, Debug, Default)]
pub struct Linear;

impl<T: Lerp> Tweak<T> for Linear {
    fn interpolate(&self, from: &T, to: &T, t: f32) -> T {
        from.lerp(to, t)
    }
}

/// Spherical linear interpolation for unit quaternions `[x, y, z, w]`
#[derive(Clone, Copy, Debug, Default)]
pub struct Spherical;

impl Tweak<[f32; 4]> for Spherical {
    fn interpolate(&self, from: &[f32; 4], to: &[f32; 4], t: f32) -> [f32; 4] {
        let a = *from;
        let mut b = *to;
        let mut dot = a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3];

        // Take the short way round
        if dot < 0.0 {
            b = [-b[0], -b[1], -b[2], -b[3]];
            dot = -dot;
        }

        if dot > 0.9995 {
            return normalize(a.lerp(&b, t));
        }

        let theta_0 = dot.clamp(-1.0, 1.0).acos();
        let theta = theta_0 * t;
        let sin_theta_0 = theta_0.sin();
        let s1 = theta.sin() / sin_theta_0;
        let s0 = theta.cos() - dot * s1;

        [
            a[0] * s0 + b[0] * s1,
            a[1] * s0 + b[1] * s1,
            a[2] * s0 + b[2] * s1,
            a[3] * s0 + b[3] * s1,
        ]
    }
}

fn normalize(q: [f32; 4]) -> [f32; 4] {
    let len = (q[0] * q[0] + q[1] * q[1] + q[2] * q[2] + q[3] * q[3]).sqrt();
    if len <= f32::EPSILON {
        return q;
    }
    [q[0] / len, q[1] / len, q[2] / len, q[3] / len]
}

/// Holds `from` until the blend reaches 1, then snaps to `to`
///
/// For values with no meaningful in-between (flags, enum states, labels).
#[derive(Clone, Copy, Debug, Default)]
pub struct Hold;

impl<T: Clone + 'static> Tweak<T> for Hold {
    fn interpolate(&self, from: &T, to: &T, t: f32) -> T {
        if t >= 1.0 {
            to.clone()
        } else {
            from.clone()
        }
    }
}
