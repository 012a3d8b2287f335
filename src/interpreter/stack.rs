//! Stack growth guard for continuation chains.
//!
//! Continuation-passing evaluation never returns to its caller until the whole
//! evaluation finishes, so a loop of N iterations nests N levels of native
//! frames. Every dispatch runs under [`ensure_sufficient_stack`], which moves
//! execution onto a freshly allocated segment when the current one runs low.
//!
//! On `wasm32` the guard is a passthrough.

/// Remaining stack below which a new segment is allocated (128KB).
const RED_ZONE: usize = 128 * 1024;

/// Size of each newly allocated segment (2MB).
const SEGMENT_SIZE: usize = 2 * 1024 * 1024;

/// Runs `f`, first growing the stack if less than the red zone remains.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, SEGMENT_SIZE, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
