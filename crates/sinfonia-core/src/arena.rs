//! Session-owned sample arena handing out cache-line aligned spans.
//!
//! All scratch and accumulation memory of a worker bank is carved out of one
//! arena at session start. Units never see addresses, only slices of spans.

use crate::buffer::{StereoMut, StereoRef};

/// Floats per 64-byte cache line.
pub const LINE_FLOATS: usize = 16;

#[derive(Clone, Copy)]
#[repr(C, align(64))]
struct CacheLine([f32; LINE_FLOATS]);

impl CacheLine {
    const ZERO: CacheLine = CacheLine([0.0; LINE_FLOATS]);
}

/// Aligned region of an arena, in floats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    offset: usize,
    len: usize,
}

impl Span {
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }
}

/// Left/right span pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StereoSpan {
    pub left: Span,
    pub right: Span,
}

/// Number of floats needed to hold `spans` spans of `len` floats each, padding included.
pub fn floats_for(spans: usize, len: usize) -> usize {
    spans * len.div_ceil(LINE_FLOATS) * LINE_FLOATS
}

/// Fixed-capacity bump arena.
pub struct SampleArena {
    // Owns the allocation; accessed only through `base` after construction.
    _lines: Vec<CacheLine>,
    base: *mut f32,
    capacity: usize,
    used: usize,
}

// Disjoint spans are handed to different threads; exclusivity per span is the
// caller's contract on the unsafe accessors.
unsafe impl Send for SampleArena {}
unsafe impl Sync for SampleArena {}

impl SampleArena {
    pub fn new(capacity_floats: usize) -> Self {
        let line_count = capacity_floats.div_ceil(LINE_FLOATS);
        let mut lines = vec![CacheLine::ZERO; line_count];
        let base = lines.as_mut_ptr() as *mut f32;
        debug_assert_eq!(base as usize % 64, 0);

        Self {
            _lines: lines,
            base,
            capacity: line_count * LINE_FLOATS,
            used: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn used(&self) -> usize {
        self.used
    }

    /// Allocate `len` floats starting on a cache-line boundary.
    pub fn alloc(&mut self, len: usize) -> Option<Span> {
        let padded = len.div_ceil(LINE_FLOATS) * LINE_FLOATS;
        if self.used + padded > self.capacity {
            return None;
        }
        let span = Span {
            offset: self.used,
            len,
        };
        self.used += padded;
        debug_assert_eq!(self.ptr(span) as usize % 64, 0, "span is not line aligned");
        Some(span)
    }

    pub fn alloc_stereo(&mut self, frames: usize) -> Option<StereoSpan> {
        Some(StereoSpan {
            left: self.alloc(frames)?,
            right: self.alloc(frames)?,
        })
    }

    #[inline]
    fn ptr(&self, span: Span) -> *mut f32 {
        assert!(span.offset + span.len <= self.capacity, "span outside arena");
        // SAFETY: bounds checked above.
        unsafe { self.base.add(span.offset) }
    }

    pub fn get(&mut self, span: Span) -> &mut [f32] {
        // SAFETY: `&mut self` gives exclusive access to every span.
        unsafe { std::slice::from_raw_parts_mut(self.ptr(span), span.len) }
    }

    /// # Safety
    /// No other live reference to `span` may exist while the slice is alive.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn span_mut(&self, span: Span) -> &mut [f32] {
        std::slice::from_raw_parts_mut(self.ptr(span), span.len)
    }

    /// # Safety
    /// No mutable reference to `span` may exist while the slice is alive.
    #[inline]
    pub unsafe fn span_ref(&self, span: Span) -> &[f32] {
        std::slice::from_raw_parts(self.ptr(span), span.len)
    }

    /// # Safety
    /// Same contract as [`span_mut`](Self::span_mut) for both channels.
    #[inline]
    pub unsafe fn stereo_mut(&self, span: StereoSpan) -> StereoMut<'_> {
        StereoMut::new(self.span_mut(span.left), self.span_mut(span.right))
    }

    /// # Safety
    /// Same contract as [`span_ref`](Self::span_ref) for both channels.
    #[inline]
    pub unsafe fn stereo_ref(&self, span: StereoSpan) -> StereoRef<'_> {
        StereoRef {
            left: self.span_ref(span.left),
            right: self.span_ref(span.right),
        }
    }
}
