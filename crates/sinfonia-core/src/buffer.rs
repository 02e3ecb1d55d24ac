//! Planar stereo buffer views handed to units.

/// Mutable planar stereo view.
#[derive(Debug)]
pub struct StereoMut<'a> {
    pub left: &'a mut [f32],
    pub right: &'a mut [f32],
}

/// Read-only planar stereo view.
#[derive(Debug, Clone, Copy)]
pub struct StereoRef<'a> {
    pub left: &'a [f32],
    pub right: &'a [f32],
}

impl<'a> StereoMut<'a> {
    pub fn new(left: &'a mut [f32], right: &'a mut [f32]) -> Self {
        debug_assert_eq!(left.len(), right.len());
        Self { left, right }
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.left.len()
    }

    /// Narrow to the first `frames` frames.
    pub fn truncate(self, frames: usize) -> StereoMut<'a> {
        let frames = frames.min(self.left.len());
        let StereoMut { left, right } = self;
        StereoMut {
            left: left.split_at_mut(frames).0,
            right: right.split_at_mut(frames).0,
        }
    }

    pub fn reborrow(&mut self) -> StereoMut<'_> {
        StereoMut {
            left: &mut *self.left,
            right: &mut *self.right,
        }
    }

    pub fn view(&self) -> StereoRef<'_> {
        StereoRef {
            left: &*self.left,
            right: &*self.right,
        }
    }

    #[inline]
    pub fn fill(&mut self, value: f32) {
        self.left.fill(value);
        self.right.fill(value);
    }

    #[inline]
    pub fn copy_from(&mut self, src: StereoRef<'_>) {
        let n = self.frames().min(src.frames());
        self.left[..n].copy_from_slice(&src.left[..n]);
        self.right[..n].copy_from_slice(&src.right[..n]);
    }

    #[inline]
    pub fn accumulate(&mut self, src: StereoRef<'_>) {
        for (d, s) in self.left.iter_mut().zip(src.left) {
            *d += *s;
        }
        for (d, s) in self.right.iter_mut().zip(src.right) {
            *d += *s;
        }
    }

    #[inline]
    pub fn scale(&mut self, gain: f32) {
        for s in self.left.iter_mut().chain(self.right.iter_mut()) {
            *s *= gain;
        }
    }
}

impl<'a> StereoRef<'a> {
    #[inline]
    pub fn frames(&self) -> usize {
        self.left.len()
    }

    pub fn truncate(self, frames: usize) -> StereoRef<'a> {
        let frames = frames.min(self.left.len());
        StereoRef {
            left: &self.left[..frames],
            right: &self.right[..frames],
        }
    }

    /// Index of the first frame whose magnitude exceeds `threshold` on either channel.
    pub fn first_audible(&self, threshold: f32) -> Option<usize> {
        self.left
            .iter()
            .zip(self.right)
            .position(|(l, r)| l.abs() > threshold || r.abs() > threshold)
    }
}

/// Owned planar stereo buffer.
#[derive(Debug, Clone, Default)]
pub struct StereoBuffer {
    left: Vec<f32>,
    right: Vec<f32>,
}

impl StereoBuffer {
    pub fn new(frames: usize) -> Self {
        Self {
            left: vec![0.0; frames],
            right: vec![0.0; frames],
        }
    }

    pub fn frames(&self) -> usize {
        self.left.len()
    }

    pub fn view(&self) -> StereoRef<'_> {
        StereoRef {
            left: &self.left,
            right: &self.right,
        }
    }

    pub fn view_mut(&mut self) -> StereoMut<'_> {
        StereoMut {
            left: &mut self.left,
            right: &mut self.right,
        }
    }

    /// Shift frames `from..` down to the start of the buffer.
    pub fn discard_front(&mut self, from: usize, end: usize) {
        self.left.copy_within(from..end, 0);
        self.right.copy_within(from..end, 0);
    }
}
