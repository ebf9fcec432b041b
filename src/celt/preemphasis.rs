//! Pre-emphasis and de-emphasis: a simple first-order filter applied before analysis and
//! after synthesis that whitens the typical spectral tilt of speech and music, improving
//! the input's fit to CELT's energy/PVQ model.

/// Pre-emphasis coefficient. Fixed by the format; not user-tunable.
pub(crate) const COEFFICIENT: f32 = 0.85;

/// Per-channel pre-emphasis / de-emphasis filter state, carried across frames.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Preemphasis {
    state: f32,
}

impl Preemphasis {
    pub(crate) fn new() -> Self {
        Self { state: 0.0 }
    }

    /// Applies `y[i] = x[i] - COEFFICIENT * x[i - 1]` in place, carrying `x[-1]` from the
    /// previous call.
    pub(crate) fn apply(&mut self, samples: &mut [f32]) {
        let mut prev = self.state;
        for s in samples.iter_mut() {
            let cur = *s;
            *s = cur - COEFFICIENT * prev;
            prev = cur;
        }
        self.state = prev;
    }
}

/// Per-channel de-emphasis filter state, carried across frames.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Deemphasis {
    state: f32,
}

impl Deemphasis {
    pub(crate) fn new() -> Self {
        Self { state: 0.0 }
    }

    /// Inverts [`Preemphasis::apply`]: `y[i] = x[i] + COEFFICIENT * y[i - 1]`.
    pub(crate) fn apply(&mut self, samples: &mut [f32]) {
        let mut prev = self.state;
        for s in samples.iter_mut() {
            let cur = *s + COEFFICIENT * prev;
            *s = cur;
            prev = cur;
        }
        self.state = prev;
    }
}
