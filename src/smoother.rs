//! Raw sample smoothing
//!
//! Centered moving average over each numeric field independently. Absent
//! values never enter an average; a field is absent in the output only when
//! its whole window is empty. At the sequence edges the window shrinks
//! symmetrically instead of padding or wrapping.

use std::collections::VecDeque;

use crate::schema::{Point2, RawSample};

/// Smooth a sample sequence with a centered window of `window` samples.
///
/// The window radius is `window / 2`, so an even window behaves like the next
/// odd one. A window of 0 or 1 returns the input unchanged.
pub fn smooth(samples: &[RawSample], window: usize) -> Vec<RawSample> {
    let half = window / 2;
    let n = samples.len();
    (0..n)
        .map(|i| {
            let r = half.min(i).min(n - 1 - i);
            smooth_span(samples, i, r)
        })
        .collect()
}

/// Average of the window `[center - r, center + r]` around `center`
fn smooth_span(samples: &[RawSample], center: usize, r: usize) -> RawSample {
    let span = &samples[center - r..=center + r];
    let origin = &samples[center];

    RawSample {
        schema_version: origin.schema_version.clone(),
        timestamp: origin.timestamp,
        pupil_left: mean_point(span.iter().filter_map(|s| s.pupil_left)),
        pupil_right: mean_point(span.iter().filter_map(|s| s.pupil_right)),
        gaze_h: mean(span.iter().filter_map(|s| s.gaze_h)),
        gaze_v: mean(span.iter().filter_map(|s| s.gaze_v)),
        blinking: origin.blinking,
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

fn mean_point(points: impl Iterator<Item = Point2>) -> Option<Point2> {
    let (sx, sy, count) = points.fold((0.0, 0.0, 0usize), |(sx, sy, c), p| {
        (sx + p.x, sy + p.y, c + 1)
    });
    (count > 0).then(|| Point2::new(sx / count as f64, sy / count as f64))
}

/// Incremental form of [`smooth`] for live sessions.
///
/// Output for index `i` is released once `window / 2` later samples have
/// arrived; `finish` flushes the tail with the shrunk edge window. The
/// concatenated output equals `smooth` over the full sequence.
#[derive(Debug, Clone)]
pub struct StreamingSmoother {
    half: usize,
    buffer: VecDeque<RawSample>,
    /// Global index of `buffer[0]`
    base: usize,
    /// Global index of the next sample to release
    next: usize,
    received: usize,
}

impl StreamingSmoother {
    pub fn new(window: usize) -> Self {
        let half = window / 2;
        Self {
            half,
            buffer: VecDeque::with_capacity(2 * half + 1),
            base: 0,
            next: 0,
            received: 0,
        }
    }

    /// Number of samples held back waiting for look-ahead
    pub fn pending(&self) -> usize {
        self.received - self.next
    }

    /// Feed one sample; returns the smoothed sample that became final, if any
    pub fn push(&mut self, sample: RawSample) -> Option<RawSample> {
        self.buffer.push_back(sample);
        self.received += 1;

        if self.received <= self.next + self.half {
            return None;
        }

        let r = self.half.min(self.next);
        let out = self.emit(self.next, r);
        self.next += 1;

        let keep_from = self.next.saturating_sub(self.half);
        while self.base < keep_from {
            self.buffer.pop_front();
            self.base += 1;
        }

        Some(out)
    }

    /// Flush every held-back sample using the end-of-sequence window
    pub fn finish(mut self) -> Vec<RawSample> {
        let n = self.received;
        let mut out = Vec::with_capacity(n - self.next);
        for i in self.next..n {
            let r = self.half.min(i).min(n - 1 - i);
            out.push(self.emit(i, r));
        }
        self.next = n;
        out
    }

    fn emit(&mut self, index: usize, r: usize) -> RawSample {
        let slice = self.buffer.make_contiguous();
        smooth_span(slice, index - self.base, r)
    }
}
