//! Sample source abstraction
//!
//! The pupil detector is an external collaborator. Anything that can hand out
//! the next `RawSample` in arrival order can drive calibration or a session.

use crate::schema::RawSample;

/// Producer of raw gaze samples.
///
/// Implementations must yield samples with strictly increasing timestamps and
/// return `None` once the stream has ended.
pub trait SampleSource {
    /// Next sample, or `None` at end of stream
    fn next_sample(&mut self) -> Option<RawSample>;
}

impl<I> SampleSource for I
where
    I: Iterator<Item = RawSample>,
{
    fn next_sample(&mut self) -> Option<RawSample> {
        self.next()
    }
}
