use crate::sample::FromSample;

/// FIFO of normalized samples with a movable head.
///
/// Consumed samples are only moved out when they make up more than half of
/// the backing storage, so consuming is cheap. The last `history` consumed
/// samples are always kept and can be read with [`peek_behind`].
///
/// [`peek_behind`]: Self::peek_behind
#[derive(Clone, Debug, Default)]
pub struct StreamBuffer {
    samples: Vec<f32>,
    head: usize,
    /// Absolute stream position of `head`.
    position: u64,
    history: usize,
}

impl StreamBuffer {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            ..Default::default()
        }
    }

    #[inline]
    pub fn with_history(mut self, history: usize) -> Self {
        self.history = history;
        self
    }

    #[inline]
    pub fn history(&self) -> usize {
        self.history
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len() - self.head
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of samples consumed since creation.
    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn push(&mut self, samples: &[i16]) {
        self.samples
            .extend(samples.iter().map(|sample| f32::from_sample(*sample)));
    }

    /// The first `n` buffered samples, if that many are available.
    #[inline]
    pub fn peek(&self, n: usize) -> Option<&[f32]> {
        self.samples.get(self.head..self.head.checked_add(n)?)
    }

    /// The last `n` consumed samples.
    ///
    /// Returns `None` if `n` exceeds the history or fewer than `n` samples
    /// were consumed so far.
    #[inline]
    pub fn peek_behind(&self, n: usize) -> Option<&[f32]> {
        if n > self.history {
            return None;
        }
        self.samples.get(self.head.checked_sub(n)?..self.head)
    }

    /// Drops up to `n` samples from the head and returns how many were
    /// dropped.
    pub fn consume(&mut self, n: usize) -> usize {
        let n = n.min(self.len());
        self.head += n;
        self.position += n as u64;

        let stale = self.head.saturating_sub(self.history);
        if stale > 0 && stale >= self.samples.len() / 2 {
            self.samples.drain(..stale);
            self.head -= stale;
        }

        n
    }

    /// Drops the oldest samples so that at most `max_len` remain.
    #[inline]
    pub fn truncate_front(&mut self, max_len: usize) -> usize {
        self.consume(self.len().saturating_sub(max_len))
    }

    pub fn clear(&mut self) {
        self.consume(self.len());
    }
}
