use std::collections::VecDeque;

use crate::Candle;

/// Fixed-capacity rolling window of closes/highs/lows/volumes for one
/// symbol. Oldest entries are evicted first; length never exceeds
/// capacity. Appended by the stream adapter, read by the indicator layer.
///
/// The component deques are kept contiguous on read so indicator calls
/// get plain slices without a per-tick copy.
#[derive(Debug)]
pub struct PriceSeries {
    capacity: usize,
    closes: VecDeque<f64>,
    highs: VecDeque<f64>,
    lows: VecDeque<f64>,
    volumes: VecDeque<f64>,
}

impl PriceSeries {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "series capacity must be positive");
        Self {
            capacity,
            closes: VecDeque::with_capacity(capacity + 1),
            highs: VecDeque::with_capacity(capacity + 1),
            lows: VecDeque::with_capacity(capacity + 1),
            volumes: VecDeque::with_capacity(capacity + 1),
        }
    }

    /// Append one completed candle, evicting the oldest entry when the
    /// window is full.
    pub fn push(&mut self, candle: &Candle) {
        self.closes.push_back(candle.close);
        self.highs.push_back(candle.high);
        self.lows.push_back(candle.low);
        self.volumes.push_back(candle.volume);

        while self.closes.len() > self.capacity {
            self.closes.pop_front();
            self.highs.pop_front();
            self.lows.pop_front();
            self.volumes.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last_close(&self) -> Option<f64> {
        self.closes.back().copied()
    }

    pub fn closes(&mut self) -> &[f64] {
        self.closes.make_contiguous()
    }

    pub fn highs(&mut self) -> &[f64] {
        self.highs.make_contiguous()
    }

    pub fn lows(&mut self) -> &[f64] {
        self.lows.make_contiguous()
    }

    pub fn volumes(&mut self) -> &[f64] {
        self.volumes.make_contiguous()
    }

    /// Borrow all component slices at once, in arrival order. The deques
    /// are compacted in place, so repeated snapshots between pushes are
    /// free.
    pub fn snapshot(&mut self) -> SeriesView<'_> {
        SeriesView {
            closes: self.closes.make_contiguous(),
            highs: self.highs.make_contiguous(),
            lows: self.lows.make_contiguous(),
            volumes: self.volumes.make_contiguous(),
        }
    }
}

/// Read-only view over one symbol's rolling window.
#[derive(Debug)]
pub struct SeriesView<'a> {
    pub closes: &'a [f64],
    pub highs: &'a [f64],
    pub lows: &'a [f64],
    pub volumes: &'a [f64],
}
