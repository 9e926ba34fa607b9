/// Bookkeeping of the seeks applied to the current run, in nanoseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeekLedger {
    /// Whether the last accepted seek was relative.
    pub relative: bool,
    /// Offset requested by the last accepted seek.
    pub offset: i64,
    /// Absolute position the last accepted seek resolved to.
    pub absolute: i64,
    /// Net displacement accumulated over every accepted seek.
    pub sum: i64,
    /// Number of accepted seeks.
    pub count: u32,
}

impl SeekLedger {
    /// Records a seek the engine accepted. `delta` is the displacement it
    /// introduced relative to the position at request time.
    pub(crate) fn commit(&mut self, relative: bool, offset: i64, absolute: i64, delta: i64) {
        self.relative = relative;
        self.offset = offset;
        self.absolute = absolute;
        self.sum = self.sum.saturating_add(delta);
        self.count += 1;
    }
}
