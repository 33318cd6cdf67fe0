use crate::layout::Layout;

// Half-open cue time range, in milliseconds
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Span {
    pub start_ms: u64,
    pub end_ms: u64,
}

// The running cue clock.
//
// A plain value: each batch takes the clock left by the previous batch and hands
// back the advanced one, so assembling a batch depends only on (batch, clock).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CueClock {
    cursor_ms: u64,
    interval_ms: u64,
}

impl CueClock {
    // Start of the run: the first frame's nominal time shifted by the layout's
    // offset (one interval earlier by default). Clamped at zero for 0-based
    // sequences.
    pub fn start(layout: &Layout, first_sequence_index: u64) -> Self {
        let nominal = first_sequence_index.saturating_mul(layout.frame_interval_ms());
        let offset = layout.first_frame_offset_ms();
        let cursor_ms = if offset < 0 {
            nominal.saturating_sub(offset.unsigned_abs())
        } else {
            nominal.saturating_add(offset as u64)
        };
        Self {
            cursor_ms,
            interval_ms: layout.frame_interval_ms(),
        }
    }

    pub fn cursor_ms(&self) -> u64 {
        self.cursor_ms
    }

    pub fn tick(&mut self) -> Span {
        let start_ms = self.cursor_ms;
        let end_ms = start_ms + self.interval_ms;
        self.cursor_ms = end_ms;
        Span { start_ms, end_ms }
    }

    // Clock as it will stand after `frames` more ticks
    pub fn skip(self, frames: usize) -> Self {
        Self {
            cursor_ms: self.cursor_ms + self.interval_ms * frames as u64,
            ..self
        }
    }
}

#[test]
fn test_clock_contiguous() {
    let layout = Layout::new(3, 4, 5.0, true).unwrap();
    let mut clock = CueClock::start(&layout, 1);
    assert_eq!(clock.cursor_ms(), 0);
    let spans: Vec<Span> = (0..13).map(|_| clock.tick()).collect();
    assert_eq!(spans[0], Span { start_ms: 0, end_ms: 5000 });
    for w in spans.windows(2) {
        assert_eq!(w[0].end_ms, w[1].start_ms);
    }
    assert_eq!(spans[12].end_ms, 65_000);
    assert_eq!(CueClock::start(&layout, 1).skip(13), clock);
}

#[test]
fn test_clock_offsets() {
    let layout = Layout::new(3, 4, 5.0, true).unwrap();
    // resuming mid-video starts one interval before the first nominal time
    assert_eq!(CueClock::start(&layout, 25).cursor_ms(), 120_000);
    // 0-based sequences would start before zero
    assert_eq!(CueClock::start(&layout, 0).cursor_ms(), 0);

    let layout = layout.with_first_frame_offset(1.5).unwrap();
    assert_eq!(CueClock::start(&layout, 2).cursor_ms(), 11_500);
}
