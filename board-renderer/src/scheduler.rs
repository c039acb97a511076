//! Frame and timer bookkeeping for a single-threaded host loop
//!
//! Nothing here owns a clock. The host calls in with timestamps from its
//! animation-frame and timer callbacks and asks whether to schedule more.

/// Frame cap of 60fps.
pub const FRAME_INTERVAL_MS: f64 = 1000.0 / 60.0;

/// Frames keep coming this long after a host mutation, to catch slides in progress.
pub const SETTLE_WINDOW_MS: f64 = 200.0;

pub const HEALTH_CHECK_INTERVAL_MS: f64 = 500.0;

/// What to do with one animation-frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTick {
    /// Do the frame work now.
    pub render: bool,
    /// Request another animation frame.
    pub again: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FrameScheduler {
    pending: bool,
    one_shot: bool,
    animating: bool,
    settle_until: Option<f64>,
    last_frame: Option<f64>,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// A frame callback is outstanding.
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn is_animating(&self) -> bool {
        self.animating
    }

    /// Returns true when the caller must request a new frame callback;
    /// false when one is already outstanding.
    fn ensure_pending(&mut self) -> bool {
        if self.pending {
            return false;
        }
        self.pending = true;
        true
    }

    /// One-shot render after a discrete change.
    pub fn request_frame(&mut self) -> bool {
        self.one_shot = true;
        self.ensure_pending()
    }

    /// Open (or extend) the settle window after a host mutation.
    pub fn note_mutation(&mut self, now: f64) -> bool {
        let until = now + SETTLE_WINDOW_MS;
        self.settle_until = Some(self.settle_until.map_or(until, |u| u.max(until)));
        self.ensure_pending()
    }

    /// Turn continuous rendering on or off.
    pub fn set_animating(&mut self, animating: bool) -> bool {
        self.animating = animating;
        animating && self.ensure_pending()
    }

    fn settling(&self, ts: f64) -> bool {
        self.settle_until.is_some_and(|until| ts <= until)
    }

    /// Handle an animation-frame callback at `ts` ms.
    pub fn on_frame(&mut self, ts: f64) -> FrameTick {
        self.pending = false;
        if !self.settling(ts) {
            self.settle_until = None;
        }

        if !(self.one_shot || self.animating || self.settle_until.is_some()) {
            self.last_frame = None;
            return FrameTick {
                render: false,
                again: false,
            };
        }

        if let Some(last) = self.last_frame {
            let delta = ts - last;
            if delta < FRAME_INTERVAL_MS {
                // Too soon: skip this one, keep the loop alive
                self.pending = true;
                return FrameTick {
                    render: false,
                    again: true,
                };
            }
            self.last_frame = Some(ts - delta % FRAME_INTERVAL_MS);
        } else {
            self.last_frame = Some(ts);
        }

        self.one_shot = false;
        let again = self.animating || self.settle_until.is_some();
        self.pending = again;
        if !again {
            self.last_frame = None;
        }
        FrameTick { render: true, again }
    }

    /// Drop every reason to render. The host's outstanding callback will
    /// find nothing to do and stop.
    pub fn cancel(&mut self) {
        *self = FrameScheduler {
            pending: self.pending,
            ..FrameScheduler::default()
        };
    }
}

/// Fixed-period timer polled by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IntervalTimer {
    period: Option<f64>,
    next_due: Option<f64>,
}

impl IntervalTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, period_ms: f64, now: f64) {
        self.period = Some(period_ms);
        self.next_due = Some(now + period_ms);
    }

    pub fn stop(&mut self) {
        self.period = None;
        self.next_due = None;
    }

    /// Start with `period_ms`, or stop when it is `None`.
    pub fn restart(&mut self, period_ms: Option<f64>, now: f64) {
        match period_ms {
            Some(period) if period > 0.0 => self.start(period, now),
            _ => self.stop(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.period.is_some()
    }

    pub fn period(&self) -> Option<f64> {
        self.period
    }

    /// Whether the timer fired since the last poll. Missed periods collapse
    /// into one firing.
    pub fn poll(&mut self, now: f64) -> bool {
        let (Some(period), Some(due)) = (self.period, self.next_due) else {
            return false;
        };
        if now < due {
            return false;
        }
        let missed = ((now - due) / period).floor() + 1.0;
        self.next_due = Some(due + missed * period);
        true
    }
}
