use chrono::{DateTime, FixedOffset, Local, Offset, Utc};

/// Source of wall-clock time for a board session.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;

    /// Offset used to interpret time-of-day values and to draw the clock.
    fn local_offset(&self) -> FixedOffset;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn local_offset(&self) -> FixedOffset {
        Local::now().offset().fix()
    }
}

/// A clock that advances with tokio's time, so paused-time tests move it too.
#[derive(Debug, Clone)]
pub struct TokioClock {
    base: DateTime<Utc>,
    started: tokio::time::Instant,
    offset: FixedOffset,
}

impl TokioClock {
    pub fn new(base: DateTime<Utc>, offset: FixedOffset) -> Self {
        TokioClock {
            base,
            started: tokio::time::Instant::now(),
            offset,
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = tokio::time::Instant::now() - self.started;
        self.base + chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero())
    }

    fn local_offset(&self) -> FixedOffset {
        self.offset
    }
}
