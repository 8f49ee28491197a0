// src/scheduler.rs - Per-display-frame tick scheduling
//
// The host (the egui update callback) fires the link once per rendered frame.
// A tick only runs if its token is still pending at that moment.

/// Handle for one requested tick. Not `Clone`: whoever holds it owns the tick.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "dropping a TickToken loses the ability to cancel the tick"]
pub struct TickToken {
    id: u64,
}

impl TickToken {
    pub fn id(&self) -> u64 {
        self.id
    }
}

#[derive(Debug, Default)]
pub struct DisplayLink {
    next_id: u64,
    pending: Option<u64>,
    fired: u64,
}

impl DisplayLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a tick on the next display frame. At most one tick is pending;
    /// a new request supersedes the old one.
    pub fn request_tick(&mut self) -> TickToken {
        self.next_id += 1;
        self.pending = Some(self.next_id);
        TickToken { id: self.next_id }
    }

    /// Returns true if the tick was still pending.
    pub fn cancel(&mut self, token: TickToken) -> bool {
        if self.pending == Some(token.id) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    /// Called by the host once per display frame. Consumes the token if it is
    /// the pending tick.
    pub fn fire(&mut self, token: &TickToken) -> bool {
        if self.pending == Some(token.id) {
            self.pending = None;
            self.fired += 1;
            true
        } else {
            false
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn fired_count(&self) -> u64 {
        self.fired
    }
}
