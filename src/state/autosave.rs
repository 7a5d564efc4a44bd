/// Debounced autosave
///
/// Every text edit schedules a delayed write keyed by note id. A new
/// edit on the same note supersedes the earlier one: the earlier
/// ticket goes stale and firing it does nothing. The UI turns each
/// ticket into a timer task; `flush` empties the queue on profile
/// switch and exit.
use std::collections::HashMap;
use std::time::Duration;

/// Handle for one scheduled write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub note_id: String,
    generation: u64,
}

#[derive(Debug)]
pub struct Autosave {
    delay: Duration,
    pending: HashMap<String, u64>,
    next_generation: u64,
}

impl Autosave {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: HashMap::new(),
            next_generation: 0,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule (or reschedule) a write for `note_id`
    pub fn schedule(&mut self, note_id: &str) -> Ticket {
        self.next_generation += 1;
        self.pending.insert(note_id.to_string(), self.next_generation);
        Ticket {
            note_id: note_id.to_string(),
            generation: self.next_generation,
        }
    }

    /// Consume a fired ticket. True when it is still the latest one
    /// for its note, meaning the write should happen now.
    pub fn fire(&mut self, ticket: &Ticket) -> bool {
        match self.pending.get(&ticket.note_id) {
            Some(&generation) if generation == ticket.generation => {
                self.pending.remove(&ticket.note_id);
                true
            }
            _ => false,
        }
    }

    /// Put a note back in the queue after its write failed
    pub fn keep_pending(&mut self, note_id: &str) {
        self.schedule(note_id);
    }

    pub fn is_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Cancel everything pending; true if anything was
    pub fn take_all(&mut self) -> bool {
        let had_pending = self.is_pending();
        self.pending.clear();
        had_pending
    }
}
