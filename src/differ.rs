// Change detection: per-section snapshot signatures

use crate::models::{Bin, Event};

/// Reserved signature: no admin key is stored, the event pane shows the
/// key prompt.
pub const SIG_EVENTS_LOCKED: &str = "\u{0}events:no-key";

/// Reserved signature: an admin key is stored but the server did not
/// accept it for this snapshot.
pub const SIG_EVENTS_REJECTED: &str = "\u{0}events:key-rejected";

/// Ordered join of each bin's salient fields, in render order. Equality
/// with the previously stored value means the bin table needs no work.
pub fn bin_signature<'a, I>(bins: I) -> String
where
    I: IntoIterator<Item = &'a Bin>,
{
    let mut sig = String::new();
    for b in bins {
        sig.push_str(&b.bin_id);
        sig.push('|');
        sig.push_str(&b.capacity_g.to_string());
        sig.push('|');
        sig.push_str(&b.current_weight_g.to_string());
        sig.push('|');
        sig.push_str(b.last_seen.as_deref().unwrap_or(""));
        sig.push(';');
    }
    sig
}

pub fn event_signature(events: &[Event]) -> String {
    let mut sig = String::new();
    for e in events {
        sig.push_str(e.id.as_deref().unwrap_or(""));
        sig.push('|');
        sig.push_str(&e.bin_id);
        sig.push('|');
        sig.push_str(&e.material);
        sig.push('|');
        sig.push_str(&e.weight_g.to_string());
        sig.push('|');
        sig.push_str(&e.ts);
        sig.push(';');
    }
    sig
}

/// One signature slot per rendered section, invalidated independently.
#[derive(Debug, Default)]
pub struct SectionSignatures {
    bins: Option<String>,
    events: Option<String>,
}

impl SectionSignatures {
    /// Store the new bin-table signature; returns whether the section
    /// changed and must be re-rendered.
    pub fn update_bins(&mut self, sig: String) -> bool {
        let changed = self.bins.as_deref() != Some(sig.as_str());
        self.bins = Some(sig);
        changed
    }

    pub fn update_events(&mut self, sig: String) -> bool {
        let changed = self.events.as_deref() != Some(sig.as_str());
        self.events = Some(sig);
        changed
    }

    /// Threshold or filter edits change ordering/severity without touching
    /// the underlying data, so the stored bin signature no longer proves
    /// the rendered table is current.
    pub fn invalidate_bins(&mut self) {
        self.bins = None;
    }

    pub fn invalidate_events(&mut self) {
        self.events = None;
    }
}
