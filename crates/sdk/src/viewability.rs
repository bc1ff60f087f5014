//! Ad slot viewability
//!
//! Tracks how long each registered ad slot has actually been on screen.
//! The host reports visibility transitions (a slot counts as viewed at
//! half on-screen or more); the registry keeps per-slot timers that
//! reset with every heartbeat.

use chrono::Utc;
use parking_lot::Mutex;

use beacon_core::context::SlotMetrics;

/// Minimum on-screen share for a slot to count as in view, in percent.
pub const AD_IN_VIEW_PERCENTAGE: u32 = 50;

/// Registered ad slots and their viewability timers.
#[derive(Debug, Default)]
pub struct SlotRegistry {
    slots: Mutex<Vec<SlotMetrics>>,
}

impl SlotRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a slot. A slot id already present is left untouched.
    pub fn register(&self, slot_id: &str, slot_size: &str, ad_unit_path: Option<&str>) {
        let mut slots = self.slots.lock();
        if slots.iter().any(|slot| slot.slot_id == slot_id) {
            return;
        }
        slots.push(SlotMetrics {
            slot_id: slot_id.to_string(),
            slot_size: slot_size.to_string(),
            ad_unit_path: ad_unit_path.map(str::to_string),
            ..SlotMetrics::default()
        });
    }

    /// The host reports a slot crossing into view.
    pub fn slot_in_view(&self, slot_id: &str, slot_size: Option<&str>) {
        self.slot_in_view_at(slot_id, slot_size, now_secs());
    }

    fn slot_in_view_at(&self, slot_id: &str, slot_size: Option<&str>, now: u64) {
        let mut slots = self.slots.lock();
        for slot in slots.iter_mut().filter(|s| s.slot_id == slot_id) {
            slot.visible_on_start = true;
            slot.ad_was_viewed = true;
            if let Some(size) = slot_size {
                slot.slot_size = size.to_string();
            }
            update_slot_timer(slot, now);
        }
    }

    /// The host reports a slot leaving view.
    pub fn slot_out_of_view(&self, slot_id: &str) {
        let mut slots = self.slots.lock();
        for slot in slots.iter_mut().filter(|s| s.slot_id == slot_id) {
            slot.visible_on_start = false;
            slot.last_view_started = 0;
            slot.last_hover_started = 0;
        }
    }

    /// The page went hidden: stop visible timers so hidden time never
    /// counts.
    pub fn on_hidden(&self) {
        let mut slots = self.slots.lock();
        for slot in slots.iter_mut().filter(|s| s.visible_on_start) {
            slot.last_view_started = 0;
        }
    }

    /// The page became visible again: restart timers for slots that
    /// were visible.
    pub fn on_visible(&self) {
        self.on_visible_at(now_secs());
    }

    fn on_visible_at(&self, now: u64) {
        let mut slots = self.slots.lock();
        for slot in slots.iter_mut().filter(|s| s.visible_on_start) {
            slot.last_view_started = now;
        }
    }

    /// Fold running timers into the totals, ahead of a snapshot.
    pub fn update_timers(&self) {
        self.update_timers_at(now_secs());
    }

    fn update_timers_at(&self, now: u64) {
        let mut slots = self.slots.lock();
        for slot in slots.iter_mut().filter(|s| s.visible_on_start) {
            update_slot_timer(slot, now);
        }
    }

    /// Clear per-interval metrics after a heartbeat.
    pub fn reset_metrics(&self) {
        let mut slots = self.slots.lock();
        for slot in slots.iter_mut() {
            slot.total_view_time = 0;
            slot.total_hover_time = 0;
            slot.ad_was_viewed = false;
        }
    }

    /// Current metrics for all registered slots.
    #[must_use]
    pub fn snapshot(&self) -> Vec<SlotMetrics> {
        self.slots.lock().clone()
    }
}

fn now_secs() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

/// Add the time since the timer started to the total and restart it.
fn update_slot_timer(slot: &mut SlotMetrics, now: u64) {
    if slot.last_view_started > 0 {
        slot.total_view_time += now.saturating_sub(slot.last_view_started);
    }
    slot.last_view_started = now;
}
