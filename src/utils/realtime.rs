//! Real-time setup for the acquisition thread: optional core pinning and max OS priority.
//! Failures are reported and the run continues with default scheduling.

use core_affinity::{get_core_ids, set_for_current};
use thread_priority::{ThreadPriority, set_current_thread_priority};
use log::{info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RealtimeOptions {
    pub core: Option<usize>,
    pub max_priority: bool,
}

/// What was actually applied to the current thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RealtimeStatus {
    pub pinned_core: Option<usize>,
    pub max_priority: bool,
}

pub fn apply_to_current_thread(options: RealtimeOptions) -> RealtimeStatus {
    let mut status = RealtimeStatus::default();

    if let Some(core) = options.core {
        let core_ids = get_core_ids().unwrap_or_default();
        match core_ids.iter().find(|c| c.id == core) {
            Some(core_id) if set_for_current(*core_id) => {
                info!("Acquisition thread pinned to core {}", core);
                status.pinned_core = Some(core);
            }
            Some(_) => warn!("Failed to pin acquisition thread to core {}", core),
            None => warn!("Core {} not found among {} available cores", core, core_ids.len()),
        }
    }

    if options.max_priority {
        match set_current_thread_priority(ThreadPriority::Max) {
            Ok(()) => {
                info!("Acquisition thread running at maximum priority");
                status.max_priority = true;
            }
            Err(e) => warn!("Failed to raise acquisition thread priority: {:?}", e),
        }
    }

    status
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nothing_requested_nothing_applied() {
        assert_eq!(apply_to_current_thread(RealtimeOptions::default()), RealtimeStatus::default());
    }

    #[test]
    fn unknown_core_is_not_fatal() {
        let status = apply_to_current_thread(RealtimeOptions {
            core: Some(usize::MAX),
            max_priority: false,
        });
        assert_eq!(status.pinned_core, None);
    }
}
