/*!
 * Scheduler Policy Management
 * Runtime switching between priority and FCFS ordering
 */

use super::Scheduler;
use crate::process::types::SchedulingPolicy;
use log::info;

impl Scheduler {
    /// Change scheduling policy, re-homing every ready process into a
    /// freshly ordered queue
    pub fn set_policy(&self, new_policy: SchedulingPolicy) {
        let mut state = self.state.lock();
        let current_policy = state.ready.policy();
        if new_policy == current_policy {
            return;
        }

        let moved = state.ready.rehome(new_policy);
        info!(
            "Scheduling policy changed from {:?} to {:?} ({} ready processes re-homed)",
            current_policy, new_policy, moved
        );
    }

    /// Get current scheduling policy
    pub fn policy(&self) -> SchedulingPolicy {
        self.state.lock().ready.policy()
    }
}
