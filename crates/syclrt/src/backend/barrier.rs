//! Work-group barriers.
//!
//! Every lane of a barrier-capable work-group runs on its own thread. In
//! [`BarrierMode::Parallel`] the lanes run freely and meet at each barrier. In
//! [`BarrierMode::Lockstep`] exactly one lane runs at a time: a lane hands its turn to the next
//! runnable lane when it reaches a barrier or finishes, and once every live lane is waiting the
//! next phase starts again from the lowest lane. Lockstep gives the sequential executor the
//! barrier semantics of the parallel one without any two lanes overlapping.

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierMode {
    Parallel,
    Lockstep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LaneStatus {
    Runnable,
    Waiting,
    Done,
}

struct BarrierState {
    live: usize,
    arrived: usize,
    generation: u64,
    turn: usize,
    status: Vec<LaneStatus>,
}

impl BarrierState {
    fn release(&mut self) {
        self.arrived = 0;
        self.generation += 1;
    }

    /// Lockstep only: give the turn to the next runnable lane after `from`, starting a new phase
    /// when every live lane is waiting.
    fn pass_turn(&mut self, from: usize) {
        let lanes = self.status.len();
        let next = (1..=lanes)
            .map(|step| (from + step) % lanes)
            .find(|&lane| self.status[lane] == LaneStatus::Runnable);
        if let Some(lane) = next {
            self.turn = lane;
            return;
        }
        if self.status.contains(&LaneStatus::Waiting) {
            for status in &mut self.status {
                if *status == LaneStatus::Waiting {
                    *status = LaneStatus::Runnable;
                }
            }
            self.generation += 1;
            self.turn = self
                .status
                .iter()
                .position(|&status| status == LaneStatus::Runnable)
                .unwrap_or(0);
        }
    }
}

pub struct GroupBarrier {
    mode: BarrierMode,
    state: Mutex<BarrierState>,
    changed: Condvar,
}

/// Held by a running lane; retires the lane from the barrier when dropped, including on unwind.
pub struct LaneGuard<'a> {
    barrier: &'a GroupBarrier,
    lane: usize,
}

impl Drop for LaneGuard<'_> {
    fn drop(&mut self) {
        self.barrier.retire(self.lane);
    }
}

impl GroupBarrier {
    pub fn new(lanes: usize, mode: BarrierMode) -> Self {
        Self {
            mode,
            state: Mutex::new(BarrierState {
                live: lanes,
                arrived: 0,
                generation: 0,
                turn: 0,
                status: vec![LaneStatus::Runnable; lanes],
            }),
            changed: Condvar::new(),
        }
    }

    pub fn mode(&self) -> BarrierMode {
        self.mode
    }

    /// Barrier phases completed so far.
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Start running `lane`. In lockstep mode this blocks until it is the lane's turn.
    pub fn enter(&self, lane: usize) -> LaneGuard<'_> {
        if self.mode == BarrierMode::Lockstep {
            let mut state = self.state.lock();
            while state.turn != lane {
                self.changed.wait(&mut state);
            }
        }
        LaneGuard { barrier: self, lane }
    }

    /// Block until every live lane of the group has reached the barrier.
    pub fn wait(&self, lane: usize) {
        let mut state = self.state.lock();
        match self.mode {
            BarrierMode::Parallel => {
                let generation = state.generation;
                state.arrived += 1;
                if state.arrived >= state.live {
                    state.release();
                    self.changed.notify_all();
                    return;
                }
                while state.generation == generation {
                    self.changed.wait(&mut state);
                }
            }
            BarrierMode::Lockstep => {
                state.status[lane] = LaneStatus::Waiting;
                state.pass_turn(lane);
                self.changed.notify_all();
                while state.turn != lane {
                    self.changed.wait(&mut state);
                }
            }
        }
    }

    /// Remove `lane` from the group. Later barriers no longer wait for it.
    pub fn retire(&self, lane: usize) {
        let mut state = self.state.lock();
        if state.status[lane] == LaneStatus::Done {
            return;
        }
        state.status[lane] = LaneStatus::Done;
        state.live -= 1;
        match self.mode {
            BarrierMode::Parallel => {
                if state.arrived > 0 && state.arrived >= state.live {
                    state.release();
                }
            }
            BarrierMode::Lockstep => {
                if state.turn == lane {
                    state.pass_turn(lane);
                }
            }
        }
        self.changed.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    fn run_lanes(lanes: usize, mode: BarrierMode, body: impl Fn(usize, &GroupBarrier) + Sync) {
        let barrier = GroupBarrier::new(lanes, mode);
        thread::scope(|s| {
            for lane in 0..lanes {
                let (barrier, body) = (&barrier, &body);
                s.spawn(move || {
                    let _guard = barrier.enter(lane);
                    body(lane, barrier);
                });
            }
        });
    }

    #[test]
    fn parallel_barrier_separates_phases() {
        let log = Arc::new(Mutex::new(Vec::new()));
        run_lanes(4, BarrierMode::Parallel, |lane, barrier| {
            log.lock().push((0, lane));
            barrier.wait(lane);
            log.lock().push((1, lane));
        });
        let log = log.lock();
        let first_phase_end = log.iter().rposition(|&(phase, _)| phase == 0).unwrap_or(0);
        let second_phase_start = log.iter().position(|&(phase, _)| phase == 1).unwrap_or(0);
        assert!(first_phase_end < second_phase_start);
    }

    #[test]
    fn lockstep_runs_lanes_in_turn_per_phase() {
        let log = Mutex::new(Vec::new());
        run_lanes(3, BarrierMode::Lockstep, |lane, barrier| {
            log.lock().push((0, lane));
            barrier.wait(lane);
            log.lock().push((1, lane));
            barrier.wait(lane);
            log.lock().push((2, lane));
        });
        let expected: Vec<_> = (0..3).flat_map(|phase| (0..3).map(move |lane| (phase, lane))).collect();
        assert_eq!(log.into_inner(), expected);
    }

    #[test]
    fn early_exit_does_not_block_the_others() {
        for mode in [BarrierMode::Parallel, BarrierMode::Lockstep] {
            let barrier = GroupBarrier::new(3, mode);
            let passed = Mutex::new(0);
            thread::scope(|s| {
                for lane in 0..3 {
                    let (barrier, passed) = (&barrier, &passed);
                    s.spawn(move || {
                        let _guard = barrier.enter(lane);
                        if lane == 1 {
                            return;
                        }
                        barrier.wait(lane);
                        barrier.wait(lane);
                        *passed.lock() += 1;
                    });
                }
            });
            assert_eq!(passed.into_inner(), 2, "{mode:?}");
        }
    }

    #[test]
    fn single_lane_passes_immediately() {
        for mode in [BarrierMode::Parallel, BarrierMode::Lockstep] {
            let barrier = GroupBarrier::new(1, mode);
            let _guard = barrier.enter(0);
            barrier.wait(0);
            barrier.wait(0);
            assert_eq!(barrier.generation(), 2);
        }
    }
}
