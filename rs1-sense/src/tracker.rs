//! Multi-target tracker: association, lifecycle and divergence recovery.
//!
//! Tracks live in a fixed pool of [`MAX_TRACKS`] slots; iteration and
//! reporting are in slot order for determinism. Each frame runs
//! predict → gate → greedy associate → update → spawn/miss bookkeeping.
//! The Kalman machinery comes from `rs1-tracking` / `adskalman`; the update
//! uses the Joseph form so the covariance stays symmetric positive.

use adskalman::{
    CovarianceUpdateMethod, ObservationModel as _, StateAndCovariance,
    TransitionModelLinearNoControl as _,
};
use nalgebra::core::dimension::{U2, U4};
use nalgebra::{OMatrix, OVector};
use tracing::{debug, trace};

use rs1_tracking::{ConstantVelocity2DModel, PositionObservationModel};
use rs1_types::{DetectionFrame, MyFloat, TrackReport, TrackState, TrackingParams, MAX_TARGETS};

/// More than the radar's 3-target bound, to tolerate brief double-reports
/// during handoffs.
pub const MAX_TRACKS: usize = 8;

#[derive(Debug, Clone)]
struct TrackSlot {
    id: u32,
    state: TrackState,
    estimate: StateAndCovariance<MyFloat, U4>,
    consecutive_hits: u16,
    consecutive_misses: u16,
    occluded_frames: u16,
    confidence: u8,
    last_update_ms: u32,
    /// Most recent accepted measurement, the divergence-reset anchor.
    last_measurement: (MyFloat, MyFloat),
}

impl TrackSlot {
    fn report(&self) -> TrackReport {
        let s = self.estimate.state();
        TrackReport {
            id: self.id,
            state: self.state,
            x_mm: s[0],
            y_mm: s[1],
            vx_mm_s: s[2],
            vy_mm_s: s[3],
            consecutive_hits: self.consecutive_hits,
            consecutive_misses: self.consecutive_misses,
            confidence: self.confidence,
            last_update_ms: self.last_update_ms,
        }
    }
}

pub struct Tracker {
    params: TrackingParams,
    motion: ConstantVelocity2DModel,
    observation: PositionObservationModel,
    slots: [Option<TrackSlot>; MAX_TRACKS],
    next_id: u32,
    last_frame_ms: Option<u32>,
    divergence_resets: u32,
    confirmed_total: u32,
    reports: [TrackReport; MAX_TRACKS],
    report_len: usize,
}

/// NaN/Inf state, a negative variance or a near-singular covariance all
/// count as divergence.
fn estimate_is_sane(epsilon: MyFloat, estimate: &StateAndCovariance<MyFloat, U4>) -> bool {
    let s = estimate.state();
    if !(s[0].is_finite() && s[1].is_finite() && s[2].is_finite() && s[3].is_finite()) {
        return false;
    }
    let p = estimate.covariance();
    for i in 0..4 {
        if !p[(i, i)].is_finite() || p[(i, i)] < 0.0 {
            return false;
        }
    }
    p.determinant().abs() >= epsilon
}

const EMPTY_REPORT: TrackReport = TrackReport {
    id: 0,
    state: TrackState::Retired,
    x_mm: 0.0,
    y_mm: 0.0,
    vx_mm_s: 0.0,
    vy_mm_s: 0.0,
    consecutive_hits: 0,
    consecutive_misses: 0,
    confidence: 0,
    last_update_ms: 0,
};

impl Tracker {
    pub fn new(params: TrackingParams) -> Self {
        let motion =
            ConstantVelocity2DModel::new(params.process_noise_pos, params.process_noise_vel);
        let observation =
            PositionObservationModel::new(params.observation_std_x_mm, params.observation_std_y_mm);
        Tracker {
            params,
            motion,
            observation,
            slots: std::array::from_fn(|_| None),
            next_id: 0,
            last_frame_ms: None,
            divergence_resets: 0,
            confirmed_total: 0,
            reports: [EMPTY_REPORT; MAX_TRACKS],
            report_len: 0,
        }
    }

    /// Lifetime count of in-place numerical recoveries.
    pub fn divergence_resets(&self) -> u32 {
        self.divergence_resets
    }

    /// Lifetime count of tentative→confirmed transitions.
    pub fn confirmed_total(&self) -> u32 {
        self.confirmed_total
    }

    /// Current tracks in slot order, refreshed by the last `process_frame`.
    pub fn reports(&self) -> &[TrackReport] {
        &self.reports[..self.report_len]
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn initial_covariance(&self) -> OMatrix<MyFloat, U4, U4> {
        let pos = self.params.initial_position_std_mm * self.params.initial_position_std_mm;
        let vel = self.params.initial_vel_std_mm_s * self.params.initial_vel_std_mm_s;
        let mut covariance = OMatrix::<MyFloat, U4, U4>::identity() * pos;
        covariance[(2, 2)] = vel;
        covariance[(3, 3)] = vel;
        covariance
    }

    /// Gate radius for the given prediction interval.
    fn gate_mm(&self, dt: MyFloat) -> MyFloat {
        self.params.gate_base_mm + self.params.gate_max_speed_mm_s * dt
    }

    /// In-place recovery from numerical divergence: re-anchor on the most
    /// recent accepted measurement with a fresh inflated covariance.
    fn reset_diverged(&mut self, slot_idx: usize) {
        let fresh_covariance = self.initial_covariance();
        if let Some(slot) = self.slots[slot_idx].as_mut() {
            let (x, y) = slot.last_measurement;
            slot.estimate = StateAndCovariance::new(
                OVector::<MyFloat, U4>::new(x, y, 0.0, 0.0),
                fresh_covariance,
            );
            self.divergence_resets += 1;
            debug!(track = slot.id, "divergence reset");
        }
    }

    /// Run one detection frame through the tracker.
    ///
    /// Returns true when any track changed state this frame (hit, miss,
    /// spawn, retirement, or lifecycle transition).
    pub fn process_frame(&mut self, frame: &DetectionFrame) -> bool {
        let now = frame.timestamp_ms;
        let dt = match self.last_frame_ms {
            Some(last) => {
                let raw = now.wrapping_sub(last) as MyFloat / 1000.0;
                raw.clamp(self.params.dt_min_s, self.params.dt_max_s)
            }
            None => self.params.dt_min_s,
        };
        self.last_frame_ms = Some(now);

        let mut changed = false;

        // Predict.
        let motion_model = self.motion.calc_for_dt(dt);
        for idx in 0..MAX_TRACKS {
            let needs_reset = if let Some(slot) = self.slots[idx].as_mut() {
                slot.estimate = motion_model.predict(&slot.estimate);
                !estimate_is_sane(self.params.covariance_epsilon, &slot.estimate)
            } else {
                false
            };
            if needs_reset {
                self.reset_diverged(idx);
                changed = true;
            }
        }

        // Collect valid detections (at most MAX_TARGETS).
        let mut dets = [(0.0, 0.0); MAX_TARGETS];
        let mut n_dets = 0usize;
        for d in frame.valid_targets() {
            dets[n_dets] = (d.x_mm as MyFloat, d.y_mm as MyFloat);
            n_dets += 1;
        }

        // Gate + greedy nearest-neighbour association, ascending distance,
        // lower track id on ties.
        let gate = self.gate_mm(dt);
        let mut det_assigned = [false; MAX_TARGETS];
        let mut slot_assigned = [false; MAX_TRACKS];
        loop {
            let mut best: Option<(usize, usize, MyFloat, u32)> = None;
            for (slot_idx, slot) in self.slots.iter().enumerate() {
                let Some(slot) = slot.as_ref() else { continue };
                if slot_assigned[slot_idx] {
                    continue;
                }
                let s = slot.estimate.state();
                for (det_idx, &(dx, dy)) in dets[..n_dets].iter().enumerate() {
                    if det_assigned[det_idx] {
                        continue;
                    }
                    let dist = ((s[0] - dx).powi(2) + (s[1] - dy).powi(2)).sqrt();
                    if dist > gate {
                        continue;
                    }
                    let better = match best {
                        None => true,
                        Some((_, _, best_dist, best_id)) => {
                            dist < best_dist || (dist == best_dist && slot.id < best_id)
                        }
                    };
                    if better {
                        best = Some((slot_idx, det_idx, dist, slot.id));
                    }
                }
            }
            let Some((slot_idx, det_idx, dist, _)) = best else {
                break;
            };
            slot_assigned[slot_idx] = true;
            det_assigned[det_idx] = true;
            trace!(slot = slot_idx, det = det_idx, dist, "associated");
            self.update_slot(slot_idx, dets[det_idx], now);
            changed = true;
        }

        // Misses.
        for idx in 0..MAX_TRACKS {
            let retire = {
                let Some(slot) = self.slots[idx].as_mut() else {
                    continue;
                };
                if slot_assigned[idx] {
                    continue;
                }
                match slot.state {
                    TrackState::Tentative => {
                        // Unconfirmed and already gone again: drop at once.
                        trace!(track = slot.id, "tentative drop");
                        true
                    }
                    TrackState::Confirmed | TrackState::Occluded => {
                        slot.state = TrackState::Occluded;
                        slot.consecutive_hits = 0;
                        slot.consecutive_misses += 1;
                        slot.occluded_frames += 1;
                        slot.confidence = slot.confidence.saturating_sub(15);
                        slot.consecutive_misses > self.params.m_drop
                            || slot.occluded_frames > self.params.occlusion_timeout_frames
                    }
                    TrackState::Retired => true,
                }
            };
            if retire {
                if let Some(slot) = self.slots[idx].take() {
                    debug!(track = slot.id, "retired");
                }
            }
            changed = true;
        }

        // Spawn tentative tracks for unmatched detections.
        for det_idx in 0..n_dets {
            if det_assigned[det_idx] {
                continue;
            }
            let Some(free) = self.slots.iter().position(|s| s.is_none()) else {
                trace!("track pool full, detection ignored");
                break;
            };
            let (x, y) = dets[det_idx];
            let id = self.next_id();
            let covariance = self.initial_covariance();
            self.slots[free] = Some(TrackSlot {
                id,
                state: TrackState::Tentative,
                estimate: StateAndCovariance::new(
                    OVector::<MyFloat, U4>::new(x, y, 0.0, 0.0),
                    covariance,
                ),
                consecutive_hits: 1,
                consecutive_misses: 0,
                occluded_frames: 0,
                confidence: 20,
                last_update_ms: now,
                last_measurement: (x, y),
            });
            trace!(track = id, x, y, "spawned tentative");
            changed = true;
        }

        self.refresh_reports();
        changed
    }

    fn update_slot(&mut self, slot_idx: usize, z: (MyFloat, MyFloat), now: u32) {
        let mut diverged = false;
        let mut confirmed_now = false;
        {
            let observation = &self.observation;
            let n_confirm = self.params.n_confirm;
            let slot = self.slots[slot_idx].as_mut().unwrap();
            let measurement = OVector::<MyFloat, U2>::new(z.0, z.1);
            match observation.update(
                &slot.estimate,
                &measurement,
                CovarianceUpdateMethod::JosephForm,
            ) {
                Ok(posterior) => slot.estimate = posterior,
                Err(_) => diverged = true,
            }
            slot.last_measurement = z;
            slot.last_update_ms = now;
            slot.consecutive_misses = 0;
            slot.occluded_frames = 0;
            slot.consecutive_hits = slot.consecutive_hits.saturating_add(1);
            slot.confidence = (slot.confidence + 15).min(100);
            match slot.state {
                TrackState::Tentative if slot.consecutive_hits >= n_confirm => {
                    slot.state = TrackState::Confirmed;
                    confirmed_now = true;
                    debug!(track = slot.id, "confirmed");
                }
                TrackState::Occluded => {
                    slot.state = TrackState::Confirmed;
                }
                _ => {}
            }
        }
        if confirmed_now {
            self.confirmed_total += 1;
        }
        if diverged
            || !estimate_is_sane(
                self.params.covariance_epsilon,
                &self.slots[slot_idx].as_ref().unwrap().estimate,
            )
        {
            self.reset_diverged(slot_idx);
        }
    }

    fn refresh_reports(&mut self) {
        self.report_len = 0;
        for slot in self.slots.iter().flatten() {
            self.reports[self.report_len] = slot.report();
            self.report_len += 1;
        }
    }

    #[cfg(test)]
    fn corrupt_track_for_test(&mut self, report_idx: usize) {
        let id = self.reports[report_idx].id;
        for slot in self.slots.iter_mut().flatten() {
            if slot.id == id {
                slot.estimate = StateAndCovariance::new(
                    OVector::<MyFloat, U4>::new(MyFloat::NAN, 0.0, 0.0, 0.0),
                    OMatrix::<MyFloat, U4, U4>::identity(),
                );
            }
        }
    }
}
