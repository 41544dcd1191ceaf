//! Plausibility filtering of decoded tracking-radar frames.

use rs1_types::{Detection, DetectionFrame, TargetFilterParams};

/// Rejects detections outside the configured range/speed envelope.
///
/// Rejected slots are zeroed (the `!valid ⇒ zero fields` invariant) and the
/// frame's `target_count` is recounted. Rejection is silent; parser stats
/// are not affected.
#[derive(Debug, Clone)]
pub struct TargetFilter {
    params: TargetFilterParams,
}

impl TargetFilter {
    pub fn new(params: TargetFilterParams) -> Self {
        TargetFilter { params }
    }

    pub fn params(&self) -> &TargetFilterParams {
        &self.params
    }

    fn plausible(&self, d: &Detection) -> bool {
        d.y_mm >= self.params.min_range_mm
            && d.y_mm <= self.params.max_range_mm
            && d.x_mm.unsigned_abs() <= self.params.max_abs_x_mm.unsigned_abs()
            && d.speed_cm_s.unsigned_abs() <= self.params.max_speed_cm_s.unsigned_abs()
    }

    pub fn apply(&self, frame: &mut DetectionFrame) {
        for det in frame.targets.iter_mut() {
            if det.valid && !self.plausible(det) {
                *det = Detection::EMPTY;
            }
        }
        frame.recount();
    }
}

impl Default for TargetFilter {
    fn default() -> Self {
        TargetFilter::new(TargetFilterParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(x: i16, y: i16, v: i16) -> Detection {
        Detection {
            x_mm: x,
            y_mm: y,
            speed_cm_s: v,
            resolution_mm: 100,
            signal_quality: 100,
            valid: true,
        }
    }

    #[test]
    fn out_of_range_target_removed() {
        let filter = TargetFilter::default();
        let mut frame = DetectionFrame::default();
        frame.targets[0] = detection(0, 7000, 0);
        frame.recount();
        assert_eq!(frame.target_count, 1);

        filter.apply(&mut frame);
        assert_eq!(frame.target_count, 0);
        assert_eq!(frame.targets[0], Detection::EMPTY);
    }

    #[test]
    fn in_range_targets_survive() {
        let filter = TargetFilter::default();
        let mut frame = DetectionFrame::default();
        frame.targets[0] = detection(-5999, 100, -599);
        frame.targets[2] = detection(2000, 6000, 600);
        frame.recount();

        filter.apply(&mut frame);
        assert_eq!(frame.target_count, 2);
        assert!(frame.targets[0].valid);
        assert!(frame.targets[2].valid);
    }

    #[test]
    fn overspeed_target_removed() {
        let filter = TargetFilter::default();
        let mut frame = DetectionFrame::default();
        frame.targets[1] = detection(0, 1000, 601);
        frame.recount();

        filter.apply(&mut frame);
        assert_eq!(frame.target_count, 0);
    }
}
