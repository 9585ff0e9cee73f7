//! Per-frame decision pipeline: detections + embedding store + zones
//! produce at most one actuation candidate.

use crate::store::EmbeddingStore;
use crate::types::{Detection, DoorState, Rect, UserId, UNKNOWN_USER};
use crate::zone::{ZoneMode, Zones};

/// Outcome of one frame's decision pass.
#[derive(Debug, Clone, Default)]
pub struct FrameDecision {
    /// Matched user id per detection, in detector output order.
    /// Strangers get the sentinel id.
    pub recognized: Vec<UserId>,
    /// Face boxes, in the same order as `recognized`.
    pub boxes: Vec<Rect>,
    /// Actuation candidate. When several matched faces occupy zones in
    /// the same frame, the last one in detector order wins; the system
    /// makes at most one actuation decision per frame.
    pub trigger: Option<(UserId, DoorState)>,
}

/// Decide one frame: match every detection against the store, classify
/// matched faces by zone, and pick the trigger candidate.
///
/// Unmatched detections are still returned for display but are never
/// eligible to open a door.
pub fn decide(
    detections: &[Detection],
    store: &EmbeddingStore,
    threshold: f32,
    zones: &Zones,
    mode: ZoneMode,
) -> FrameDecision {
    let mut decision = FrameDecision {
        recognized: Vec::with_capacity(detections.len()),
        boxes: Vec::with_capacity(detections.len()),
        trigger: None,
    };

    for det in detections {
        let id = store
            .best_match(&det.embedding, threshold)
            .unwrap_or(UNKNOWN_USER);

        if id != UNKNOWN_USER {
            match zones.classify(&det.bbox, mode) {
                DoorState::Closed => {}
                side => decision.trigger = Some((id, side)),
            }
        }

        decision.recognized.push(id);
        decision.boxes.push(det.bbox);
    }

    decision
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Embedding;

    fn store() -> EmbeddingStore {
        EmbeddingStore::from_entries([
            (1, Embedding::new(vec![0.0, 0.0])), // Alice
            (2, Embedding::new(vec![10.0, 0.0])), // Bob
        ])
    }

    fn zones() -> Zones {
        Zones {
            exit: Rect::new(0.0, 0.0, 100.0, 100.0),
            entrance: Rect::new(200.0, 0.0, 300.0, 100.0),
        }
    }

    fn det(cx: f32, cy: f32, embedding: &[f32]) -> Detection {
        Detection {
            bbox: Rect::new(cx - 10.0, cy - 10.0, cx + 10.0, cy + 10.0),
            embedding: Embedding::new(embedding.to_vec()),
        }
    }

    #[test]
    fn test_match_in_exit_zone_triggers() {
        // Distance 0.4 to Alice, 9.6 to Bob, threshold 0.6.
        let detections = vec![det(50.0, 50.0, &[0.4, 0.0])];
        let d = decide(&detections, &store(), 0.6, &zones(), ZoneMode::Center);
        assert_eq!(d.recognized, vec![1]);
        assert_eq!(d.trigger, Some((1, DoorState::Exit)));
    }

    #[test]
    fn test_stranger_never_triggers() {
        let detections = vec![det(50.0, 50.0, &[5.0, 5.0])];
        let d = decide(&detections, &store(), 0.6, &zones(), ZoneMode::Center);
        assert_eq!(d.recognized, vec![UNKNOWN_USER]);
        assert_eq!(d.trigger, None);
    }

    #[test]
    fn test_match_outside_zones_is_display_only() {
        let detections = vec![det(150.0, 50.0, &[0.1, 0.0])];
        let d = decide(&detections, &store(), 0.6, &zones(), ZoneMode::Center);
        assert_eq!(d.recognized, vec![1]);
        assert_eq!(d.trigger, None);
    }

    #[test]
    fn test_last_candidate_wins() {
        // Alice in the exit zone, then Bob in the entrance zone.
        let detections = vec![
            det(50.0, 50.0, &[0.1, 0.0]),
            det(250.0, 50.0, &[10.1, 0.0]),
        ];
        let d = decide(&detections, &store(), 0.6, &zones(), ZoneMode::Center);
        assert_eq!(d.recognized, vec![1, 2]);
        assert_eq!(d.trigger, Some((2, DoorState::Entrance)));
    }

    #[test]
    fn test_output_preserves_detection_order() {
        let detections = vec![
            det(250.0, 50.0, &[10.0, 0.0]), // Bob, entrance
            det(150.0, 50.0, &[7.0, 7.0]),  // stranger, no zone
            det(50.0, 50.0, &[0.0, 0.0]),   // Alice, exit
        ];
        let d = decide(&detections, &store(), 0.6, &zones(), ZoneMode::Center);
        assert_eq!(d.recognized, vec![2, UNKNOWN_USER, 1]);
        assert_eq!(d.boxes.len(), 3);
        assert!((d.boxes[0].center().0 - 250.0).abs() < 1e-6);
        assert_eq!(d.trigger, Some((1, DoorState::Exit)));
    }

    #[test]
    fn test_empty_frame() {
        let d = decide(&[], &store(), 0.6, &zones(), ZoneMode::Center);
        assert!(d.recognized.is_empty());
        assert!(d.boxes.is_empty());
        assert_eq!(d.trigger, None);
    }
}
