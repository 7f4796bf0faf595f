use std::ops::Range;
use tracing::warn;
use crate::communication::FrameId;
use super::splitter::ModelBatch;

/// Marks every frame in `positions` invalid.
///
/// The range is clipped to the frames of the unit, so padding positions are
/// ignored. Frames outside the range and their result slots are left untouched.
/// Returns how many frames were newly invalidated.
pub fn mark_invalid(frame_ids: &mut [FrameId], positions: Range<usize>) -> usize {
    let end = positions.end.min(frame_ids.len());
    let start = positions.start.min(end);
    let mut marked = 0;
    for id in frame_ids[start..end].iter_mut() {
        if id.is_valid() {
            *id = FrameId::Invalid;
            marked += 1;
        }
    }
    marked
}

/// Invalidates the real frames of a failed model batch.
pub fn mark_batch_invalid(frame_ids: &mut [FrameId], batch: &ModelBatch, reason: &dyn std::fmt::Display) -> usize {
    let marked = mark_invalid(frame_ids, batch.real());
    warn!(model_batch = batch.index, start = batch.start, marked, %reason, "model batch failed; frames invalidated");
    marked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::split;

    fn ids(count: u32) -> Vec<FrameId> {
        (0..count).map(FrameId::Valid).collect()
    }

    #[test]
    fn test_marking_one_position_leaves_others() {
        let mut frame_ids = ids(5);
        assert_eq!(mark_invalid(&mut frame_ids, 2..3), 1);

        assert_eq!(
            frame_ids,
            vec![
                FrameId::Valid(0),
                FrameId::Valid(1),
                FrameId::Invalid,
                FrameId::Valid(3),
                FrameId::Valid(4),
            ]
        );
    }

    #[test]
    fn test_range_is_clipped_to_real_frames() {
        let mut frame_ids = ids(5);
        assert_eq!(mark_invalid(&mut frame_ids, 4..6), 1);
        assert_eq!(mark_invalid(&mut frame_ids, 9..12), 0);
        assert_eq!(frame_ids.iter().filter(|id| id.is_valid()).count(), 4);
    }

    #[test]
    fn test_marking_twice_counts_once() {
        let mut frame_ids = ids(3);
        assert_eq!(mark_invalid(&mut frame_ids, 0..2), 2);
        assert_eq!(mark_invalid(&mut frame_ids, 0..3), 1);
    }

    #[test]
    fn test_failed_batch_marks_its_window_only() {
        let mut frame_ids = ids(5);
        let batch = split(5, 2).unwrap().nth(1).unwrap();

        assert_eq!(mark_batch_invalid(&mut frame_ids, &batch, &"predict failed"), 2);

        let valid: Vec<bool> = frame_ids.iter().map(FrameId::is_valid).collect();
        assert_eq!(valid, vec![true, true, false, false, true]);
    }
}
