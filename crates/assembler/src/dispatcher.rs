use std::collections::VecDeque;

use duet_script::{Segment, Speaker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneState {
    Idle,
    Active(u64),
}

#[derive(Debug)]
struct Lane {
    state: LaneState,
    queue: VecDeque<Segment>,
}

/// Per-lane flow control: each lane has at most one segment in synthesis.
///
/// Lanes advance independently; the assembly order is restored downstream
/// by the reorder buffer, not here.
#[derive(Debug)]
pub struct SegmentDispatcher {
    lanes: [Lane; 2],
    total: usize,
    completed: usize,
    script_complete_sent: bool,
}

impl SegmentDispatcher {
    pub fn new(segments: Vec<Segment>) -> Self {
        let total = segments.len();
        let (a, b): (VecDeque<_>, VecDeque<_>) =
            segments.into_iter().partition(|s| s.speaker == Speaker::A);

        Self {
            lanes: [
                Lane {
                    state: LaneState::Idle,
                    queue: a,
                },
                Lane {
                    state: LaneState::Idle,
                    queue: b,
                },
            ],
            total,
            completed: 0,
            script_complete_sent: false,
        }
    }

    fn lane(&self, speaker: Speaker) -> &Lane {
        match speaker {
            Speaker::A => &self.lanes[0],
            Speaker::B => &self.lanes[1],
        }
    }

    fn lane_mut(&mut self, speaker: Speaker) -> &mut Lane {
        match speaker {
            Speaker::A => &mut self.lanes[0],
            Speaker::B => &mut self.lanes[1],
        }
    }

    pub fn lane_state(&self, speaker: Speaker) -> LaneState {
        self.lane(speaker).state
    }

    pub fn active_segment(&self, speaker: Speaker) -> Option<u64> {
        match self.lane(speaker).state {
            LaneState::Active(index) => Some(index),
            LaneState::Idle => None,
        }
    }

    pub fn active_segments(&self) -> Vec<u64> {
        Speaker::ALL
            .iter()
            .filter_map(|&s| self.active_segment(s))
            .collect()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Release the head of the lane's queue if the lane is idle.
    pub fn dispatch_next(&mut self, speaker: Speaker) -> Option<Segment> {
        let lane = self.lane_mut(speaker);
        if lane.state != LaneState::Idle {
            return None;
        }

        let segment = lane.queue.pop_front()?;
        lane.state = LaneState::Active(segment.index);
        tracing::info!(lane = %speaker, segment_index = segment.index, text = %segment.text, "segment_dispatched");
        Some(segment)
    }

    /// Acknowledge the lane's in-flight segment and release its next one.
    ///
    /// A mismatching `reported` index is logged but the active segment is
    /// still retired; stalling the lane here would deadlock the script.
    pub fn complete(&mut self, speaker: Speaker, reported: Option<u64>) -> Option<Segment> {
        match self.lane(speaker).state {
            LaneState::Idle => {
                tracing::warn!(lane = %speaker, ?reported, "completion_without_active_segment");
            }
            LaneState::Active(active) => {
                if let Some(reported) = reported
                    && reported != active
                {
                    tracing::warn!(
                        lane = %speaker,
                        reported,
                        active,
                        "completion_index_mismatch"
                    );
                }
                self.lane_mut(speaker).state = LaneState::Idle;
                self.completed += 1;
                tracing::debug!(
                    lane = %speaker,
                    segment_index = active,
                    completed = self.completed,
                    total = self.total,
                    "segment_completed"
                );
            }
        }

        self.dispatch_next(speaker)
    }

    pub fn is_finished(&self) -> bool {
        self.completed >= self.total
            && self
                .lanes
                .iter()
                .all(|l| l.state == LaneState::Idle && l.queue.is_empty())
    }

    /// Returns `true` exactly once, the first time the script is finished.
    pub fn take_script_complete(&mut self) -> bool {
        if self.script_complete_sent || !self.is_finished() {
            return false;
        }
        self.script_complete_sent = true;
        tracing::info!(total = self.total, "script_complete");
        true
    }
}
