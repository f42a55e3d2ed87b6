//! Pagination state machine behind the option carousel.

use std::ops::Range;
use std::time::{Duration, Instant};

/// Default length of a slide animation.
pub const DEFAULT_ANIMATION: Duration = Duration::from_millis(300);

/// Default horizontal distance a drag must exceed to change the page.
pub const DEFAULT_DRAG_THRESHOLD: i32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Whether the carousel is accepting navigation.
pub enum Phase {
    /// Ready for the next command.
    Idle,
    /// A slide animation runs until the given instant.
    Transitioning {
        /// End of the running animation.
        until: Instant,
    },
}

#[derive(Debug, Clone)]
/// Minimum viewport widths and the number of items shown from each width upward.
pub struct Breakpoints {
    steps: Vec<(u32, usize)>,
    smallest: usize,
}

impl Breakpoints {
    /// Build a table from `(min_width, items_per_view)` pairs.
    ///
    /// Widths below every step show `smallest` items.
    #[must_use]
    pub fn new(smallest: usize, mut steps: Vec<(u32, usize)>) -> Self {
        steps.sort_by_key(|(min_width, _)| *min_width);
        Self { steps, smallest }
    }

    /// Items per view for a viewport `width`.
    #[must_use]
    pub fn items_per_view(&self, width: u32) -> usize {
        self.steps
            .iter()
            .rev()
            .find(|(min_width, _)| width >= *min_width)
            .map_or(self.smallest, |(_, items)| *items)
            .max(1)
    }
}

impl Default for Breakpoints {
    /// Pixel breakpoints of the web layout: 2 items from 768, 3 from 1024, 4 from 1280.
    fn default() -> Self {
        Self::new(1, vec![(768, 2), (1024, 3), (1280, 4)])
    }
}

#[derive(Debug, Clone)]
/// Visible window over an ordered list of items.
///
/// `0 <= offset <= max_offset` holds after every method. Navigation is
/// dropped, not queued, while a transition is running.
pub struct Carousel {
    offset: usize,
    items_per_view: usize,
    item_count: usize,
    phase: Phase,
    animation: Duration,
    drag_threshold: i32,
}

impl Carousel {
    /// Create a carousel at offset 0 with default animation and drag threshold.
    #[must_use]
    pub fn new(item_count: usize, items_per_view: usize) -> Self {
        Self {
            offset: 0,
            items_per_view: items_per_view.max(1),
            item_count,
            phase: Phase::Idle,
            animation: DEFAULT_ANIMATION,
            drag_threshold: DEFAULT_DRAG_THRESHOLD,
        }
    }

    /// Override the slide animation length.
    #[must_use]
    pub fn with_animation(mut self, animation: Duration) -> Self {
        self.animation = animation;
        self
    }

    /// Override the drag distance needed to change the page.
    #[must_use]
    pub fn with_drag_threshold(mut self, threshold: i32) -> Self {
        self.drag_threshold = threshold.abs();
        self
    }

    /// First visible item.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of items visible at once.
    #[must_use]
    pub fn items_per_view(&self) -> usize {
        self.items_per_view
    }

    /// Number of items in the list.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.item_count
    }

    /// Largest reachable offset.
    #[must_use]
    pub fn max_offset(&self) -> usize {
        self.item_count.saturating_sub(self.items_per_view)
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether an animation is running.
    #[must_use]
    pub fn is_transitioning(&self) -> bool {
        matches!(self.phase, Phase::Transitioning { .. })
    }

    /// Indices of the visible items.
    #[must_use]
    pub fn visible_range(&self) -> Range<usize> {
        let end = (self.offset + self.items_per_view).min(self.item_count);
        self.offset..end
    }

    /// Whether the previous control should be enabled.
    #[must_use]
    pub fn can_prev(&self) -> bool {
        !self.is_transitioning() && self.offset > 0
    }

    /// Whether the next control should be enabled.
    #[must_use]
    pub fn can_next(&self) -> bool {
        !self.is_transitioning() && self.offset < self.max_offset()
    }

    /// Number of distinct scroll positions.
    #[must_use]
    pub fn snap_count(&self) -> usize {
        self.max_offset() + 1
    }

    /// Index of the current scroll position among [`Self::snap_count`].
    #[must_use]
    pub fn selected_snap(&self) -> usize {
        self.offset
    }

    /// Controls are only worth showing with more than one position.
    #[must_use]
    pub fn show_controls(&self) -> bool {
        self.snap_count() > 1
    }

    /// Fraction of the list scrolled through, in `(0, 1]`.
    #[must_use]
    #[expect(clippy::cast_precision_loss, reason = "snap counts are tiny")]
    pub fn progress(&self) -> f64 {
        let snaps = self.snap_count();
        if snaps <= 1 {
            return 1.0;
        }
        (self.selected_snap() + 1) as f64 / snaps as f64
    }

    /// Advance one item.
    pub fn next(&mut self, now: Instant) -> bool {
        if self.is_transitioning() || self.offset >= self.max_offset() {
            return false;
        }
        self.begin(self.offset + 1, now);
        true
    }

    /// Go back one item.
    pub fn prev(&mut self, now: Instant) -> bool {
        if self.is_transitioning() || self.offset == 0 {
            return false;
        }
        self.begin(self.offset - 1, now);
        true
    }

    /// Move to `index`, clamped into `0..=max_offset`.
    pub fn jump_to(&mut self, index: usize, now: Instant) -> bool {
        let target = index.min(self.max_offset());
        if self.is_transitioning() || target == self.offset {
            return false;
        }
        self.begin(target, now);
        true
    }

    /// Finish a drag that moved the pointer `delta` pixels horizontally.
    ///
    /// Dragging toward the start (negative delta) reveals the next items.
    pub fn drag_end(&mut self, delta: i32, now: Instant) -> bool {
        if delta.unsigned_abs() <= self.drag_threshold.unsigned_abs() {
            return false;
        }
        if delta < 0 {
            self.next(now)
        } else {
            self.prev(now)
        }
    }

    /// React to a new number of visible items. Never starts a transition.
    pub fn viewport_changed(&mut self, items_per_view: usize) {
        self.items_per_view = items_per_view.max(1);
        self.clamp();
    }

    /// React to a new item count. Never starts a transition.
    pub fn items_changed(&mut self, item_count: usize) {
        self.item_count = item_count;
        self.clamp();
    }

    /// Return to idle once the running animation is over.
    pub fn tick(&mut self, now: Instant) {
        if let Phase::Transitioning { until } = self.phase
            && now >= until
        {
            self.phase = Phase::Idle;
        }
    }

    fn begin(&mut self, target: usize, now: Instant) {
        self.offset = target.min(self.max_offset());
        self.phase = Phase::Transitioning {
            until: now + self.animation,
        };
    }

    fn clamp(&mut self) {
        self.offset = self.offset.min(self.max_offset());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settle(carousel: &mut Carousel, now: &mut Instant) {
        *now += DEFAULT_ANIMATION;
        carousel.tick(*now);
    }

    #[test]
    fn next_walks_to_max_offset_and_stops() {
        let mut now = Instant::now();
        let mut carousel = Carousel::new(6, 3);
        assert_eq!(carousel.max_offset(), 3);

        let mut offsets = Vec::new();
        for _ in 0..3 {
            assert!(carousel.next(now));
            offsets.push(carousel.offset());
            settle(&mut carousel, &mut now);
        }
        assert_eq!(offsets, vec![1, 2, 3]);

        assert!(!carousel.next(now));
        assert_eq!(carousel.offset(), 3);
        assert!(!carousel.can_next());
        assert!(carousel.can_prev());
    }

    #[test]
    fn commands_during_transition_are_dropped() {
        let mut now = Instant::now();
        let mut carousel = Carousel::new(6, 2);

        assert!(carousel.next(now));
        assert!(carousel.is_transitioning());
        assert!(!carousel.next(now));
        assert!(!carousel.prev(now));
        assert!(!carousel.jump_to(4, now));
        assert_eq!(carousel.offset(), 1);

        carousel.tick(now + Duration::from_millis(100));
        assert!(carousel.is_transitioning());
        settle(&mut carousel, &mut now);
        assert_eq!(carousel.phase(), Phase::Idle);
        assert!(carousel.next(now));
        assert_eq!(carousel.offset(), 2);
    }

    #[test]
    fn prev_is_guarded_at_zero() {
        let now = Instant::now();
        let mut carousel = Carousel::new(4, 2);
        assert!(!carousel.prev(now));
        assert!(!carousel.can_prev());
        assert_eq!(carousel.phase(), Phase::Idle);
    }

    #[test]
    fn jump_to_clamps_into_range() {
        let now = Instant::now();
        let mut carousel = Carousel::new(5, 2);
        assert!(carousel.jump_to(99, now));
        assert_eq!(carousel.offset(), 3);
        assert_eq!(carousel.visible_range(), 3..5);
    }

    #[test]
    fn drag_needs_to_exceed_threshold() {
        let mut now = Instant::now();
        let mut carousel = Carousel::new(5, 1);

        assert!(!carousel.drag_end(-DEFAULT_DRAG_THRESHOLD, now));
        assert!(carousel.drag_end(-80, now));
        assert_eq!(carousel.offset(), 1);
        settle(&mut carousel, &mut now);
        assert!(carousel.drag_end(80, now));
        assert_eq!(carousel.offset(), 0);
    }

    #[test]
    fn viewport_change_clamps_without_transition() {
        let now = Instant::now();
        let mut carousel = Carousel::new(6, 1);
        assert!(carousel.jump_to(5, now));
        carousel.tick(now + DEFAULT_ANIMATION);

        carousel.viewport_changed(4);
        assert_eq!(carousel.max_offset(), 2);
        assert_eq!(carousel.offset(), 2);
        assert_eq!(carousel.phase(), Phase::Idle);

        carousel.viewport_changed(10);
        assert_eq!(carousel.offset(), 0);
        assert!(!carousel.show_controls());
        assert!((carousel.progress() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_items_per_view_is_treated_as_one() {
        let mut carousel = Carousel::new(3, 0);
        assert_eq!(carousel.items_per_view(), 1);
        carousel.items_changed(0);
        assert_eq!(carousel.max_offset(), 0);
        assert_eq!(carousel.visible_range(), 0..0);
    }

    #[test]
    fn offset_stays_in_bounds_for_mixed_events() {
        let mut now = Instant::now();
        let mut carousel = Carousel::new(9, 2);
        let widths = [1, 4, 2, 3, 8, 1, 2];

        for (step, width) in widths.iter().enumerate() {
            for _ in 0..=step {
                carousel.next(now);
                settle(&mut carousel, &mut now);
            }
            carousel.prev(now);
            carousel.viewport_changed(*width);
            assert!(carousel.offset() <= carousel.max_offset());
            settle(&mut carousel, &mut now);
        }
    }

    #[test]
    fn progress_tracks_selected_snap() {
        let now = Instant::now();
        let mut carousel = Carousel::new(5, 2);
        assert_eq!(carousel.snap_count(), 4);
        assert!((carousel.progress() - 0.25).abs() < f64::EPSILON);
        carousel.jump_to(3, now);
        assert!((carousel.progress() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn breakpoints_pick_largest_matching_step() {
        let breakpoints = Breakpoints::default();
        assert_eq!(breakpoints.items_per_view(375), 1);
        assert_eq!(breakpoints.items_per_view(768), 2);
        assert_eq!(breakpoints.items_per_view(1100), 3);
        assert_eq!(breakpoints.items_per_view(1920), 4);
    }
}
