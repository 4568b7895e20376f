//! Viewport management for scrolling.
//!
//! The [`Viewport`] struct tracks the visible window over the rendered
//! document. Every mutation keeps `offset <= max(0, total_lines - height)`.

use std::ops::Range;

/// Manages the visible portion of a document.
///
/// # Example
///
/// ```
/// use marksight::ui::viewport::Viewport;
///
/// let mut vp = Viewport::new(80, 24, 100);
/// assert_eq!(vp.visible_range(), 0..24);
///
/// vp.scroll_by(10);
/// assert_eq!(vp.visible_range(), 10..34);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewport {
    width: u16,
    height: u16,
    offset: usize,
    total_lines: usize,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(80, 24, 0)
    }
}

impl Viewport {
    /// Create a viewport positioned at the top of the document.
    pub const fn new(width: u16, height: u16, total_lines: usize) -> Self {
        Self {
            width,
            height,
            offset: 0,
            total_lines,
        }
    }

    pub const fn offset(&self) -> usize {
        self.offset
    }

    pub const fn width(&self) -> u16 {
        self.width
    }

    pub const fn height(&self) -> u16 {
        self.height
    }

    pub const fn total_lines(&self) -> usize {
        self.total_lines
    }

    /// Lines currently on screen, clipped to the document.
    pub fn visible_range(&self) -> Range<usize> {
        let end = self.offset.saturating_add(self.page()).min(self.total_lines);
        self.offset.min(end)..end
    }

    /// Position through the scrollable range, from 0.0 (top) to 1.0 (bottom).
    ///
    /// A document that fits on one screen reports 1.0.
    pub fn scroll_percentage(&self) -> f32 {
        match self.max_offset() {
            0 => 1.0,
            #[allow(clippy::cast_precision_loss)]
            max => (self.offset as f32 / max as f32).clamp(0.0, 1.0),
        }
    }

    /// Scroll percentage rounded to 0-100 for the status bar.
    pub fn scroll_percent(&self) -> u8 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let percent = (self.scroll_percentage() * 100.0).round() as u8;
        percent.min(100)
    }

    pub const fn can_scroll_up(&self) -> bool {
        self.offset != 0
    }

    pub const fn can_scroll_down(&self) -> bool {
        self.max_offset() > self.offset
    }

    /// Scroll by a signed number of lines.
    pub fn scroll_by(&mut self, delta: isize) {
        let target = self.offset.saturating_add_signed(delta);
        self.scroll_to(target);
    }

    /// Put `line` at the top of the viewport, clamped.
    pub fn scroll_to(&mut self, line: usize) {
        self.offset = self.clamped(line);
    }

    pub const fn scroll_up(&mut self, n: usize) {
        self.offset = self.offset.saturating_sub(n);
    }

    pub fn scroll_down(&mut self, n: usize) {
        self.scroll_to(self.offset.saturating_add(n));
    }

    pub const fn page_up(&mut self) {
        self.scroll_up(self.page());
    }

    pub fn page_down(&mut self) {
        self.scroll_down(self.page());
    }

    pub const fn half_page_up(&mut self) {
        self.scroll_up(self.page() / 2);
    }

    pub fn half_page_down(&mut self) {
        self.scroll_down(self.page() / 2);
    }

    pub const fn go_to_top(&mut self) {
        self.offset = 0;
    }

    pub const fn go_to_bottom(&mut self) {
        self.offset = self.max_offset();
    }

    /// Same as [`scroll_to`](Self::scroll_to); the line lands on the top row.
    pub fn go_to_line(&mut self, line: usize) {
        self.scroll_to(line);
    }

    /// Jump to `percent` (capped at 100) of the scrollable range.
    pub fn go_to_percent(&mut self, percent: u8) {
        let span = self
            .max_offset()
            .saturating_mul(usize::from(percent.min(100)));
        self.scroll_to(span.saturating_add(50) / 100);
    }

    /// Change the size; the offset is re-clamped against the new height.
    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.scroll_to(self.offset);
    }

    /// Change the document length after a relayout.
    pub fn set_total_lines(&mut self, total: usize) {
        self.total_lines = total;
        self.scroll_to(self.offset);
    }

    /// Largest valid offset.
    pub const fn max_offset(&self) -> usize {
        self.total_lines.saturating_sub(self.page())
    }

    const fn page(&self) -> usize {
        self.height as usize
    }

    fn clamped(&self, line: usize) -> usize {
        line.min(self.max_offset())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_viewport_starts_at_top() {
        let vp = Viewport::new(80, 24, 100);
        assert_eq!(vp.offset(), 0);
        assert_eq!(vp.visible_range(), 0..24);
    }

    #[test]
    fn test_scroll_by_moves_both_directions() {
        let mut vp = Viewport::new(80, 10, 100);
        vp.scroll_by(15);
        assert_eq!(vp.offset(), 15);
        vp.scroll_by(-5);
        assert_eq!(vp.offset(), 10);
        vp.scroll_by(-50);
        assert_eq!(vp.offset(), 0);
    }

    #[test]
    fn test_scroll_to_clamps_to_max_offset() {
        let mut vp = Viewport::new(80, 10, 100);
        vp.scroll_to(1000);
        assert_eq!(vp.offset(), 90);
        assert!(!vp.can_scroll_down());
        assert!(vp.can_scroll_up());
    }

    #[test]
    fn test_short_document_cannot_scroll() {
        let mut vp = Viewport::new(80, 24, 10);
        vp.page_down();
        assert_eq!(vp.offset(), 0);
        assert_eq!(vp.visible_range(), 0..10);
        assert!((vp.scroll_percentage() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_half_page_moves_half_height() {
        let mut vp = Viewport::new(80, 20, 100);
        vp.half_page_down();
        assert_eq!(vp.offset(), 10);
        vp.half_page_up();
        assert_eq!(vp.offset(), 0);
    }

    #[test]
    fn test_scroll_percentage_midpoint() {
        let mut vp = Viewport::new(80, 10, 110);
        vp.scroll_to(50);
        assert!((vp.scroll_percentage() - 0.5).abs() < 1e-6);
        assert_eq!(vp.scroll_percent(), 50);
    }

    #[test]
    fn test_go_to_percent() {
        let mut vp = Viewport::new(80, 10, 110);
        vp.go_to_percent(100);
        assert_eq!(vp.offset(), 100);
        vp.go_to_percent(0);
        assert_eq!(vp.offset(), 0);
    }

    #[test]
    fn test_resize_keeps_valid_offset() {
        let mut vp = Viewport::new(80, 24, 100);
        vp.scroll_down(50);
        vp.resize(80, 60);
        assert_eq!(vp.offset(), 40);
    }

    #[test]
    fn test_set_total_lines_adjusts_offset() {
        let mut vp = Viewport::new(80, 24, 100);
        vp.scroll_down(80);
        vp.set_total_lines(50);
        assert_eq!(vp.offset(), 26);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            By(isize),
            To(usize),
            PageUp,
            PageDown,
            Bottom,
            Resize(u16),
            Total(usize),
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (-500isize..500).prop_map(Op::By),
                (0usize..5000).prop_map(Op::To),
                Just(Op::PageUp),
                Just(Op::PageDown),
                Just(Op::Bottom),
                (0u16..120).prop_map(Op::Resize),
                (0usize..3000).prop_map(Op::Total),
            ]
        }

        proptest! {
            #[test]
            fn offset_stays_clamped_under_any_sequence(
                total_lines in 0..3000usize,
                height in 0..120u16,
                ops in proptest::collection::vec(op(), 0..40),
            ) {
                let mut vp = Viewport::new(80, height, total_lines);
                for op in ops {
                    match op {
                        Op::By(n) => vp.scroll_by(n),
                        Op::To(n) => vp.scroll_to(n),
                        Op::PageUp => vp.page_up(),
                        Op::PageDown => vp.page_down(),
                        Op::Bottom => vp.go_to_bottom(),
                        Op::Resize(h) => vp.resize(80, h),
                        Op::Total(t) => vp.set_total_lines(t),
                    }
                    let max = vp.total_lines().saturating_sub(vp.height() as usize);
                    prop_assert!(vp.offset() <= max);
                }
            }

            #[test]
            fn visible_range_within_bounds(
                total_lines in 0..10000usize,
                height in 1..100u16,
                offset in 0..10000usize,
            ) {
                let mut vp = Viewport::new(80, height, total_lines);
                vp.scroll_down(offset);

                let range = vp.visible_range();
                prop_assert!(range.start <= range.end);
                prop_assert!(range.end <= total_lines);
            }

            #[test]
            fn percentage_always_in_unit_range(
                total_lines in 0..10000usize,
                height in 1..100u16,
                offset in 0..10000usize,
            ) {
                let mut vp = Viewport::new(80, height, total_lines);
                vp.scroll_to(offset);
                let pct = vp.scroll_percentage();
                prop_assert!((0.0..=1.0).contains(&pct));
                prop_assert!(vp.scroll_percent() <= 100);
            }
        }
    }
}
