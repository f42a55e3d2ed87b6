use std::cell::Cell;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rust_decimal::{Decimal, RoundingStrategy};
use skiphire_core::{
    cache::CacheState,
    carousel::{Breakpoints, Carousel},
    model::{Location, OptionId, PricingOption},
    service::{OptionList, SkipHireService},
    steps::Progress,
};
use tracing::debug;

/// Columns a mouse drag must travel to change the page.
const DRAG_THRESHOLD_COLUMNS: i32 = 4;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// How often the shown list is read again so a stale entry revalidates.
const REVALIDATE_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ViewMode {
    Carousel,
    Grid,
}

pub(crate) struct App {
    pub service: Arc<SkipHireService>,
    pub location: Location,

    pub options: OptionList,
    pub carousel: Carousel,
    pub breakpoints: Breakpoints,
    pub view: ViewMode,
    pub focus: usize,
    pub details: Option<PricingOption>,
    pub drag_origin: Option<u16>,
    /// First grid row on screen, as left by the last draw.
    pub grid_offset: Cell<usize>,

    pub progress: Progress,

    pub is_loading: bool,
    pub is_refreshing: bool,
    pub error_message: Option<String>,
    pub status_message: Option<String>,

    last_sweep: Instant,
    last_revalidate: Instant,
}

impl App {
    pub(crate) fn new(service: Arc<SkipHireService>, location: Location, width: u16) -> Self {
        let breakpoints = column_breakpoints();
        let carousel = Carousel::new(0, breakpoints.items_per_view(u32::from(width)))
            .with_drag_threshold(DRAG_THRESHOLD_COLUMNS);
        Self {
            service,
            location,
            options: Arc::default(),
            carousel,
            breakpoints,
            view: ViewMode::Carousel,
            focus: 0,
            details: None,
            drag_origin: None,
            grid_offset: Cell::new(0),
            progress: Progress::default(),
            is_loading: false,
            is_refreshing: false,
            error_message: None,
            status_message: None,
            last_sweep: Instant::now(),
            last_revalidate: Instant::now(),
        }
    }

    /// Read the options for the current location, from cache when possible.
    pub(crate) async fn load(&mut self) {
        self.is_loading = true;
        let res = self.service.options_for(&self.location).await;
        self.is_loading = false;
        self.last_revalidate = Instant::now();
        match res {
            Ok(cached) => {
                self.is_refreshing = cached.state == CacheState::StaleRevalidating;
                self.error_message = None;
                if !Arc::ptr_eq(&cached.value, &self.options) {
                    self.set_options(cached.value);
                }
            }
            Err(err) => {
                self.error_message = Some(format!("Failed to load skip options: {err}"));
            }
        }
    }

    /// Reload the options even if the cached list is fresh.
    pub(crate) async fn retry(&mut self) {
        self.is_loading = true;
        self.error_message = None;
        let res = self.service.refresh_options(&self.location).await;
        self.is_loading = false;
        match res {
            Ok(cached) => {
                self.is_refreshing = false;
                self.set_options(cached.value);
            }
            Err(err) => {
                self.error_message = Some(format!("Failed to load skip options: {err}"));
            }
        }
    }

    /// Whether the options on screen should be read again.
    ///
    /// Reading a stale list serves it and starts a background revalidation.
    pub(crate) fn revalidate_due(&self, now: Instant) -> bool {
        !self.is_loading
            && !self.is_refreshing
            && self.error_message.is_none()
            && now.duration_since(self.last_revalidate) >= REVALIDATE_INTERVAL
    }

    /// Advance animations and pick up the result of a background refresh.
    pub(crate) fn tick(&mut self, now: Instant) {
        self.carousel.tick(now);

        // A focus move during an animation could not scroll the carousel.
        if self.view == ViewMode::Carousel
            && !self.carousel.is_transitioning()
            && !self.options.is_empty()
            && !self.carousel.visible_range().contains(&self.focus)
        {
            self.follow_focus(now);
        }

        if self.is_refreshing {
            let still_fetching = self
                .service
                .options_status(&self.location)
                .is_some_and(|status| status.is_fetching);
            if !still_fetching {
                self.is_refreshing = false;
                if let Some(list) = self.service.cached_options(&self.location)
                    && !Arc::ptr_eq(&list, &self.options)
                {
                    debug!(count = list.len(), "background refresh delivered options");
                    self.set_options(list);
                }
            }
        }

        if now.duration_since(self.last_sweep) >= SWEEP_INTERVAL {
            self.service.sweep();
            self.last_sweep = now;
        }
    }

    pub(crate) fn set_options(&mut self, options: OptionList) {
        self.carousel.items_changed(options.len());
        self.options = options;
        self.focus = self.focus.min(self.options.len().saturating_sub(1));
        self.follow_focus(Instant::now());
    }

    pub(crate) fn resize(&mut self, width: u16) {
        self.carousel
            .viewport_changed(self.breakpoints.items_per_view(u32::from(width)));
        self.focus_visible();
    }

    pub(crate) fn focused_option(&self) -> Option<&PricingOption> {
        self.options.get(self.focus)
    }

    /// Move keyboard focus by one card. Returns the newly focused option.
    pub(crate) fn move_focus(&mut self, forward: bool, now: Instant) -> Option<OptionId> {
        let last = self.options.len().checked_sub(1)?;
        let target = if forward {
            (self.focus + 1).min(last)
        } else {
            self.focus.saturating_sub(1)
        };
        self.set_focus(target, now)
    }

    /// Focus the card at `index`, scrolling the carousel to keep it visible.
    pub(crate) fn set_focus(&mut self, index: usize, now: Instant) -> Option<OptionId> {
        if index == self.focus || index >= self.options.len() {
            return None;
        }
        self.focus = index;
        self.follow_focus(now);
        self.focused_option().map(|option| option.id)
    }

    pub(crate) fn next_page(&mut self, now: Instant) -> bool {
        let moved = self.carousel.next(now);
        self.focus_visible();
        moved
    }

    pub(crate) fn prev_page(&mut self, now: Instant) -> bool {
        let moved = self.carousel.prev(now);
        self.focus_visible();
        moved
    }

    pub(crate) fn jump_to(&mut self, index: usize, now: Instant) -> bool {
        let moved = self.carousel.jump_to(index, now);
        self.focus_visible();
        moved
    }

    pub(crate) fn drag_end(&mut self, column: u16, now: Instant) -> bool {
        let Some(origin) = self.drag_origin.take() else {
            return false;
        };
        let moved = self
            .carousel
            .drag_end(i32::from(column) - i32::from(origin), now);
        self.focus_visible();
        moved
    }

    pub(crate) fn toggle_view(&mut self) {
        self.view = match self.view {
            ViewMode::Carousel => ViewMode::Grid,
            ViewMode::Grid => ViewMode::Carousel,
        };
    }

    pub(crate) fn show_details(&mut self, option: PricingOption) {
        self.details = Some(option);
    }

    /// Confirm the option in the details modal and move on to the next step.
    pub(crate) fn confirm_selection(&mut self) {
        let Some(option) = self.details.take() else {
            return;
        };
        self.status_message = Some(format!(
            "You've selected a {} yard skip for £{}",
            option.size,
            format_price(option.total_price())
        ));
        self.progress.complete_current();
    }

    /// Keep focus on a card the carousel shows.
    fn focus_visible(&mut self) {
        if self.view != ViewMode::Carousel || self.options.is_empty() {
            return;
        }
        let visible = self.carousel.visible_range();
        if !visible.contains(&self.focus) {
            self.focus = visible.start.min(self.options.len() - 1);
        }
    }

    /// Scroll the carousel so the focused card is visible.
    fn follow_focus(&mut self, now: Instant) {
        let visible = self.carousel.visible_range();
        if self.focus < visible.start {
            self.carousel.jump_to(self.focus, now);
        } else if self.focus >= visible.end {
            let per_view = self.carousel.items_per_view();
            self.carousel.jump_to(self.focus + 1 - per_view.min(self.focus + 1), now);
        }
    }
}

/// Terminal columns take the place of pixel widths.
fn column_breakpoints() -> Breakpoints {
    Breakpoints::new(1, vec![(60, 2), (90, 3), (120, 4)])
}

/// Two decimal places, rounded only for display.
pub(crate) fn format_price(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{rounded:.2}")
}

/// Whole pounds for compact card labels.
pub(crate) fn format_whole_price(amount: Decimal) -> String {
    amount
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_string()
}
