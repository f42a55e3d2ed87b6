use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use skiphire_core::model::OptionId;

use crate::app::{App, ViewMode};
use crate::ui;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    None,
    Quit,
    /// Reload options with `service.refresh_options`(...)
    Retry,
    /// Look the option up and show it in the details modal
    OpenDetails(OptionId),
    /// Confirm the option shown in the details modal
    Continue,
    /// Warm the option cache for a focused or hovered card
    Prefetch(OptionId),
}

pub(crate) fn handle_key_event(key: KeyEvent, app: &mut App, now: Instant) -> Action {
    use KeyCode::{BackTab, Char, Down, Enter, Esc, Left, Right, Tab, Up};

    // Global quit shortcuts
    if key.code == Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Action::Quit;
    }
    if key.code == Char('q') && key.modifiers.is_empty() {
        return Action::Quit;
    }

    if app.details.is_some() {
        match key.code {
            Enter | Char('c') => return Action::Continue,
            Esc | Char('b') => app.details = None,
            _ => {}
        }
        return Action::None;
    }

    match (app.view, key.code) {
        (ViewMode::Carousel, Left | Char('h')) => {
            app.prev_page(now);
            prefetch_focused(app)
        }
        (ViewMode::Carousel, Right | Char('l')) => {
            app.next_page(now);
            prefetch_focused(app)
        }
        (_, Tab | Down | Char('j')) | (ViewMode::Grid, Right | Char('l')) => {
            app.move_focus(true, now).map_or(Action::None, Action::Prefetch)
        }
        (_, BackTab | Up | Char('k')) | (ViewMode::Grid, Left | Char('h')) => {
            app.move_focus(false, now).map_or(Action::None, Action::Prefetch)
        }
        (ViewMode::Carousel, Char(digit @ '1'..='9')) => {
            if let Some(position) = digit.to_digit(10).and_then(|value| usize::try_from(value).ok()) {
                app.jump_to(position.saturating_sub(1), now);
            }
            prefetch_focused(app)
        }
        (_, Char('v')) => {
            app.toggle_view();
            Action::None
        }
        (_, Char('r')) => Action::Retry,
        (_, Enter | Char(' ')) => app
            .focused_option()
            .map_or(Action::None, |option| Action::OpenDetails(option.id)),
        (_, Esc) => {
            app.error_message = None;
            app.status_message = None;
            Action::None
        }
        _ => Action::None,
    }
}

pub(crate) fn handle_mouse_event(mouse: MouseEvent, app: &mut App, area: Rect, now: Instant) -> Action {
    if app.details.is_some() {
        return Action::None;
    }

    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            app.drag_origin = Some(mouse.column);
            Action::None
        }
        MouseEventKind::Up(MouseButton::Left) => {
            let clicked = app.drag_origin == Some(mouse.column);
            if app.drag_end(mouse.column, now) {
                return prefetch_focused(app);
            }
            if !clicked {
                return Action::None;
            }
            match ui::card_at(app, area, mouse.column, mouse.row) {
                Some(index) => {
                    app.set_focus(index, now);
                    app.focused_option()
                        .map_or(Action::None, |option| Action::OpenDetails(option.id))
                }
                None => Action::None,
            }
        }
        MouseEventKind::Moved => ui::card_at(app, area, mouse.column, mouse.row)
            .and_then(|index| app.set_focus(index, now))
            .map_or(Action::None, Action::Prefetch),
        MouseEventKind::ScrollDown => {
            app.next_page(now);
            prefetch_focused(app)
        }
        MouseEventKind::ScrollUp => {
            app.prev_page(now);
            prefetch_focused(app)
        }
        _ => Action::None,
    }
}

fn prefetch_focused(app: &App) -> Action {
    app.focused_option()
        .map_or(Action::None, |option| Action::Prefetch(option.id))
}
