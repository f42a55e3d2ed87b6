use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Clear, Gauge, Paragraph, Row, Table, TableState, Wrap},
};
use skiphire_core::{
    model::PricingOption,
    steps::{Step, StepStatus},
};

use crate::app::{App, ViewMode, format_price, format_whole_price};

const DISCLAIMER: &str = "Imagery and information shown may not reflect the exact shape or size \
                          specification, colours may vary, options and/or accessories may be \
                          featured at additional cost.";

/// Header, progress steps, main content and status line.
fn screen_layout(area: Rect) -> [Rect; 4] {
    Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .margin(1)
    .areas(area)
}

/// Card row above the navigation controls.
fn carousel_layout(content: Rect) -> [Rect; 2] {
    Layout::vertical([Constraint::Min(0), Constraint::Length(3)]).areas(content)
}

/// Screen areas of the visible carousel cards, paired with their option index.
fn card_rects(app: &App, cards: Rect) -> Vec<(usize, Rect)> {
    let per_view = u32::try_from(app.carousel.items_per_view()).unwrap_or(1);
    let slots = Layout::horizontal((0..per_view).map(|_| Constraint::Ratio(1, per_view))).split(cards);
    app.carousel
        .visible_range()
        .zip(slots.iter().copied())
        .collect()
}

/// Index of the option drawn at `column`/`row`, if any.
pub(crate) fn card_at(app: &App, area: Rect, column: u16, row: u16) -> Option<usize> {
    let [_, _, content, _] = screen_layout(area);
    let point = Position::new(column, row);
    if !content.contains(point) || app.options.is_empty() {
        return None;
    }

    match app.view {
        ViewMode::Carousel => {
            let [cards, _] = carousel_layout(content);
            card_rects(app, cards)
                .into_iter()
                .find(|(_, rect)| rect.contains(point))
                .map(|(index, _)| index)
        }
        ViewMode::Grid => {
            // border and header row
            let first_row = content.y.saturating_add(2);
            if row >= content.bottom().saturating_sub(1) {
                return None;
            }
            let index = usize::from(row.checked_sub(first_row)?) + app.grid_offset.get();
            (index < app.options.len()).then_some(index)
        }
    }
}

pub(crate) fn draw(frame: &mut Frame<'_>, app: &App) {
    let [header_area, steps_area, content_area, status_area] = screen_layout(frame.area());

    draw_header(frame, app, header_area);
    draw_steps(frame, app, steps_area);

    if app.is_loading && app.options.is_empty() {
        let paragraph = Paragraph::new("Loading skip options…")
            .block(Block::default().borders(Borders::ALL).title("Skips"));
        frame.render_widget(paragraph, content_area);
    } else if let Some(msg) = app.error_message.as_ref().filter(|_| app.options.is_empty()) {
        let paragraph = Paragraph::new(format!("{msg}\n\nPress r to retry."))
            .style(Style::default().fg(Color::Red))
            .block(Block::default().borders(Borders::ALL).title("Something went wrong"))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, content_area);
    } else if app.options.is_empty() {
        let paragraph = Paragraph::new("No skip options available for this location.")
            .block(Block::default().borders(Borders::ALL).title("Skips"))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, content_area);
    } else {
        match app.view {
            ViewMode::Carousel => draw_carousel(frame, app, content_area),
            ViewMode::Grid => draw_grid(frame, app, content_area),
        }
    }

    draw_status(frame, app, status_area);

    if let Some(option) = &app.details {
        let area = frame.area();
        draw_details(frame, option, area);
    }
}

fn draw_header(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled("Choose Your Skip Size", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(format!(" · {}", app.location)),
    ];
    if app.is_refreshing {
        spans.push(Span::styled(" · refreshing…", Style::default().fg(Color::Yellow)));
    }

    let header = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title("Skiphire"));
    frame.render_widget(header, area);
}

fn draw_steps(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let mut spans = Vec::new();
    for (idx, step) in Step::ALL.iter().enumerate() {
        if idx > 0 {
            spans.push(Span::styled(" › ", Style::default().fg(Color::DarkGray)));
        }
        let span = match app.progress.status(*step) {
            StepStatus::Completed => Span::styled(format!("✓ {step}"), Style::default().fg(Color::Green)),
            StepStatus::Current => Span::styled(
                format!("● {step}"),
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ),
            StepStatus::Upcoming => Span::styled(format!("○ {step}"), Style::default().fg(Color::DarkGray)),
        };
        spans.push(span);
    }

    let steps = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title("Progress"));
    frame.render_widget(steps, area);
}

fn draw_carousel(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let [cards_area, controls_area] = carousel_layout(area);

    for (index, rect) in card_rects(app, cards_area) {
        if let Some(option) = app.options.get(index) {
            draw_card(frame, option, index == app.focus, rect);
        }
    }

    if !app.carousel.show_controls() {
        return;
    }

    let [dots_area, gauge_area] =
        Layout::horizontal([Constraint::Min(0), Constraint::Length(24)]).areas(controls_area);

    let enabled = |on: bool| {
        if on {
            Style::default().add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        }
    };
    let mut spans = vec![Span::styled("‹ ", enabled(app.carousel.can_prev()))];
    for snap in 0..app.carousel.snap_count() {
        let style = if snap == app.carousel.selected_snap() {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(format!("{} ", snap + 1), style));
    }
    spans.push(Span::styled("›", enabled(app.carousel.can_next())));

    let dots = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    frame.render_widget(dots, dots_area);

    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL))
        .gauge_style(Style::default().fg(Color::Yellow))
        .ratio(app.carousel.progress().clamp(0.0, 1.0));
    frame.render_widget(gauge, gauge_area);
}

fn draw_card(frame: &mut Frame<'_>, option: &PricingOption, focused: bool, area: Rect) {
    let border_style = if focused {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };

    let mut lines = vec![
        Line::styled(
            format!("{} Yard Skip", option.size),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Line::raw(format!("{} day hire · {}", option.hire_period_days, option.postcode)),
        Line::raw(""),
        Line::styled(
            format!("£{}", format_whole_price(option.total_price())),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ),
        Line::raw("Inc. VAT"),
        Line::raw(""),
    ];
    if option.allows_heavy_waste {
        lines.push(Line::styled("Heavy Waste OK", Style::default().fg(Color::Green)));
    }
    if option.allowed_on_road {
        lines.push(Line::styled("Road Placement", Style::default().fg(Color::Green)));
    } else {
        lines.push(Line::styled("Not Allowed On Road", Style::default().fg(Color::Red)));
    }

    let card = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border_style)
                .title(format!("{} Yards", option.size)),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(card, area);
}

fn draw_grid(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let rows = app.options.iter().map(|option| {
        Row::new(vec![
            Cell::from(format!("{} yd", option.size)),
            Cell::from(format!("{} days", option.hire_period_days)),
            Cell::from(format!("£{}", format_whole_price(option.total_price()))),
            Cell::from(yes_no(option.allowed_on_road)),
            Cell::from(yes_no(option.allows_heavy_waste)),
        ])
    });

    let column_widths = [
        Constraint::Length(8),
        Constraint::Length(10),
        Constraint::Length(10),
        Constraint::Length(6),
        Constraint::Min(6),
    ];

    let table = Table::new(rows, column_widths)
        .header(
            Row::new(vec!["Size", "Hire", "Price", "Road", "Heavy"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(Block::default().borders(Borders::ALL).title("All skips (v for carousel)"))
        .row_highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
        .column_spacing(1);

    let mut state = TableState::default()
        .with_offset(app.grid_offset.get())
        .with_selected(Some(app.focus));
    frame.render_stateful_widget(table, area, &mut state);
    app.grid_offset.set(state.offset());
}

fn draw_details(frame: &mut Frame<'_>, option: &PricingOption, area: Rect) {
    let popup = centered(area, 60, 80);
    let location = if option.area.is_empty() {
        option.postcode.clone()
    } else {
        format!("{} {}", option.postcode, option.area)
    };
    let road = if option.allowed_on_road {
        "Allowed on road"
    } else {
        "Private property only"
    };

    let lines = vec![
        Line::styled(
            format!("£{}", format_whole_price(option.total_price())),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ),
        Line::raw(format!("{} day hire period", option.hire_period_days)),
        Line::raw(""),
        Line::raw(format!("Hire Period:     {} days", option.hire_period_days)),
        Line::raw(format!("Location:        {location}")),
        Line::raw(format!("Road Placement:  {road}")),
        Line::raw(format!("Heavy waste:     {}", yes_no(option.allows_heavy_waste))),
        Line::raw(""),
        Line::raw(format!("Price before VAT:  £{}", format_price(option.price_before_vat))),
        Line::raw(format!("VAT ({}%):         £{}", option.vat, format_price(option.vat_amount()))),
        Line::styled(
            format!("Total:             £{}", format_price(option.total_price())),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Line::raw(""),
        Line::styled(DISCLAIMER, Style::default().fg(Color::DarkGray)),
        Line::raw(""),
        Line::raw("Enter/c continue · Esc/b back"),
    ];

    let details = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("{} Yard Skip Details", option.size)),
        )
        .wrap(Wrap { trim: true });

    frame.render_widget(Clear, popup);
    frame.render_widget(details, popup);
}

fn draw_status(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let nav_hint = match app.view {
        ViewMode::Carousel => "←/→ page · Tab focus · 1-9 jump · Enter details · v grid · r retry · q quit",
        ViewMode::Grid => "↑/↓ focus · Enter details · v carousel · r retry · q quit",
    };

    let status_text = if app.is_loading {
        format!("Loading… · {nav_hint}")
    } else if let Some(msg) = &app.error_message {
        format!("{msg} · r retry · Esc dismiss")
    } else if let Some(msg) = &app.status_message {
        format!("{msg} · {nav_hint}")
    } else {
        nav_hint.to_owned()
    };

    let status_style = if app.error_message.is_some() {
        Style::default().fg(Color::Red)
    } else if app.is_loading {
        Style::default().fg(Color::Yellow)
    } else if app.status_message.is_some() {
        Style::default().fg(Color::Green)
    } else {
        Style::default()
    };

    let status = Paragraph::new(status_text)
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .style(status_style)
        .wrap(Wrap { trim: true });

    frame.render_widget(status, area);
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

/// Rectangle of `percent_x` by `percent_y` centred in `area`.
fn centered(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let [_, middle, _] = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .areas(area);
    let [_, popup, _] = Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .areas(middle);
    popup
}
