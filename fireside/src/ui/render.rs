//! Render orchestration for the Fireside TUI

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, Paragraph, Wrap},
    Frame,
};

use fireside_core::adventure::{EvaluationReport, STARTING_HP};

use crate::app::{App, InputMode};
use crate::encounter::Encounter;
use crate::ui::widgets::{
    HotkeyBarWidget, InputWidget, OptionsWidget, StatusBarWidget, StoryWidget,
};

/// Main render function
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let options_height = OptionsWidget::height(&app.view.current_options, app.view.is_generating);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),               // title bar
            Constraint::Min(5),                  // the telling
            Constraint::Length(options_height),  // choices
            Constraint::Length(3),               // input
            Constraint::Length(1),               // status bar
            Constraint::Length(1),               // hotkey bar
        ])
        .split(area);

    render_title_bar(frame, app, chunks[0]);

    let story_widget = StoryWidget::new(&app.view.displayed_story, &app.theme)
        .scroll(app.story_scroll)
        .streaming(app.view.is_generating)
        .error(app.view.error_message.as_deref());
    frame.render_widget(story_widget, chunks[1]);

    let options_widget = OptionsWidget::new(&app.view.current_options, &app.theme)
        .generating(app.view.is_generating)
        .defeated(app.is_defeated())
        .animation_frame(app.spinner_frame);
    frame.render_widget(options_widget, chunks[2]);

    render_input(frame, app, chunks[3]);

    let status_widget = StatusBarWidget::new(
        app.teller_name(),
        app.genre_label(),
        app.input_mode,
        &app.theme,
    )
    .hit_points(app.hit_points())
    .message(app.status_message());
    frame.render_widget(status_widget, chunks[4]);

    let hotkey_widget = HotkeyBarWidget::new(app.input_mode, &app.theme)
        .adventure(app.is_adventure())
        .encounter(app.encounter.is_some());
    frame.render_widget(hotkey_widget, chunks[5]);

    // Overlays
    if let Some(encounter) = &app.encounter {
        render_encounter_overlay(frame, app, encounter, area);
    }
    if let Some(report) = &app.evaluation {
        render_evaluation_overlay(frame, app, report, area);
    }
    if app.show_help {
        render_help_overlay(frame, app, area);
    }
}

/// Render the title bar
fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let title = format!(
        " The Wanderer's Inn | {} tells {} ",
        app.teller_name(),
        if app.is_adventure() {
            "an adventure"
        } else {
            "a tale"
        }
    );

    let mut spans = vec![Span::styled(title, app.theme.title_style())];
    if let Some(track) = &app.theme_track {
        spans.push(Span::styled(format!(" {track} "), app.theme.system_style()));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Render the input area
fn render_input(frame: &mut Frame, app: &App, area: Rect) {
    let is_active = matches!(app.input_mode, InputMode::Insert);

    let placeholder = if app.view.is_generating {
        "The teller is speaking..."
    } else {
        "Speak to the teller..."
    };

    let input_widget = InputWidget::new(app.input_buffer(), &app.theme)
        .cursor_position(app.cursor_position())
        .active(is_active)
        .placeholder(placeholder);

    frame.render_widget(input_widget, area);
}

/// Render the skirmish overlay
fn render_encounter_overlay(frame: &mut Frame, app: &App, encounter: &Encounter, area: Rect) {
    let popup_area = centered_rect_fixed(46, 11, area);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .title(format!(" {} ", encounter.enemy.name))
        .borders(Borders::ALL)
        .border_style(app.theme.border_style(true));

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // round
            Constraint::Length(2), // foe gauge
            Constraint::Length(2), // hero gauge
            Constraint::Min(1),    // keys
        ])
        .split(inner);

    let round = Line::from(Span::styled(
        format!("Round {}", encounter.rounds + 1),
        app.theme.system_style(),
    ));
    frame.render_widget(Paragraph::new(round), chunks[0]);

    let foe_gauge = Gauge::default()
        .block(Block::default())
        .gauge_style(Style::default().fg(app.theme.hp_color(encounter.hp_ratio())))
        .ratio(encounter.hp_ratio() as f64)
        .label(format!("Foe {}/{}", encounter.enemy_hp, encounter.enemy.hp));
    frame.render_widget(foe_gauge, chunks[1]);

    let hp = app.hit_points().unwrap_or(0);
    let hero_ratio = hp as f32 / STARTING_HP as f32;
    let hero_gauge = Gauge::default()
        .block(Block::default())
        .gauge_style(Style::default().fg(app.theme.hp_color(hero_ratio)))
        .ratio(hero_ratio as f64)
        .label(format!("You {hp}/{STARTING_HP}"));
    frame.render_widget(hero_gauge, chunks[2]);

    let keys = Line::from(vec![
        Span::styled("a", app.theme.accent_style().add_modifier(Modifier::BOLD)),
        Span::raw(" attack    "),
        Span::styled("f", app.theme.accent_style().add_modifier(Modifier::BOLD)),
        Span::raw(" flee"),
    ]);
    frame.render_widget(Paragraph::new(keys), chunks[3]);
}

/// Render the judgement overlay
fn render_evaluation_overlay(
    frame: &mut Frame,
    app: &App,
    report: &EvaluationReport,
    area: Rect,
) {
    let popup_area = centered_rect_fixed(54, 14, area);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .title(" The Teller's Judgement ")
        .borders(Borders::ALL)
        .border_style(app.theme.border_style(true));

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let text = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("  {} / 10", report.rating),
            app.theme.title_style(),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!("  {}", report.verdict),
            app.theme.story_style(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Best moment: ", app.theme.accent_style()),
            Span::styled(report.highlight.clone(), app.theme.story_style()),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "  r new evening    Esc close    q quit",
            app.theme.system_style(),
        )),
    ];

    frame.render_widget(Paragraph::new(text).wrap(Wrap { trim: false }), inner);
}

/// Render help overlay
fn render_help_overlay(frame: &mut Frame, app: &App, area: Rect) {
    let popup_area = centered_rect_fixed(52, 20, area);
    frame.render_widget(Clear, popup_area);

    let help_text = vec![
        Line::from(Span::styled(
            " Fireside - Help ",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Input Modes:",
            Style::default().add_modifier(Modifier::UNDERLINED),
        )),
        Line::from("  i       Enter INSERT mode (speak freely)"),
        Line::from("  Esc     Return to NORMAL mode"),
        Line::from(""),
        Line::from(Span::styled(
            "Navigation (NORMAL mode):",
            Style::default().add_modifier(Modifier::UNDERLINED),
        )),
        Line::from("  j/k or ↑/↓     Scroll the telling"),
        Line::from("  Ctrl+u/d       Scroll by half page"),
        Line::from("  g/G            Jump to top/bottom"),
        Line::from("  Mouse wheel    Scroll the telling"),
        Line::from(""),
        Line::from(Span::styled(
            "The Evening:",
            Style::default().add_modifier(Modifier::UNDERLINED),
        )),
        Line::from("  1-9     Take a choice at the fork"),
        Line::from("  f       Pick a fight (adventures)"),
        Line::from("  e       Ask for the judgement (adventures)"),
        Line::from("  r       Abandon the evening, back to the inn"),
        Line::from("  q       Quit"),
        Line::from(""),
        Line::from(Span::styled(
            "Press Esc or q to close",
            Style::default().add_modifier(Modifier::DIM),
        )),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_style(app.theme.border_style(true));

    let paragraph = Paragraph::new(help_text)
        .block(block)
        .wrap(Wrap { trim: false });

    frame.render_widget(paragraph, popup_area);
}

/// A fixed-size rect centered in the given area.
pub fn centered_rect_fixed(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
