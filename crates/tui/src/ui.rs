//! Rendering. Pure projection of [`App`] state onto the frame; no state
//! changes happen here.

use ratatui::prelude::*;
use ratatui::widgets::{Clear, List, ListItem, ListState, Paragraph, Wrap};

use shopwatch_core::action::format_action;
use shopwatch_core::event::{EventPayload, ScreenshotSource};
use shopwatch_core::rewrite::Segment;

use crate::app::{App, View, SAMPLE_TASKS};
use crate::config::MODEL_OPTIONS;
use crate::run::RunPhase;
use crate::theme::{action_color, status_color, Theme};

pub fn render(frame: &mut Frame, app: &mut App) {
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Fill(1),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    render_header(frame, app, header_area);

    match app.view {
        View::NewRun => render_new_run(frame, app, body_area),
        View::Session => render_session(frame, app, body_area),
        View::History => render_history(frame, app, body_area),
    }

    render_footer(frame, app, footer_area);

    if app.banner.is_some() {
        render_banner(frame, app);
    }
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let block = Theme::block();
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut spans = vec![Span::styled(
        " shopwatch ",
        Style::new().fg(Theme::ACCENT_ORANGE).bold(),
    )];
    if app.view == View::Session {
        let phase = app.controller.lifecycle.phase;
        spans.push(Span::styled(
            format!(" {} ", phase.label()),
            Style::new().fg(Color::Black).bg(phase_color(phase)).bold(),
        ));
        if app.controller.lifecycle.stopping_busy {
            spans.push(Span::styled(
                " stopping…",
                Style::new().fg(Theme::ACCENT_YELLOW).italic(),
            ));
        }
        if let Some(status) = app.controller.lifecycle.agent_status {
            spans.push(Span::styled(
                format!("  agent:{}", status.as_str()),
                Style::new().fg(status_color(status.as_str())),
            ));
        }
        if let Some(run_id) = &app.controller.run_id {
            spans.push(Span::styled(
                format!("  {run_id}"),
                Style::new().fg(Theme::TEXT_MUTED),
            ));
        }
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), inner);
}

fn phase_color(phase: RunPhase) -> Color {
    match phase {
        RunPhase::NotStarted => Theme::TEXT_SECONDARY,
        RunPhase::Starting | RunPhase::Stopping => Theme::ACCENT_YELLOW,
        RunPhase::Live => Theme::ACCENT_BLUE,
        RunPhase::Completed => Theme::ACCENT_GREEN,
        RunPhase::Failed => Theme::ACCENT_RED,
    }
}

// ─── New run ─────────────────────────────────────────────────────────────────

fn render_new_run(frame: &mut Frame, app: &App, area: Rect) {
    let [task_area, model_area, samples_area] = Layout::vertical([
        Constraint::Length(4),
        Constraint::Length(3),
        Constraint::Fill(1),
    ])
    .areas(area);

    let task = Paragraph::new(format!("{}▏", app.task_input))
        .wrap(Wrap { trim: false })
        .style(Style::new().fg(Theme::TEXT_PRIMARY))
        .block(Theme::block_accent().title(" What should the agent shop for? "));
    frame.render_widget(task, task_area);

    let mut model_spans = Vec::new();
    for (i, model) in MODEL_OPTIONS.iter().enumerate() {
        let style = if i == app.model_index {
            Style::new().fg(Color::Black).bg(Theme::ACCENT_BLUE).bold()
        } else {
            Style::new().fg(Theme::TEXT_SECONDARY)
        };
        model_spans.push(Span::styled(format!(" {model} "), style));
        model_spans.push(Span::raw(" "));
    }
    let models = Paragraph::new(Line::from(model_spans)).block(Theme::block().title(" Model (Tab) "));
    frame.render_widget(models, model_area);

    let samples: Vec<Line> = SAMPLE_TASKS
        .iter()
        .enumerate()
        .map(|(i, sample)| {
            Line::from(vec![
                Span::styled(format!(" F{} ", i + 1), Style::new().fg(Theme::ACCENT_BLUE).bold()),
                Span::styled(*sample, Style::new().fg(Theme::TEXT_CONTENT)),
            ])
        })
        .collect();
    let samples = Paragraph::new(samples)
        .wrap(Wrap { trim: false })
        .block(Theme::block().title(" Sample tasks "));
    frame.render_widget(samples, samples_area);
}

// ─── Session ─────────────────────────────────────────────────────────────────

fn render_session(frame: &mut Frame, app: &App, area: Rect) {
    let [main_area, rewriter_area] =
        Layout::vertical([Constraint::Fill(1), Constraint::Length(3)]).areas(area);
    let [timeline_area, browser_area] =
        Layout::horizontal([Constraint::Ratio(1, 3), Constraint::Ratio(2, 3)]).areas(main_area);

    render_timeline(frame, app, timeline_area);
    render_browser_pane(frame, app, browser_area);
    render_rewriter(frame, app, rewriter_area);
}

fn render_timeline(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines: Vec<Line> = Vec::new();
    let groups = app.controller.timeline.group_by_step();

    if groups.is_empty() {
        lines.push(Line::from(Span::styled(
            "waiting for events…",
            Style::new().fg(Theme::TEXT_MUTED).italic(),
        )));
    }

    for (step, events) in &groups {
        let collapsed = app.controller.timeline.is_collapsed(*step);
        let marker = if collapsed { "▸" } else { "▾" };
        let selected = app.selected_step == Some(*step);
        let header_style = if selected {
            Style::new().fg(Theme::ACCENT_BLUE).bold()
        } else {
            Style::new().fg(Theme::TEXT_PRIMARY).bold()
        };
        lines.push(Line::from(Span::styled(
            format!("{marker} Step {step}  ({} events)", events.len()),
            header_style,
        )));
        if collapsed {
            continue;
        }
        for event in events {
            lines.extend(event_lines(&event.payload));
        }
        lines.push(Line::raw(""));
    }

    let timeline = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Theme::block().title(" Timeline "));
    frame.render_widget(timeline, area);
}

fn event_lines(payload: &EventPayload) -> Vec<Line<'_>> {
    match payload {
        EventPayload::Log(log) => {
            let prefix_color = if log.is_summary() {
                Theme::ACCENT_GREEN
            } else {
                Theme::TEXT_SECONDARY
            };
            vec![Line::from(vec![
                Span::styled(format!("  {} ", log.prefix), Style::new().fg(prefix_color).bold()),
                Span::styled(log.content.as_str(), Style::new().fg(Theme::TEXT_CONTENT)),
            ])]
        }
        EventPayload::Action(action) => {
            let rendered = format_action(&action.action_json);
            let label = rendered.label().to_string();
            let detail = match rendered {
                shopwatch_core::action::RenderableAction::Navigate { url } => url,
                shopwatch_core::action::RenderableAction::InputText { text, index } => {
                    format!("\"{text}\" into element {index}")
                }
                shopwatch_core::action::RenderableAction::Click { index } => {
                    format!("element {index}")
                }
                shopwatch_core::action::RenderableAction::CopyToClipboard { text } => text,
                shopwatch_core::action::RenderableAction::Done { text } => text,
                shopwatch_core::action::RenderableAction::Other { args, .. } => args,
                shopwatch_core::action::RenderableAction::Raw(raw) => raw,
            };
            vec![Line::from(vec![
                Span::styled(
                    format!("  [{}/{}] ", action.index, action.total),
                    Style::new().fg(Theme::TEXT_MUTED),
                ),
                Span::styled(
                    format!(" {label} "),
                    Style::new().fg(Color::Black).bg(action_color(&label)),
                ),
                Span::styled(format!(" {detail}"), Style::new().fg(Theme::TEXT_CONTENT)),
            ])]
        }
        EventPayload::Update(update) => {
            let mut lines = Vec::new();
            for (name, value) in [
                ("Memory", &update.memory),
                ("Progress", &update.task_progress),
                ("Next Steps", &update.future_plans),
            ] {
                if value.is_empty() {
                    continue;
                }
                lines.push(Line::from(vec![
                    Span::styled(
                        format!("  {name}: "),
                        Style::new().fg(Theme::ACCENT_PURPLE).bold(),
                    ),
                    Span::styled(value.as_str(), Style::new().fg(Theme::TEXT_CONTENT)),
                ]));
            }
            lines
        }
        // Screenshots render in the browser pane, not the timeline.
        EventPayload::Screenshot(_) => Vec::new(),
        EventPayload::Status(status) => vec![Line::from(Span::styled(
            format!("  status → {}", status.status.as_str()),
            Style::new().fg(status_color(status.status.as_str())).italic(),
        ))],
        EventPayload::Finished => vec![Line::from(Span::styled(
            "  ── run finished ──",
            Style::new().fg(Theme::ACCENT_GREEN).bold(),
        ))],
    }
}

fn render_browser_pane(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines: Vec<Line> = Vec::new();

    match app.controller.timeline.latest_screenshot() {
        Some(ScreenshotSource::Inline(data)) => {
            // Terminal cells cannot show the PNG itself; show frame metadata.
            lines.push(Line::from(Span::styled(
                format!("live frame ({} KiB base64)", data.len() / 1024),
                Style::new().fg(Theme::TEXT_SECONDARY),
            )));
        }
        Some(ScreenshotSource::Url(url)) => {
            lines.push(Line::from(Span::styled(
                url.as_str(),
                Style::new().fg(Theme::ACCENT_BLUE).underlined(),
            )));
        }
        None => {
            lines.push(Line::from(Span::styled(
                "no frames yet",
                Style::new().fg(Theme::TEXT_MUTED).italic(),
            )));
        }
    }

    if let Some((step, update)) = app.controller.timeline.latest_update() {
        lines.push(Line::raw(""));
        lines.push(Line::from(Span::styled(
            format!("step {step}: {}", update.task_progress),
            Style::new().fg(Theme::TEXT_CONTENT),
        )));
    }

    if app.controller.lifecycle.phase.is_terminal() {
        lines.push(Line::raw(""));
        if let Some(url) = &app.controller.history_gif_url {
            lines.push(artifact_line("history", url));
        }
        if let Some(url) = &app.controller.recording_url {
            lines.push(artifact_line("recording", url));
        }
    }

    let pane = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Theme::block().title(" Browser "));
    frame.render_widget(pane, area);
}

fn artifact_line<'a>(name: &'a str, url: &'a str) -> Line<'a> {
    Line::from(vec![
        Span::styled(format!("{name}: "), Style::new().fg(Theme::TEXT_SECONDARY)),
        Span::styled(url, Style::new().fg(Theme::ACCENT_BLUE).underlined()),
    ])
}

fn render_rewriter(frame: &mut Frame, app: &App, area: Rect) {
    let segments = app.task_segments();
    let mut spans = Vec::new();
    for (i, segment) in segments.iter().enumerate() {
        match segment {
            Segment::Text(text) => {
                spans.push(Span::styled(
                    text.clone(),
                    Style::new().fg(Theme::TEXT_CONTENT),
                ));
            }
            Segment::Filter { text, .. } => {
                let bg = if app.rewriter.selected == Some(i) {
                    Theme::FILTER_SELECTED_BG
                } else {
                    Theme::FILTER_BG
                };
                spans.push(Span::styled(
                    text.clone(),
                    Style::new().fg(Theme::TEXT_PRIMARY).bg(bg).bold(),
                ));
            }
        }
    }

    let alternatives = app.selected_alternatives();
    if !alternatives.is_empty() {
        spans.push(Span::styled("  → ", Style::new().fg(Theme::TEXT_MUTED)));
        for (i, option) in alternatives.iter().enumerate() {
            let style = if i == app.rewriter.alternative {
                Style::new().fg(Color::Black).bg(Theme::ACCENT_GREEN).bold()
            } else {
                Style::new().fg(Theme::TEXT_SECONDARY)
            };
            spans.push(Span::styled(format!(" {option} "), style));
            spans.push(Span::raw(" "));
        }
    }

    let rewriter =
        Paragraph::new(Line::from(spans)).block(Theme::block().title(" Task (Tab to rewrite) "));
    frame.render_widget(rewriter, area);
}

// ─── History ─────────────────────────────────────────────────────────────────

fn render_history(frame: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .history
        .iter()
        .map(|row| {
            let line = Line::from(vec![
                Span::styled(
                    format!(" {} ", row.status),
                    Style::new().fg(Color::Black).bg(status_color(&row.status)),
                ),
                Span::styled(
                    format!(" {} ", row.start_time.format("%Y-%m-%d %H:%M")),
                    Style::new().fg(Theme::TEXT_SECONDARY),
                ),
                Span::styled(row.task.as_str(), Style::new().fg(Theme::TEXT_CONTENT)),
            ]);
            ListItem::new(line)
        })
        .collect();

    let title = format!(
        " Runs — page {} ({} total) ",
        app.history_page, app.history_total
    );
    let list = List::new(items)
        .block(Theme::block().title(title))
        .highlight_style(Style::new().fg(Theme::TEXT_PRIMARY).bg(Theme::FILTER_SELECTED_BG));

    let mut state = ListState::default();
    state.select(Some(app.history_selected));
    frame.render_stateful_widget(list, area, &mut state);
}

// ─── Footer / banner ─────────────────────────────────────────────────────────

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    let hints = match app.view {
        View::NewRun => "Enter start · Tab model · F1-F3 samples · Esc quit",
        View::Session => {
            "s stop · ↑↓ step · Space fold · Tab/←→/Enter rewrite · h history · Esc back"
        }
        View::History => "↑↓ select · ←→ page · Enter open · Esc back",
    };
    let footer = Paragraph::new(Span::styled(
        format!(" {hints}"),
        Style::new().fg(Theme::TEXT_MUTED),
    ));
    frame.render_widget(footer, area);
}

fn render_banner(frame: &mut Frame, app: &App) {
    let Some(banner) = &app.banner else { return };

    let area = frame.area();
    let width = area.width.saturating_sub(8).clamp(20, 70);
    let height = if banner.detail.is_some() { 4 } else { 3 };
    let popup = Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + 1,
        width,
        height,
    };

    let mut lines = vec![Line::from(Span::styled(
        banner.message.clone(),
        Style::new().fg(Theme::ACCENT_RED).bold(),
    ))];
    if let Some(detail) = &banner.detail {
        lines.push(Line::from(Span::styled(
            detail.clone(),
            Style::new().fg(Theme::TEXT_CONTENT),
        )));
    }

    frame.render_widget(Clear, popup);
    let paragraph = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Theme::block_accent());
    frame.render_widget(paragraph, popup);
}
