use ratatui::{
    Frame,
    layout::{Constraint, Layout, Position, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Table, Wrap},
};

use crate::display::Tone;
use crate::domain::TableConfig;
use crate::model::{PanelView, Segments, UIData};
use crate::selection::ActionVariant;

pub const TOOLBAR_HEIGHT: usize = 1;
pub const TABLE_HEADER_HEIGHT: usize = 1;
pub const FOOTER_HEIGHT: usize = 1;
pub const BULKBAR_HEIGHT: usize = 1;
pub const CMDLINE_HEIGH: usize = 1;
pub const CHECKBOX_WIDTH: usize = 4;
pub const COLUMN_WIDTH_MARGIN: usize = 1;

pub struct TableUI {
    show_status_for: std::time::Duration,
}

fn tone_style(tone: Tone) -> Style {
    match tone {
        Tone::Plain => Style::default(),
        Tone::Strong => Style::default().add_modifier(Modifier::BOLD),
        Tone::Muted => Style::default().fg(Color::DarkGray),
        Tone::Info => Style::default().fg(Color::Cyan),
        Tone::Success => Style::default().fg(Color::Green),
        Tone::Warning => Style::default().fg(Color::Yellow),
        Tone::Danger => Style::default().fg(Color::Red),
    }
}

fn segments_line(segments: &Segments) -> Line<'static> {
    Line::from(
        segments
            .iter()
            .map(|(tone, s)| Span::styled(s.clone(), tone_style(*tone)))
            .collect::<Vec<_>>(),
    )
}

/// Centered rect of the given percentage of `area`.
fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let [_, middle, _] = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .areas(area);
    let [_, center, _] = Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .areas(middle);
    center
}

fn drawer_area(area: Rect) -> Rect {
    let [_, right] =
        Layout::horizontal([Constraint::Percentage(55), Constraint::Percentage(45)]).areas(area);
    right
}

impl TableUI {
    pub fn new(_cfg: &TableConfig) -> Self {
        Self {
            show_status_for: std::time::Duration::from_secs(5),
        }
    }

    pub fn draw(&mut self, data: &UIData, frame: &mut Frame) {
        let area = frame.area();
        let mut constraints = Vec::new();
        if !data.fullscreen {
            constraints.push(Constraint::Length(TOOLBAR_HEIGHT as u16));
        }
        constraints.push(Constraint::Min(TABLE_HEADER_HEIGHT as u16));
        if !data.bulk_actions.is_empty() {
            constraints.push(Constraint::Length(BULKBAR_HEIGHT as u16));
        }
        if !data.fullscreen {
            constraints.push(Constraint::Length(FOOTER_HEIGHT as u16));
        }
        constraints.push(Constraint::Length(CMDLINE_HEIGH as u16));
        let areas = Layout::vertical(constraints).split(area);

        let mut next = 0;
        let mut take = || {
            let rect = areas.get(next).copied().unwrap_or_default();
            next += 1;
            rect
        };
        if !data.fullscreen {
            self.draw_toolbar(data, frame, take());
        }
        self.draw_table(data, frame, take());
        if !data.bulk_actions.is_empty() {
            self.draw_bulk_bar(data, frame, take());
        }
        if !data.fullscreen {
            self.draw_footer(data, frame, take());
        }
        self.draw_statusline(data, frame, take());

        if let Some(panel) = &data.panel {
            self.draw_panel(panel, frame, area);
        }
        if data.show_popup {
            self.draw_popup(&data.popup_message, frame, area);
        }
    }

    fn draw_toolbar(&self, data: &UIData, frame: &mut Frame, area: Rect) {
        let mut spans = vec![
            Span::styled(format!(" {} ", data.name), Style::default().bold().reversed()),
            Span::raw(format!(" {} of {} rows ", data.filtered, data.total)),
        ];
        if !data.search.is_empty() {
            spans.push(Span::styled(format!(" /{} ", data.search), tone_style(Tone::Info)));
        }
        if data.active_filters > 0 {
            spans.push(Span::styled(
                format!(" {} filters ", data.active_filters),
                tone_style(Tone::Info),
            ));
        }
        if data.selected_count > 0 {
            spans.push(Span::styled(
                format!(" {} selected ", data.selected_count),
                tone_style(Tone::Warning),
            ));
        }
        if data.refreshing {
            spans.push(Span::styled(" ⟳ refreshing ", tone_style(Tone::Muted)));
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn draw_table(&self, data: &UIData, frame: &mut Frame, area: Rect) {
        if data.nrows == 0 {
            let message = if data.total == 0 {
                "No records"
            } else {
                "No records match the current search and filters"
            };
            let [header, body] =
                Layout::vertical([Constraint::Length(TABLE_HEADER_HEIGHT as u16), Constraint::Min(0)])
                    .areas(area);
            frame.render_widget(self.header_row_text(data), header);
            frame.render_widget(
                Paragraph::new(message)
                    .style(tone_style(Tone::Muted))
                    .centered(),
                body,
            );
            return;
        }

        let header_style = Style::default().fg(Color::Yellow).bold();
        let mut header_cells = vec![Cell::from(data.header_check.symbol()).style(header_style)];
        header_cells.extend(
            data.table
                .iter()
                .map(|c| Cell::from(c.name.clone()).style(header_style)),
        );
        let header = Row::new(header_cells).height(TABLE_HEADER_HEIGHT as u16);

        let rows: Vec<Row> = (0..data.nrows)
            .map(|ridx| {
                let checked = data.checkboxes.get(ridx).copied().unwrap_or(false);
                let mut cells = vec![Cell::from(if checked { "[x]" } else { "[ ]" })];
                for (cidx, column) in data.table.iter().enumerate() {
                    let line = column
                        .data
                        .get(ridx)
                        .map(segments_line)
                        .unwrap_or_default();
                    let mut cell = Cell::from(line);
                    if ridx == data.selected_row && cidx == data.selected_column {
                        cell = cell.style(Style::default().add_modifier(Modifier::REVERSED));
                    }
                    cells.push(cell);
                }
                let mut row = Row::new(cells);
                if ridx == data.selected_row {
                    row = row.style(Style::default().bg(Color::Rgb(40, 40, 60)));
                } else if checked {
                    row = row.style(Style::default().bg(Color::Rgb(30, 45, 30)));
                }
                row
            })
            .collect();

        let mut widths = vec![Constraint::Length(CHECKBOX_WIDTH as u16 - 1)];
        widths.extend(data.table.iter().map(|c| Constraint::Length(c.width as u16)));

        let table = Table::new(rows, widths).header(header).column_spacing(1);
        frame.render_widget(table, area);
    }

    fn header_row_text(&self, data: &UIData) -> Paragraph<'static> {
        let titles = data
            .table
            .iter()
            .map(|c| format!("{:width$}", c.name, width = c.width))
            .collect::<Vec<_>>()
            .join(" ");
        Paragraph::new(format!("{} {titles}", data.header_check.symbol()))
            .style(Style::default().fg(Color::Yellow).bold())
    }

    fn draw_bulk_bar(&self, data: &UIData, frame: &mut Frame, area: Rect) {
        let mut spans = vec![Span::styled(
            format!(" {} selected │", data.selected_count),
            Style::default().bold(),
        )];
        for (label, variant) in &data.bulk_actions {
            let style = match variant {
                ActionVariant::Default => Style::default().fg(Color::White),
                ActionVariant::Secondary => tone_style(Tone::Info),
                ActionVariant::Destructive => tone_style(Tone::Danger),
            };
            spans.push(Span::styled(format!(" [{label}]"), style));
        }
        spans.push(Span::styled("  b: run", tone_style(Tone::Muted)));
        frame.render_widget(
            Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Rgb(30, 30, 30))),
            area,
        );
    }

    fn draw_footer(&self, data: &UIData, frame: &mut Frame, area: Rect) {
        let pager = &data.pager;
        let enabled = |on: bool| {
            if on {
                Style::default()
            } else {
                tone_style(Tone::Muted)
            }
        };
        let mut spans = vec![
            Span::styled(" « First ", enabled(!pager.is_first)),
            Span::styled("‹ Prev ", enabled(!pager.is_first)),
        ];
        for &page in &pager.window {
            if page == pager.page {
                spans.push(Span::styled(format!("[{page}]"), Style::default().bold().reversed()));
            } else {
                spans.push(Span::raw(format!(" {page} ")));
            }
        }
        spans.push(Span::styled(" Next ›", enabled(!pager.is_last)));
        spans.push(Span::styled(" Last »", enabled(!pager.is_last)));
        spans.push(Span::styled(
            format!(
                "   page {}/{} · {} per page",
                pager.page, pager.total_pages, pager.page_size
            ),
            tone_style(Tone::Muted),
        ));
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn draw_statusline(&self, data: &UIData, frame: &mut Frame, area: Rect) {
        if data.active_cmdinput {
            let prompt_len = data.cmd_prompt.chars().count();
            let line = Line::from(vec![
                Span::styled(data.cmd_prompt.clone(), Style::default().bold()),
                Span::raw(data.cmdinput.input.clone()),
            ]);
            frame.render_widget(Paragraph::new(line), area);
            let x = area.x + (prompt_len + data.cmdinput.curser_pos) as u16;
            frame.set_cursor_position(Position::new(x.min(area.right().saturating_sub(1)), area.y));
            return;
        }

        let mut spans = Vec::new();
        if data.last_status_message_update.elapsed() < self.show_status_for {
            spans.push(Span::raw(format!(" {}", data.status_message)));
        }
        if let Some(tooltip) = &data.tooltip {
            spans.push(Span::styled(format!("  ⓘ {tooltip}"), tone_style(Tone::Info)));
        }
        spans.push(Span::styled("  ? help", tone_style(Tone::Muted)));
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn draw_panel(&self, panel: &PanelView, frame: &mut Frame, area: Rect) {
        let rect = if panel.drawer {
            drawer_area(area)
        } else {
            popup_area(area, 60, 60)
        };
        frame.render_widget(Clear, rect);

        let label_width = panel
            .items
            .iter()
            .map(|i| i.label.chars().count())
            .max()
            .unwrap_or(0);
        let items: Vec<ListItem> = panel
            .items
            .iter()
            .map(|item| {
                ListItem::new(Line::from(vec![
                    Span::styled(
                        format!("{:label_width$}  ", item.label),
                        Style::default().bold(),
                    ),
                    Span::styled(item.value.clone(), tone_style(item.tone)),
                ]))
            })
            .collect();

        let mut block = Block::default()
            .title(panel.title.clone())
            .title_style(Style::default().fg(Color::Cyan).bold())
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));
        if !panel.hint.is_empty() {
            block = block.title_bottom(Line::from(format!(" {} ", panel.hint)).centered());
        }
        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .highlight_symbol("› ");
        let mut state = ListState::default().with_selected(Some(panel.selected));
        frame.render_stateful_widget(list, rect, &mut state);
    }

    fn draw_popup(&self, message: &str, frame: &mut Frame, area: Rect) {
        let rect = popup_area(area, 70, 80);
        frame.render_widget(Clear, rect);
        let block = Block::bordered()
            .title(Line::from(" Help ".bold()).centered())
            .title_bottom(Line::from(" esc close ").centered());
        frame.render_widget(
            Paragraph::new(Text::from(message.to_string()))
                .block(block)
                .wrap(Wrap { trim: false }),
            rect,
        );
    }
}
