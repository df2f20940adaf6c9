use itertools::Itertools;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::app::App;
use crate::item::{GameKind, Item, ItemKind};
use crate::session::Phase;

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;
const CELL_GAP: &str = "   ";

impl<K: ItemKind> Widget for &App<K> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let session = self.session();
        let kind = session.kind().kind();

        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let green_bold_style = Style::default().patch(bold_style).fg(Color::Green);
        let red_bold_style = Style::default().patch(bold_style).fg(Color::Red);
        let dim_bold_style = Style::default()
            .patch(bold_style)
            .add_modifier(Modifier::DIM);
        let italic_style = Style::default().add_modifier(Modifier::ITALIC);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Length(1), // title
                Constraint::Length(1), // timer / progress
                Constraint::Min(1),    // body
                Constraint::Length(1), // notice
                Constraint::Length(1), // legend
            ])
            .split(area);

        Paragraph::new(Span::styled(format!("{kind} / {}", session.phase()), dim_bold_style))
            .alignment(Alignment::Center)
            .render(chunks[0], buf);

        let status = match session.phase() {
            Phase::Ready => session
                .high_score()
                .map(|hs| {
                    format!(
                        "best {}% ({}/{}, {} items, {}s)",
                        hs.percent, hs.correct, hs.total, hs.item_count, hs.memorize_seconds
                    )
                })
                .unwrap_or_default(),
            Phase::Showing if session.config().timer_enabled => {
                format!("{}s", session.timer_remaining())
            }
            Phase::Showing => String::new(),
            Phase::Input => {
                let need = session.kind().expected_len(session.items().len());
                let have = session.kind().measure(session.input());
                format!("{have}/{need}")
            }
            Phase::Result => session
                .result()
                .map(|r| {
                    format!(
                        "{}/{} correct ({}%)",
                        r.score.correct, r.score.total, r.score.percent
                    )
                })
                .unwrap_or_default(),
        };
        Paragraph::new(Span::styled(status, bold_style))
            .alignment(Alignment::Center)
            .render(chunks[1], buf);

        let body: Vec<Line> = match session.phase() {
            Phase::Ready => vec![Line::from(Span::styled(
                format!(
                    "{} items, {}s to memorize",
                    session.config().item_count,
                    session.config().memorize_seconds
                ),
                italic_style,
            ))],
            Phase::Showing => grid_lines(kind, session.chunked())
                .into_iter()
                .map(|line| Line::from(Span::styled(line, bold_style)))
                .collect(),
            Phase::Input => vec![Line::from(vec![
                Span::styled(session.input().to_string(), bold_style),
                Span::styled(
                    "_",
                    Style::default().add_modifier(Modifier::SLOW_BLINK),
                ),
            ])],
            Phase::Result => {
                let marks = session.result_marks();
                let mut spans: Vec<Span> = Vec::new();
                if let Some(result) = session.result() {
                    for (idx, want) in result.expected.iter().enumerate() {
                        if idx > 0 {
                            spans.push(Span::raw(" "));
                        }
                        if marks.get(idx).copied().unwrap_or(false) {
                            spans.push(Span::styled(want.clone(), green_bold_style));
                        } else {
                            let given = result.provided.get(idx).map_or("?", String::as_str);
                            spans.push(Span::styled(format!("{want}({given})"), red_bold_style));
                        }
                    }
                }
                let mut lines = vec![Line::from(spans)];
                if session.result().is_some_and(|r| r.is_new_high) {
                    lines.push(Line::from(Span::styled(
                        "new high score",
                        Style::default().fg(Color::Yellow).patch(bold_style),
                    )));
                }
                lines
            }
        };
        Paragraph::new(body)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: false })
            .render(chunks[2], buf);

        if let Some(notice) = self.notice() {
            Paragraph::new(Span::styled(notice.to_string(), italic_style))
                .alignment(Alignment::Center)
                .render(chunks[3], buf);
        }

        Paragraph::new(Span::styled(legend(session.phase()), italic_style))
            .render(chunks[4], buf);
    }
}

fn legend(phase: Phase) -> &'static str {
    match phase {
        Phase::Ready => "(enter) start / (q)uit",
        Phase::Showing => "(enter) hide / (esc) cancel / (q)uit",
        Phase::Input => "(enter) submit / (esc) cancel",
        Phase::Result => "(enter) next round / (esc) back / (q)uit",
    }
}

/// Text lines of a round's items: digit pairs chunk into rows, words into columns.
pub fn grid_lines(kind: GameKind, chunked: &[Vec<Item>]) -> Vec<String> {
    match kind {
        GameKind::Pairs => chunked.iter().map(|row| row.iter().join(CELL_GAP)).collect(),
        GameKind::Words => {
            let widths: Vec<usize> = chunked
                .iter()
                .map(|column| column.iter().map(|w| w.width()).max().unwrap_or(0))
                .collect();
            let height = chunked.iter().map(Vec::len).max().unwrap_or(0);

            (0..height)
                .map(|row| {
                    chunked
                        .iter()
                        .zip(&widths)
                        .filter_map(|(column, &width)| {
                            column.get(row).map(|w| {
                                let pad = width.saturating_sub(w.width());
                                format!("{w}{}", " ".repeat(pad))
                            })
                        })
                        .join(CELL_GAP)
                        .trim_end()
                        .to_string()
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{DigitPairs, Generated, Words};
    use crate::runtime::Event;
    use crate::session::{RoundConfig, Session};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::{backend::TestBackend, Terminal};
    use std::time::Instant;

    fn items(list: &[&str]) -> Vec<Item> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn rendered<K: ItemKind>(app: &App<K>) -> String {
        let backend = TestBackend::new(80, 20);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|f| f.render_widget(app, f.area())).unwrap();
        let buffer = terminal.backend().buffer();
        buffer.content.iter().map(|c| c.symbol()).collect()
    }

    fn enter() -> Event {
        Event::Key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE))
    }

    #[test]
    fn test_grid_lines_pairs_are_rows() {
        let chunked = vec![items(&["12", "34"]), items(&["56"])];
        assert_eq!(grid_lines(GameKind::Pairs, &chunked), vec!["12   34", "56"]);
    }

    #[test]
    fn test_grid_lines_words_are_columns() {
        let chunked = vec![items(&["apple", "kiwi"]), items(&["fig", "mango"])];
        assert_eq!(
            grid_lines(GameKind::Words, &chunked),
            vec!["apple   fig", "kiwi    mango"]
        );
    }

    #[test]
    fn test_grid_lines_ragged_columns() {
        let chunked = vec![items(&["a", "bb"]), items(&["c"])];
        assert_eq!(grid_lines(GameKind::Words, &chunked), vec!["a    c", "bb"]);
    }

    #[test]
    fn test_render_ready() {
        let app = App::new(Session::new(DigitPairs, RoundConfig::default()));
        let content = rendered(&app);

        assert!(content.contains("pairs / ready"));
        assert!(content.contains("(enter) start"));
    }

    #[test]
    fn test_render_showing_and_input() {
        let mut app = App::new(Session::new(DigitPairs, RoundConfig::default()));
        let now = Instant::now();
        app.handle(enter(), now);

        let content = rendered(&app);
        let first_row = grid_lines(GameKind::Pairs, app.session().chunked())[0].clone();
        assert!(content.contains(&first_row));
        assert!(content.contains("8s"));

        app.handle(enter(), now);
        let content = rendered(&app);
        assert!(content.contains("pairs / input"));
        assert!(content.contains("0/10"));
        assert!(!content.contains(&first_row));
    }

    #[test]
    fn test_render_result_marks() {
        let config = RoundConfig {
            item_count: 2,
            layout: 1,
            memorize_seconds: 5,
            timer_enabled: false,
        };
        let mut session = Session::new(Words::default(), config);
        session.start_round(Generated {
            items: items(&["apple", "mango"]),
            chunked: vec![items(&["apple", "mango"])],
        });
        session.hide_now();
        session.verify_input(items(&["apple", "kiwi"]));

        let content = rendered(&App::new(session));
        assert!(content.contains("1/2 correct (50%)"));
        assert!(content.contains("mango(kiwi)"));
    }
}
