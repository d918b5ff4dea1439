use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

fn key_line(key: &str, pad: usize, action: &str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(key.to_string(), Style::default().fg(Color::Magenta)),
        Span::raw(" ".repeat(pad)),
        Span::raw(action.to_string()),
    ])
}

pub fn draw_help(area: Rect, f: &mut Frame) {
    let p = Paragraph::new(vec![
        Line::from("Keybinds:"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled("q", Style::default().fg(Color::Magenta)),
            Span::raw(" / "),
            Span::styled("Ctrl-C", Style::default().fg(Color::Magenta)),
            Span::raw("  Quit"),
        ]),
        key_line("e", 11, "Edit prompt"),
        key_line("g", 11, "Generate code"),
        key_line("d", 11, "Deploy & run"),
        key_line("c", 11, "Clean up project"),
        key_line("y", 11, "Copy code to clipboard"),
        key_line("s", 11, "Save code to current directory"),
        key_line("↑/↓", 9, "Scroll code (also j/k, PgUp/PgDn)"),
        key_line("?", 11, "Show this help"),
        Line::from(""),
        Line::from("Prompt editor:"),
        key_line("Enter", 7, "Generate"),
        key_line("Esc", 9, "Stop editing"),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(Clear, area);
    f.render_widget(p, area);
}
