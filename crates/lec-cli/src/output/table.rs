#[derive(Clone, Copy, Debug)]
pub struct TableOptions {
    pub max_width: Option<usize>,
    pub color: bool,
}

const MIN_COLUMN: usize = 6;
const SEPARATOR: &str = "  ";

/// Render an aligned table for string rows.
#[must_use]
pub fn render_table(headers: &[&str], rows: &[Vec<String>], options: TableOptions) -> String {
    let mut widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(index, header)| {
            rows.iter()
                .filter_map(|row| row.get(index))
                .map(|cell| cell.chars().count())
                .max()
                .unwrap_or(0)
                .max(header.len())
                .max(MIN_COLUMN)
        })
        .collect();

    if let Some(max_width) = options.max_width {
        shrink_to_fit(&mut widths, headers, max_width);
    }

    let header_line = headers
        .iter()
        .zip(&widths)
        .map(|(header, width)| pad(&clip(header, *width), *width, false))
        .collect::<Vec<_>>()
        .join(SEPARATOR);
    let divider = "-".repeat(header_line.chars().count());

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(header_line);
    lines.push(divider);
    for row in rows {
        let line = widths
            .iter()
            .enumerate()
            .map(|(index, width)| {
                let cell = clip(row.get(index).map_or("-", String::as_str), *width);
                let padded = pad(&cell, *width, is_numeric(&cell));
                if options.color {
                    colorize(&cell, padded)
                } else {
                    padded
                }
            })
            .collect::<Vec<_>>()
            .join(SEPARATOR);
        lines.push(line);
    }
    lines.join("\n")
}

/// Narrow the widest column one character at a time until the row fits.
fn shrink_to_fit(widths: &mut [usize], headers: &[&str], max_width: usize) {
    let separators = widths.len().saturating_sub(1) * SEPARATOR.len();
    while widths.iter().sum::<usize>() + separators > max_width {
        let widest = widths
            .iter()
            .enumerate()
            .filter(|(idx, width)| **width > headers[*idx].len().max(MIN_COLUMN))
            .max_by_key(|(_, width)| **width)
            .map(|(idx, _)| idx);
        let Some(idx) = widest else {
            break;
        };
        widths[idx] -= 1;
    }
}

fn clip(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let mut out = value.chars().take(width.saturating_sub(1)).collect::<String>();
    out.push('…');
    out
}

fn is_numeric(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty()
        && trimmed
            .chars()
            .all(|ch| ch.is_ascii_digit() || matches!(ch, '-' | '+' | '.'))
}

fn pad(value: &str, width: usize, right_align: bool) -> String {
    let fill = " ".repeat(width.saturating_sub(value.chars().count()));
    if right_align {
        format!("{fill}{value}")
    } else {
        format!("{value}{fill}")
    }
}

/// Color instance and engine states. Padding is applied before coloring so
/// escape codes never count toward column width.
fn colorize(cell: &str, padded: String) -> String {
    let code = match cell.to_ascii_lowercase().as_str() {
        "tracked" | "confirmed" | "idle" | "true" => "32",
        "acknowledged" | "pending" | "reconciling" | "committing" | "loading" => "33",
        "missing" | "error" | "false" => "31",
        _ => return padded,
    };
    format!("\u{1b}[{code}m{padded}\u{1b}[0m")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_terminal_clips_widest_column() {
        let rows = vec![vec![
            "asg-1".to_string(),
            "A rather long assignment title that will not fit".to_string(),
        ]];
        let out = render_table(
            &["id", "title"],
            &rows,
            TableOptions {
                max_width: Some(30),
                color: false,
            },
        );
        for line in out.lines() {
            assert!(line.chars().count() <= 30, "line too wide: {line}");
        }
        assert!(out.contains('…'));
    }

    #[test]
    fn numbers_are_right_aligned() {
        let rows = vec![vec!["7.5".to_string()]];
        let out = render_table(
            &["mark"],
            &rows,
            TableOptions {
                max_width: None,
                color: false,
            },
        );
        assert_eq!(out.lines().nth(2), Some("   7.5"));
    }

    #[test]
    fn color_wraps_known_states_only() {
        let options = TableOptions {
            max_width: None,
            color: true,
        };
        let rows = vec![
            vec!["pending".to_string()],
            vec!["asg-1".to_string()],
        ];
        let out = render_table(&["status"], &rows, options);
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[2].starts_with("\u{1b}[33m"));
        assert_eq!(lines[3], "asg-1  ");
    }
}
