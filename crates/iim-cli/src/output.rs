use serde::Serialize;
use std::io::Write;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let mut out = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    print!("{}", format_table(headers, &rows));
}

/// Left-aligned columns two spaces apart, a dashed rule under the header.
/// Widths count characters so timestamps and names with accents line up.
fn format_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let widths: Vec<usize> = (0..headers.len())
        .map(|i| {
            rows.iter()
                .filter_map(|r| r.get(i))
                .map(|c| c.chars().count())
                .fold(headers[i].chars().count(), usize::max)
        })
        .collect();

    let mut out = table_line(headers, &widths);
    let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    out.push_str(&table_line(&rule, &widths));
    for row in rows {
        out.push_str(&table_line(row, &widths));
    }
    out
}

fn table_line<S: AsRef<str>>(cells: &[S], widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(c, &w)| format!("{:<w$}", c.as_ref()))
        .collect();
    format!("{}\n", padded.join("  ").trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_align_to_widest_cell() {
        let rows = vec![
            vec!["severity".to_string(), "Medium".to_string(), "High".to_string()],
            vec!["detected".to_string(), "(empty)".to_string(), "2025-01-31 15:06 UTC".to_string()],
        ];
        let table = format_table(&["FIELD", "TRACKER", "REPORT"], &rows);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "FIELD     TRACKER  REPORT");
        assert_eq!(lines[1], "--------  -------  --------------------");
        assert_eq!(lines[2], "severity  Medium   High");
        assert_eq!(lines[3], "detected  (empty)  2025-01-31 15:06 UTC");
    }
}
