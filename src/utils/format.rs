/// Rounds to `digits` decimal places, exact halves to the even neighbour
/// (6.25 -> 6.2, 2.5 -> 2.0).
pub fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round_ties_even() / factor
}

/// Two decimals, or an empty cell.
pub fn fmt2(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_default()
}

/// 固定寬度的文字表格，欄位以 ` | ` 分隔
pub fn render_table(header: &[String], rows: &[Vec<String>]) -> String {
    let widths: Vec<usize> = (0..header.len())
        .map(|i| {
            std::iter::once(header)
                .chain(rows.iter().map(Vec::as_slice))
                .filter_map(|r| r.get(i))
                .map(|cell| cell.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    let sep = " | ";
    let line = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join(sep)
    };

    let total = widths.iter().sum::<usize>() + sep.len() * widths.len().saturating_sub(1);
    let mut out = vec![line(header), "-".repeat(total)];
    out.extend(rows.iter().map(|r| line(r)));
    out.join("\n")
}
