/// Format a float as a euro amount with German separators: 1.234,56 €
pub fn money(val: f64) -> String {
    let negative = val < 0.0;
    let abs = val.abs();
    let cents = format!("{:.2}", abs);
    let (int_part, dec_part) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));

    let mut grouped = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    let grouped: String = grouped.chars().rev().collect();

    if negative {
        format!("-{grouped},{dec_part} \u{20ac}")
    } else {
        format!("{grouped},{dec_part} \u{20ac}")
    }
}

/// Confidence as a whole percentage.
pub fn percent(val: f64) -> String {
    format!("{:.0}%", val * 100.0)
}
