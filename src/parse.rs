use chrono::NaiveDate;

// (name, month number), looked up case-sensitively
const MONTH_NAMES: &[(&str, u32)] = &[
    // German short
    ("Jan", 1), ("Feb", 2), ("Mär", 3), ("Mrz", 3), ("Apr", 4), ("Mai", 5),
    ("Jun", 6), ("Jul", 7), ("Aug", 8), ("Sep", 9), ("Okt", 10), ("Nov", 11), ("Dez", 12),
    // German long
    ("Januar", 1), ("Februar", 2), ("März", 3), ("April", 4), ("Juni", 6), ("Juli", 7),
    ("August", 8), ("September", 9), ("Oktober", 10), ("November", 11), ("Dezember", 12),
    // English short
    ("Mar", 3), ("May", 5), ("Sept", 9), ("Oct", 10), ("Dec", 12),
    // English long
    ("January", 1), ("February", 2), ("March", 3), ("June", 6), ("July", 7),
    ("October", 10), ("December", 12),
];

fn month_from_name(name: &str) -> Option<u32> {
    MONTH_NAMES.iter().find(|(n, _)| *n == name).map(|(_, m)| *m)
}

/// Parse a date written as `D.M.Y`, `Y-M-D`, `D-M-Y` or `D. Monthname Y`.
///
/// The notation is chosen from the syntax alone; there is no locale
/// parameter. A trailing time of day (`15.06.2025 14:33`,
/// `2025-06-15T10:00:00`) is discarded. Returns `None` for anything that
/// does not parse to a valid calendar date.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim().trim_matches('"').trim();
    if s.is_empty() {
        return None;
    }
    let head = s.split_whitespace().next()?;

    let dotted: Vec<&str> = head.split('.').collect();
    if dotted.len() == 3 && dotted.iter().all(|p| !p.is_empty()) {
        return parse_dmy_dotted(&dotted);
    }

    let dashed: Vec<&str> = head.split('-').collect();
    if dashed.len() == 3 {
        if dashed[0].len() == 4 {
            let day = dashed[2].split('T').next().unwrap_or_default();
            return ymd(dashed[0].parse().ok()?, dashed[1].parse().ok()?, day.parse().ok()?);
        }
        return ymd(dashed[2].parse().ok()?, dashed[1].parse().ok()?, dashed[0].parse().ok()?);
    }

    parse_verbose(s)
}

fn parse_dmy_dotted(parts: &[&str]) -> Option<NaiveDate> {
    let d: u32 = parts[0].trim().parse().ok()?;
    let m: u32 = parts[1].trim().parse().ok()?;
    let mut y: i32 = parts[2].trim().parse().ok()?;
    if y < 100 {
        y += 2000;
    }
    ymd(y, m, d)
}

fn parse_verbose(s: &str) -> Option<NaiveDate> {
    let tokens: Vec<&str> = s.split_whitespace().collect();
    if tokens.len() < 3 {
        return None;
    }
    let d: u32 = tokens[0].trim_end_matches('.').parse().ok()?;
    let m = month_from_name(tokens[1].trim_end_matches('.'))?;
    let y: i32 = tokens[2].trim_matches('"').parse().ok()?;
    ymd(y, m, d)
}

fn ymd(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d)
}

/// Parse a monetary amount in either European (`1.234,56`) or US
/// (`1,234.56`) notation.
///
/// Everything except digits, `,`, `.` and `-` is dropped. Whichever
/// separator occurs last is the decimal separator. Blank input is zero;
/// input with no usable number is `None`.
pub fn parse_amount(raw: &str) -> Option<f64> {
    if raw.trim().is_empty() {
        return Some(0.0);
    }
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();

    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(_), None) => cleaned.replace(',', "."),
        _ => cleaned,
    };
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Round to whole cents.
pub fn round_cents(val: f64) -> f64 {
    (val * 100.0).round() / 100.0
}
