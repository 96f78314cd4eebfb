//! Display helpers shared by the analysis text and the metric cards.

pub const NOT_AVAILABLE: &str = "N/A";

/// `1234.5` -> `"$1,234.50"`.
pub fn currency(value: f64) -> String {
    with_sign(value, |v| format!("${}", group_fixed(v, 2)))
}

/// `1_200_000_000.0` -> `"$1,200,000,000"`.
pub fn whole_currency(value: f64) -> String {
    with_sign(value, |v| format!("${}", group_fixed(v, 0)))
}

/// Ratio to percent: `0.1234` -> `"12.34%"`.
pub fn percent(ratio: f64) -> String {
    format!("{:.2}%", ratio * 100.0)
}

/// Value that is already a percentage: `1.5` -> `"1.50%"`.
pub fn percent_points(value: f64) -> String {
    format!("{value:.2}%")
}

pub fn decimal(value: f64) -> String {
    format!("{value:.2}")
}

/// Share counts and volumes: `1234567.4` -> `"1,234,567"`.
pub fn integer(value: f64) -> String {
    with_sign(value, |v| group_fixed(v, 0))
}

pub fn or_na(value: Option<f64>, f: fn(f64) -> String) -> String {
    match value {
        Some(v) if v.is_finite() => f(v),
        _ => NOT_AVAILABLE.to_string(),
    }
}

fn with_sign(value: f64, f: impl Fn(f64) -> String) -> String {
    if value.is_sign_negative() && value != 0.0 {
        format!("-{}", f(-value))
    } else {
        f(value)
    }
}

fn group_fixed(value: f64, decimals: usize) -> String {
    let fixed = format!("{value:.decimals$}");
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let digits = int_part.as_bytes();
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, d) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*d as char);
    }

    match frac_part {
        Some(f) => format!("{grouped}.{f}"),
        None => grouped,
    }
}
