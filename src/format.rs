//! Display helpers shared by templates and bot messages.

/// USD price: two decimals with thousands separators, six decimals below $1.
pub fn usd(price: f64) -> String {
    if !price.is_finite() {
        return "$—".to_string();
    }

    let decimals = if price.abs() >= 1.0 || price == 0.0 { 2 } else { 6 };
    let raw = format!("{:.*}", decimals, price.abs());
    let (int_part, frac_part) = raw.split_once('.').unwrap_or((raw.as_str(), ""));

    let sign = if price < 0.0 { "-" } else { "" };
    if frac_part.is_empty() {
        format!("{sign}${}", group_thousands(int_part))
    } else {
        format!("{sign}${}.{frac_part}", group_thousands(int_part))
    }
}

pub fn percentage(p: f64) -> String {
    if p >= 0.0 {
        format!("+{p:.2}%")
    } else {
        format!("{p:.2}%")
    }
}

pub fn market_cap(cap: f64) -> String {
    if cap >= 1e12 {
        format!("${:.2}T", cap / 1e12)
    } else if cap >= 1e9 {
        format!("${:.2}B", cap / 1e9)
    } else if cap >= 1e6 {
        format!("${:.2}M", cap / 1e6)
    } else {
        format!("${}", group_thousands(&format!("{:.0}", cap.max(0.0))))
    }
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Minimal HTML escaping for text placed inside bot messages.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usd_formats_large_and_small_prices() {
        assert_eq!(usd(50_500.0), "$50,500.00");
        assert_eq!(usd(1_234_567.891), "$1,234,567.89");
        assert_eq!(usd(999.5), "$999.50");
        assert_eq!(usd(0.000123), "$0.000123");
        assert_eq!(usd(0.0), "$0.00");
    }

    #[test]
    fn percentage_has_explicit_sign() {
        assert_eq!(percentage(1.234), "+1.23%");
        assert_eq!(percentage(-4.5), "-4.50%");
        assert_eq!(percentage(0.0), "+0.00%");
    }

    #[test]
    fn market_cap_uses_suffixes() {
        assert_eq!(market_cap(1.5e12), "$1.50T");
        assert_eq!(market_cap(2.25e9), "$2.25B");
        assert_eq!(market_cap(7.0e6), "$7.00M");
        assert_eq!(market_cap(12_345.0), "$12,345");
    }

    #[test]
    fn escape_html_escapes_markup() {
        assert_eq!(escape_html("<b>A&B</b>"), "&lt;b&gt;A&amp;B&lt;/b&gt;");
    }
}
