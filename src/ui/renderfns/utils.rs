/// Truncate a string to at most `max_len` characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Format a rupee amount rounded to whole units, with thousands separators
pub fn format_price(amount: f64) -> String {
  let rounded = amount.round();
  let digits = (rounded.abs() as u64).to_string();
  let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
  for (i, c) in digits.chars().enumerate() {
    if i > 0 && (digits.len() - i) % 3 == 0 {
      grouped.push(',');
    }
    grouped.push(c);
  }
  let sign = if rounded < 0.0 { "-" } else { "" };
  format!("{}₹{}", sign, grouped)
}
