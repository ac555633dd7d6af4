//! Table scraping helpers shared by the extraction tasks.

use itax_portal::Page;

/// Scrape every row of an HTML table into trimmed cell texts.
pub async fn scrape_table(
    page: &Page,
    table_selector: &str,
) -> Result<Vec<Vec<String>>, itax_portal::Error> {
    let js = format!(
        r#"(() => {{
            const table = document.querySelector({sel});
            if (!table) return '[]';
            const rows = Array.from(table.querySelectorAll('tr')).map(tr =>
                Array.from(tr.querySelectorAll('td, th')).map(td => td.textContent.trim()));
            return JSON.stringify(rows);
        }})()"#,
        sel = serde_json::to_string(table_selector).unwrap()
    );
    let json_str: String = page.evaluate(&js).await.map_err(itax_portal::Error::from)?;
    serde_json::from_str(&json_str)
        .map_err(|e| itax_portal::Error::StepFailed(format!("table parse: {}", e)))
}

/// Parse a grid amount like `"1,234.50"` or `"(500.00)"` (bracketed
/// negatives). Blank and dash cells are zero.
pub fn parse_amount(raw: &str) -> f64 {
    let trimmed = raw.trim();
    let negative = trimmed.starts_with('(') && trimmed.ends_with(')');
    let cleaned: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    let value: f64 = cleaned.parse().unwrap_or(0.0);
    if negative {
        -value
    } else {
        value
    }
}
