//! Label/value extraction for free-form detail layouts.
//!
//! Layouts seen on the site, tried in this order:
//! 1. a bold/label element followed by its value (`<b>Owner:</b> DOE JANE`),
//!    or the label cell's next sibling element;
//! 2. definition lists (`<dt>Owner</dt><dd>DOE JANE</dd>`);
//! 3. table rows, either `<th>Owner</th><td>DOE JANE</td>` or a header row
//!    whose cells name the columns of the row below;
//! 4. inline text (`Owner: DOE JANE`).
//!
//! The first strategy that yields a non-empty value wins.

use super::{clean_text, element_text};
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

pub struct LabelScanner {
    doc: Html,
}

fn normalize_label(s: &str) -> String {
    clean_text(s)
        .trim_end_matches(|c: char| c == ':' || c == '*' || c.is_whitespace())
        .to_ascii_lowercase()
}

fn label_matches(text: &str, labels: &[&str]) -> bool {
    let text = normalize_label(text);
    !text.is_empty() && labels.iter().any(|l| l.eq_ignore_ascii_case(&text))
}

fn clean_value(s: &str) -> Option<String> {
    let v = clean_text(s);
    let v = v.trim_start_matches(|c: char| c == ':' || c.is_whitespace());
    (!v.is_empty()).then(|| v.to_string())
}

fn is_label_tag(name: &str) -> bool {
    matches!(name, "b" | "strong" | "label" | "dt" | "th")
}

/// True when `el` is, or holds, a label of its own (the next field's row).
fn carries_label(el: &ElementRef<'_>) -> bool {
    let value = el.value();
    if is_label_tag(value.name()) || value.classes().any(|c| c == "label" || c == "field-label") {
        return true;
    }
    Selector::parse("b, strong, label, .label, .field-label, dt, th")
        .map(|sel| el.select(&sel).next().is_some())
        .unwrap_or(false)
}

impl LabelScanner {
    pub fn new(html: &str) -> Self {
        Self {
            doc: Html::parse_fragment(html),
        }
    }

    /// Value for the first of `labels` found by the first working strategy.
    /// Labels are compared case-insensitively without trailing colons.
    pub fn value(&self, labels: &[&str]) -> Option<String> {
        self.bold_sibling(labels)
            .or_else(|| self.definition_list(labels))
            .or_else(|| self.table_row(labels))
            .or_else(|| self.inline_text(labels))
    }

    fn bold_sibling(&self, labels: &[&str]) -> Option<String> {
        let sel = Selector::parse("b, strong, label, .label, .field-label").ok()?;
        for el in self.doc.select(&sel) {
            if !label_matches(&element_text(&el), labels) {
                continue;
            }

            let mut parts: Vec<String> = Vec::new();
            for node in el.next_siblings() {
                match node.value() {
                    Node::Text(t) => {
                        let s: &str = t;
                        parts.push(s.to_string());
                    }
                    Node::Element(e) => {
                        if e.name() == "br" {
                            if parts.iter().any(|p| !p.trim().is_empty()) {
                                break;
                            }
                            continue;
                        }
                        if is_label_tag(e.name()) {
                            break;
                        }
                        if let Some(child) = ElementRef::wrap(node) {
                            parts.push(element_text(&child));
                        }
                    }
                    _ => {}
                }
            }
            if let Some(v) = clean_value(&parts.join(" ")) {
                return Some(v);
            }

            // <div><b>Owner</b></div><div>DOE JANE</div>
            let next = el
                .parent()
                .and_then(|p| p.next_siblings().find_map(ElementRef::wrap))
                .filter(|n| !carries_label(n));
            if let Some(v) = next.and_then(|n| clean_value(&element_text(&n))) {
                return Some(v);
            }
        }
        None
    }

    fn definition_list(&self, labels: &[&str]) -> Option<String> {
        let sel = Selector::parse("dt").ok()?;
        self.doc
            .select(&sel)
            .filter(|dt| label_matches(&element_text(dt), labels))
            .find_map(|dt| {
                dt.next_siblings()
                    .filter_map(ElementRef::wrap)
                    .next()
                    .filter(|dd| dd.value().name() == "dd")
                    .and_then(|dd| clean_value(&element_text(&dd)))
            })
    }

    fn table_row(&self, labels: &[&str]) -> Option<String> {
        let (table_sel, tr_sel, cell_sel) = (
            Selector::parse("table").ok()?,
            Selector::parse("tr").ok()?,
            Selector::parse("th, td").ok()?,
        );

        for table in self.doc.select(&table_sel) {
            let rows: Vec<Vec<ElementRef<'_>>> = table
                .select(&tr_sel)
                .map(|tr| tr.select(&cell_sel).collect())
                .collect();

            for (i, cells) in rows.iter().enumerate() {
                // a row of only header cells names the columns of the row below
                let header_row = cells.len() > 1 && cells.iter().all(|c| c.value().name() == "th");
                for (j, cell) in cells.iter().enumerate() {
                    if !label_matches(&element_text(cell), labels) {
                        continue;
                    }
                    let value = if header_row {
                        rows.get(i + 1).and_then(|below| below.get(j))
                    } else {
                        cells.get(j + 1)
                    };
                    if let Some(v) = value.and_then(|c| clean_value(&element_text(c))) {
                        return Some(v);
                    }
                }
            }
        }
        None
    }

    fn inline_text(&self, labels: &[&str]) -> Option<String> {
        let lines: Vec<String> = self
            .doc
            .root_element()
            .text()
            .map(clean_text)
            .filter(|t| !t.is_empty())
            .collect();

        for label in labels {
            let pattern = format!(r"(?i)^{}\s*:\s*(.+)$", regex::escape(label));
            let Ok(re) = Regex::new(&pattern) else {
                continue;
            };
            if let Some(v) = lines
                .iter()
                .find_map(|line| re.captures(line))
                .and_then(|c| c.get(1))
                .and_then(|m| clean_value(m.as_str()))
            {
                return Some(v);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bold_label_sibling() {
        let s = LabelScanner::new("<div><b>Owner:</b> DOE JANE<br>123 MAIN ST</div>");
        assert_eq!(s.value(&["owner"]).as_deref(), Some("DOE JANE"));

        let s = LabelScanner::new(
            "<div class='row'><div><strong>Jurisdiction</strong></div><div>UNINCORPORATED</div></div>",
        );
        assert_eq!(s.value(&["jurisdiction"]).as_deref(), Some("UNINCORPORATED"));
    }

    #[test]
    fn definition_list_and_tables() {
        let s = LabelScanner::new("<dl><dt>Subdivision</dt><dd>PALMA SOLA PARK</dd></dl>");
        assert_eq!(s.value(&["subdivision"]).as_deref(), Some("PALMA SOLA PARK"));

        let s = LabelScanner::new(
            "<table><tr><th>Tax District</th><td>BRADENTON 2024</td></tr></table>",
        );
        assert_eq!(s.value(&["tax district"]).as_deref(), Some("BRADENTON 2024"));

        let s = LabelScanner::new(
            "<table><tr><th>Year Built</th><th>Stories</th></tr><tr><td>1987</td><td>1</td></tr></table>",
        );
        assert_eq!(s.value(&["stories"]).as_deref(), Some("1"));
    }

    #[test]
    fn inline_text_is_last_resort() {
        let s = LabelScanner::new("<p>Legal Description: LOT 4 BLK B</p>");
        assert_eq!(s.value(&["legal description"]).as_deref(), Some("LOT 4 BLK B"));

        // a bold layout takes precedence over an inline mention
        let s = LabelScanner::new("<p>Owner: OLD NAME</p><div><b>Owner</b> NEW NAME</div>");
        assert_eq!(s.value(&["owner"]).as_deref(), Some("NEW NAME"));

        assert_eq!(LabelScanner::new("").value(&["owner"]), None);
    }

    #[test]
    fn blank_value_does_not_borrow_next_row() {
        let s = LabelScanner::new(
            "<div><b>Owner:</b> DOE JANE</div><div><b>HOA:</b></div><div><b>Jurisdiction:</b> UNINCORPORATED</div>",
        );
        assert_eq!(s.value(&["hoa"]), None);
        assert_eq!(s.value(&["jurisdiction"]).as_deref(), Some("UNINCORPORATED"));
    }
}
