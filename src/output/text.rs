//! Human-friendly text output formatting
//!
//! Used when --format text is specified.

use super::types::*;

/// Format RegexpResult as human-readable text
pub fn format_regexp_result(result: &RegexpResult) -> String {
    let mut output = String::new();

    output.push_str(&format!("Pattern: {}\n", result.pattern));
    output.push_str(&format!(
        "Engine:  {} ({})\n",
        result.engine,
        if result.engine == "regex" {
            "linear time"
        } else {
            "backtracking"
        }
    ));
    output.push('\n');
    output.push_str(if result.matched { "Match\n" } else { "No match\n" });

    output
}

/// Format InstrResult as human-readable text
pub fn format_instr_result(result: &InstrResult) -> String {
    let mut output = String::new();

    output.push_str(&format!("Pattern: {}\n", result.pattern));
    if result.position == 0 {
        output.push_str("No match\n");
    } else {
        output.push_str(&format!(
            "Position: {} ({})\n",
            result.position,
            if result.blob { "bytes" } else { "characters" }
        ));
    }

    output
}

/// Format SubstrResult as human-readable text
pub fn format_substr_result(result: &SubstrResult) -> String {
    format!("Pattern: {}\nValue:   \"{}\"\n", result.pattern, result.value)
}

/// Format ReplaceResult as human-readable text
pub fn format_replace_result(result: &ReplaceResult) -> String {
    let mut output = String::new();

    output.push_str(&format!("Pattern:     {}\n", result.pattern));
    output.push_str(&format!("Replacement: {}\n", result.replacement));
    output.push('\n');
    output.push_str(&format!("Original: {}\n", result.original));
    output.push_str(&format!("Result:   {}\n", result.result));
    output.push('\n');
    output.push_str(&format!(
        "{} replacement{} made\n",
        result.replacements_made,
        if result.replacements_made == 1 {
            ""
        } else {
            "s"
        }
    ));

    output
}

/// Format TableResult as an aligned table
pub fn format_table_result(result: &TableResult) -> String {
    let mut output = String::new();

    output.push_str(&format!("Pattern: {}\n\n", result.pattern));
    if result.rows.is_empty() {
        output.push_str("No rows\n");
        return output;
    }

    output.push_str(&format!("{:<6} {:<12} {:<6} {}\n", "rowid", "group_id", "match", "value"));
    for row in &result.rows {
        let value = match &row.value {
            Some(text) => format!("\"{}\"", text),
            None => "NULL".to_string(),
        };
        output.push_str(&format!(
            "{:<6} {:<12} {:<6} {}\n",
            row.rowid,
            row.group_id.to_string(),
            row.match_order,
            value
        ));
    }
    output.push('\n');
    output.push_str(&format!(
        "{} row{}\n",
        result.row_count,
        if result.row_count == 1 { "" } else { "s" }
    ));

    output
}

/// Format EscapeResult as the bare literal
pub fn format_escape_result(result: &EscapeResult) -> String {
    result.literal.clone()
}
