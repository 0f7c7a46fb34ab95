//! Instruction prompt assembly for the generation backend.

/// Build the single instruction string for one transform run.
///
/// Layout, in order: formatting rules, the literal column list in its
/// required order, the template hint verbatim, and -- only when a roster is
/// supplied -- the reconciliation instruction for the trailing
/// `[[MISSING: ...]]` line. Deterministic: identical inputs always produce
/// an identical prompt.
pub fn build_instruction(
    report: &str,
    columns: &[String],
    hint: &str,
    roster: &[String],
) -> String {
    let mut out = String::new();
    out.push_str("Task: extract the report below into tab-separated rows, one participant per row.\n");
    out.push_str("Rules:\n");
    out.push_str("1. Output plain delimited text only: no markdown, no code fences, no commentary.\n");
    out.push_str("2. Separate fields with a single tab character, in the column order given.\n");
    out.push_str("3. Dates use the YYYY/MM/DD format.\n");
    out.push_str("4. Write \"-\" for any field the report does not mention.\n");
    if !columns.is_empty() {
        out.push_str("Columns: ");
        out.push_str(&columns.join("\t"));
        out.push('\n');
    }
    let hint = hint.trim();
    if !hint.is_empty() {
        out.push_str(hint);
        out.push('\n');
    }
    if !roster.is_empty() {
        out.push_str(
            "After the last data row, append exactly one line of the form \
             [[MISSING: name, name]] listing every expected participant the \
             report has no data for, or [[MISSING: none]] if everyone \
             reported. Expected participants: ",
        );
        out.push_str(&roster.join(", "));
        out.push_str(".\n");
    }
    out.push_str("\nReport:\n");
    out.push_str(report);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn deterministic_for_identical_inputs() {
        let columns = cols(&["日期", "姓名", "数量"]);
        let roster = cols(&["A", "B"]);
        let a = build_instruction("report body", &columns, "hint text", &roster);
        let b = build_instruction("report body", &columns, "hint text", &roster);
        assert_eq!(a, b);
    }

    #[test]
    fn columns_appear_in_order_tab_separated() {
        let prompt = build_instruction("r", &cols(&["日期", "姓名", "数量"]), "", &[]);
        assert!(prompt.contains("Columns: 日期\t姓名\t数量\n"));
    }

    #[test]
    fn empty_columns_omit_the_column_line() {
        // "Custom" mode: no column constraint yet.
        let prompt = build_instruction("r", &[], "", &[]);
        assert!(!prompt.contains("Columns:"));
    }

    #[test]
    fn hint_is_included_verbatim() {
        let prompt = build_instruction("r", &[], "提取账号状态、剪辑发布及客资。", &[]);
        assert!(prompt.contains("提取账号状态、剪辑发布及客资。"));
    }

    #[test]
    fn roster_adds_the_reconciliation_instruction() {
        let prompt = build_instruction("r", &[], "", &cols(&["花花", "小冉"]));
        assert!(prompt.contains("[[MISSING: name, name]]"));
        assert!(prompt.contains("[[MISSING: none]]"));
        assert!(prompt.contains("花花, 小冉"));
    }

    #[test]
    fn empty_roster_omits_the_reconciliation_instruction() {
        let prompt = build_instruction("r", &[], "", &[]);
        assert!(!prompt.contains("[[MISSING:"));
    }

    #[test]
    fn report_text_comes_last() {
        let prompt = build_instruction("the report body", &[], "", &[]);
        assert!(prompt.ends_with("\nReport:\nthe report body"));
    }
}
