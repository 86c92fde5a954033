//! Output formatting - plaintext and JSON.

use serde_json::json;

use crate::issue::Issue;

/// One line per issue: `file:line,col-col: severity: message (rule)`.
pub fn format_plain(issues: &[Issue]) -> String {
    if issues.is_empty() {
        return "No issues found.\n".to_string();
    }

    let mut out = format!("ISSUES ({}):\n", issues.len());
    for issue in issues {
        let fixed = if issue.fixed { " [fixed]" } else { "" };
        out.push_str(&format!(
            "{}: {}: {} ({}){}\n",
            issue.range, issue.severity, issue.message, issue.rule, fixed
        ));
    }
    out
}

/// Prints issues in plain text format.
pub fn print_plain(issues: &[Issue]) {
    print!("{}", format_plain(issues));
}

/// Prints issues in JSON format.
///
/// Falls back to a line-per-issue array if serialization fails.
pub fn print_json(issues: &[Issue]) {
    match serde_json::to_string_pretty(&json!({ "issues": issues })) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("[WARN] JSON serialization failed: {}", e);
            let messages: Vec<String> = issues.iter().map(|i| format!("{}: {}", i.range, i.message)).collect();
            println!("{{\"issues\": {:?}}}", messages);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::Severity;
    use crate::syntax::SourceMap;

    fn issue(fixed: bool) -> Issue {
        let map = SourceMap::new("main.tf", "variable \"a\" {}\n");
        Issue {
            rule: "opentofu_unused_declarations".to_string(),
            severity: Severity::Warning,
            message: "variable \"a\" is declared but not used".to_string(),
            range: map.range(0..12),
            link: String::new(),
            fixable: true,
            fixed,
        }
    }

    #[test]
    fn test_format_plain_empty() {
        assert_eq!(format_plain(&[]), "No issues found.\n");
    }

    #[test]
    fn test_format_plain() {
        let out = format_plain(&[issue(false), issue(true)]);
        assert!(out.starts_with("ISSUES (2):\n"));
        assert!(out.contains(
            "main.tf:1,1-13: warning: variable \"a\" is declared but not used (opentofu_unused_declarations)\n"
        ));
        assert!(out.contains("[fixed]"));
    }

    #[test]
    fn test_issue_serializes() {
        let value = serde_json::to_value(issue(false)).unwrap();
        assert_eq!(value["severity"], "warning");
        assert_eq!(value["range"]["start"]["line"], 1);
        assert_eq!(value["range"]["filename"], "main.tf");
    }
}
