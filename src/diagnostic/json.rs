use super::Diagnostic;
use crate::source::SourceMap;

pub fn render(d: &Diagnostic) -> String {
    let source_map = d.source.as_deref().map(SourceMap::new);

    let labels: Vec<serde_json::Value> = d
        .labels
        .iter()
        .map(|l| {
            let mut obj = serde_json::json!({
                "start": l.span.start,
                "end": l.span.end,
                "message": l.message,
                "primary": l.is_primary,
            });
            if let Some(map) = &source_map {
                let (line, col) = map.lookup(l.span.start);
                obj["line"] = serde_json::Value::from(line);
                obj["col"] = serde_json::Value::from(col);
            }
            obj
        })
        .collect();

    let mut obj = serde_json::json!({
        "severity": d.severity,
        "message": d.message,
        "labels": labels,
        "notes": d.notes,
    });

    if let Some(code) = d.code {
        obj["code"] = serde_json::Value::String(code.to_string());
    }

    if let Some(s) = &d.suggestion {
        obj["suggestion"] = serde_json::Value::String(s.clone());
    }

    serde_json::to_string(&obj).unwrap_or_else(|_| {
        r#"{"severity":"error","message":"internal error serializing diagnostic"}"#.to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Span;

    fn parse_json(s: &str) -> serde_json::Value {
        serde_json::from_str(s).expect("valid JSON")
    }

    #[test]
    fn render_basic_error() {
        let v = parse_json(&render(&Diagnostic::error("Formula is too large")));
        assert_eq!(v["severity"], "error");
        assert_eq!(v["message"], "Formula is too large");
        assert!(v["labels"].as_array().unwrap().is_empty());
        assert!(v.get("code").is_none());
    }

    #[test]
    fn render_with_span_and_source() {
        let d = Diagnostic::error("Should be an Operator")
            .with_code(Some("FRM-P001"))
            .with_span(Span::new(12, 13), "here")
            .with_source("f {\n  z = 1 2\n}");
        let v = parse_json(&render(&d));
        let label = &v["labels"][0];
        assert_eq!(v["code"], "FRM-P001");
        assert_eq!(label["start"], 12);
        assert_eq!(label["end"], 13);
        assert_eq!(label["primary"], true);
        assert_eq!(label["line"], 2);
        assert_eq!(label["col"], 9);
    }

    #[test]
    fn render_warning_with_suggestion() {
        let d = Diagnostic::warning("Symmetry below is invalid, will use NOSYM")
            .with_suggestion("use one of XAXIS, YAXIS, ORIGIN ...");
        let v = parse_json(&render(&d));
        assert_eq!(v["severity"], "warning");
        assert!(v["suggestion"].as_str().unwrap().starts_with("use one of"));
    }

    #[test]
    fn label_without_source_has_no_line() {
        let d = Diagnostic::error("bad").with_span(Span::new(5, 8), "here");
        let v = parse_json(&render(&d));
        assert!(v["labels"][0].get("line").is_none());
    }
}
