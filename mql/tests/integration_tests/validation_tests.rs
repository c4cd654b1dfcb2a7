//! Integration tests for the validation entry points and error reporting.

use mql::query::{parse_expr, ParseMode};
use mql::{parse, validate, validate_with_errors, CompileOptions, MqlError, QueryCompiler};

#[test]
fn test_rejected_inputs_report_errors() {
    for query in ["metric{", "rate(metric)", "", "   ", "5xx_errors", "sum(", "up{job=}"] {
        assert!(!validate(query), "{query:?}");
        assert!(!validate_with_errors(query).is_empty(), "{query:?}");
    }
}

#[test]
fn test_accepted_inputs() {
    for query in [
        "up",
        r#"up{job="api"}"#,
        r#"http_requests_total{code=~"5..", method!~"GET|HEAD"}"#,
        "rate(http_requests_total[5m])",
        "sum(rate(http_requests_total[5m])) by (job)",
        "sum by (job) (rate(http_requests_total[5m]))",
        "quantile_over_time(0.99, latency[1h30m])",
        "max_over_time(cpu[1h]) > 0.9",
        r#"label_replace(up, "host", "$1", "instance", "(.*):.*")"#,
        "round(avg(cpu) without (cpu), 0.01)",
        "-errors / requests",
        "# comment\nup",
    ] {
        assert!(validate(query), "{query:?}: {:?}", validate_with_errors(query));
    }
}

#[test]
fn test_error_taxonomy() {
    let compiler = QueryCompiler::default();

    assert!(matches!(compiler.compile(""), Err(MqlError::Validation(_))));
    assert!(matches!(compiler.compile("metric{"), Err(MqlError::Syntax(_))));
    assert!(matches!(compiler.compile("rate(metric)"), Err(MqlError::Semantic(_))));
    assert!(matches!(
        compiler.compile("quantile_over_time(latency[5m])"),
        Err(MqlError::Semantic(_))
    ));
    assert!(matches!(
        compiler.compile("sum(metric[5m])"),
        Err(MqlError::Semantic(_))
    ));
}

#[test]
fn test_rollup_without_window_parses_but_fails_to_compile() {
    assert!(parse_expr("rate(metric)", ParseMode::Strict).is_ok());

    let errors = validate_with_errors("rate(metric)");
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("requires a time range"), "{errors:?}");
}

#[test]
fn test_syntax_errors_carry_positions_and_hints() {
    let Err(MqlError::Syntax(errors)) = QueryCompiler::default().compile("up{job=\"api\"") else {
        panic!("expected syntax error");
    };

    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].line, 1);
    assert!(errors[0].column > 1);
    assert!(errors[0].hint.is_some());
}

#[test]
fn test_errors_on_later_lines() {
    let Err(MqlError::Syntax(errors)) =
        QueryCompiler::default().compile("sum(\n  rate(x[5m]) +\n)")
    else {
        panic!("expected syntax error");
    };

    assert_eq!(errors[0].line, 3);
    assert_eq!(errors[0].column, 1);
}

#[test]
fn test_metric_starting_with_digit() {
    let errors = validate_with_errors("5xx_errors");
    assert!(!errors.is_empty());
    assert!(errors[0].contains("line 1, column 1"), "{errors:?}");
}

#[test]
fn test_strict_and_lenient_modes() {
    let query = r#"up{job=api, env="prod"}"#;

    assert!(parse(query, true).is_err());
    let compiled = parse(query, false).unwrap();
    assert_eq!(compiled.kind, mql::ValueKind::InstantVector);

    let parsed = parse_expr(query, ParseMode::Lenient).unwrap();
    assert_eq!(parsed.diagnostics.len(), 1);
}

#[test]
fn test_lenient_mode_still_fails_semantic_checks() {
    assert!(parse("rate(metric)", false).unwrap_err().is_semantic());
}

#[test]
fn test_options_from_code() {
    let compiler = QueryCompiler::new(
        CompileOptions::new()
            .with_max_query_length(64)
            .with_max_depth(8),
    );

    assert!(compiler.compile("sum(up)").is_ok());
    assert!(matches!(
        compiler.compile(&"a + ".repeat(20)),
        Err(MqlError::Validation(_))
    ));
}

#[test]
fn test_deep_expressions_are_rejected_without_overflowing() {
    for query in [
        format!("{}1", "-".repeat(16_000)),
        format!("{}up", "+".repeat(16_000)),
        vec!["up"; 1500].join("+"),
        vec!["up"; 1500].join(" or "),
    ] {
        let err = QueryCompiler::default().compile(&query).unwrap_err();
        assert!(err.is_syntax(), "{err}");
        assert!(
            err.messages().iter().any(|m| m.contains("deeper than 128")),
            "{:?}",
            err.messages()
        );
    }
}

#[test]
fn test_long_operator_chains_within_the_limit_compile() {
    let compiled = QueryCompiler::default()
        .compile(&vec!["up"; 100].join(" + "))
        .unwrap();
    assert_eq!(
        compiled.fragment.placeholder_count(),
        compiled.fragment.params().len()
    );
}
