//! Tests for the error system.

use stepwise::error::unified::*;
use stepwise::error::*;

#[test]
fn provider_error_display() {
    let err = StepwiseError::provider("openai", 404, "Not found");
    assert!(matches!(&err, StepwiseError::Provider { status: Some(404), .. }));
    assert_eq!(err.to_string(), "Provider error (openai): Not found");
}

#[test]
fn error_helper_mappings_are_stable_for_major_variants() {
    struct Case {
        error: StepwiseError,
        expected_category: ErrorCategory,
        expected_retryable: bool,
        expected_recovery: RecoverySuggestion,
    }

    let serde_error = serde_json::from_str::<serde_json::Value>("{not-json}").unwrap_err();

    let cases = vec![
        Case {
            error: StepwiseError::provider("anthropic", 401, "bad key"),
            expected_category: ErrorCategory::Authentication,
            expected_retryable: false,
            expected_recovery: RecoverySuggestion::CheckCredentials,
        },
        Case {
            error: StepwiseError::provider("anthropic", 429, "slow down"),
            expected_category: ErrorCategory::RateLimit,
            expected_retryable: true,
            expected_recovery: RecoverySuggestion::RetryWithBackoff,
        },
        Case {
            error: StepwiseError::provider("anthropic", 502, "bad gateway"),
            expected_category: ErrorCategory::Server,
            expected_retryable: true,
            expected_recovery: RecoverySuggestion::RetryWithBackoff,
        },
        Case {
            error: StepwiseError::provider_message("local", "connection refused", true),
            expected_category: ErrorCategory::Provider,
            expected_retryable: true,
            expected_recovery: RecoverySuggestion::ContactSupport,
        },
        Case {
            error: StepwiseError::Timeout(5000),
            expected_category: ErrorCategory::Timeout,
            expected_retryable: true,
            expected_recovery: RecoverySuggestion::IncreaseTimeout,
        },
        Case {
            error: StepwiseError::Canceled,
            expected_category: ErrorCategory::Canceled,
            expected_retryable: false,
            expected_recovery: RecoverySuggestion::ContactSupport,
        },
        Case {
            error: StepwiseError::Configuration("bad-config".to_string()),
            expected_category: ErrorCategory::Configuration,
            expected_retryable: false,
            expected_recovery: RecoverySuggestion::CheckConfiguration,
        },
        Case {
            error: StepwiseError::NoSuchTool {
                tool_name: "search".into(),
                tool_call_id: "call_1".into(),
                step: 2,
            },
            expected_category: ErrorCategory::ToolExecution,
            expected_retryable: false,
            expected_recovery: RecoverySuggestion::CheckToolImplementation,
        },
        Case {
            error: StepwiseError::LoopIterationExceeded { max_iterations: 5 },
            expected_category: ErrorCategory::LoopLimit,
            expected_retryable: false,
            expected_recovery: RecoverySuggestion::RaiseIterationLimit,
        },
        Case {
            error: StepwiseError::ObjectValidation {
                message: "missing bar".into(),
                raw_json: "{}".into(),
            },
            expected_category: ErrorCategory::Validation,
            expected_retryable: false,
            expected_recovery: RecoverySuggestion::RelaxSchemaOrRetry,
        },
        Case {
            error: StepwiseError::ProviderMismatch {
                expected: "openai".into(),
                actual: "anthropic".into(),
            },
            expected_category: ErrorCategory::InvalidRequest,
            expected_retryable: false,
            expected_recovery: RecoverySuggestion::FixRequest,
        },
        Case {
            error: StepwiseError::Serialization(serde_error),
            expected_category: ErrorCategory::Serialization,
            expected_retryable: false,
            expected_recovery: RecoverySuggestion::ContactSupport,
        },
    ];

    for case in cases {
        let display = case.error.to_string();
        assert_eq!(case.error.category(), case.expected_category, "{display}");
        assert_eq!(case.error.is_retryable(), case.expected_retryable, "{display}");
        assert_eq!(case.error.recovery_suggestion(), case.expected_recovery, "{display}");
    }
}

#[test]
fn tool_errors_name_tool_call_and_step() {
    let err = StepwiseError::InvalidToolInput {
        tool_name: "add".into(),
        tool_call_id: "call_7".into(),
        step: 3,
        message: "\"a\" is a required property".into(),
    };
    let text = err.to_string();
    assert!(text.contains("'add'"));
    assert!(text.contains("call_7"));
    assert!(text.contains("step 3"));
    assert_eq!(err.step(), Some(3));
    assert_eq!(StepwiseError::Canceled.step(), None);
}

#[test]
fn tool_execution_keeps_its_source() {
    use std::error::Error;

    let err = StepwiseError::ToolExecution {
        tool_name: "fetch".into(),
        tool_call_id: "call_1".into(),
        step: 0,
        source: Box::new(StepwiseError::Timeout(10)),
    };
    let source = err.source().unwrap();
    assert_eq!(source.to_string(), "Timeout after 10ms");
}

#[test]
fn loop_limit_names_the_cap() {
    let err = StepwiseError::LoopIterationExceeded { max_iterations: 3 };
    assert_eq!(err.to_string(), "Tool loop exceeded max iterations (3)");
}
