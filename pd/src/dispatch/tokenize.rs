//! Splitting a typed line into argv tokens

use tracing::debug;

use crate::error::DispatchError;

/// Split on whitespace, honouring single and double quotes and backslashes
pub fn tokenize(line: &str) -> Result<Vec<String>, DispatchError> {
    debug!(%line, "tokenize: called");
    shell_words::split(line).map_err(|e| {
        debug!(error = %e, "tokenize: split failed");
        DispatchError::Quote(format!("{} (unterminated quote?)", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_respects_quotes() {
        let tokens = tokenize(r#"project add "Physics Study Plan" --description 'exam prep'"#).unwrap();
        assert_eq!(
            tokens,
            vec!["project", "add", "Physics Study Plan", "--description", "exam prep"]
        );
    }

    #[test]
    fn test_tokenize_empty_line() {
        assert!(tokenize("   ").unwrap().is_empty());
    }

    #[test]
    fn test_tokenize_unterminated_quote_is_error() {
        let err = tokenize(r#"project add "Physics"#).unwrap_err();
        assert!(matches!(err, DispatchError::Quote(_)));
    }
}
