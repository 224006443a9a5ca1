//! SQL text handling for migration scripts
//!
//! Splits scripts into statements with the `sqlparser` tokenizer so that
//! semicolons inside literals, quoted identifiers and comments are respected.

use sqlparser::dialect::SQLiteDialect;
use sqlparser::tokenizer::{Token, Tokenizer};

/// Leading keywords of statements that open, close or nest transactions
const TRANSACTION_KEYWORDS: &[&str] = &["BEGIN", "COMMIT", "ROLLBACK", "END", "SAVEPOINT", "RELEASE"];

/// Split a script into individual statements, without trailing semicolons.
///
/// Statements consisting only of whitespace or comments are dropped.
pub fn split_sql_statements(sql: &str) -> Vec<String> {
    let dialect = SQLiteDialect {};
    let tokens = match Tokenizer::new(&dialect, sql).with_unescape(false).tokenize() {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::warn!("SQL tokenizing failed, using naive semicolon splitting: {}", e);
            return sql
                .split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
    };

    let mut statements = Vec::new();
    let mut current = String::new();
    let mut has_content = false;
    // First unquoted words of the current statement, uppercased
    let mut leading: Vec<String> = Vec::new();
    // BEGIN/CASE nesting inside a trigger definition
    let mut depth: usize = 0;

    for token in tokens {
        match token {
            Token::SemiColon if depth == 0 => {
                if has_content {
                    statements.push(current.trim().to_string());
                }
                current.clear();
                has_content = false;
                leading.clear();
            }
            Token::Whitespace(_) => current.push_str(&token.to_string()),
            Token::EOF => {}
            other => {
                if let Token::Word(word) = &other {
                    if word.quote_style.is_none() {
                        let upper = word.value.to_uppercase();
                        if leading.len() < 3 {
                            leading.push(upper.clone());
                        }
                        if is_trigger_definition(&leading) {
                            match upper.as_str() {
                                "BEGIN" | "CASE" => depth += 1,
                                "END" => depth = depth.saturating_sub(1),
                                _ => {}
                            }
                        }
                    }
                }
                has_content = true;
                current.push_str(&other.to_string());
            }
        }
    }

    if has_content {
        statements.push(current.trim().to_string());
    }

    statements
}

/// `CREATE [TEMP|TEMPORARY] TRIGGER ...`; its body holds `;`-terminated statements
fn is_trigger_definition(leading: &[String]) -> bool {
    match leading {
        [create, trigger, ..] if create == "CREATE" && trigger == "TRIGGER" => true,
        [create, temp, trigger, ..] => {
            create == "CREATE" && (temp == "TEMP" || temp == "TEMPORARY") && trigger == "TRIGGER"
        }
        _ => false,
    }
}

/// Whether a statement starts with a transaction control keyword
pub fn is_transaction_control(statement: &str) -> bool {
    let dialect = SQLiteDialect {};
    let first_word = match Tokenizer::new(&dialect, statement).tokenize() {
        Ok(tokens) => tokens.into_iter().find_map(|token| match token {
            Token::Whitespace(_) => None,
            Token::Word(word) => Some(word.value),
            _ => Some(String::new()),
        }),
        Err(_) => statement
            .split_whitespace()
            .next()
            .map(|word| word.trim_end_matches(';').to_string()),
    };

    first_word.is_some_and(|word| {
        TRANSACTION_KEYWORDS
            .iter()
            .any(|keyword| keyword.eq_ignore_ascii_case(&word))
    })
}
