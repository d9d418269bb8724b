//! Bind parameter resolution for the sqlx-backed engines.
//!
//! sqlx only binds by position. Named parameters (`:name`) are rewritten into
//! the engine's positional markers and the values are ordered to match.

use std::collections::HashMap;

use serde_json::{Map, Value};

use common::models::BindParams;

use crate::error::{EngineError, EngineResult};

/// Positional marker syntax of the target engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// PostgreSQL: `$1`, `$2`, ... A repeated name reuses its index.
    Numbered,
    /// MySQL: `?`. A repeated name binds its value again.
    Question,
}

/// SQL text ready for positional binding.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSql {
    pub sql: String,
    pub values: Vec<Value>,
}

pub fn resolve(sql: &str, binds: Option<&BindParams>, style: Placeholder) -> EngineResult<ResolvedSql> {
    match binds {
        None => Ok(ResolvedSql {
            sql: sql.to_string(),
            values: Vec::new(),
        }),
        Some(BindParams::Positional(values)) => Ok(ResolvedSql {
            sql: sql.to_string(),
            values: values.clone(),
        }),
        Some(BindParams::Named(named)) => rewrite_named(sql, named, style),
    }
}

fn rewrite_named(sql: &str, named: &Map<String, Value>, style: Placeholder) -> EngineResult<ResolvedSql> {
    let chars: Vec<char> = sql.chars().collect();
    let mut out = String::with_capacity(sql.len());
    let mut values = Vec::new();
    let mut numbered: HashMap<String, usize> = HashMap::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' | '`' => {
                let end = skip_quoted(&chars, i, c);
                out.extend(&chars[i..end]);
                i = end;
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                let end = chars[i..]
                    .iter()
                    .position(|&ch| ch == '\n')
                    .map_or(chars.len(), |p| i + p);
                out.extend(&chars[i..end]);
                i = end;
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                let end = find_block_end(&chars, i + 2);
                out.extend(&chars[i..end]);
                i = end;
            }
            ':' if chars.get(i + 1) == Some(&':') => {
                out.push_str("::");
                i += 2;
            }
            ':' if chars.get(i + 1).is_some_and(|ch| ch.is_ascii_alphabetic() || *ch == '_') => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_') {
                    end += 1;
                }
                let name: String = chars[start..end].iter().collect();
                let value = named.get(&name).ok_or_else(|| {
                    EngineError::invalid_query(format!("Missing value for bind parameter ':{}'", name))
                })?;

                match style {
                    Placeholder::Question => {
                        values.push(value.clone());
                        out.push('?');
                    }
                    Placeholder::Numbered => {
                        let index = match numbered.get(&name) {
                            Some(index) => *index,
                            None => {
                                values.push(value.clone());
                                numbered.insert(name, values.len());
                                values.len()
                            }
                        };
                        out.push('$');
                        out.push_str(&index.to_string());
                    }
                }
                i = end;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    Ok(ResolvedSql { sql: out, values })
}

/// Returns the index just past the closing quote. A doubled quote is an escape.
fn skip_quoted(chars: &[char], start: usize, quote: char) -> usize {
    let mut i = start + 1;
    while i < chars.len() {
        if chars[i] == quote {
            if chars.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        if chars[i] == '\\' && quote != '"' {
            i += 2;
            continue;
        }
        i += 1;
    }
    chars.len()
}

fn find_block_end(chars: &[char], from: usize) -> usize {
    let mut i = from;
    while i + 1 < chars.len() {
        if chars[i] == '*' && chars[i + 1] == '/' {
            return i + 2;
        }
        i += 1;
    }
    chars.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn named(value: Value) -> BindParams {
        match value {
            Value::Object(map) => BindParams::Named(map),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_positional_and_absent_binds_pass_through() {
        let resolved = resolve("SELECT $1", Some(&BindParams::Positional(vec![json!(3)])), Placeholder::Numbered).unwrap();
        assert_eq!(resolved.sql, "SELECT $1");
        assert_eq!(resolved.values, vec![json!(3)]);

        let resolved = resolve("SELECT 1", None, Placeholder::Question).unwrap();
        assert!(resolved.values.is_empty());
    }

    #[test]
    fn test_named_to_numbered_reuses_index() {
        let params = named(json!({"id": 7, "name": "bob"}));
        let resolved = resolve(
            "SELECT * FROM users WHERE id = :id OR parent = :id AND name = :name",
            Some(&params),
            Placeholder::Numbered,
        )
        .unwrap();
        assert_eq!(
            resolved.sql,
            "SELECT * FROM users WHERE id = $1 OR parent = $1 AND name = $2"
        );
        assert_eq!(resolved.values, vec![json!(7), json!("bob")]);
    }

    #[test]
    fn test_named_to_question_repeats_values() {
        let params = named(json!({"id": 7}));
        let resolved = resolve("DELETE FROM t WHERE a = :id OR b = :id", Some(&params), Placeholder::Question).unwrap();
        assert_eq!(resolved.sql, "DELETE FROM t WHERE a = ? OR b = ?");
        assert_eq!(resolved.values, vec![json!(7), json!(7)]);
    }

    #[test]
    fn test_quotes_comments_and_casts_are_left_alone() {
        let params = named(json!({"v": 1}));
        let sql = "SELECT ':v', \"a:b\", x::text, arr[1:2] -- :v\n/* :v */ FROM t WHERE y = :v";
        let resolved = resolve(sql, Some(&params), Placeholder::Numbered).unwrap();
        assert_eq!(
            resolved.sql,
            "SELECT ':v', \"a:b\", x::text, arr[1:2] -- :v\n/* :v */ FROM t WHERE y = $1"
        );
        assert_eq!(resolved.values.len(), 1);
    }

    #[test]
    fn test_missing_named_value_is_an_error() {
        let params = named(json!({"a": 1}));
        let err = resolve("SELECT :b", Some(&params), Placeholder::Question).unwrap_err();
        assert_eq!(err.to_string(), "Missing value for bind parameter ':b'");
    }
}
