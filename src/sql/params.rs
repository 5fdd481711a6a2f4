//! Named `:placeholder` binding.

use std::collections::HashMap;

use sea_orm::{DbErr, Value};

use super::Dialect;

/// Named statement parameters.
#[derive(Debug, Clone, Default)]
pub struct Params {
    values: Vec<(String, Value)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the value bound to `name`.
    pub fn bind(mut self, name: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        match self.values.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => self.values.push((name.to_string(), value)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values
            .iter()
            .find_map(|(n, v)| (n == name).then_some(v))
    }
}

/// Resolves every `:name` placeholder in `template` for the given engine.
///
/// PostgreSQL gets one `$n` per distinct name; MySQL and SQLite get a `?` per
/// occurrence with the value repeated. Quoted literals and identifiers and
/// `::type` casts are left alone.
pub fn bind_named(
    dialect: Dialect,
    template: &str,
    params: &Params,
) -> Result<(String, Vec<Value>), DbErr> {
    let bytes = template.as_bytes();
    let mut sql = String::with_capacity(template.len());
    let mut values = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut last = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"' | b'`') => {
                i += 1;
                while i < bytes.len() {
                    if bytes[i] == quote {
                        if bytes.get(i + 1) == Some(&quote) {
                            i += 2;
                            continue;
                        }
                        break;
                    }
                    i += 1;
                }
                i += 1;
            }
            b':' if bytes.get(i + 1) == Some(&b':') => i += 2,
            b':' if bytes
                .get(i + 1)
                .is_some_and(|b| b.is_ascii_alphabetic() || *b == b'_') =>
            {
                let start = i + 1;
                let mut end = start;
                while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_')
                {
                    end += 1;
                }
                let name = &template[start..end];
                let value = params.get(name).ok_or_else(|| {
                    DbErr::Custom(format!("no value bound for named parameter :{name}"))
                })?;

                sql.push_str(&template[last..i]);
                match dialect {
                    Dialect::Postgres => {
                        let next = positions.len() + 1;
                        let index = *positions.entry(name).or_insert_with(|| {
                            values.push(value.clone());
                            next
                        });
                        sql.push('$');
                        sql.push_str(&index.to_string());
                    }
                    Dialect::Mysql | Dialect::Sqlite => {
                        values.push(value.clone());
                        sql.push('?');
                    }
                }
                last = end;
                i = end;
            }
            _ => i += 1,
        }
    }
    sql.push_str(&template[last..]);

    Ok((sql, values))
}
