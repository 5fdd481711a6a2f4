//! Engine dialects and the reference-to-MySQL identifier translator.
//!
//! Statements are authored once in the reference dialect (PostgreSQL style,
//! double-quoted identifiers). PostgreSQL and SQLite execute them unchanged;
//! MySQL/MariaDB receive a copy with back-tick quoting. Statements that rely on
//! engine-only primitives are written per engine and bypass the translator.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::DbBackend;

static PUBLIC_QUALIFIED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""public"\."(\w+)""#).expect("valid public-qualifier pattern")
});
static SCHEMA_QUALIFIED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""(\w+)"\."(\w+)""#).expect("valid qualified-name pattern"));
static QUOTED_IDENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""(\w+)""#).expect("valid identifier pattern"));

/// The relational engine a statement is dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Dialect {
    Postgres,
    Mysql,
    Sqlite,
}

impl From<DbBackend> for Dialect {
    fn from(backend: DbBackend) -> Self {
        match backend {
            DbBackend::Postgres => Dialect::Postgres,
            DbBackend::MySql => Dialect::Mysql,
            DbBackend::Sqlite => Dialect::Sqlite,
        }
    }
}

impl Dialect {
    pub fn backend(self) -> DbBackend {
        match self {
            Dialect::Postgres => DbBackend::Postgres,
            Dialect::Mysql => DbBackend::MySql,
            Dialect::Sqlite => DbBackend::Sqlite,
        }
    }

    /// Quote a single identifier for this engine.
    pub fn quote_ident(self, name: &str) -> String {
        match self {
            Dialect::Mysql => format!("`{}`", name.replace('`', "``")),
            Dialect::Postgres | Dialect::Sqlite => format!("\"{}\"", name.replace('"', "\"\"")),
        }
    }

    /// Whether reference-dialect statements must be rewritten before dispatch.
    pub fn needs_translation(self) -> bool {
        matches!(self, Dialect::Mysql)
    }

    /// Whether `INSERT ... RETURNING` is used to read generated keys.
    pub fn supports_returning(self) -> bool {
        matches!(self, Dialect::Postgres)
    }

    /// Whether a session-level `search_path` can select a non-default schema.
    pub fn supports_search_path(self) -> bool {
        matches!(self, Dialect::Postgres)
    }

    /// Rewrite a reference-dialect statement for this engine.
    ///
    /// Borrowed when the engine accepts the reference quoting as-is.
    pub fn translate(self, sql: &str) -> Cow<'_, str> {
        if self.needs_translation() {
            Cow::Owned(postgres_to_mysql(sql))
        } else {
            Cow::Borrowed(sql)
        }
    }
}

/// Rewrite double-quoted identifiers to back-tick quoting.
///
/// The default `"public"` qualifier is dropped, other schema qualifiers are
/// kept. Identifiers are assumed to contain only word characters.
pub fn postgres_to_mysql(sql: &str) -> String {
    let sql = PUBLIC_QUALIFIED.replace_all(sql, "`${1}`");
    let sql = SCHEMA_QUALIFIED.replace_all(&sql, "`${1}`.`${2}`");
    QUOTED_IDENT.replace_all(&sql, "`${1}`").into_owned()
}
