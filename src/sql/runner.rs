use std::time::Instant;

use metrics::{counter, histogram};
use sea_orm::{
    ConnectionTrait, DbErr, ExecResult, FromQueryResult, QueryResult, Statement,
};
use tracing::{debug, error};

use super::{bind_named, Dialect, Params};

const STATEMENTS_TOTAL: &str = "order_line_migrate.statements_total";
const STATEMENT_ERRORS_TOTAL: &str = "order_line_migrate.statement_errors_total";
const STATEMENT_DURATION: &str = "order_line_migrate.statement_duration_seconds";

/// Parameterized execution facade over an already-open connection or transaction.
///
/// Never commits or rolls back; the caller owns the transaction scope. Driver
/// errors are returned as-is.
pub struct QueryRunner<'c, C: ConnectionTrait> {
    conn: &'c C,
    dialect: Dialect,
}

impl<'c, C: ConnectionTrait> QueryRunner<'c, C> {
    pub fn new(conn: &'c C) -> Self {
        Self {
            conn,
            dialect: Dialect::from(conn.get_database_backend()),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Builds the engine statement: optional identifier translation, then
    /// placeholder resolution.
    pub fn prepare(
        &self,
        template: &str,
        params: &Params,
        translate: bool,
    ) -> Result<Statement, DbErr> {
        let sql = if translate {
            self.dialect.translate(template)
        } else {
            template.into()
        };
        let (sql, values) = bind_named(self.dialect, &sql, params)?;
        Ok(Statement::from_sql_and_values(
            self.dialect.backend(),
            sql,
            values,
        ))
    }

    /// Runs a statement and returns its rows.
    pub async fn query(
        &self,
        template: &str,
        params: &Params,
        translate: bool,
    ) -> Result<Vec<QueryResult>, DbErr> {
        let stmt = self.prepare(template, params, translate)?;
        debug!(dialect = %self.dialect, sql = %stmt.sql, "query");
        let started = Instant::now();
        let result = self.conn.query_all(stmt).await;
        self.record(started, result.as_ref().err());
        result
    }

    /// Runs a statement and maps each row onto `T`.
    pub async fn query_as<T: FromQueryResult>(
        &self,
        template: &str,
        params: &Params,
        translate: bool,
    ) -> Result<Vec<T>, DbErr> {
        self.query(template, params, translate)
            .await?
            .iter()
            .map(|row| T::from_query_result(row, ""))
            .collect()
    }

    /// Runs a statement that returns no rows.
    pub async fn execute(
        &self,
        template: &str,
        params: &Params,
        translate: bool,
    ) -> Result<ExecResult, DbErr> {
        let stmt = self.prepare(template, params, translate)?;
        debug!(dialect = %self.dialect, sql = %stmt.sql, "execute");
        let started = Instant::now();
        let result = self.conn.execute(stmt).await;
        self.record(started, result.as_ref().err());
        result
    }

    /// Selects a non-default schema for the rest of the session.
    ///
    /// Only PostgreSQL honours this; other engines ignore it.
    pub async fn set_search_path(&self, schema: &str) -> Result<(), DbErr> {
        if !self.dialect.supports_search_path() {
            debug!(dialect = %self.dialect, schema, "search_path not supported, ignoring");
            return Ok(());
        }
        let sql = format!("SET search_path TO {}", self.dialect.quote_ident(schema));
        self.execute(&sql, &Params::new(), false).await?;
        Ok(())
    }

    fn record(&self, started: Instant, err: Option<&DbErr>) {
        counter!(STATEMENTS_TOTAL, 1, "dialect" => self.dialect.to_string());
        histogram!(STATEMENT_DURATION, started.elapsed().as_secs_f64());
        if let Some(err) = err {
            counter!(STATEMENT_ERRORS_TOTAL, 1, "dialect" => self.dialect.to_string());
            error!(dialect = %self.dialect, error = %err, "statement failed");
        }
    }
}
