//! Parameter builder.
//!
//! Turns loosely-typed caller fields into the exact parameter bag an engine
//! adapter consumes. Pure: no I/O, and a bag is either fully built or not at all.

use common::errors::{AppError, AppResult};
use common::models::{ConnectionFields, ConnectionParams, EngineKind, MongoParams, OracleParams, SqlParams};

/// Validates `fields` for `db_type` and builds the parameter bag.
///
/// Empty strings and port `0` count as missing.
pub fn build(db_type: &str, fields: &ConnectionFields) -> AppResult<(EngineKind, ConnectionParams)> {
    let kind: EngineKind = db_type.parse()?;

    let params = match kind {
        EngineKind::Mongo => {
            let (Some(uri), Some(dbname)) = (present(&fields.uri), present(&fields.dbname)) else {
                return Err(AppError::Validation(format!(
                    "For {}, 'uri' and 'dbname' are required.",
                    kind
                )));
            };
            ConnectionParams::Mongo(MongoParams {
                uri: uri.to_string(),
                dbname: dbname.to_string(),
            })
        }
        EngineKind::Postgres | EngineKind::Mysql | EngineKind::Oracle => {
            let sql = sql_params(kind, fields)?;
            if kind == EngineKind::Oracle {
                ConnectionParams::Oracle(OracleParams {
                    dsn: format!("{}:{}/{}", sql.host, sql.port, sql.dbname),
                    user: sql.user,
                    password: sql.password,
                })
            } else {
                ConnectionParams::Sql(sql)
            }
        }
    };

    Ok((kind, params))
}

fn sql_params(kind: EngineKind, fields: &ConnectionFields) -> AppResult<SqlParams> {
    match (
        present(&fields.host),
        fields.port.filter(|p| *p != 0),
        present(&fields.user),
        present(&fields.password),
        present(&fields.dbname),
    ) {
        (Some(host), Some(port), Some(user), Some(password), Some(dbname)) => Ok(SqlParams {
            host: host.to_string(),
            port,
            user: user.to_string(),
            password: password.to_string(),
            dbname: dbname.to_string(),
        }),
        _ => Err(AppError::Validation(format!(
            "For {}, 'host', 'port', 'user', 'password', and 'dbname' are required.",
            kind
        ))),
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sql_fields() -> ConnectionFields {
        ConnectionFields {
            host: Some("h".into()),
            port: Some(1521),
            user: Some("scott".into()),
            password: Some("tiger".into()),
            dbname: Some("d".into()),
            uri: None,
        }
    }

    #[test]
    fn test_oracle_derives_connect_descriptor() {
        let (kind, params) = build("oracle", &sql_fields()).unwrap();
        assert_eq!(kind, EngineKind::Oracle);
        match &params {
            ConnectionParams::Oracle(p) => {
                assert_eq!(p.dsn, "h:1521/d");
                assert_eq!(p.user, "scott");
            }
            other => panic!("unexpected shape: {other:?}"),
        }
        let stored: serde_json::Value = serde_json::from_str(&params.to_json().unwrap()).unwrap();
        for key in ["host", "port", "dbname"] {
            assert!(stored.get(key).is_none(), "{key} must not be stored");
        }
    }

    #[test]
    fn test_postgres_and_mysql_keep_all_fields() {
        for db_type in ["postgres", "mysql"] {
            let (_, params) = build(db_type, &sql_fields()).unwrap();
            assert_eq!(
                params,
                ConnectionParams::Sql(SqlParams {
                    host: "h".into(),
                    port: 1521,
                    user: "scott".into(),
                    password: "tiger".into(),
                    dbname: "d".into(),
                })
            );
        }
    }

    #[test]
    fn test_missing_sql_field_names_engine() {
        for db_type in ["postgres", "mysql", "oracle"] {
            let mut fields = sql_fields();
            fields.password = None;
            let err = build(db_type, &fields).unwrap_err();
            assert!(matches!(err, AppError::Validation(ref m) if m.starts_with(&format!("For {db_type},"))));
        }
    }

    #[test]
    fn test_empty_string_and_zero_port_count_as_missing() {
        let mut fields = sql_fields();
        fields.host = Some(String::new());
        assert!(build("postgres", &fields).is_err());

        let mut fields = sql_fields();
        fields.port = Some(0);
        assert!(build("mysql", &fields).is_err());
    }

    #[test]
    fn test_mongo_requires_uri_and_dbname() {
        let fields = ConnectionFields {
            uri: Some("mongodb://localhost".into()),
            ..Default::default()
        };
        let err = build("mongo", &fields).unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("mongo")));

        let fields = ConnectionFields {
            uri: Some("mongodb://localhost".into()),
            dbname: Some("crm".into()),
            host: Some("ignored".into()),
            ..Default::default()
        };
        let (kind, params) = build("mongo", &fields).unwrap();
        assert_eq!(kind, EngineKind::Mongo);
        assert_eq!(
            params,
            ConnectionParams::Mongo(MongoParams {
                uri: "mongodb://localhost".into(),
                dbname: "crm".into(),
            })
        );
    }

    #[test]
    fn test_unknown_engine_is_rejected() {
        let err = build("sqlserver", &sql_fields()).unwrap_err();
        assert!(matches!(err, AppError::UnsupportedDatabaseType(ref t) if t == "sqlserver"));
    }
}
