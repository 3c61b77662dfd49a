//! Supported SQL dialects

use serde::{Deserialize, Serialize};

/// SQL dialect of a source or target
///
/// Selects the splitter rules, the type-mapping table and the catalog
/// query templates (see `ddlcompare_sql::profile`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Generic ANSI SQL
    Ansi,

    /// PostgreSQL (and Redshift)
    Postgres,

    /// MySQL / MariaDB
    MySql,

    /// Microsoft SQL Server
    MsSql,

    /// Snowflake
    Snowflake,

    /// Google BigQuery
    BigQuery,

    /// Teradata
    Teradata,
}

impl Dialect {
    /// Every dialect, in declaration order
    pub const ALL: [Dialect; 7] = [
        Dialect::Ansi,
        Dialect::Postgres,
        Dialect::MySql,
        Dialect::MsSql,
        Dialect::Snowflake,
        Dialect::BigQuery,
        Dialect::Teradata,
    ];

    /// Stable lowercase identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ansi => "ansi",
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
            Self::MsSql => "mssql",
            Self::Snowflake => "snowflake",
            Self::BigQuery => "bigquery",
            Self::Teradata => "teradata",
        }
    }
}

impl Default for Dialect {
    fn default() -> Self {
        Self::Ansi
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ansi" | "generic" => Ok(Self::Ansi),
            "postgres" | "postgresql" | "redshift" => Ok(Self::Postgres),
            "mysql" | "mariadb" => Ok(Self::MySql),
            "mssql" | "sqlserver" | "tsql" => Ok(Self::MsSql),
            "snowflake" => Ok(Self::Snowflake),
            "bigquery" => Ok(Self::BigQuery),
            "teradata" => Ok(Self::Teradata),
            other => Err(format!(
                "unknown dialect '{}' (expected one of: {})",
                other,
                Dialect::ALL.iter().map(|d| d.as_str()).collect::<Vec<_>>().join(", ")
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_aliases() {
        assert_eq!("PostgreSQL".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert_eq!("sqlserver".parse::<Dialect>().unwrap(), Dialect::MsSql);
        assert!("oracle".parse::<Dialect>().is_err());
    }

    #[test]
    fn display_roundtrips_through_from_str() {
        for dialect in Dialect::ALL {
            assert_eq!(dialect.to_string().parse::<Dialect>().unwrap(), dialect);
        }
    }
}
