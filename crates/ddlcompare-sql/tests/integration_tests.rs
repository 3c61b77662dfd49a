//! Integration tests for splitting, parsing and type equivalence

use ddlcompare_core::{Dialect, ObjectKind, TypeMatching};
use ddlcompare_sql::{referenced_objects, split_statements, ParseErrorKind, SqlParser, TypeEquivalence};
use pretty_assertions::assert_eq;

const POSTGRES_DUMP: &str = r#"
-- dumped from a reporting database
SET statement_timeout = 0;

CREATE TABLE sales.customers (
    id integer NOT NULL,
    name character varying(50) NOT NULL,
    email text COLLATE "C",
    CONSTRAINT customers_pkey PRIMARY KEY (id)
);

CREATE TABLE sales.orders (
    id bigint NOT NULL,
    customer_id integer REFERENCES sales.customers(id),
    placed_at timestamp with time zone DEFAULT now(),
    total numeric(12,2) DEFAULT 0
);

COMMENT ON TABLE sales.orders IS 'one row; per order';

CREATE VIEW sales.order_totals AS
 SELECT c.name, sum(o.total) AS total
   FROM sales.orders o
   JOIN sales.customers c ON c.id = o.customer_id
  GROUP BY c.name;
"#;

const MYSQL_DUMP: &str = r#"
CREATE TABLE `sales`.`customers` (
  `id` int(11) NOT NULL,
  `name` varchar(40) NOT NULL,
  `email` text,
  PRIMARY KEY (`id`)
) ENGINE=InnoDB;
"#;

#[test]
fn split_and_parse_a_dump() {
    let statements = split_statements(Dialect::Postgres, "dump.sql", POSTGRES_DUMP);
    let names: Vec<String> = statements.iter().map(|s| s.name.to_string()).collect();
    assert_eq!(
        names,
        vec!["sales.customers", "sales.orders", "sales.order_totals"]
    );

    let parser = SqlParser::new(Dialect::Postgres);
    let objects: Vec<_> = statements
        .iter()
        .map(|s| parser.parse_statement(s).unwrap())
        .collect();

    assert_eq!(objects[0].column_names(), vec!["id", "name", "email"]);
    assert_eq!(objects[0].find_column("email").unwrap().collation.as_deref(), Some("C"));
    assert_eq!(objects[1].constraints.len(), 1);
    assert_eq!(objects[2].kind, ObjectKind::View);
}

#[test]
fn cross_dialect_length_mismatch() {
    let pg = split_statements(Dialect::Postgres, "pg", POSTGRES_DUMP);
    let my = split_statements(Dialect::MySql, "mysql", MYSQL_DUMP);

    let source = SqlParser::new(Dialect::Postgres).parse_statement(&pg[0]).unwrap();
    let target = SqlParser::new(Dialect::MySql).parse_statement(&my[0]).unwrap();
    assert_eq!(source.name, target.name);

    let equivalence = TypeEquivalence::new(Dialect::Postgres, Dialect::MySql, TypeMatching::Strict);
    let name_types = (
        &source.find_column("name").unwrap().data_type,
        &target.find_column("name").unwrap().data_type,
    );
    let mismatch = equivalence.compare(name_types.0, name_types.1).unwrap();
    assert_eq!(mismatch.aspect, "length");
    assert_eq!((mismatch.source.as_str(), mismatch.target.as_str()), ("50", "40"));

    let id_types = (
        &source.find_column("id").unwrap().data_type,
        &target.find_column("id").unwrap().data_type,
    );
    assert!(equivalence.equivalent(id_types.0, id_types.1));
}

#[test]
fn view_dependencies() {
    let statements = split_statements(Dialect::Postgres, "dump.sql", POSTGRES_DUMP);
    let view = statements.iter().find(|s| s.kind == ObjectKind::View).unwrap();

    let refs: Vec<String> = referenced_objects(Dialect::Postgres, &view.text)
        .unwrap()
        .into_iter()
        .map(|n| n.to_string())
        .collect();
    assert_eq!(refs, vec!["sales.orders", "sales.customers"]);
}

#[test]
fn parsing_is_deterministic() {
    let parser = SqlParser::new(Dialect::Postgres);
    let statements = split_statements(Dialect::Postgres, "dump.sql", POSTGRES_DUMP);

    for statement in &statements {
        let first = parser.parse_statement(statement).unwrap();
        let second = parser.parse_statement(statement).unwrap();
        assert_eq!(first, second);
    }
}

#[test]
fn malformed_statement_reports_object() {
    let parser = SqlParser::new(Dialect::Ansi);
    let err = parser.parse("CREATE TABLE s.broken (id INT,, name TEXT)").unwrap_err();

    assert_eq!(err.object.as_ref().map(|o| o.to_string()).as_deref(), Some("s.broken"));
    assert!(matches!(err.kind, ParseErrorKind::UnexpectedToken { .. }));
    assert!(err.to_string().contains("s.broken"));
}
