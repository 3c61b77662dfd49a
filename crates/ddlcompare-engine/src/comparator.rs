//! Schema comparator
//!
//! Compares one source object against any number of targets. Columns are
//! matched by name, never by position; constraints by kind and ordered
//! column list.

use crate::defaults::DefaultRules;
use ddlcompare_core::{
    AllowlistRules, ColumnComparison, ColumnSpec, ColumnStatus, CompareConfig, ComparisonResult, Config,
    ConstraintComparison, ConstraintSpec, ConstraintStatus, DimensionStatus, Mismatch, ObjectKind,
    ObjectName, OverallStatus, PairComparison, SchemaObject,
};
use ddlcompare_sql::TypeEquivalence;

/// Attribute-by-attribute comparison of schema objects
#[derive(Debug, Clone)]
pub struct Comparator {
    config: CompareConfig,
    defaults: DefaultRules,
    allowlist: AllowlistRules,
}

impl Comparator {
    /// Build a comparator; fails when a configured regex does not compile
    pub fn new(config: &Config) -> Result<Self, regex::Error> {
        Ok(Self {
            config: config.compare.clone(),
            defaults: DefaultRules::new(&config.default_rules, &config.ambiguous_defaults)?,
            allowlist: config.allowlist.clone(),
        })
    }

    /// Compare a source object against every target
    ///
    /// The object kind comes from whichever side has the object; an object
    /// absent everywhere is reported as a table.
    pub fn compare(
        &self,
        object: &ObjectName,
        source: Option<&SchemaObject>,
        targets: &[(&str, Option<&SchemaObject>)],
    ) -> ComparisonResult {
        let kind = source
            .or_else(|| targets.iter().find_map(|(_, t)| *t))
            .map(|o| o.kind)
            .unwrap_or(ObjectKind::Table);

        let pairs = targets
            .iter()
            .map(|(label, target)| match (source, target) {
                (None, _) => PairComparison::unavailable(*label, OverallStatus::NotAvailableInSource),
                (Some(_), None) => PairComparison::unavailable(*label, OverallStatus::NotAvailableInTarget),
                (Some(source), Some(target)) => self.compare_pair(label, source, target),
            })
            .collect();

        ComparisonResult::from_pairs(object.clone(), kind, pairs)
    }

    /// Compare one source/target pair of present objects
    pub fn compare_pair(&self, label: &str, source: &SchemaObject, target: &SchemaObject) -> PairComparison {
        let mut pair = PairComparison::unavailable(label, OverallStatus::Matched);

        if source.kind != target.kind {
            pair.kind_mismatch = Some(Mismatch::new(
                "kind",
                source.kind.to_string(),
                target.kind.to_string(),
            ));
            pair.status = OverallStatus::NotMatched;
            return pair;
        }

        match source.kind {
            ObjectKind::View => {
                if self.config.compare_view_bodies {
                    pair.view_body = Some(compare_view_bodies(source, target));
                }
            }
            ObjectKind::Table => {
                pair.columns = self.compare_columns(source, target);
                pair.constraints = compare_constraints(&source.constraints, &target.constraints);
            }
        }

        let matched = pair.columns.iter().all(|c| c.status == ColumnStatus::Matched)
            && pair.constraints.iter().all(|c| c.status == ConstraintStatus::Matched)
            && pair.view_body.as_ref().map_or(true, DimensionStatus::is_match);
        if !matched {
            pair.status = OverallStatus::NotMatched;
        }
        pair
    }

    fn compare_columns(&self, source: &SchemaObject, target: &SchemaObject) -> Vec<ColumnComparison> {
        let types = TypeEquivalence::new(source.dialect, target.dialect, self.config.type_matching);
        let ignore_defaults = self.allowlist.are_defaults_ignored(&source.name.to_string())
            || self.allowlist.are_defaults_ignored(&source.name.short().to_string());

        let pairing = pair_columns(source, target);
        let mut columns = Vec::new();

        for (column, matched) in source.columns.iter().zip(&pairing) {
            match matched {
                Some(index) => {
                    columns.push(self.compare_column(&types, ignore_defaults, column, &target.columns[*index]))
                }
                None => columns.push(ColumnComparison::missing_in_target(&column.name)),
            }
        }

        for (index, column) in target.columns.iter().enumerate() {
            if !pairing.contains(&Some(index)) {
                columns.push(ColumnComparison::missing_in_source(&column.name));
            }
        }

        columns
    }

    fn compare_column(
        &self,
        types: &TypeEquivalence,
        ignore_defaults: bool,
        source: &ColumnSpec,
        target: &ColumnSpec,
    ) -> ColumnComparison {
        let data_type = match types.compare(&source.data_type, &target.data_type) {
            Some(mismatch) => DimensionStatus::Mismatched(mismatch),
            None => DimensionStatus::Matched,
        };

        let nullability = if source.nullable == target.nullable {
            DimensionStatus::Matched
        } else {
            DimensionStatus::Mismatched(Mismatch::new(
                "nullability",
                nullability_label(source.nullable),
                nullability_label(target.nullable),
            ))
        };

        let default = if ignore_defaults {
            DimensionStatus::NotCompared
        } else {
            self.defaults.compare(source.default.as_deref(), target.default.as_deref())
        };

        let collation = if self.config.ignore_collation {
            DimensionStatus::NotCompared
        } else {
            compare_collations(source.collation.as_deref(), target.collation.as_deref())
        };

        ColumnComparison::compared(&source.name, data_type, nullability, default, collation)
    }
}

/// Target column index for each source column
///
/// Exact names pair first. A leftover source column then pairs
/// case-insensitively, but only when exactly one leftover column on each
/// side folds to that name. Every target column pairs at most once.
fn pair_columns(source: &SchemaObject, target: &SchemaObject) -> Vec<Option<usize>> {
    let mut pairing: Vec<Option<usize>> = source
        .columns
        .iter()
        .map(|c| target.columns.iter().position(|t| t.name == c.name))
        .collect();

    let unpaired_targets: Vec<usize> = (0..target.columns.len())
        .filter(|i| !pairing.contains(&Some(*i)))
        .collect();
    let unpaired_sources: Vec<usize> = (0..source.columns.len()).filter(|i| pairing[*i].is_none()).collect();

    for &s in &unpaired_sources {
        let name = &source.columns[s].name;
        let folds = |other: &str| other.eq_ignore_ascii_case(name);

        let mut candidates = unpaired_targets.iter().filter(|t| folds(&target.columns[**t].name));
        let rivals = unpaired_sources
            .iter()
            .filter(|o| folds(&source.columns[**o].name))
            .count();
        if let (Some(&t), None, 1) = (candidates.next(), candidates.next(), rivals) {
            pairing[s] = Some(t);
        }
    }

    pairing
}

fn nullability_label(nullable: bool) -> &'static str {
    if nullable {
        "NULL"
    } else {
        "NOT NULL"
    }
}

fn compare_collations(source: Option<&str>, target: Option<&str>) -> DimensionStatus {
    let same = match (source, target) {
        (None, None) => true,
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    };

    if same {
        DimensionStatus::Matched
    } else {
        DimensionStatus::Mismatched(Mismatch::new(
            "collation",
            source.unwrap_or("none"),
            target.unwrap_or("none"),
        ))
    }
}

fn compare_view_bodies(source: &SchemaObject, target: &SchemaObject) -> DimensionStatus {
    let left = source.view_body.as_deref().unwrap_or_default();
    let right = target.view_body.as_deref().unwrap_or_default();

    if left == right {
        DimensionStatus::Matched
    } else {
        DimensionStatus::Mismatched(Mismatch::new("body", left, right))
    }
}

/// Pair constraints by kind and ordered columns
///
/// A source constraint with no same-kind partner is paired with an unused
/// target constraint on the same columns (kind mismatch) before being
/// reported missing.
pub fn compare_constraints(source: &[ConstraintSpec], target: &[ConstraintSpec]) -> Vec<ConstraintComparison> {
    let mut used = vec![false; target.len()];
    let mut results = Vec::new();

    for constraint in source {
        let same_kind = find_unused(target, &used, |t| t.kind == constraint.kind && t.columns == constraint.columns);

        let status = if let Some(index) = same_kind {
            used[index] = true;
            compare_references(constraint, &target[index])
        } else if let Some(index) = find_unused(target, &used, |t| t.columns == constraint.columns) {
            used[index] = true;
            ConstraintStatus::Mismatched(format!("{} vs {}", constraint.kind, target[index].kind))
        } else {
            ConstraintStatus::MissingInTarget
        };

        results.push(ConstraintComparison {
            kind: constraint.kind,
            columns: constraint.columns.clone(),
            status,
        });
    }

    for (constraint, _) in target.iter().zip(&used).filter(|(_, used)| !**used) {
        results.push(ConstraintComparison {
            kind: constraint.kind,
            columns: constraint.columns.clone(),
            status: ConstraintStatus::MissingInSource,
        });
    }

    results
}

fn compare_references(source: &ConstraintSpec, target: &ConstraintSpec) -> ConstraintStatus {
    match (&source.references, &target.references) {
        (Some(a), Some(b)) if a.object.matches(&b.object) && a.columns == b.columns => ConstraintStatus::Matched,
        (Some(a), Some(b)) => ConstraintStatus::Mismatched(format!(
            "references {}({}) vs {}({})",
            a.object,
            a.columns.join(", "),
            b.object,
            b.columns.join(", ")
        )),
        (None, None) => ConstraintStatus::Matched,
        _ => ConstraintStatus::Mismatched("reference target differs".to_string()),
    }
}

fn find_unused(target: &[ConstraintSpec], used: &[bool], pred: impl Fn(&ConstraintSpec) -> bool) -> Option<usize> {
    target
        .iter()
        .enumerate()
        .find(|(i, c)| !used[*i] && pred(c))
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddlcompare_core::{CanonicalType, Dialect, TypeFamily, TypeMatching};
    use ddlcompare_sql::SqlParser;
    use pretty_assertions::assert_eq;

    fn parse(dialect: Dialect, sql: &str) -> SchemaObject {
        SqlParser::new(dialect).parse(sql).unwrap()
    }

    fn comparator() -> Comparator {
        Comparator::new(&Config::default()).unwrap()
    }

    fn int(name: &str) -> ColumnSpec {
        ColumnSpec::new(name, CanonicalType::new(TypeFamily::Int32, "INT"))
    }

    #[test]
    fn test_identical_tables_match() {
        let sql = "CREATE TABLE s.t (id INT PRIMARY KEY, name VARCHAR(20) DEFAULT 'x', \
                   parent_id INT REFERENCES s.p(id))";
        let table = parse(Dialect::Postgres, sql);

        let result = comparator().compare(&table.name, Some(&table), &[("prod", Some(&table))]);
        assert_eq!(result.status, OverallStatus::Matched);
        assert!(result.mismatch_notes(10).is_empty());
    }

    #[test]
    fn test_length_mismatch() {
        let source = parse(Dialect::Postgres, "CREATE TABLE s.customers (name VARCHAR(50))");
        let target = parse(Dialect::MySql, "CREATE TABLE s.customers (name VARCHAR(40))");

        let pair = comparator().compare_pair("prod", &source, &target);
        assert_eq!(pair.status, OverallStatus::NotMatched);
        assert_eq!(
            pair.columns[0].data_type,
            Some(DimensionStatus::Mismatched(Mismatch::new("length", "50", "40")))
        );
        assert_eq!(pair.notes(), vec!["column 'name' length (50 vs 40)".to_string()]);
    }

    #[test]
    fn test_column_sets_by_name() {
        let source = SchemaObject::table(ObjectName::parse("s.t"), Dialect::Ansi, vec![int("a"), int("b")], vec![]);
        let target = SchemaObject::table(ObjectName::parse("s.t"), Dialect::Ansi, vec![int("c"), int("a")], vec![]);

        let pair = comparator().compare_pair("prod", &source, &target);
        let statuses: Vec<_> = pair.columns.iter().map(|c| (c.name.as_str(), c.status)).collect();
        assert_eq!(
            statuses,
            vec![
                ("a", ColumnStatus::Matched),
                ("b", ColumnStatus::MissingInTarget),
                ("c", ColumnStatus::MissingInSource),
            ]
        );
    }

    #[test]
    fn test_case_colliding_columns_pair_once() {
        let source = parse(Dialect::Postgres, r#"CREATE TABLE s.t (a INT, "A" INT)"#);
        let target = parse(Dialect::Postgres, "CREATE TABLE s.t (a INT)");

        let pair = comparator().compare_pair("prod", &source, &target);
        let statuses: Vec<_> = pair.columns.iter().map(|c| (c.name.as_str(), c.status)).collect();
        assert_eq!(statuses, vec![("a", ColumnStatus::Matched), ("A", ColumnStatus::MissingInTarget)]);
        assert_eq!(pair.status, OverallStatus::NotMatched);

        let backward = comparator().compare_pair("prod", &target, &source);
        assert_eq!(backward.status, OverallStatus::NotMatched);
    }

    #[test]
    fn test_case_insensitive_fallback() {
        let source = SchemaObject::table(ObjectName::parse("s.t"), Dialect::Ansi, vec![int("Id")], vec![]);
        let target = SchemaObject::table(ObjectName::parse("s.t"), Dialect::Ansi, vec![int("id")], vec![]);
        assert_eq!(comparator().compare_pair("prod", &source, &target).status, OverallStatus::Matched);

        // two leftover target columns fold to the same name: no guess
        let target = SchemaObject::table(ObjectName::parse("s.t"), Dialect::Ansi, vec![int("ID"), int("iD")], vec![]);
        let pair = comparator().compare_pair("prod", &source, &target);
        assert!(pair.columns.iter().all(|c| c.status != ColumnStatus::Matched));
    }

    #[test]
    fn test_column_order_is_irrelevant() {
        let source = SchemaObject::table(ObjectName::parse("s.t"), Dialect::Ansi, vec![int("a"), int("b")], vec![]);
        let target = SchemaObject::table(ObjectName::parse("s.t"), Dialect::Ansi, vec![int("b"), int("a")], vec![]);
        assert_eq!(comparator().compare_pair("prod", &source, &target).status, OverallStatus::Matched);
    }

    #[test]
    fn test_direction_relativity() {
        let a = SchemaObject::table(ObjectName::parse("s.t"), Dialect::Ansi, vec![int("a"), int("b")], vec![]);
        let b = SchemaObject::table(ObjectName::parse("s.t"), Dialect::Ansi, vec![int("a")], vec![]);

        let forward = comparator().compare_pair("x", &a, &b);
        let backward = comparator().compare_pair("x", &b, &a);
        assert_eq!(forward.columns[1].status, ColumnStatus::MissingInTarget);
        assert_eq!(backward.columns[1].status, ColumnStatus::MissingInSource);
    }

    #[test]
    fn test_nullability_default_and_collation() {
        let source = parse(
            Dialect::Postgres,
            "CREATE TABLE s.t (code VARCHAR(5) NOT NULL DEFAULT 'A' COLLATE \"C\")",
        );
        let target = parse(Dialect::Postgres, "CREATE TABLE s.t (code VARCHAR(5) DEFAULT 'B' COLLATE \"POSIX\")");

        let pair = comparator().compare_pair("prod", &source, &target);
        let column = &pair.columns[0];
        assert_eq!(column.status, ColumnStatus::Mismatched);
        assert_eq!(
            column.nullability,
            Some(DimensionStatus::Mismatched(Mismatch::new("nullability", "NOT NULL", "NULL")))
        );
        assert_eq!(
            column.default,
            Some(DimensionStatus::Mismatched(Mismatch::new("default", "'A'", "'B'")))
        );
        assert!(matches!(column.collation, Some(DimensionStatus::Mismatched(_))));
    }

    #[test]
    fn test_collation_is_case_insensitive_and_optional() {
        assert_eq!(compare_collations(Some("utf8mb4_bin"), Some("UTF8MB4_BIN")), DimensionStatus::Matched);

        let mut config = Config::default();
        config.compare.ignore_collation = true;
        let comparator = Comparator::new(&config).unwrap();

        let source = parse(Dialect::Postgres, "CREATE TABLE s.t (code TEXT COLLATE \"C\")");
        let target = parse(Dialect::Postgres, "CREATE TABLE s.t (code TEXT)");
        let pair = comparator.compare_pair("prod", &source, &target);
        assert_eq!(pair.columns[0].collation, Some(DimensionStatus::NotCompared));
        assert_eq!(pair.status, OverallStatus::Matched);
    }

    #[test]
    fn test_ignored_defaults() {
        let mut config = Config::default();
        config.allowlist.ignore_defaults = vec!["s.*".to_string()];
        let comparator = Comparator::new(&config).unwrap();

        let source = parse(Dialect::Postgres, "CREATE TABLE s.t (at TIMESTAMP DEFAULT now())");
        let target = parse(Dialect::Postgres, "CREATE TABLE s.t (at TIMESTAMP)");
        let pair = comparator.compare_pair("prod", &source, &target);
        assert_eq!(pair.columns[0].default, Some(DimensionStatus::NotCompared));
        assert_eq!(pair.status, OverallStatus::Matched);
    }

    #[test]
    fn test_family_matching() {
        let source = parse(Dialect::Postgres, "CREATE TABLE s.t (n INTEGER)");
        let target = parse(Dialect::Postgres, "CREATE TABLE s.t (n BIGINT)");
        assert_eq!(comparator().compare_pair("prod", &source, &target).status, OverallStatus::NotMatched);

        let mut config = Config::default();
        config.compare.type_matching = TypeMatching::Family;
        let relaxed = Comparator::new(&config).unwrap();
        assert_eq!(relaxed.compare_pair("prod", &source, &target).status, OverallStatus::Matched);
    }

    #[test]
    fn test_constraints() {
        let source = vec![
            ConstraintSpec::primary_key(["id"]),
            ConstraintSpec::unique(["email"]),
            ConstraintSpec::foreign_key(["customer_id"], ObjectName::parse("s.customers"), ["id"]),
        ];
        let target = vec![
            ConstraintSpec::primary_key(["id"]).named("pk_t"),
            ConstraintSpec::primary_key(["email"]),
            ConstraintSpec::foreign_key(["customer_id"], ObjectName::parse("s.clients"), ["id"]),
            ConstraintSpec::unique(["code"]),
        ];

        let statuses: Vec<_> = compare_constraints(&source, &target)
            .into_iter()
            .map(|c| (c.columns.join(","), c.status))
            .collect();
        assert_eq!(
            statuses,
            vec![
                ("id".to_string(), ConstraintStatus::Matched),
                ("email".to_string(), ConstraintStatus::Mismatched("UNIQUE vs PRIMARY KEY".to_string())),
                (
                    "customer_id".to_string(),
                    ConstraintStatus::Mismatched("references s.customers(id) vs s.clients(id)".to_string())
                ),
                ("code".to_string(), ConstraintStatus::MissingInSource),
            ]
        );
    }

    #[test]
    fn test_foreign_key_schema_qualification() {
        let source = vec![ConstraintSpec::foreign_key(["c"], ObjectName::parse("sales.customers"), ["id"])];
        let target = vec![ConstraintSpec::foreign_key(["c"], ObjectName::parse("customers"), ["id"])];
        assert_eq!(compare_constraints(&source, &target)[0].status, ConstraintStatus::Matched);
    }

    #[test]
    fn test_views() {
        let source = parse(Dialect::Postgres, "CREATE VIEW s.v AS SELECT a FROM s.t");
        let target = parse(Dialect::Postgres, "CREATE VIEW s.v AS SELECT a, b FROM s.t");

        // presence only by default
        assert_eq!(comparator().compare_pair("prod", &source, &target).status, OverallStatus::Matched);

        let mut config = Config::default();
        config.compare.compare_view_bodies = true;
        let pair = Comparator::new(&config).unwrap().compare_pair("prod", &source, &target);
        assert_eq!(pair.status, OverallStatus::NotMatched);
        assert_eq!(pair.notes(), vec!["view body".to_string()]);
    }

    #[test]
    fn test_table_versus_view() {
        let table = parse(Dialect::Postgres, "CREATE TABLE s.x (a INT)");
        let view = parse(Dialect::Postgres, "CREATE VIEW s.x AS SELECT 1 AS a");

        let pair = comparator().compare_pair("prod", &table, &view);
        assert_eq!(pair.status, OverallStatus::NotMatched);
        assert_eq!(pair.kind_mismatch, Some(Mismatch::new("kind", "TABLE", "VIEW")));
        assert!(pair.columns.is_empty());
    }

    #[test]
    fn test_absent_objects() {
        let table = parse(Dialect::Postgres, "CREATE TABLE s.orders (id INT)");
        let name = ObjectName::parse("s.orders");
        let comparator = comparator();

        let result = comparator.compare(&name, Some(&table), &[("prod", None)]);
        assert_eq!(result.status, OverallStatus::NotAvailableInTarget);
        assert!(result.pairs[0].columns.is_empty());

        let result = comparator.compare(&name, None, &[("prod", Some(&table))]);
        assert_eq!(result.status, OverallStatus::NotAvailableInSource);
        assert_eq!(result.kind, ObjectKind::Table);
    }

    #[test]
    fn test_one_to_many_precedence() {
        let a = parse(Dialect::Postgres, "CREATE TABLE s.t (id INT)");
        let b = parse(Dialect::Postgres, "CREATE TABLE s.t (id BIGINT)");

        let result = comparator().compare(&a.name, Some(&a), &[("same", Some(&a)), ("other", Some(&b))]);
        assert_eq!(result.status, OverallStatus::NotMatched);
        assert_eq!(result.pairs[0].status, OverallStatus::Matched);

        let result = comparator().compare(
            &a.name,
            Some(&a),
            &[("same", Some(&a)), ("other", Some(&b)), ("gone", None)],
        );
        assert_eq!(result.status, OverallStatus::NotAvailableInTarget);
    }

    #[test]
    fn test_comparison_is_idempotent() {
        let source = parse(Dialect::Postgres, "CREATE TABLE s.t (id INT, name VARCHAR(50) DEFAULT 'n')");
        let target = parse(Dialect::MySql, "CREATE TABLE s.t (id INT, name VARCHAR(40))");
        let comparator = comparator();

        let first = comparator.compare(&source.name, Some(&source), &[("prod", Some(&target))]);
        let second = comparator.compare(&source.name, Some(&source), &[("prod", Some(&target))]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_ambiguity_pattern() {
        let mut config = Config::default();
        config.ambiguous_defaults.push("[".to_string());
        assert!(Comparator::new(&config).is_err());
    }
}
