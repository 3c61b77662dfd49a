//! Type normalization and cross-dialect type equivalence

use crate::profile::profile;
use ddlcompare_core::{CanonicalType, Dialect, Mismatch, TypeClass, TypeFamily, TypeMatching};

/// Words that never change the family of a type
const IGNORED_WORDS: &[&str] = &["UNSIGNED", "SIGNED", "ZEROFILL"];

/// A raw type token split into its parts
#[derive(Debug, Default)]
struct TypeToken {
    /// Words before the argument list
    base: Vec<String>,

    /// Arguments of the first parenthesized group
    args: Vec<String>,

    /// Words after the argument list
    tail: Vec<String>,

    /// `[]` suffix
    array: bool,
}

fn split_type(raw: &str) -> TypeToken {
    let mut token = TypeToken::default();
    let mut word = String::new();
    let mut arg = String::new();
    let mut seen_args = false;
    let mut paren_depth = 0usize;
    let mut angle_depth = 0usize;
    let mut in_bracket = false;

    let flush_word = |word: &mut String, token: &mut TypeToken, seen_args: bool| {
        if !word.is_empty() {
            let upper = word.to_uppercase();
            if seen_args {
                token.tail.push(upper);
            } else {
                token.base.push(upper);
            }
            word.clear();
        }
    };

    for ch in raw.chars() {
        if paren_depth > 0 {
            match ch {
                '(' => {
                    paren_depth += 1;
                    arg.push(ch);
                }
                ')' => {
                    paren_depth -= 1;
                    if paren_depth == 0 {
                        if !seen_args {
                            token.args.push(arg.trim().to_string());
                        }
                        arg.clear();
                        seen_args = true;
                    } else {
                        arg.push(ch);
                    }
                }
                ',' if paren_depth == 1 => {
                    if !seen_args {
                        token.args.push(arg.trim().to_string());
                    }
                    arg.clear();
                }
                _ => arg.push(ch),
            }
            continue;
        }
        if angle_depth > 0 {
            match ch {
                '<' => angle_depth += 1,
                '>' => angle_depth -= 1,
                _ => {}
            }
            continue;
        }
        if in_bracket {
            in_bracket = ch != ']';
            continue;
        }

        match ch {
            '(' => {
                flush_word(&mut word, &mut token, seen_args);
                paren_depth = 1;
            }
            '<' => {
                flush_word(&mut word, &mut token, seen_args);
                angle_depth = 1;
            }
            '[' => {
                flush_word(&mut word, &mut token, seen_args);
                token.array = true;
                in_bracket = true;
            }
            c if c.is_alphanumeric() || c == '_' => word.push(c),
            _ => flush_word(&mut word, &mut token, seen_args),
        }
    }
    flush_word(&mut word, &mut token, seen_args);

    token
}

/// Map a dialect type token onto the canonical type model
///
/// Unrecognized tokens keep their raw text and get a best-effort class.
pub fn normalize(dialect: Dialect, raw: &str) -> CanonicalType {
    let raw = raw.trim();
    let token = split_type(raw);

    if token.array {
        return CanonicalType::new(TypeFamily::Unknown(TypeClass::Other), raw);
    }

    let significant = |words: &[String]| -> Vec<String> {
        words
            .iter()
            .filter(|w| !IGNORED_WORDS.contains(&w.as_str()))
            .cloned()
            .collect()
    };
    let base = significant(&token.base).join(" ");
    let tail = significant(&token.tail);
    let full = if tail.is_empty() {
        base.clone()
    } else {
        format!("{} {}", base, tail.join(" "))
    };

    let profile = profile(dialect);
    let Some(rule) = profile.type_rule(&full).or_else(|| profile.type_rule(&base)) else {
        if base.starts_with("INTERVAL") {
            return CanonicalType::new(TypeFamily::Interval, raw);
        }
        return CanonicalType::new(TypeFamily::Unknown(guess_class(&full)), raw);
    };

    let mut ty = CanonicalType::new(rule.family, raw).with_precision(rule.precision, rule.scale);
    let first = token.args.first().map(String::as_str);

    match rule.family {
        TypeFamily::Char | TypeFamily::Varchar | TypeFamily::Binary | TypeFamily::Varbinary => {
            ty.length = first.and_then(parse_dimension);
        }
        TypeFamily::Decimal => {
            if let Some(arg) = first {
                let precision = parse_dimension(arg);
                let scale = token.args.get(1).and_then(|s| parse_dimension(s));
                ty.precision = precision;
                ty.scale = scale.or(precision.map(|_| 0));
            }
        }
        TypeFamily::Float32 | TypeFamily::Float64 if rule.name == "FLOAT" => {
            if let Some(bits) = first.and_then(parse_dimension) {
                ty.family = if bits <= 24 {
                    TypeFamily::Float32
                } else {
                    TypeFamily::Float64
                };
            }
        }
        TypeFamily::Time | TypeFamily::Timestamp | TypeFamily::TimestampTz => {
            ty.precision = first.and_then(parse_dimension);
            ty.scale = None;
        }
        // integer display widths and the rest carry no dimensions
        _ => {}
    }

    ty
}

/// Parse a numeric argument; `MAX` and `*` mean unbounded
fn parse_dimension(arg: &str) -> Option<u32> {
    arg.trim().parse().ok()
}

fn guess_class(words: &str) -> TypeClass {
    let has = |needle: &str| words.contains(needle);

    if has("JSON") {
        TypeClass::Json
    } else if has("BOOL") {
        TypeClass::Boolean
    } else if has("CHAR") || has("TEXT") || has("STRING") || has("CLOB") {
        TypeClass::String
    } else if has("DATE") || has("TIME") || has("PERIOD") {
        TypeClass::Temporal
    } else if has("BLOB") || has("BINARY") || has("BYTE") {
        TypeClass::Binary
    } else if has("FLOAT") || has("DOUBLE") || has("REAL") {
        TypeClass::Float
    } else if has("DEC") || has("NUM") || has("MONEY") {
        TypeClass::Decimal
    } else if (words.starts_with("INT") || words.ends_with("INT")) && !has("POINT") {
        TypeClass::Integer
    } else {
        TypeClass::Other
    }
}

/// Type equivalence for one (source dialect, target dialect) pair
#[derive(Debug, Clone, Copy)]
pub struct TypeEquivalence {
    matching: TypeMatching,

    /// Integer and float families compare by class
    widthless: bool,

    /// Scale-0 decimals equal integers
    integers_as_numbers: bool,
}

impl TypeEquivalence {
    pub fn new(source: Dialect, target: Dialect, matching: TypeMatching) -> Self {
        let (s, t) = (profile(source), profile(target));
        Self {
            matching,
            widthless: !s.exact_widths || !t.exact_widths,
            integers_as_numbers: s.integers_as_numbers || t.integers_as_numbers,
        }
    }

    /// Are the two types equivalent?
    pub fn equivalent(&self, source: &CanonicalType, target: &CanonicalType) -> bool {
        self.compare(source, target).is_none()
    }

    /// First differing aspect, or `None` when equivalent
    pub fn compare(&self, source: &CanonicalType, target: &CanonicalType) -> Option<Mismatch> {
        let family_mismatch = || Mismatch::new("family", source.to_string(), target.to_string());

        if self.numbers_stand_in_for_integers(source, target) {
            return None;
        }

        if self.matching == TypeMatching::Family {
            return (source.class() != target.class()).then(family_mismatch);
        }

        if let (TypeFamily::Unknown(_), TypeFamily::Unknown(_)) = (source.family, target.family) {
            return (compact(&source.raw) != compact(&target.raw)).then(family_mismatch);
        }

        if source.family != target.family {
            let class = source.class();
            let by_class = self.widthless
                && class == target.class()
                && matches!(class, TypeClass::Integer | TypeClass::Float);
            return (!by_class).then(family_mismatch);
        }

        let dimensions = [
            ("length", source.length, target.length),
            ("precision", source.precision, target.precision),
            ("scale", source.scale, target.scale),
        ];
        dimensions.into_iter().find_map(|(aspect, s, t)| match (s, t) {
            (Some(s), Some(t)) if s != t => Some(Mismatch::new(aspect, s.to_string(), t.to_string())),
            _ => None,
        })
    }

    fn numbers_stand_in_for_integers(&self, a: &CanonicalType, b: &CanonicalType) -> bool {
        let scale_zero = |t: &CanonicalType| t.family == TypeFamily::Decimal && t.scale == Some(0);
        self.integers_as_numbers
            && ((scale_zero(a) && b.class() == TypeClass::Integer)
                || (scale_zero(b) && a.class() == TypeClass::Integer))
    }
}

fn compact(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn strict(source: Dialect, target: Dialect) -> TypeEquivalence {
        TypeEquivalence::new(source, target, TypeMatching::Strict)
    }

    #[test]
    fn string_lengths() {
        let ty = normalize(Dialect::Ansi, "VARCHAR(50)");
        assert_eq!(ty.family, TypeFamily::Varchar);
        assert_eq!(ty.length, Some(50));

        let max = normalize(Dialect::MsSql, "NVARCHAR(MAX)");
        assert_eq!(max.family, TypeFamily::Varchar);
        assert_eq!(max.length, None);

        let varying = normalize(Dialect::Postgres, "character varying(20)");
        assert_eq!(varying.family, TypeFamily::Varchar);
        assert_eq!(varying.length, Some(20));
        assert_eq!(varying.raw, "character varying(20)");
    }

    #[test]
    fn decimal_dimensions() {
        let ty = normalize(Dialect::Ansi, "NUMERIC(10)");
        assert_eq!((ty.precision, ty.scale), (Some(10), Some(0)));

        let money = normalize(Dialect::MsSql, "MONEY");
        assert_eq!((money.precision, money.scale), (Some(19), Some(4)));

        let number = normalize(Dialect::Snowflake, "NUMBER");
        assert_eq!((number.precision, number.scale), (Some(38), Some(0)));

        let unbounded = normalize(Dialect::Postgres, "numeric");
        assert_eq!((unbounded.precision, unbounded.scale), (None, None));
    }

    #[test]
    fn float_precision_picks_width() {
        assert_eq!(normalize(Dialect::Ansi, "FLOAT(10)").family, TypeFamily::Float32);
        assert_eq!(normalize(Dialect::Ansi, "FLOAT(53)").family, TypeFamily::Float64);
        assert_eq!(normalize(Dialect::Ansi, "DOUBLE PRECISION").family, TypeFamily::Float64);
        assert_eq!(normalize(Dialect::MySql, "FLOAT").family, TypeFamily::Float32);
    }

    #[test]
    fn integer_widths_and_modifiers_ignored() {
        let ty = normalize(Dialect::MySql, "INT(11) UNSIGNED");
        assert_eq!(ty.family, TypeFamily::Int32);
        assert_eq!(ty.precision, None);

        assert_eq!(normalize(Dialect::MsSql, "TINYINT").family, TypeFamily::Int8);
        assert_eq!(normalize(Dialect::Teradata, "BYTEINT").family, TypeFamily::Int8);
        assert_eq!(normalize(Dialect::Ansi, "SMALLINT").family, TypeFamily::Int16);
    }

    #[test]
    fn time_families() {
        let ty = normalize(Dialect::Postgres, "TIMESTAMP(3) WITH TIME ZONE");
        assert_eq!(ty.family, TypeFamily::TimestampTz);
        assert_eq!(ty.precision, Some(3));

        assert_eq!(normalize(Dialect::Postgres, "timestamptz").family, TypeFamily::TimestampTz);
        assert_eq!(normalize(Dialect::Ansi, "INTERVAL DAY TO SECOND").family, TypeFamily::Interval);
        assert_eq!(normalize(Dialect::BigQuery, "TIMESTAMP").family, TypeFamily::TimestampTz);
    }

    #[test]
    fn unknown_types_keep_raw_text() {
        let period = normalize(Dialect::Teradata, "PERIOD(DATE)");
        assert_eq!(period.family, TypeFamily::Unknown(TypeClass::Temporal));
        assert_eq!(period.raw, "PERIOD(DATE)");

        let geo = normalize(Dialect::Postgres, "geometry(Point, 4326)");
        assert_eq!(geo.family, TypeFamily::Unknown(TypeClass::Other));

        let array = normalize(Dialect::Postgres, "INTEGER[]");
        assert_eq!(array.family, TypeFamily::Unknown(TypeClass::Other));
    }

    #[test]
    fn varchar_length_mismatch() {
        let eq = strict(Dialect::Ansi, Dialect::Ansi);
        let mismatch = eq
            .compare(&normalize(Dialect::Ansi, "VARCHAR(50)"), &normalize(Dialect::Ansi, "VARCHAR(40)"))
            .unwrap();

        assert_eq!(mismatch, Mismatch::new("length", "50", "40"));
    }

    #[test]
    fn unbounded_side_matches_bounded() {
        let eq = strict(Dialect::Postgres, Dialect::MySql);
        assert!(eq.equivalent(
            &normalize(Dialect::Postgres, "TEXT"),
            &normalize(Dialect::MySql, "VARCHAR(255)")
        ));
    }

    #[test]
    fn family_mismatch_reported_first() {
        let eq = strict(Dialect::Postgres, Dialect::MySql);
        let mismatch = eq
            .compare(&normalize(Dialect::Postgres, "INTEGER"), &normalize(Dialect::MySql, "BIGINT"))
            .unwrap();
        assert_eq!(mismatch.aspect, "family");
        assert_eq!(mismatch.source, "INT32");
        assert_eq!(mismatch.target, "INT64");
    }

    #[test]
    fn widthless_dialects_compare_integers_by_class() {
        let eq = strict(Dialect::Postgres, Dialect::BigQuery);
        assert!(eq.equivalent(
            &normalize(Dialect::Postgres, "INTEGER"),
            &normalize(Dialect::BigQuery, "INT64")
        ));
        assert!(eq.equivalent(
            &normalize(Dialect::Postgres, "REAL"),
            &normalize(Dialect::BigQuery, "FLOAT64")
        ));
        assert!(!eq.equivalent(
            &normalize(Dialect::Postgres, "INTEGER"),
            &normalize(Dialect::BigQuery, "FLOAT64")
        ));
    }

    #[test]
    fn snowflake_numbers_stand_in_for_integers() {
        let eq = strict(Dialect::Postgres, Dialect::Snowflake);
        assert!(eq.equivalent(
            &normalize(Dialect::Postgres, "BIGINT"),
            &normalize(Dialect::Snowflake, "NUMBER(38,0)")
        ));
        assert!(!eq.equivalent(
            &normalize(Dialect::Postgres, "BIGINT"),
            &normalize(Dialect::Snowflake, "NUMBER(10,2)")
        ));

        // only when one side of the pair stores integers as numbers
        let pg = strict(Dialect::Postgres, Dialect::Postgres);
        assert!(!pg.equivalent(
            &normalize(Dialect::Postgres, "BIGINT"),
            &normalize(Dialect::Postgres, "NUMERIC(38,0)")
        ));
    }

    #[test]
    fn family_only_mode() {
        let eq = TypeEquivalence::new(Dialect::Ansi, Dialect::Ansi, TypeMatching::Family);
        assert!(eq.equivalent(&normalize(Dialect::Ansi, "CHAR(3)"), &normalize(Dialect::Ansi, "VARCHAR(10)")));
        assert!(eq.equivalent(&normalize(Dialect::Ansi, "INT"), &normalize(Dialect::Ansi, "BIGINT")));
        assert!(!eq.equivalent(&normalize(Dialect::Ansi, "INT"), &normalize(Dialect::Ansi, "VARCHAR(10)")));

        let strict = strict(Dialect::Ansi, Dialect::Ansi);
        assert!(!strict.equivalent(&normalize(Dialect::Ansi, "CHAR(3)"), &normalize(Dialect::Ansi, "VARCHAR(10)")));
    }

    #[test]
    fn unknown_types_compare_by_text() {
        let eq = strict(Dialect::Teradata, Dialect::Teradata);
        assert!(eq.equivalent(
            &normalize(Dialect::Teradata, "PERIOD(DATE)"),
            &normalize(Dialect::Teradata, "period( date )")
        ));
        assert!(!eq.equivalent(
            &normalize(Dialect::Teradata, "PERIOD(DATE)"),
            &normalize(Dialect::Teradata, "PERIOD(TIMESTAMP)")
        ));
    }
}
