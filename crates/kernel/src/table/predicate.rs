//! Predicate construction from raw search tokens.
//!
//! Search boxes receive arbitrary text, so building a predicate never fails:
//! a token that cannot be parsed for the column's type degrades to
//! [`Predicate::Neutral`], which constrains nothing.

use std::fmt;

use tracing::debug;

use super::classify::{Classification, NumericKind};
use crate::backend::Backend;

/// A typed literal parsed from a search token.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Literal {
    /// Parse a token against a column classification.
    ///
    /// Returns `None` when the token does not fit, or when the
    /// classification has no literal form (lists, unknown types).
    pub fn parse(classification: &Classification, token: &str) -> Option<Self> {
        match classification {
            Classification::Numeric(NumericKind::Integer) => {
                token.trim().parse().ok().map(Literal::Integer)
            }
            Classification::Numeric(NumericKind::Float) => token
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Literal::Float),
            Classification::Text => Some(Literal::Text(token.to_string())),
            Classification::ListOf(_) | Classification::Unknown => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Integer(i) => write!(f, "{i}"),
            Literal::Float(v) => write!(f, "{v}"),
            Literal::Text(s) => write!(f, "{s}"),
        }
    }
}

/// A filter condition, or the neutral element.
///
/// `Neutral` is the identity for both conjunction and disjunction: it is
/// dropped from any group it appears in, and a group left empty is itself
/// neutral. Filtering a query with a neutral predicate leaves it unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate<C> {
    Neutral,
    Condition(C),
}

impl<C> Predicate<C> {
    /// Returns `true` for the neutral predicate.
    pub fn is_neutral(&self) -> bool {
        matches!(self, Predicate::Neutral)
    }

    /// The wrapped condition, if any.
    pub fn into_condition(self) -> Option<C> {
        match self {
            Predicate::Neutral => None,
            Predicate::Condition(c) => Some(c),
        }
    }
}

/// AND all predicates together, skipping neutral ones.
pub fn all<B, I>(backend: &B, predicates: I) -> Predicate<B::Condition>
where
    B: Backend + ?Sized,
    I: IntoIterator<Item = Predicate<B::Condition>>,
{
    combine(predicates, |conditions| backend.conjoin(conditions))
}

/// OR all predicates together, skipping neutral ones.
pub fn any<B, I>(backend: &B, predicates: I) -> Predicate<B::Condition>
where
    B: Backend + ?Sized,
    I: IntoIterator<Item = Predicate<B::Condition>>,
{
    combine(predicates, |conditions| backend.disjoin(conditions))
}

fn combine<C, I, F>(predicates: I, join: F) -> Predicate<C>
where
    I: IntoIterator<Item = Predicate<C>>,
    F: FnOnce(Vec<C>) -> C,
{
    let mut conditions: Vec<C> = predicates
        .into_iter()
        .filter_map(Predicate::into_condition)
        .collect();

    match conditions.len() {
        0 => Predicate::Neutral,
        1 => conditions.pop().map_or(Predicate::Neutral, Predicate::Condition),
        _ => Predicate::Condition(join(conditions)),
    }
}

/// Build the search predicate for one column and one token.
///
/// - Numeric: equality when the token parses, neutral otherwise.
/// - Text: pattern match on the raw token when `regex` is set, otherwise
///   case-insensitive substring containment.
/// - List: array-overlaps-singleton when the token parses as the element
///   type, neutral otherwise.
/// - Unknown: always neutral.
pub fn build_predicate<B>(
    backend: &B,
    expr: &B::Expr,
    classification: &Classification,
    token: &str,
    regex: bool,
) -> Predicate<B::Condition>
where
    B: Backend + ?Sized,
{
    match classification {
        Classification::Numeric(_) => match Literal::parse(classification, token) {
            Some(literal) => Predicate::Condition(backend.equals(expr, &literal)),
            None => {
                debug!(token, "numeric search token did not parse; ignoring");
                Predicate::Neutral
            }
        },
        Classification::Text => {
            if regex {
                Predicate::Condition(backend.matches_pattern(expr, token))
            } else {
                Predicate::Condition(backend.contains_ci(expr, token))
            }
        }
        Classification::ListOf(element) => match Literal::parse(element, token) {
            Some(literal) => Predicate::Condition(backend.array_overlaps(expr, &literal)),
            None => {
                debug!(token, "list search token did not parse; ignoring");
                Predicate::Neutral
            }
        },
        Classification::Unknown => Predicate::Neutral,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::backend::memory::{MemoryBackend, MemoryCondition};

    fn int() -> Classification {
        Classification::Numeric(NumericKind::Integer)
    }

    #[test]
    fn literal_parsing() {
        assert_eq!(Literal::parse(&int(), "42"), Some(Literal::Integer(42)));
        assert_eq!(Literal::parse(&int(), " 7 "), Some(Literal::Integer(7)));
        assert_eq!(Literal::parse(&int(), "4.2"), None);
        assert_eq!(
            Literal::parse(&Classification::Numeric(NumericKind::Float), "4.5"),
            Some(Literal::Float(4.5))
        );
        assert_eq!(
            Literal::parse(&Classification::Numeric(NumericKind::Float), "NaN"),
            None
        );
        assert_eq!(
            Literal::parse(&Classification::Text, "abc"),
            Some(Literal::Text("abc".into()))
        );
        assert_eq!(Literal::parse(&Classification::Unknown, "abc"), None);
    }

    #[test]
    fn numeric_column_with_text_token_is_neutral() {
        let backend = MemoryBackend;
        let expr = "year".to_string();
        for token in ["abc", "12abc", "", "1e", "--1"] {
            let predicate = build_predicate(&backend, &expr, &int(), token, false);
            assert!(predicate.is_neutral(), "token {token:?} should be neutral");
        }
    }

    #[test]
    fn numeric_column_with_number_token_is_equality() {
        let backend = MemoryBackend;
        let predicate = build_predicate(&backend, &"year".to_string(), &int(), "2020", false);
        assert_eq!(
            predicate,
            Predicate::Condition(MemoryCondition::Equals {
                field: "year".into(),
                literal: Literal::Integer(2020),
            })
        );
    }

    #[test]
    fn text_column_regex_flag_selects_pattern() {
        let backend = MemoryBackend;
        let expr = "name".to_string();

        let plain = build_predicate(&backend, &expr, &Classification::Text, "^A.*", false);
        assert_eq!(
            plain,
            Predicate::Condition(MemoryCondition::ContainsCi {
                field: "name".into(),
                needle: "^A.*".into(),
            })
        );

        let pattern = build_predicate(&backend, &expr, &Classification::Text, "^A.*", true);
        assert_eq!(
            pattern,
            Predicate::Condition(MemoryCondition::Pattern {
                field: "name".into(),
                pattern: "^A.*".into(),
            })
        );
    }

    #[test]
    fn list_column_parses_element_type() {
        let backend = MemoryBackend;
        let list = Classification::ListOf(Box::new(int()));
        let expr = "scores".to_string();

        assert_eq!(
            build_predicate(&backend, &expr, &list, "3", false),
            Predicate::Condition(MemoryCondition::Overlaps {
                field: "scores".into(),
                literal: Literal::Integer(3),
            })
        );
        assert!(build_predicate(&backend, &expr, &list, "three", false).is_neutral());
    }

    #[test]
    fn unknown_column_is_always_neutral() {
        let backend = MemoryBackend;
        let expr = "flag".to_string();
        assert!(build_predicate(&backend, &expr, &Classification::Unknown, "true", false)
            .is_neutral());
    }

    #[test]
    fn combinators_skip_neutral() {
        let backend = MemoryBackend;
        let a = Predicate::Condition(MemoryCondition::ContainsCi {
            field: "a".into(),
            needle: "x".into(),
        });

        assert!(all(&backend, Vec::new()).is_neutral());
        assert!(any(&backend, Vec::new()).is_neutral());
        assert!(any(&backend, vec![Predicate::Neutral, Predicate::Neutral]).is_neutral());
        assert_eq!(any(&backend, vec![Predicate::Neutral, a.clone()]), a);
        assert_eq!(all(&backend, vec![a.clone(), Predicate::Neutral]), a);

        let both = all(&backend, vec![a.clone(), a.clone()]);
        assert!(matches!(
            both,
            Predicate::Condition(MemoryCondition::All(ref parts)) if parts.len() == 2
        ));
    }
}
