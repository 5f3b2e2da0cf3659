use crate::filter::View;
use crate::types::Entity;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SortAttribute {
    Capital,
    Age,
    Name,
    City,
    Neighborhood,
    Category,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Direction {
    #[strum(serialize = "asc")]
    Ascending,
    #[strum(serialize = "desc")]
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub attribute: SortAttribute,
    pub direction: Direction,
}

impl SortKey {
    pub const fn asc(attribute: SortAttribute) -> Self {
        Self {
            attribute,
            direction: Direction::Ascending,
        }
    }

    pub const fn desc(attribute: SortAttribute) -> Self {
        Self {
            attribute,
            direction: Direction::Descending,
        }
    }

    fn compare(&self, a: &Entity, b: &Entity) -> Ordering {
        let ord = match self.attribute {
            SortAttribute::Capital => a.capital.total_cmp(&b.capital),
            SortAttribute::Age => a.age_years.total_cmp(&b.age_years),
            SortAttribute::Name => a.name.cmp(&b.name),
            SortAttribute::City => a.city.cmp(&b.city),
            SortAttribute::Neighborhood => a.neighborhood.cmp(&b.neighborhood),
            SortAttribute::Category => a.category.cmp(&b.category),
        };
        match self.direction {
            Direction::Ascending => ord,
            Direction::Descending => ord.reverse(),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.attribute, self.direction)
    }
}

/// Parses `attribute[:asc|desc]`; the direction defaults to descending.
impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (attr, dir) = match s.split_once(':') {
            Some((a, d)) => (a, Some(d)),
            None => (s, None),
        };
        let attribute = attr
            .trim()
            .parse::<SortAttribute>()
            .map_err(|_| format!("unknown sort attribute '{}'", attr.trim()))?;
        let direction = match dir {
            Some(d) => d
                .trim()
                .parse::<Direction>()
                .map_err(|_| format!("unknown sort direction '{}'", d.trim()))?,
            None => Direction::Descending,
        };
        Ok(Self {
            attribute,
            direction,
        })
    }
}

/// Stable multi-key sort followed by a silent cut to `limit` rows.
pub fn rank<'a>(view: &View<'a>, keys: &[SortKey], limit: usize) -> View<'a> {
    let mut rows: Vec<&'a Entity> = view.rows().to_vec();
    rows.sort_by(|a, b| {
        keys.iter()
            .map(|k| k.compare(a, b))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
    rows.truncate(limit);
    View::new(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::Category;

    fn entity(name: &str, capital: f64, age: f64) -> Entity {
        Entity {
            id: name.to_string(),
            name: name.to_string(),
            state: "SP".to_string(),
            city: "Campinas".to_string(),
            neighborhood: "centro".to_string(),
            category: Category::MidMarketBroker,
            capital,
            age_years: age,
            flagged: false,
            threat_profile: None,
            source: Vec::new(),
        }
    }

    fn names(view: &View<'_>) -> Vec<String> {
        view.iter().map(|e| e.name.clone()).collect()
    }

    #[test]
    fn sorts_by_capital_then_age_descending() {
        let data = vec![
            entity("a", 100.0, 1.0),
            entity("b", 300.0, 2.0),
            entity("c", 100.0, 9.0),
            entity("d", 200.0, 5.0),
        ];
        let keys = [
            SortKey::desc(SortAttribute::Capital),
            SortKey::desc(SortAttribute::Age),
        ];
        let ranked = rank(&View::of(&data), &keys, 10);
        assert_eq!(names(&ranked), vec!["b", "d", "c", "a"]);
    }

    #[test]
    fn limit_truncates_and_ranking_is_idempotent() {
        let data = vec![
            entity("a", 1.0, 1.0),
            entity("b", 2.0, 1.0),
            entity("c", 3.0, 1.0),
        ];
        let keys = [SortKey::desc(SortAttribute::Capital)];
        let ranked = rank(&View::of(&data), &keys, 2);
        assert_eq!(names(&ranked), vec!["c", "b"]);
        let again = rank(&ranked, &keys, 5);
        assert_eq!(again, ranked);
        assert!(rank(&View::of(&data), &keys, 0).is_empty());
    }

    #[test]
    fn ties_keep_input_order() {
        let data = vec![entity("x", 5.0, 1.0), entity("y", 5.0, 1.0)];
        let ranked = rank(&View::of(&data), &[SortKey::desc(SortAttribute::Capital)], 2);
        assert_eq!(names(&ranked), vec!["x", "y"]);
    }

    #[test]
    fn nan_measures_still_give_a_total_order() {
        let data = vec![
            entity("a", 1.0, 1.0),
            entity("nan", f64::NAN, f64::NAN),
            entity("c", 3.0, 1.0),
            entity("b", 2.0, 1.0),
        ];
        let keys = [
            SortKey::desc(SortAttribute::Capital),
            SortKey::desc(SortAttribute::Age),
        ];
        let ranked = rank(&View::of(&data), &keys, 10);
        assert_eq!(ranked.len(), 4);
        let finite: Vec<String> = ranked
            .iter()
            .filter(|e| e.capital.is_finite())
            .map(|e| e.name.clone())
            .collect();
        assert_eq!(finite, vec!["c", "b", "a"]);
    }

    #[test]
    fn ascending_text_keys() {
        let data = vec![entity("b", 1.0, 1.0), entity("a", 1.0, 1.0)];
        let ranked = rank(&View::of(&data), &[SortKey::asc(SortAttribute::Name)], 2);
        assert_eq!(names(&ranked), vec!["a", "b"]);
    }

    #[test]
    fn parses_sort_keys() {
        assert_eq!(
            "capital:desc".parse::<SortKey>().unwrap(),
            SortKey::desc(SortAttribute::Capital)
        );
        assert_eq!(
            "Name:ASC".parse::<SortKey>().unwrap(),
            SortKey::asc(SortAttribute::Name)
        );
        assert_eq!(
            "age".parse::<SortKey>().unwrap(),
            SortKey::desc(SortAttribute::Age)
        );
        assert!("height:desc".parse::<SortKey>().is_err());
    }
}
