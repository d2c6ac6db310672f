use rusqlite::types::{ToSql, ToSqlOutput, Value};

/// A column that may appear in a filter or sort. Implemented by closed per-entity
/// enums so SQL identifiers never come from caller strings.
pub trait Field: Copy {
    fn column(self) -> &'static str;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    Like,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Operator {
    fn sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "<>",
            Operator::Like => "LIKE",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Join {
    #[default]
    And,
    Or,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Text(String),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

impl ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            FieldValue::Null => ToSqlOutput::Owned(Value::Null),
            FieldValue::Integer(value) => ToSqlOutput::Owned(Value::Integer(*value)),
            FieldValue::Text(value) => ToSqlOutput::Borrowed(value.as_str().into()),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Condition<F> {
    pub field: F,
    pub operator: Operator,
    pub value: FieldValue,
}

/// A field -> (operator, value) predicate set joined by AND or OR.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Filter<F> {
    pub join: Join,
    pub conditions: Vec<Condition<F>>,
}

impl<F: Field> Filter<F> {
    pub fn new(join: Join) -> Self {
        Self {
            join,
            conditions: Vec::new(),
        }
    }

    pub fn all() -> Self {
        Self::new(Join::And)
    }

    pub fn any() -> Self {
        Self::new(Join::Or)
    }

    pub fn with(mut self, field: F, operator: Operator, value: impl Into<FieldValue>) -> Self {
        self.conditions.push(Condition {
            field,
            operator,
            value: value.into(),
        });
        self
    }

    /// Renders `WHERE ...` (or an empty string) with positional placeholders
    /// starting at `?1`, plus the values to bind in order.
    pub(crate) fn where_clause(&self) -> (String, Vec<&FieldValue>) {
        let mut terms = Vec::new();
        let mut values = Vec::new();
        for condition in &self.conditions {
            let column = condition.field.column();
            match (&condition.value, condition.operator) {
                (FieldValue::Null, Operator::Eq) => terms.push(format!("{} IS NULL", column)),
                (FieldValue::Null, Operator::NotEq) => {
                    terms.push(format!("{} IS NOT NULL", column))
                }
                (value, operator) => {
                    values.push(value);
                    terms.push(format!("{} {} ?{}", column, operator.sql(), values.len()));
                }
            }
        }
        if terms.is_empty() {
            return (String::new(), values);
        }
        let glue = match self.join {
            Join::And => " AND ",
            Join::Or => " OR ",
        };
        (format!("WHERE {}", terms.join(glue)), values)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    fn sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// Sort column, direction, and window for an "all" listing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page<F> {
    pub sort: F,
    pub direction: Direction,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl<F: Field> Page<F> {
    pub fn sorted_by(sort: F) -> Self {
        Self {
            sort,
            direction: Direction::Asc,
            limit: None,
            offset: 0,
        }
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn window(mut self, limit: usize, offset: usize) -> Self {
        self.limit = Some(limit);
        self.offset = offset;
        self
    }

    /// `ORDER BY ... LIMIT ... OFFSET ...`, with `id` as the tie-break so pages are stable.
    pub(crate) fn tail(&self) -> String {
        let limit = self
            .limit
            .map(|limit| limit.min(i64::MAX as usize) as i64)
            .unwrap_or(-1);
        format!(
            "ORDER BY {} {}, id ASC LIMIT {} OFFSET {}",
            self.sort.column(),
            self.direction.sql(),
            limit,
            self.offset
        )
    }
}

pub(crate) fn as_params<'a>(values: &'a [&'a FieldValue]) -> Vec<&'a dyn ToSql> {
    values.iter().map(|value| *value as &dyn ToSql).collect()
}
