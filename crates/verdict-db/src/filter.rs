use rusqlite::types::Value;

/// External filter parameters for title listing. Absent fields impose no
/// constraint.
#[derive(Debug, Clone, Default)]
pub struct TitleFilter {
    /// Case-insensitive substring match on the title name.
    pub name: Option<String>,
    /// Exact release year.
    pub year: Option<i32>,
    /// Exact category slug.
    pub category: Option<String>,
    /// Genre slugs, OR-combined: a title matches if tagged with any of them.
    pub genres: Vec<String>,
}

impl TitleFilter {
    /// Build the WHERE fragment (aliased on `t`) and its positional
    /// parameters. Pure predicate construction; the caller appends further
    /// numbered parameters starting at `params.len() + 1`.
    pub fn predicate(&self) -> (String, Vec<Value>) {
        let mut clauses: Vec<String> = Vec::new();
        let mut params: Vec<Value> = Vec::new();

        if let Some(name) = &self.name {
            // instr instead of LIKE so user input needs no wildcard escaping
            params.push(Value::Text(name.to_lowercase()));
            clauses.push(format!("instr(lower(t.name), ?{}) > 0", params.len()));
        }

        if let Some(year) = self.year {
            params.push(Value::Integer(i64::from(year)));
            clauses.push(format!("t.year = ?{}", params.len()));
        }

        if let Some(category) = &self.category {
            params.push(Value::Text(category.clone()));
            clauses.push(format!("t.category_slug = ?{}", params.len()));
        }

        if !self.genres.is_empty() {
            let mut slots = Vec::with_capacity(self.genres.len());
            for slug in &self.genres {
                params.push(Value::Text(slug.clone()));
                slots.push(format!("?{}", params.len()));
            }
            clauses.push(format!(
                "EXISTS (SELECT 1 FROM title_genres tg \
                 WHERE tg.title_id = t.id AND tg.genre_slug IN ({}))",
                slots.join(", ")
            ));
        }

        if clauses.is_empty() {
            (String::new(), params)
        } else {
            (format!("WHERE {}", clauses.join(" AND ")), params)
        }
    }
}
