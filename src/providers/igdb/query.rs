/// Fields requested for every game lookup
pub const GAME_FIELDS: &[&str] = &[
    "name",
    "slug",
    "summary",
    "cover.url",
    "first_release_date",
    "genres.name",
    "platforms.name",
    "involved_companies.company.name",
    "involved_companies.developer",
    "involved_companies.publisher",
    "screenshots.url",
    "aggregated_rating",
    "total_rating",
    "total_rating_count",
    "franchises.name",
    "collections.name",
    "alternative_names.name",
    "similar_games",
    "dlcs",
    "expansions",
    "category",
    "parent_game",
];

/// IGDB caps a single page at 500 records
pub const MAX_LIMIT: usize = 500;

/// Builder for IGDB query-language request bodies (Apicalypse)
#[derive(Debug, Clone, Default)]
pub struct IgdbQuery {
    fields: Vec<String>,
    search: Option<String>,
    conditions: Vec<String>,
    sort: Option<String>,
    limit: Option<usize>,
    offset: Option<usize>,
}

impl IgdbQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Query selecting the standard game fields
    pub fn games() -> Self {
        Self::new().fields(GAME_FIELDS)
    }

    pub fn fields(mut self, fields: &[&str]) -> Self {
        self.fields.extend(fields.iter().map(|f| f.to_string()));
        self
    }

    /// Free-text search; quotes and backslashes are escaped
    pub fn search(mut self, text: &str) -> Self {
        self.search = Some(escape(text.trim()));
        self
    }

    pub fn where_id(self, id: i64) -> Self {
        self.condition(format!("id = {}", id))
    }

    pub fn where_ids(self, ids: &[i64]) -> Self {
        let list: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        self.condition(format!("id = ({})", list.join(",")))
    }

    pub fn where_slug(self, slug: &str) -> Self {
        self.condition(format!("slug = \"{}\"", escape(slug)))
    }

    /// Raw condition; multiple conditions are joined with `&`
    pub fn condition(mut self, condition: impl Into<String>) -> Self {
        self.conditions.push(condition.into());
        self
    }

    pub fn sort(mut self, field: &str, descending: bool) -> Self {
        self.sort = Some(format!("{} {}", field, if descending { "desc" } else { "asc" }));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit.clamp(1, MAX_LIMIT));
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn build(&self) -> String {
        let mut parts = Vec::new();

        let fields = if self.fields.is_empty() {
            "*".to_string()
        } else {
            self.fields.join(",")
        };
        parts.push(format!("fields {};", fields));

        if let Some(search) = &self.search {
            parts.push(format!("search \"{}\";", search));
        }
        if !self.conditions.is_empty() {
            parts.push(format!("where {};", self.conditions.join(" & ")));
        }
        if let Some(sort) = &self.sort {
            parts.push(format!("sort {};", sort));
        }
        if let Some(limit) = self.limit {
            parts.push(format!("limit {};", limit));
        }
        if let Some(offset) = self.offset {
            parts.push(format!("offset {};", offset));
        }

        parts.join(" ")
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_query() {
        let body = IgdbQuery::new().fields(&["name", "slug"]).search("zelda").limit(10).build();
        assert_eq!(body, "fields name,slug; search \"zelda\"; limit 10;");
    }

    #[test]
    fn test_search_escapes_quotes() {
        let body = IgdbQuery::new().search(r#"say "hi" \o/"#).build();
        assert_eq!(body, r#"fields *; search "say \"hi\" \\o/";"#);
    }

    #[test]
    fn test_where_ids_and_conditions() {
        let body = IgdbQuery::new()
            .fields(&["name"])
            .where_ids(&[1, 2, 3])
            .condition("category = 0")
            .sort("total_rating", true)
            .limit(1000)
            .offset(20)
            .build();
        assert_eq!(
            body,
            "fields name; where id = (1,2,3) & category = 0; sort total_rating desc; limit 500; offset 20;"
        );
    }

    #[test]
    fn test_games_query_by_slug() {
        let body = IgdbQuery::games().where_slug("hollow-knight").limit(1).build();
        assert!(body.starts_with("fields name,slug,summary,cover.url,"));
        assert!(body.contains("where slug = \"hollow-knight\";"));
        assert!(body.ends_with("limit 1;"));
    }
}
