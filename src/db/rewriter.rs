//! Table-name rewriting: bare quoted table identifiers become their cross-database qualified form.

use crate::db::SchemaCatalog;
use regex::{Captures, Regex, RegexBuilder};
use std::borrow::Cow;
use std::sync::{Arc, OnceLock};

pub struct SqlRewriter {
    catalog: Arc<SchemaCatalog>,
    pattern: OnceLock<Option<Regex>>,
}

impl SqlRewriter {
    pub fn new(catalog: Arc<SchemaCatalog>) -> Self {
        SqlRewriter {
            catalog,
            pattern: OnceLock::new(),
        }
    }

    /// One alternation over every scanned name, in scan order. A name preceded by `.` is already
    /// qualified (or is a column of an aliased table) and is left alone.
    fn pattern(&self) -> Option<&Regex> {
        self.pattern
            .get_or_init(|| {
                if self.catalog.is_empty() {
                    return None;
                }
                let alternatives: Vec<String> = self.catalog.entries().map(|(k, _)| regex::escape(k)).collect();
                let source = format!("(^|[^.])({})", alternatives.join("|"));
                match RegexBuilder::new(&source)
                    .case_insensitive(true)
                    .size_limit(64 * (1 << 20))
                    .build()
                {
                    Ok(re) => Some(re),
                    Err(e) => {
                        tracing::warn!(error = %e, "table rewrite pattern rejected; SQL passes through unchanged");
                        None
                    }
                }
            })
            .as_ref()
    }

    pub fn rewrite<'a>(&self, sql: &'a str) -> Cow<'a, str> {
        let Some(re) = self.pattern() else {
            return Cow::Borrowed(sql);
        };
        re.replace_all(sql, |caps: &Captures| match self.catalog.qualified(&caps[2]) {
            Some(qualified) => format!("{}{}", &caps[1], qualified),
            None => caps[0].to_string(),
        })
    }
}
