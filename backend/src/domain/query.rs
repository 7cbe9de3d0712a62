//! Query Translator: validated `sort`, `filter`, `include` and `page` input.
//!
//! Keys are checked against the [`EntityRegistry`] descriptor of the
//! requested type. Every rejected key of one family is reported together.

use std::sync::Arc;

use pagination::{PAGE_NUMBER_PARAM, PAGE_SIZE_PARAM, PageRequest, PageSettings, is_page_param};

use super::ports::ListQuery;
use super::registry::{EntityRegistry, ResourceDescriptor};
use super::{Error, ResourceType};

const SORT_PARAM: &str = "sort";
const INCLUDE_PARAM: &str = "include";
const FILTER_PREFIX: &str = "filter[";

/// Sort order of one key; `-field` means descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// One validated sort field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: &'static str,
    pub direction: SortDirection,
}

impl SortKey {
    /// Ascending sort on `field`.
    pub const fn ascending(field: &'static str) -> Self {
        Self {
            field,
            direction: SortDirection::Ascending,
        }
    }

    /// Descending sort on `field`.
    pub const fn descending(field: &'static str) -> Self {
        Self {
            field,
            direction: SortDirection::Descending,
        }
    }
}

/// One validated equality filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterClause {
    /// Registered filter field.
    pub field: &'static str,
    /// Exact value to match.
    pub value: String,
}

/// Fully validated collection query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceQuery {
    /// Requested keys in order; the primary-key tie-breaker is added by adapters.
    pub sort: Vec<SortKey>,
    pub filters: Vec<FilterClause>,
    /// Relationship names to load into `included`.
    pub include: Vec<&'static str>,
    pub page: PageRequest,
    link_params: Vec<(String, String)>,
}

impl ResourceQuery {
    /// Repository request for the page described by this query.
    pub fn list_query(&self) -> ListQuery {
        ListQuery {
            filters: self.filters.clone(),
            sort: self.sort.clone(),
            offset: self.page.offset(),
            limit: self.page.size(),
        }
    }

    /// Non-pagination parameters to carry into page links, in request order.
    pub fn link_params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.link_params
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

/// Translates raw query pairs into validated queries.
#[derive(Debug, Clone)]
pub struct QueryTranslator {
    registry: Arc<EntityRegistry>,
    page_settings: PageSettings,
}

impl QueryTranslator {
    /// Translator bound to `registry` and the page size policy.
    pub fn new(registry: Arc<EntityRegistry>, page_settings: PageSettings) -> Self {
        Self {
            registry,
            page_settings,
        }
    }

    pub const fn page_settings(&self) -> PageSettings {
        self.page_settings
    }

    /// Validate a collection query.
    ///
    /// Families are checked in the order sort, include, filter, page; the
    /// first family with a rejected key fails the request.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    ///
    /// use bookshelf::domain::query::{QueryTranslator, SortKey};
    /// use bookshelf::domain::registry::EntityRegistry;
    /// use bookshelf::domain::ResourceType;
    /// use pagination::PageSettings;
    ///
    /// let translator = QueryTranslator::new(
    ///     Arc::new(EntityRegistry::standard()),
    ///     PageSettings::default(),
    /// );
    /// let pairs = vec![("sort".to_owned(), "-publication_year,title".to_owned())];
    /// let query = translator.translate(ResourceType::Books, &pairs).expect("valid sort");
    /// assert_eq!(
    ///     query.sort,
    ///     vec![SortKey::descending("publication_year"), SortKey::ascending("title")]
    /// );
    /// ```
    pub fn translate(
        &self,
        resource_type: ResourceType,
        pairs: &[(String, String)],
    ) -> Result<ResourceQuery, Error> {
        let descriptor = self.registry.describe(resource_type)?;

        let sort = parse_sort(descriptor, pairs)?;
        let include = parse_include(descriptor, pairs)?;
        let filters = parse_filters(descriptor, pairs)?;
        let page = PageRequest::parse(
            last_value(pairs, PAGE_NUMBER_PARAM),
            last_value(pairs, PAGE_SIZE_PARAM),
            &self.page_settings,
        )
        .map_err(|err| Error::invalid_request(err.to_string()).with_title("Invalid Page Query"))?;

        let link_params = pairs
            .iter()
            .filter(|(name, _)| !is_page_param(name))
            .cloned()
            .collect();

        Ok(ResourceQuery {
            sort,
            filters,
            include,
            page,
            link_params,
        })
    }

    /// Validate only the `include` parameter, as single-resource reads do.
    pub fn translate_include(
        &self,
        resource_type: ResourceType,
        pairs: &[(String, String)],
    ) -> Result<Vec<&'static str>, Error> {
        let descriptor = self.registry.describe(resource_type)?;
        parse_include(descriptor, pairs)
    }
}

fn last_value<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .rev()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|item| !item.is_empty())
}

fn lookup(allowed: &[&'static str], name: &str) -> Option<&'static str> {
    allowed.iter().copied().find(|candidate| *candidate == name)
}

fn rejection(family: &str, title: &str, rejected: &[String], allowed: &[&'static str]) -> Error {
    Error::invalid_request(format!(
        "Given {family}(s) `{}` are not allowed. Allowed {family}(s) are `{}`.",
        rejected.join(", "),
        allowed.join(", ")
    ))
    .with_title(title)
}

fn parse_sort(
    descriptor: &ResourceDescriptor,
    pairs: &[(String, String)],
) -> Result<Vec<SortKey>, Error> {
    let Some(raw) = last_value(pairs, SORT_PARAM) else {
        return Ok(Vec::new());
    };
    let allowed = descriptor.allowed_sorts();
    let mut keys: Vec<SortKey> = Vec::new();
    let mut rejected = Vec::new();
    for item in split_list(raw) {
        let (name, direction) = match item.strip_prefix('-') {
            Some(name) => (name, SortDirection::Descending),
            None => (item, SortDirection::Ascending),
        };
        match lookup(allowed, name) {
            Some(field) if keys.iter().any(|key| key.field == field) => {}
            Some(field) => keys.push(SortKey { field, direction }),
            None => rejected.push(name.to_owned()),
        }
    }
    if rejected.is_empty() {
        Ok(keys)
    } else {
        Err(rejection("sort", "Invalid Sort Query", &rejected, allowed))
    }
}

fn parse_include(
    descriptor: &ResourceDescriptor,
    pairs: &[(String, String)],
) -> Result<Vec<&'static str>, Error> {
    let Some(raw) = last_value(pairs, INCLUDE_PARAM) else {
        return Ok(Vec::new());
    };
    let allowed = descriptor.allowed_includes();
    let mut names: Vec<&'static str> = Vec::new();
    let mut rejected = Vec::new();
    for item in split_list(raw) {
        match lookup(&allowed, item) {
            Some(name) if names.contains(&name) => {}
            Some(name) => names.push(name),
            None => rejected.push(item.to_owned()),
        }
    }
    if rejected.is_empty() {
        Ok(names)
    } else {
        Err(rejection("include", "Invalid Include Query", &rejected, &allowed))
    }
}

fn parse_filters(
    descriptor: &ResourceDescriptor,
    pairs: &[(String, String)],
) -> Result<Vec<FilterClause>, Error> {
    let allowed = descriptor.allowed_filters();
    let mut clauses: Vec<FilterClause> = Vec::new();
    let mut rejected: Vec<String> = Vec::new();
    for (name, value) in pairs {
        let Some(field) = name
            .strip_prefix(FILTER_PREFIX)
            .and_then(|rest| rest.strip_suffix(']'))
        else {
            continue;
        };
        match lookup(allowed, field) {
            Some(field) => {
                clauses.retain(|clause| clause.field != field);
                clauses.push(FilterClause {
                    field,
                    value: value.clone(),
                });
            }
            None if rejected.iter().any(|seen| seen == field) => {}
            None => rejected.push(field.to_owned()),
        }
    }
    if rejected.is_empty() {
        Ok(clauses)
    } else {
        Err(rejection("filter", "Invalid Filter Query", &rejected, allowed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorCode;
    use rstest::{fixture, rstest};

    #[fixture]
    fn translator() -> QueryTranslator {
        QueryTranslator::new(
            Arc::new(EntityRegistry::standard()),
            PageSettings::new(30, 100).expect("valid settings"),
        )
    }

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect()
    }

    #[rstest]
    fn empty_query_uses_defaults(translator: QueryTranslator) {
        let query = translator
            .translate(ResourceType::Books, &[])
            .expect("empty query is valid");
        assert!(query.sort.is_empty());
        assert!(query.filters.is_empty());
        assert!(query.include.is_empty());
        assert_eq!(query.page.number(), 1);
        assert_eq!(query.page.size(), 30);
    }

    #[rstest]
    fn sort_keeps_left_to_right_precedence(translator: QueryTranslator) {
        let query = translator
            .translate(
                ResourceType::Books,
                &pairs(&[("sort", "-publication_year, title,-publication_year")]),
            )
            .expect("valid sort");
        assert_eq!(
            query.sort,
            vec![
                SortKey::descending("publication_year"),
                SortKey::ascending("title"),
            ]
        );
    }

    #[rstest]
    fn unknown_sort_fields_are_all_named(translator: QueryTranslator) {
        let err = translator
            .translate(ResourceType::Books, &pairs(&[("sort", "title,-isbn,pages")]))
            .expect_err("unknown sort fields");
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
        assert_eq!(err.title(), "Invalid Sort Query");
        assert_eq!(
            err.message(),
            "Given sort(s) `isbn, pages` are not allowed. Allowed sort(s) are \
             `title, publication_year, created_at, updated_at`."
        );
    }

    #[rstest]
    fn unknown_filters_are_reported_together(translator: QueryTranslator) {
        let err = translator
            .translate(
                ResourceType::Users,
                &pairs(&[("filter[foo]", "bar"), ("filter[role]", "admin"), ("filter[baz]", "1")]),
            )
            .expect_err("unknown filters");
        assert_eq!(err.title(), "Invalid Filter Query");
        assert_eq!(
            err.message(),
            "Given filter(s) `foo, baz` are not allowed. Allowed filter(s) are `role`."
        );
    }

    #[rstest]
    fn later_filter_values_replace_earlier_ones(translator: QueryTranslator) {
        let query = translator
            .translate(
                ResourceType::Books,
                &pairs(&[("filter[title]", "Dune"), ("filter[title]", "Emma")]),
            )
            .expect("valid filters");
        assert_eq!(
            query.filters,
            vec![FilterClause {
                field: "title",
                value: "Emma".to_owned(),
            }]
        );
    }

    #[rstest]
    fn includes_are_checked_against_relationships(translator: QueryTranslator) {
        let err = translator
            .translate_include(ResourceType::Comments, &pairs(&[("include", "users,authors")]))
            .expect_err("authors is not a comment relationship");
        assert_eq!(err.title(), "Invalid Include Query");

        let include = translator
            .translate_include(ResourceType::Comments, &pairs(&[("include", "books,users,books")]))
            .expect("valid include");
        assert_eq!(include, vec!["books", "users"]);
    }

    #[rstest]
    fn sort_errors_take_precedence_over_filter_errors(translator: QueryTranslator) {
        let err = translator
            .translate(
                ResourceType::Books,
                &pairs(&[("filter[nope]", "x"), ("sort", "nope")]),
            )
            .expect_err("both families invalid");
        assert_eq!(err.title(), "Invalid Sort Query");
    }

    #[rstest]
    #[case("0", "5")]
    #[case("1", "x")]
    #[case("-2", "5")]
    fn invalid_page_values_are_rejected(
        translator: QueryTranslator,
        #[case] number: &str,
        #[case] size: &str,
    ) {
        let err = translator
            .translate(
                ResourceType::Authors,
                &pairs(&[("page[number]", number), ("page[size]", size)]),
            )
            .expect_err("invalid page");
        assert_eq!(err.title(), "Invalid Page Query");
    }

    #[rstest]
    fn oversized_pages_are_clamped(translator: QueryTranslator) {
        let query = translator
            .translate(ResourceType::Authors, &pairs(&[("page[size]", "1000")]))
            .expect("clamped page");
        assert_eq!(query.page.size(), 100);
    }

    #[rstest]
    fn list_query_carries_offset_and_limit(translator: QueryTranslator) {
        let query = translator
            .translate(
                ResourceType::Books,
                &pairs(&[("page[size]", "5"), ("page[number]", "3")]),
            )
            .expect("valid page");
        let list = query.list_query();
        assert_eq!(list.offset, 10);
        assert_eq!(list.limit, 5);
    }

    #[rstest]
    fn link_params_skip_pagination(translator: QueryTranslator) {
        let query = translator
            .translate(
                ResourceType::Books,
                &pairs(&[("sort", "title"), ("page[size]", "5"), ("include", "authors")]),
            )
            .expect("valid query");
        let params: Vec<_> = query.link_params().collect();
        assert_eq!(params, vec![("sort", "title"), ("include", "authors")]);
    }
}
