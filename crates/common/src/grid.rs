//! Client-side model of the record grid.
//!
//! [`Table`] holds the rows fetched from the server together with the
//! search, sort, paging and selection state the grid widget keeps.
//! Filtering never leaves the client; re-fetching is left to whoever owns
//! the table (see [`Table::refresh`]).

use std::{cmp::Ordering, collections::BTreeSet, sync::LazyLock};

use chrono::{Local, NaiveDate};
use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::{
    models::{Pk, Timestamp},
    render::RenderTarget,
};

pub const DEFAULT_PAGE_LEN: usize = 10;

/// A quoted phrase or a run of non-space characters.
static SMART_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""[^"]*"|[^ ]+"#).expect("static pattern"));

pub type RenderFn<R> = fn(&R, RenderTarget) -> String;

pub struct Column<R> {
    pub title: &'static str,
    pub render: RenderFn<R>,
}

impl<R> Column<R> {
    pub const fn new(title: &'static str, render: RenderFn<R>) -> Self {
        Self { title, render }
    }
}

/// A row the grid can show.
pub trait Record: Clone + Send + Sync + 'static {
    fn pk(&self) -> Pk;

    fn columns() -> &'static [Column<Self>];

    /// Timestamps this record carries, for date-range filters.
    fn date_fields() -> &'static [DateField] {
        &[]
    }

    fn timestamp(&self, _field: DateField) -> Option<&Timestamp> {
        None
    }

    fn cell(&self, column: usize, target: RenderTarget) -> Option<String> {
        Self::columns().get(column).map(|c| (c.render)(self, target))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateField {
    Created,
    Started,
    Ended,
}

impl DateField {
    pub fn label(self) -> &'static str {
        match self {
            DateField::Created => "Created",
            DateField::Started => "Started",
            DateField::Ended => "Ended",
        }
    }
}

/// Inclusive range of local calendar dates. Either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn is_open(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    pub fn admits(&self, ts: Option<&Timestamp>) -> bool {
        if self.is_open() {
            return true;
        }
        let Some(ts) = ts else {
            return false;
        };
        let date = ts.with_timezone(&Local).date_naive();
        self.from.is_none_or(|from| date >= from) && self.to.is_none_or(|to| date <= to)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateRanges {
    pub created: DateRange,
    pub started: DateRange,
    pub ended: DateRange,
}

impl DateRanges {
    pub fn get(&self, field: DateField) -> &DateRange {
        match field {
            DateField::Created => &self.created,
            DateField::Started => &self.started,
            DateField::Ended => &self.ended,
        }
    }

    pub fn set(&mut self, field: DateField, range: DateRange) {
        match field {
            DateField::Created => self.created = range,
            DateField::Started => self.started = range,
            DateField::Ended => self.ended = range,
        }
    }

    pub fn admits<R: Record>(&self, row: &R) -> bool {
        self.created.admits(row.timestamp(DateField::Created))
            && self.started.admits(row.timestamp(DateField::Started))
            && self.ended.admits(row.timestamp(DateField::Ended))
    }
}

/// Search criteria for the whole row or for one column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Search {
    pub text: String,
    pub regex: bool,
    pub smart: bool,
}

impl Search {
    pub fn new(text: impl Into<String>, regex: bool, smart: bool) -> Self {
        Self {
            text: text.into(),
            regex,
            smart,
        }
    }

    fn matcher(&self) -> Matcher {
        if self.text.is_empty() {
            return Matcher::All;
        }
        let terms = if self.smart {
            SMART_WORD
                .find_iter(&self.text)
                .map(|m| m.as_str().trim_matches('"'))
                .filter(|w| !w.is_empty())
                .map(|w| term(w, self.regex))
                .collect()
        } else {
            vec![term(&self.text, self.regex)]
        };
        Matcher::Every(terms)
    }
}

fn term(text: &str, regex: bool) -> Term {
    let literal = || {
        match RegexBuilder::new(&regex::escape(text))
            .case_insensitive(true)
            .build()
        {
            Ok(re) => Term::Pattern(re),
            // Too large to compile; compare case-folded text instead.
            Err(e) => {
                debug!("Search term of {} bytes matched as plain text: {}", text.len(), e);
                Term::Plain(text.to_lowercase())
            }
        }
    };
    if !regex {
        return literal();
    }
    match RegexBuilder::new(text).case_insensitive(true).build() {
        Ok(re) => Term::Pattern(re),
        Err(e) => {
            debug!("Invalid search pattern {:?}, matching literally: {}", text, e);
            literal()
        }
    }
}

enum Term {
    Pattern(Regex),
    Plain(String),
}

impl Term {
    fn is_match(&self, haystack: &str) -> bool {
        match self {
            Term::Pattern(re) => re.is_match(haystack),
            Term::Plain(needle) => haystack.to_lowercase().contains(needle.as_str()),
        }
    }
}

enum Matcher {
    All,
    Every(Vec<Term>),
}

impl Matcher {
    fn matches(&self, haystack: &str) -> bool {
        match self {
            Matcher::All => true,
            Matcher::Every(terms) => terms.iter().all(|t| t.is_match(haystack)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
pub struct Table<R: Record> {
    rows: Vec<R>,
    selected: BTreeSet<Pk>,
    global: Search,
    columns: Vec<Search>,
    order: Option<(usize, SortDir)>,
    page: usize,
    page_len: usize,
    /// Indices into `rows` that pass the search, in display order.
    visible: Vec<usize>,
    /// Every index into `rows`, in display order.
    ordered: Vec<usize>,
    stale: bool,
}

impl<R: Record> Default for Table<R> {
    fn default() -> Self {
        Self::new(vec![])
    }
}

impl<R: Record> Table<R> {
    pub fn new(rows: Vec<R>) -> Self {
        let mut table = Self {
            rows,
            selected: BTreeSet::new(),
            global: Search::default(),
            columns: vec![Search::default(); R::columns().len()],
            order: None,
            page: 0,
            page_len: DEFAULT_PAGE_LEN,
            visible: vec![],
            ordered: vec![],
            stale: false,
        };
        table.draw();
        table
    }

    pub fn with_page_len(mut self, page_len: usize) -> Self {
        self.page_len = page_len.max(1);
        self
    }

    /// Sets the global search. Takes effect on the next draw.
    pub fn search(&mut self, text: &str, regex: bool, smart: bool) -> &mut Self {
        self.global = Search::new(text, regex, smart);
        self
    }

    /// Sets one column's search. Out-of-range columns are ignored.
    pub fn column_search(&mut self, column: usize, text: &str, regex: bool, smart: bool) -> &mut Self {
        if let Some(search) = self.columns.get_mut(column) {
            *search = Search::new(text, regex, smart);
        }
        self
    }

    pub fn global_search(&self) -> &Search {
        &self.global
    }

    pub fn column_searches(&self) -> &[Search] {
        &self.columns
    }

    pub fn order(&mut self, column: usize, dir: SortDir) -> &mut Self {
        if column < R::columns().len() {
            self.order = Some((column, dir));
        }
        self
    }

    pub fn current_order(&self) -> Option<(usize, SortDir)> {
        self.order
    }

    pub fn draw(&mut self) -> &mut Self {
        self.draw_with(|_| true)
    }

    /// Recomputes the visible rows and returns to the first page.
    pub fn draw_with(&mut self, extra: impl Fn(&R) -> bool) -> &mut Self {
        self.recompute(&extra);
        self.page = 0;
        self
    }

    fn recompute(&mut self, extra: &dyn Fn(&R) -> bool) {
        let mut ordered: Vec<usize> = (0..self.rows.len()).collect();
        if let Some((column, dir)) = self.order {
            let keys: Vec<String> = self
                .rows
                .iter()
                .map(|r| r.cell(column, RenderTarget::Plain).unwrap_or_default())
                .collect();
            ordered.sort_by(|&a, &b| {
                let ord = compare_cells(&keys[a], &keys[b]);
                match dir {
                    SortDir::Asc => ord,
                    SortDir::Desc => ord.reverse(),
                }
            });
        }

        let global = self.global.matcher();
        let columns: Vec<Matcher> = self.columns.iter().map(Search::matcher).collect();
        self.visible = ordered
            .iter()
            .copied()
            .filter(|&i| {
                let row = &self.rows[i];
                let cells: Vec<String> = (0..columns.len())
                    .map(|c| row.cell(c, RenderTarget::Plain).unwrap_or_default())
                    .collect();
                global.matches(&cells.join("  "))
                    && columns.iter().zip(&cells).all(|(m, cell)| m.matches(cell))
                    && extra(row)
            })
            .collect();
        self.ordered = ordered;
    }

    /// Stores re-fetched rows, keeping sort, page and surviving selection.
    pub fn replace_rows(&mut self, rows: Vec<R>, extra: impl Fn(&R) -> bool) {
        let pks: BTreeSet<Pk> = rows.iter().map(Record::pk).collect();
        self.selected.retain(|pk| pks.contains(pk));
        self.rows = rows;
        self.recompute(&extra);
        self.page = self.page.min(self.page_count().saturating_sub(1));
        self.stale = false;
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn get(&self, pk: Pk) -> Option<&R> {
        self.rows.iter().find(|r| r.pk() == pk)
    }

    /// Rows passing the current search, in display order.
    pub fn visible(&self) -> impl Iterator<Item = &R> {
        self.visible.iter().map(|&i| &self.rows[i])
    }

    pub fn visible_len(&self) -> usize {
        self.visible.len()
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_len(&self) -> usize {
        self.page_len
    }

    pub fn page_count(&self) -> usize {
        self.visible.len().div_ceil(self.page_len).max(1)
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page.min(self.page_count() - 1);
    }

    pub fn page_rows(&self) -> impl Iterator<Item = &R> {
        self.visible
            .iter()
            .skip(self.page * self.page_len)
            .take(self.page_len)
            .map(|&i| &self.rows[i])
    }

    /// Selects a listed row. Returns false if no row has `pk`.
    pub fn select(&mut self, pk: Pk) -> bool {
        if self.get(pk).is_some() {
            self.selected.insert(pk);
            true
        } else {
            false
        }
    }

    pub fn toggle(&mut self, pk: Pk) {
        if !self.selected.remove(&pk) {
            self.select(pk);
        }
    }

    pub fn is_selected(&self, pk: Pk) -> bool {
        self.selected.contains(&pk)
    }

    pub fn select_visible(&mut self) {
        let pks: Vec<Pk> = self.visible().map(Record::pk).collect();
        self.selected.extend(pks);
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    /// Selected PKs in display order, including rows hidden by the search.
    pub fn selected_pks(&self) -> Vec<Pk> {
        self.ordered
            .iter()
            .map(|&i| self.rows[i].pk())
            .filter(|pk| self.selected.contains(pk))
            .collect()
    }

    /// Marks the data as out of date. The owner re-fetches and calls
    /// [`Table::replace_rows`].
    pub fn refresh(&mut self) {
        self.stale = true;
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }
}

fn compare_cells(a: &str, b: &str) -> Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.to_lowercase().cmp(&b.to_lowercase()),
    }
}

/// The grid plus the filter state shared by the page's handlers.
#[derive(Debug, Clone)]
pub struct Context<R: Record> {
    pub table: Table<R>,
    pub ranges: DateRanges,
}

impl<R: Record> Context<R> {
    pub fn new(table: Table<R>) -> Self {
        Self {
            table,
            ranges: DateRanges::default(),
        }
    }

    /// Redraws with the date ranges applied.
    pub fn redraw(&mut self) {
        let ranges = &self.ranges;
        self.table.draw_with(|row| ranges.admits(row));
    }

    /// Stores a re-fetch result, keeping the current view.
    pub fn reload(&mut self, rows: Vec<R>) {
        let ranges = &self.ranges;
        self.table.replace_rows(rows, |row| ranges.admits(row));
    }
}
