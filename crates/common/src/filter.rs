//! Filter controller: copies the filter inputs into the grid's search state.
//!
//! Inputs are addressed by stable identifiers: `global_filter` and
//! `global_regex` for the whole row, `col{i}_filter` and `col{i}_regex`
//! for column `i`. Regex mode turns smart search off and vice versa.
//! Date ranges read `{create,start,end}_date_{start,end}` as `YYYY-MM-DD`.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use tracing::{debug, trace};

use crate::grid::{Context, DateField, DateRange, Record};

pub const GLOBAL_FILTER: &str = "global_filter";
pub const GLOBAL_REGEX: &str = "global_regex";

pub fn column_filter_id(column: usize) -> String {
    format!("col{column}_filter")
}

pub fn column_regex_id(column: usize) -> String {
    format!("col{column}_regex")
}

const DATE_INPUT_FORMAT: &str = "%Y-%m-%d";

fn date_prefix(field: DateField) -> &'static str {
    match field {
        DateField::Created => "create",
        DateField::Started => "start",
        DateField::Ended => "end",
    }
}

pub fn date_start_id(field: DateField) -> String {
    format!("{}_date_start", date_prefix(field))
}

pub fn date_end_id(field: DateField) -> String {
    format!("{}_date_end", date_prefix(field))
}

/// Read access to the filter inputs.
pub trait FilterInputs {
    /// Text of an input; empty if it does not exist.
    fn value(&self, id: &str) -> String;
    /// Whether a toggle is on; false if it does not exist.
    fn checked(&self, id: &str) -> bool;
}

/// Owned input values, keyed by identifier.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    values: HashMap<String, String>,
    checked: HashSet<String>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_value(&mut self, id: impl Into<String>, value: impl Into<String>) {
        self.values.insert(id.into(), value.into());
    }

    pub fn set_checked(&mut self, id: impl Into<String>, checked: bool) {
        let id = id.into();
        if checked {
            self.checked.insert(id);
        } else {
            self.checked.remove(&id);
        }
    }

    /// Borrowed text for widgets that render the current value.
    pub fn text(&self, id: &str) -> &str {
        self.values.get(id).map(String::as_str).unwrap_or_default()
    }
}

impl FilterInputs for InputState {
    fn value(&self, id: &str) -> String {
        self.text(id).to_string()
    }

    fn checked(&self, id: &str) -> bool {
        self.checked.contains(id)
    }
}

pub fn apply_global_filter<R: Record>(ctx: &mut Context<R>, inputs: &impl FilterInputs) {
    let regex = inputs.checked(GLOBAL_REGEX);
    let text = inputs.value(GLOBAL_FILTER);
    trace!("Global filter {:?} (regex: {})", text, regex);
    ctx.table.search(&text, regex, !regex);
    ctx.redraw();
}

pub fn apply_column_filter<R: Record>(ctx: &mut Context<R>, inputs: &impl FilterInputs, column: usize) {
    if column >= R::columns().len() {
        return;
    }
    let regex = inputs.checked(&column_regex_id(column));
    let text = inputs.value(&column_filter_id(column));
    trace!("Column {} filter {:?} (regex: {})", column, text, regex);
    ctx.table.column_search(column, &text, regex, !regex);
    ctx.redraw();
}

pub fn apply_date_range<R: Record>(ctx: &mut Context<R>, field: DateField, range: DateRange) {
    ctx.ranges.set(field, range);
    ctx.redraw();
}

/// Blank or unparseable bounds leave that side of the range open.
fn date_bound(inputs: &impl FilterInputs, id: &str) -> Option<NaiveDate> {
    let text = inputs.value(id);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    match NaiveDate::parse_from_str(text, DATE_INPUT_FORMAT) {
        Ok(date) => Some(date),
        Err(e) => {
            debug!("Ignoring date bound {}={:?}: {}", id, text, e);
            None
        }
    }
}

pub fn apply_date_filter<R: Record>(ctx: &mut Context<R>, inputs: &impl FilterInputs, field: DateField) {
    let range = DateRange {
        from: date_bound(inputs, &date_start_id(field)),
        to: date_bound(inputs, &date_end_id(field)),
    };
    apply_date_range(ctx, field, range);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Search, Table, tests::scan};

    fn context() -> Context<crate::models::ScanRow> {
        Context::new(Table::new(vec![
            scan(1, "alpha", "Created", None),
            scan(2, "beta", "Started", None),
            scan(3, "alphabet", "Stopped", None),
        ]))
    }

    #[test]
    fn global_filter_reads_inputs() {
        let mut ctx = context();
        let mut inputs = InputState::new();
        inputs.set_value(GLOBAL_FILTER, "alpha");
        apply_global_filter(&mut ctx, &inputs);
        assert_eq!(ctx.table.global_search(), &Search::new("alpha", false, true));
        assert_eq!(ctx.table.visible_len(), 2);

        inputs.set_value(GLOBAL_FILTER, "^3 ");
        inputs.set_checked(GLOBAL_REGEX, true);
        apply_global_filter(&mut ctx, &inputs);
        assert_eq!(ctx.table.global_search(), &Search::new("^3 ", true, false));
        assert_eq!(ctx.table.visible().map(|r| r.pk).collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn column_filter_uses_indexed_inputs() {
        let mut ctx = context();
        let mut inputs = InputState::new();
        inputs.set_value(column_filter_id(2), "st.*ed");
        inputs.set_checked(column_regex_id(2), true);
        // Inputs for other columns are not consulted.
        inputs.set_value(column_filter_id(1), "beta");
        apply_column_filter(&mut ctx, &inputs, 2);
        assert_eq!(ctx.table.column_searches()[2], Search::new("st.*ed", true, false));
        assert_eq!(ctx.table.column_searches()[1], Search::default());
        assert_eq!(ctx.table.visible().map(|r| r.pk).collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn missing_inputs_clear_the_filter() {
        let mut ctx = context();
        ctx.table.search("beta", false, true);
        ctx.redraw();
        assert_eq!(ctx.table.visible_len(), 1);
        apply_global_filter(&mut ctx, &InputState::new());
        assert_eq!(ctx.table.visible_len(), 3);
    }

    #[test]
    fn date_filter_reads_range_inputs() {
        let mut ctx = Context::new(Table::new(vec![
            scan(1, "old", "Created", Some("2023-06-01T12:00:00Z")),
            scan(2, "new", "Created", Some("2024-06-01T12:00:00Z")),
            scan(3, "none", "Created", None),
        ]));
        let mut inputs = InputState::new();
        inputs.set_value(date_start_id(DateField::Created), "2024-01-01");
        inputs.set_value(date_end_id(DateField::Created), "not a date");
        apply_date_filter(&mut ctx, &inputs, DateField::Created);
        assert_eq!(ctx.table.visible().map(|r| r.pk).collect::<Vec<_>>(), vec![2]);
        assert_eq!(ctx.ranges.created.to, None);

        inputs.set_value(date_start_id(DateField::Created), "");
        apply_date_filter(&mut ctx, &inputs, DateField::Created);
        assert_eq!(ctx.table.visible_len(), 3);
    }

    #[test]
    fn date_input_ids() {
        assert_eq!(date_start_id(DateField::Created), "create_date_start");
        assert_eq!(date_end_id(DateField::Ended), "end_date_end");
    }

    #[test]
    fn unknown_column_is_ignored() {
        let mut ctx = context();
        let mut inputs = InputState::new();
        inputs.set_value(column_filter_id(40), "x");
        apply_column_filter(&mut ctx, &inputs, 40);
        assert_eq!(ctx.table.visible_len(), 3);
    }
}
