use common::{grid::DateField, models::Pk};

pub mod widget;

#[derive(Debug, Clone)]
pub enum GridMessage {
    GlobalFilter(String),
    GlobalRegex(bool),
    ColumnFilter(usize, String),
    ColumnRegex(usize, bool),
    DateStart(DateField, String),
    DateEnd(DateField, String),
    Sort(usize),
    Page(usize),
    ToggleRow(Pk),
    SelectVisible,
    ClearSelection,
}
