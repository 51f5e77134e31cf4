use common::{
    dispatch::Grid,
    filter::{
        FilterInputs, GLOBAL_FILTER, GLOBAL_REGEX, InputState, apply_column_filter, apply_date_filter,
        apply_global_filter, column_filter_id, column_regex_id, date_end_id, date_start_id,
    },
    grid::{Context, Record, SortDir, Table},
    models::Pk,
    render::RenderTarget,
};
use iced::{Alignment, Border, Font, Length, Theme, font::Weight, widget};

use super::GridMessage;

const SELECT_WIDTH: f32 = 48.0;

/// A filterable, selectable page of records.
#[derive(Debug)]
pub struct GridWidget<R: Record> {
    pub ctx: Context<R>,
    inputs: InputState,
}

impl<R: Record> GridWidget<R> {
    pub fn new(page_len: usize) -> Self {
        Self {
            ctx: Context::new(Table::default().with_page_len(page_len)),
            inputs: InputState::new(),
        }
    }

    pub fn table(&self) -> &Table<R> {
        &self.ctx.table
    }

    pub fn table_mut(&mut self) -> &mut Table<R> {
        &mut self.ctx.table
    }

    pub fn reload(&mut self, rows: Vec<R>) {
        self.ctx.reload(rows);
    }

    pub fn selection(&self) -> Vec<Pk> {
        self.ctx.table.selection()
    }

    pub fn update(&mut self, message: GridMessage) {
        match message {
            GridMessage::GlobalFilter(s) => {
                self.inputs.set_value(GLOBAL_FILTER, s);
                apply_global_filter(&mut self.ctx, &self.inputs);
            }
            GridMessage::GlobalRegex(on) => {
                self.inputs.set_checked(GLOBAL_REGEX, on);
                apply_global_filter(&mut self.ctx, &self.inputs);
            }
            GridMessage::ColumnFilter(i, s) => {
                self.inputs.set_value(column_filter_id(i), s);
                apply_column_filter(&mut self.ctx, &self.inputs, i);
            }
            GridMessage::ColumnRegex(i, on) => {
                self.inputs.set_checked(column_regex_id(i), on);
                apply_column_filter(&mut self.ctx, &self.inputs, i);
            }
            GridMessage::DateStart(field, s) => {
                self.inputs.set_value(date_start_id(field), s);
                apply_date_filter(&mut self.ctx, &self.inputs, field);
            }
            GridMessage::DateEnd(field, s) => {
                self.inputs.set_value(date_end_id(field), s);
                apply_date_filter(&mut self.ctx, &self.inputs, field);
            }
            GridMessage::Sort(column) => {
                let dir = match self.ctx.table.current_order() {
                    Some((c, SortDir::Asc)) if c == column => SortDir::Desc,
                    _ => SortDir::Asc,
                };
                self.ctx.table.order(column, dir);
                self.ctx.redraw();
            }
            GridMessage::Page(page) => self.ctx.table.set_page(page),
            GridMessage::ToggleRow(pk) => self.ctx.table.toggle(pk),
            GridMessage::SelectVisible => self.ctx.table.select_visible(),
            GridMessage::ClearSelection => self.ctx.table.clear_selection(),
        }
    }

    pub fn view(&self) -> iced::Element<'_, GridMessage> {
        let columns = R::columns();
        let table = &self.ctx.table;

        let global = widget::row![
            widget::text_input("Search all columns", self.inputs.text(GLOBAL_FILTER))
                .on_input(GridMessage::GlobalFilter)
                .width(Length::Fill),
            widget::horizontal_space().width(16.0),
            widget::text("Regex"),
            widget::horizontal_space().width(8.0),
            widget::toggler(self.inputs.checked(GLOBAL_REGEX)).on_toggle(GridMessage::GlobalRegex),
        ]
        .align_y(Alignment::Center);

        let mut dates = widget::row![].spacing(8.0).align_y(Alignment::Center);
        for &field in R::date_fields() {
            dates = dates.push(widget::text(field.label()));
            dates = dates.push(
                widget::text_input("from YYYY-MM-DD", self.inputs.text(&date_start_id(field)))
                    .on_input(move |s| GridMessage::DateStart(field, s))
                    .width(130.0),
            );
            dates = dates.push(
                widget::text_input("to YYYY-MM-DD", self.inputs.text(&date_end_id(field)))
                    .on_input(move |s| GridMessage::DateEnd(field, s))
                    .width(130.0),
            );
        }

        let mut header = widget::row![widget::text("").width(SELECT_WIDTH)].spacing(8.0);
        let mut filters = widget::row![widget::text("").width(SELECT_WIDTH)].spacing(8.0);
        for (i, column) in columns.iter().enumerate() {
            let arrow = match table.current_order() {
                Some((c, SortDir::Asc)) if c == i => " ^",
                Some((c, SortDir::Desc)) if c == i => " v",
                _ => "",
            };
            header = header.push(
                widget::button(table_header(format!("{}{}", column.title, arrow)))
                    .on_press(GridMessage::Sort(i))
                    .style(widget::button::text)
                    .width(Length::Fill),
            );
            filters = filters.push(
                widget::row![
                    widget::text_input(column.title, self.inputs.text(&column_filter_id(i)))
                        .on_input(move |s| GridMessage::ColumnFilter(i, s))
                        .width(Length::Fill),
                    widget::toggler(self.inputs.checked(&column_regex_id(i)))
                        .on_toggle(move |on| GridMessage::ColumnRegex(i, on)),
                ]
                .spacing(4.0)
                .align_y(Alignment::Center)
                .width(Length::Fill),
            );
        }

        let mut rows = widget::column![].spacing(8.0);
        for record in table.page_rows() {
            let pk = record.pk();
            let mut row = widget::row![
                widget::container(
                    widget::toggler(table.is_selected(pk)).on_toggle(move |_| GridMessage::ToggleRow(pk))
                )
                .width(SELECT_WIDTH)
            ]
            .spacing(8.0)
            .align_y(Alignment::Center);
            for column in columns {
                row = row.push(widget::text((column.render)(record, RenderTarget::Plain)).width(Length::Fill));
            }
            rows = rows.push(row);
        }

        let page = table.page();
        let last = table.page_count() - 1;
        let footer = widget::row![
            widget::text(format!(
                "{} of {} entries, {} selected",
                table.visible_len(),
                table.rows().len(),
                table.selected_pks().len()
            ))
            .width(Length::Fill),
            widget::button("Select shown").on_press(GridMessage::SelectVisible),
            widget::button("Clear").on_press(GridMessage::ClearSelection),
            widget::horizontal_space().width(16.0),
            widget::button("Previous").on_press_maybe((page > 0).then(|| GridMessage::Page(page - 1))),
            widget::text(format!("Page {} / {}", page + 1, last + 1)),
            widget::button("Next").on_press_maybe((page < last).then(|| GridMessage::Page(page + 1))),
        ]
        .spacing(8.0)
        .align_y(Alignment::Center);

        widget::container(
            widget::column![
                global,
                dates,
                widget::horizontal_rule(4.0),
                header,
                filters,
                widget::scrollable(rows).height(Length::Fill),
                widget::horizontal_rule(4.0),
                footer,
            ]
            .spacing(8.0),
        )
        .height(Length::Fill)
        .style(|theme: &Theme| {
            let palette = theme.extended_palette();
            widget::container::Style {
                text_color: Some(palette.background.weak.text),
                background: Some(palette.background.weak.color.into()),
                border: Border::default().rounded(8.0),
                ..Default::default()
            }
        })
        .padding(16.0)
        .into()
    }
}

pub fn table_header<'a>(label: String) -> widget::Text<'a> {
    let mut bold = Font::DEFAULT;
    bold.weight = Weight::Bold;
    widget::text(label).font(bold).style(|theme: &Theme| {
        let palette = theme.extended_palette();
        widget::text::Style {
            color: palette.primary.strong.color.into(),
        }
    })
}
