use std::{fs, path::PathBuf, sync::Arc};

use common::{
    command::Target,
    dispatch::{Batch, Pending, Recheck, Reply},
    models::{Pk, ScanRow, ScannerRow},
    network::NetworkClient,
};
use iced::{Alignment, Border, Length, Subscription, Task, Theme, keyboard, widget};
use tracing::{error, info};

use crate::{
    CONFIG,
    grid::{GridMessage, widget::GridWidget},
    icons,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AppTab {
    #[default]
    Scans,
    Scanners,
}

#[derive(Debug)]
pub struct App {
    pub dark_mode: bool,
    network: Arc<NetworkClient>,
    tab: AppTab,
    scans: GridWidget<ScanRow>,
    scanners: GridWidget<ScannerRow>,
    pending: Option<Pending>,
    alert: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AppMessage {
    Tab(AppTab),
    Scans(GridMessage),
    Scanners(GridMessage),
    Refresh,
    Loaded(Result<Vec<ScanRow>, String>, Result<Vec<ScannerRow>, String>),
    ScansLoaded(Result<Vec<ScanRow>, String>),
    SelectAll,
    ClearSelection,
    Batch(Batch),
    Confirm,
    Cancel,
    Dispatched(Result<Reply, String>),
    DismissAlert,
    Key(keyboard::Event),
    ToggleTheme,
    Quit,
}

impl App {
    pub fn new(network: Arc<NetworkClient>, page_len: usize) -> Self {
        Self {
            dark_mode: true,
            network,
            tab: AppTab::default(),
            scans: GridWidget::new(page_len),
            scanners: GridWidget::new(page_len),
            pending: None,
            alert: None,
        }
    }

    fn load_scans(&self) -> Task<AppMessage> {
        let network = self.network.clone();
        Task::perform(async move { network.scans().await }, |output| {
            AppMessage::ScansLoaded(output.map_err(|e| format!("{e:#}")))
        })
    }

    fn load_all(&self) -> Task<AppMessage> {
        let network = self.network.clone();
        Task::perform(
            async move { futures::join!(network.scans(), network.scanners()) },
            |(scans, scanners)| {
                AppMessage::Loaded(
                    scans.map_err(|e| format!("{e:#}")),
                    scanners.map_err(|e| format!("{e:#}")),
                )
            },
        )
    }

    fn selection_for(&self, batch: &Batch) -> Vec<Pk> {
        match batch {
            Batch::Command {
                target: Target::Scanner,
                ..
            } => self.scanners.selection(),
            _ => self.scans.selection(),
        }
    }

    fn fail(&mut self, context: &str, msg: String) {
        error!("{}: {}", context, msg);
        self.alert = Some(format!("{context}: {msg}"));
    }

    /// Applies a reply to the grid it targeted and kicks off any re-fetch.
    fn settle(&mut self, reply: Reply) -> Task<AppMessage> {
        let alert = match &reply {
            Reply::Command {
                target: Target::Scanner,
                ..
            } => reply.settle(self.scanners.table_mut()),
            _ => reply.settle(self.scans.table_mut()),
        };
        self.alert = alert;

        if let Reply::Download(download) = reply {
            let path = PathBuf::from(&download.filename);
            match fs::write(&path, &download.bytes) {
                Ok(()) => {
                    info!("Saved {} bytes to {}", download.bytes.len(), path.display());
                    self.alert = Some(format!("Saved {}", path.display()));
                }
                Err(e) => self.fail("Could not save download", e.to_string()),
            }
        }

        if self.scans.table().is_stale() {
            self.load_scans()
        } else {
            Task::none()
        }
    }

    pub fn update(&mut self, message: AppMessage) -> Task<AppMessage> {
        match message {
            AppMessage::Tab(tab) => {
                self.tab = tab;
                Task::none()
            }
            AppMessage::Scans(msg) => {
                self.scans.update(msg);
                Task::none()
            }
            AppMessage::Scanners(msg) => {
                self.scanners.update(msg);
                Task::none()
            }
            AppMessage::Refresh => self.load_all(),
            AppMessage::Loaded(scans, scanners) => {
                match scans {
                    Ok(rows) => self.scans.reload(rows),
                    Err(e) => self.fail("Could not load scans", e),
                }
                match scanners {
                    Ok(rows) => self.scanners.reload(rows),
                    Err(e) => self.fail("Could not load scanners", e),
                }
                Task::none()
            }
            AppMessage::ScansLoaded(output) => {
                match output {
                    Ok(rows) => self.scans.reload(rows),
                    Err(e) => self.fail("Could not load scans", e),
                }
                Task::none()
            }
            AppMessage::SelectAll => {
                let grid = match self.tab {
                    AppTab::Scans => AppMessage::Scans(GridMessage::SelectVisible),
                    AppTab::Scanners => AppMessage::Scanners(GridMessage::SelectVisible),
                };
                Task::done(grid)
            }
            AppMessage::ClearSelection => {
                let grid = match self.tab {
                    AppTab::Scans => AppMessage::Scans(GridMessage::ClearSelection),
                    AppTab::Scanners => AppMessage::Scanners(GridMessage::ClearSelection),
                };
                Task::done(grid)
            }
            AppMessage::Batch(batch) => {
                let selection = self.selection_for(&batch);
                // Nothing selected: stay idle.
                self.pending = batch.prepare(selection);
                Task::none()
            }
            AppMessage::Confirm => {
                let Some(pending) = self.pending.take() else {
                    return Task::none();
                };
                // The grid stayed live behind the banner.
                let selection = self.selection_for(pending.batch());
                let pending = match pending.recheck(selection) {
                    Recheck::Unchanged(pending) => pending,
                    Recheck::Changed(again) => {
                        self.pending = again;
                        return Task::none();
                    }
                };
                let network = self.network.clone();
                Task::perform(
                    async move { pending.send(network.as_ref()).await },
                    |output| AppMessage::Dispatched(output.map_err(|e| format!("{e:#}"))),
                )
            }
            AppMessage::Cancel => {
                self.pending = None;
                Task::none()
            }
            AppMessage::Dispatched(Ok(reply)) => self.settle(reply),
            AppMessage::Dispatched(Err(e)) => {
                self.fail("Request failed", e);
                Task::none()
            }
            AppMessage::DismissAlert => {
                self.alert = None;
                Task::none()
            }
            AppMessage::Key(event) => {
                let action = match CONFIG.write() {
                    Ok(mut config) => config.keyboard.dispatch(&event).copied(),
                    Err(_) => None,
                };
                match action {
                    Some(action) => Task::done(action.into()),
                    None => Task::none(),
                }
            }
            AppMessage::ToggleTheme => {
                self.dark_mode = !self.dark_mode;
                Task::none()
            }
            AppMessage::Quit => iced::exit(),
        }
    }

    pub fn subscription(&self) -> Subscription<AppMessage> {
        iced::event::listen_with(|event, status, _window| match (event, status) {
            (iced::Event::Keyboard(event), iced::event::Status::Ignored) => Some(AppMessage::Key(event)),
            _ => None,
        })
    }

    fn tab_button(&self, label: &'static str, icon: widget::svg::Handle, tab: AppTab) -> widget::Button<'_, AppMessage> {
        let content = widget::row![
            widget::svg(icon).width(20.0).height(20.0),
            widget::text(label),
        ]
        .spacing(8.0)
        .align_y(Alignment::Center);
        let button = widget::button(content).on_press(AppMessage::Tab(tab));
        if self.tab == tab {
            button.style(widget::button::primary)
        } else {
            button.style(widget::button::secondary)
        }
    }

    fn actions(&self) -> iced::Element<'_, AppMessage> {
        let mut actions = widget::row![].spacing(8.0).align_y(Alignment::Center);
        let target = match self.tab {
            AppTab::Scans => Target::Scan,
            AppTab::Scanners => Target::Scanner,
        };
        for &action in target.actions() {
            let batch = match target {
                Target::Scan => Batch::scan(action.into()),
                Target::Scanner => Batch::scanner(action.into()),
            };
            actions = actions.push(widget::button(widget::text(action.label())).on_press(AppMessage::Batch(batch)));
        }
        if target == Target::Scan {
            actions = actions.push(widget::button("download").on_press(AppMessage::Batch(Batch::Download)));
        }
        actions = actions.push(widget::horizontal_space().width(Length::Fill));
        actions = actions.push(widget::button("Refresh").on_press(AppMessage::Refresh));
        actions.into()
    }

    fn banner(&self) -> Option<iced::Element<'_, AppMessage>> {
        let (text, buttons): (&str, iced::Element<'_, AppMessage>) = match (&self.pending, &self.alert) {
            (Some(pending), _) => (
                pending.prompt(),
                widget::row![
                    widget::button("Confirm").on_press(AppMessage::Confirm),
                    widget::button("Cancel")
                        .style(widget::button::secondary)
                        .on_press(AppMessage::Cancel),
                ]
                .spacing(8.0)
                .into(),
            ),
            (None, Some(alert)) => (
                alert.as_str(),
                widget::button("Dismiss").on_press(AppMessage::DismissAlert).into(),
            ),
            (None, None) => return None,
        };
        Some(
            widget::container(
                widget::row![widget::text(text).width(Length::Fill), buttons]
                    .spacing(16.0)
                    .align_y(Alignment::Center),
            )
            .padding(12.0)
            .width(Length::Fill)
            .style(|theme: &Theme| {
                let palette = theme.extended_palette();
                widget::container::Style {
                    text_color: Some(palette.primary.weak.text),
                    background: Some(palette.primary.weak.color.into()),
                    border: Border::default().rounded(8.0),
                    ..Default::default()
                }
            })
            .into(),
        )
    }

    pub fn view(&self) -> iced::Element<'_, AppMessage> {
        let tabs = widget::row![
            self.tab_button("Scans", icons::scan(), AppTab::Scans),
            self.tab_button("Scanners", icons::scanner(), AppTab::Scanners),
            widget::horizontal_space().width(Length::Fill),
            widget::text(self.network.base_url().as_str()),
            widget::toggler(self.dark_mode).on_toggle(|_| AppMessage::ToggleTheme),
        ]
        .spacing(8.0)
        .align_y(Alignment::Center);

        let grid = match self.tab {
            AppTab::Scans => self.scans.view().map(AppMessage::Scans),
            AppTab::Scanners => self.scanners.view().map(AppMessage::Scanners),
        };

        let mut content = widget::column![tabs, self.actions()].spacing(12.0);
        if let Some(banner) = self.banner() {
            content = content.push(banner);
        }
        content = content.push(grid);

        widget::container(content)
            .padding(16.0)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }
}
