/// Widget trees for the main window and its dialogs
use iced::widget::{
    button, canvas, center, column, container, horizontal_space, image, mouse_area, opaque,
    pick_list, row, scrollable, slider, stack, text, text_editor, text_input, Column,
};
use iced::{mouse, Alignment, Background, Border, Color, Element, Length, Theme};

use super::cropper::CropStage;
use super::handles::HandleCache;
use super::viewer::ImageViewer;
use super::viewport::patch_view;
use crate::crop::session::{MAX_ZOOM, MIN_ZOOM, ZOOM_STEP};
use crate::error::ErrorSeverity;
use crate::state::notebook::Notebook;
use crate::state::{Image, Note};
use crate::{CropUi, Message, Notice};

const THUMBNAIL_SIZE: f32 = 160.0;
const LIST_WIDTH: f32 = 260.0;

/// Everything the main layout reads
pub struct MainView<'a> {
    pub notebook: &'a Notebook,
    pub body: &'a text_editor::Content,
    pub thumbnails: &'a HandleCache,
    pub profile_names: &'a [String],
    pub active_profile: &'a str,
    pub new_profile_name: &'a str,
    pub notice: Option<&'a Notice>,
    pub busy: Option<&'a str>,
    pub expanded: bool,
}

pub fn main_layout(view: MainView<'_>) -> Element<'_, Message> {
    let mut page = Column::new().spacing(12).padding(16);
    page = page.push(toolbar(&view));
    // Blocking notices are drawn as a dialog on top instead
    if let Some(notice) = view.notice.filter(|notice| !notice.is_blocking()) {
        page = page.push(notice_banner(notice));
    }
    if let Some(busy) = view.busy {
        page = page.push(text(busy).size(14));
    }

    let selected = view.notebook.selected_note();
    let images = image_gallery(selected, view.thumbnails);
    let content: Element<'_, Message> = if view.expanded {
        images
    } else {
        row![
            note_list(view.notebook),
            note_editor(selected, view.body),
            images,
        ]
        .spacing(16)
        .height(Length::Fill)
        .into()
    };

    page.push(content).into()
}

// ========== Top bar ==========

fn toolbar<'a>(view: &MainView<'a>) -> Element<'a, Message> {
    let profiles = pick_list(
        view.profile_names.to_vec(),
        Some(view.active_profile.to_string()),
        Message::SwitchProfile,
    )
    .width(Length::Fixed(180.0));

    let new_profile = text_input("New profile", view.new_profile_name)
        .on_input(Message::NewProfileNameChanged)
        .on_submit(Message::CreateProfile)
        .width(Length::Fixed(160.0));

    let expand_label = if view.expanded { "Show notes" } else { "Expand images" };

    row![
        text("Profile").size(14),
        profiles,
        new_profile,
        button("Create").on_press(Message::CreateProfile),
        button("Manage").on_press(Message::ManageProfiles).style(button::secondary),
        horizontal_space(),
        button("Save").on_press(Message::SaveNow),
        button("Export JSON").on_press(Message::ExportJson).style(button::secondary),
        button("Import JSON").on_press(Message::ImportJson).style(button::secondary),
        button("Print PDF")
            .on_press_maybe(view.notebook.selected_note().map(|_| Message::PrintPdf))
            .style(button::secondary),
        button(expand_label).on_press(Message::ToggleExpanded).style(button::text),
    ]
    .spacing(8)
    .align_y(Alignment::Center)
    .into()
}

fn severity_color(severity: ErrorSeverity) -> Color {
    match severity {
        ErrorSeverity::Info => Color::from_rgb8(0x2e, 0x5e, 0x8a),
        ErrorSeverity::Warning => Color::from_rgb8(0x8a, 0x6d, 0x1e),
        ErrorSeverity::Error => Color::from_rgb8(0x8a, 0x2a, 0x2a),
    }
}

fn notice_banner(notice: &Notice) -> Element<'_, Message> {
    let background = severity_color(notice.severity);
    container(
        row![
            text(&notice.message).size(15),
            horizontal_space(),
            button("Dismiss").on_press(Message::DismissNotice).style(button::text),
        ]
        .align_y(Alignment::Center),
    )
    .padding(10)
    .width(Length::Fill)
    .style(move |_theme: &Theme| container::Style {
        background: Some(Background::Color(background)),
        text_color: Some(Color::WHITE),
        border: Border {
            radius: 6.0.into(),
            ..Border::default()
        },
        ..container::Style::default()
    })
    .into()
}

// ========== Note list & editor ==========

fn note_list(notebook: &Notebook) -> Element<'_, Message> {
    let selected = notebook.selected_note_id();
    let mut list = Column::new().spacing(4);
    let mut visible = 0;
    for note in notebook.visible_notes() {
        visible += 1;
        let style = if Some(note.id.as_str()) == selected {
            button::primary
        } else {
            button::text
        };
        list = list.push(
            button(text(note.display_title()).size(15))
                .width(Length::Fill)
                .on_press(Message::SelectNote(note.id.clone()))
                .style(style),
        );
    }

    let footer = text(format!("{} of {} notes", visible, notebook.notes().len())).size(12);

    column![
        text_input("Search part ID", notebook.filter()).on_input(Message::FilterChanged),
        button("New note").on_press(Message::NewNote).width(Length::Fill),
        scrollable(list).height(Length::Fill),
        footer,
    ]
    .spacing(8)
    .width(Length::Fixed(LIST_WIDTH))
    .into()
}

fn note_editor<'a>(note: Option<&'a Note>, body: &'a text_editor::Content) -> Element<'a, Message> {
    let Some(note) = note else {
        return container(text("Create a note to get started.").size(16))
            .width(Length::FillPortion(3))
            .height(Length::Fill)
            .center_x(Length::FillPortion(3))
            .center_y(Length::Fill)
            .into();
    };

    let updated = chrono::DateTime::<chrono::Utc>::from_timestamp_millis(note.updated_at)
        .map(|t| format!("Updated {}", t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M")))
        .unwrap_or_default();

    column![
        text_input("Part ID", &note.part_id)
            .on_input(Message::PartIdChanged)
            .size(20),
        text_editor(body)
            .placeholder("Notes...")
            .on_action(Message::BodyEdited)
            .height(Length::Fill),
        row![
            text(updated).size(12),
            horizontal_space(),
            button("Duplicate").on_press(Message::DuplicateNote).style(button::secondary),
            button("Delete").on_press(Message::DeleteNote).style(button::danger),
        ]
        .spacing(8)
        .align_y(Alignment::Center),
    ]
    .spacing(8)
    .width(Length::FillPortion(3))
    .into()
}

// ========== Images ==========

fn thumbnail<'a>(img: &'a Image, thumbnails: &'a HandleCache) -> Element<'a, Message> {
    let picture: Element<'a, Message> = match thumbnails.get(&img.id) {
        Some(handle) => image(handle.clone())
            .width(Length::Fixed(THUMBNAIL_SIZE))
            .height(Length::Fixed(THUMBNAIL_SIZE))
            .into(),
        None => container(text("Unreadable image").size(12))
            .width(Length::Fixed(THUMBNAIL_SIZE))
            .height(Length::Fixed(THUMBNAIL_SIZE))
            .center_x(Length::Fixed(THUMBNAIL_SIZE))
            .center_y(Length::Fixed(THUMBNAIL_SIZE))
            .into(),
    };

    let id = img.id.clone();
    let caption_id = img.id.clone();
    let crop_id = img.id.clone();
    let remove_id = img.id.clone();

    container(
        column![
            mouse_area(picture)
                .on_press(Message::OpenViewer(id))
                .interaction(mouse::Interaction::Pointer),
            text_input("Caption", &img.caption)
                .on_input(move |caption| Message::CaptionChanged(caption_id.clone(), caption))
                .size(13)
                .width(Length::Fixed(THUMBNAIL_SIZE)),
            row![
                button(text("Crop").size(13)).on_press(Message::OpenCropper(crop_id)),
                button(text("Remove").size(13))
                    .on_press(Message::RemoveImage(remove_id))
                    .style(button::danger),
            ]
            .spacing(6),
        ]
        .spacing(6),
    )
    .padding(6)
    .into()
}

fn image_gallery<'a>(note: Option<&'a Note>, thumbnails: &'a HandleCache) -> Element<'a, Message> {
    let Some(note) = note else {
        return horizontal_space().into();
    };

    let cells: Vec<Element<'a, Message>> = note.images.iter().map(|img| thumbnail(img, thumbnails)).collect();
    let count = cells.len();

    column![
        row![
            text(format!("Images ({})", count)).size(16),
            horizontal_space(),
            button("Add images").on_press(Message::AddImages),
        ]
        .align_y(Alignment::Center),
        scrollable(iced_aw::Wrap::with_elements(cells)).height(Length::Fill),
    ]
    .spacing(8)
    .width(Length::FillPortion(4))
    .into()
}

// ========== Dialogs ==========

/// Show `content` centered over a dimmed `base`; clicking outside sends
/// `on_blur`, or nothing when it is `None`
pub fn modal<'a>(
    base: Element<'a, Message>,
    content: Element<'a, Message>,
    on_blur: Option<Message>,
) -> Element<'a, Message> {
    let mut backdrop = mouse_area(center(opaque(content)).style(|_theme: &Theme| {
        container::Style {
            background: Some(Background::Color(Color {
                a: 0.75,
                ..Color::BLACK
            })),
            ..container::Style::default()
        }
    }));
    if let Some(message) = on_blur {
        backdrop = backdrop.on_press(message);
    }

    stack![base, opaque(backdrop)].into()
}

fn dialog<'a>(content: impl Into<Element<'a, Message>>) -> Element<'a, Message> {
    container(content)
        .padding(20)
        .style(container::rounded_box)
        .into()
}

pub fn error_dialog(notice: &Notice) -> Element<'_, Message> {
    let accent = severity_color(notice.severity);
    dialog(
        column![
            text("Something went wrong").size(18).color(accent),
            text(&notice.message).size(15),
            row![
                horizontal_space(),
                button("Dismiss").on_press(Message::DismissNotice).style(button::danger),
            ],
        ]
        .spacing(16)
        .width(Length::Fixed(420.0)),
    )
}

pub fn confirm_dialog<'a>(prompt: String) -> Element<'a, Message> {
    dialog(
        column![
            text(prompt).size(16),
            row![
                horizontal_space(),
                button("Cancel").on_press(Message::Cancel).style(button::secondary),
                button("Continue").on_press(Message::Confirm).style(button::danger),
            ]
            .spacing(8),
        ]
        .spacing(16)
        .width(Length::Fixed(420.0)),
    )
}

pub fn profiles_dialog<'a>(names: &'a [String], active: &'a str) -> Element<'a, Message> {
    let mut list = Column::new().spacing(6);
    for name in names {
        let is_active = name == active;
        let label = if is_active {
            format!("{} (active)", name)
        } else {
            name.clone()
        };
        list = list.push(
            row![
                text(label).size(15),
                horizontal_space(),
                button("Open")
                    .on_press_maybe((!is_active).then(|| Message::SwitchProfile(name.clone())))
                    .style(button::secondary),
                button("Delete")
                    .on_press_maybe((!is_active).then(|| Message::DeleteProfile(name.clone())))
                    .style(button::danger),
            ]
            .spacing(8)
            .align_y(Alignment::Center),
        );
    }

    dialog(
        column![
            text("Profiles").size(20),
            scrollable(list).height(Length::Shrink),
            row![horizontal_space(), button("Close").on_press(Message::Cancel)],
        ]
        .spacing(12)
        .width(Length::Fixed(420.0)),
    )
}

pub fn crop_dialog(crop: &CropUi) -> Element<'_, Message> {
    let session = &crop.session;
    let stage = session.stage();

    let canvas_layer = canvas(CropStage { session })
        .width(Length::Fixed(stage.width))
        .height(Length::Fixed(stage.height));
    let stage_view = stack![patch_view(crop.patch.as_ref(), stage), canvas_layer];

    let (min_size, max_size) = session.size_range();
    let size = session.crop_box().size.max(min_size).min(max_size);

    let apply_label = if crop.rendering { "Applying..." } else { "Apply crop" };

    let controls = row![
        button("-")
            .on_press_maybe((session.zoom() > MIN_ZOOM).then_some(Message::CropZoom(-ZOOM_STEP))),
        text(format!("{:.0}%", session.zoom() * 100.0)).size(14),
        button("+")
            .on_press_maybe((session.zoom() < MAX_ZOOM).then_some(Message::CropZoom(ZOOM_STEP))),
        text("Size").size(14),
        slider(min_size..=max_size, size, Message::CropSize)
            .step(1.0)
            .width(Length::Fixed(220.0)),
        button("Center").on_press(Message::CropCenter).style(button::secondary),
        horizontal_space(),
        button("Cancel").on_press(Message::Cancel).style(button::secondary),
        button(apply_label).on_press_maybe((!crop.rendering).then_some(Message::ApplyCrop)),
    ]
    .spacing(8)
    .align_y(Alignment::Center)
    .width(Length::Fixed(stage.width));

    dialog(
        column![
            text("Crop image").size(18),
            container(stage_view).style(|_theme: &Theme| container::Style {
                background: Some(Background::Color(Color::from_rgb8(0x18, 0x18, 0x18))),
                ..container::Style::default()
            }),
            text("Drag to move, drag a corner to resize, scroll or +/- to resize, arrows to nudge")
                .size(12),
            controls,
        ]
        .spacing(10),
    )
}

pub fn viewer_dialog(viewer: &ImageViewer) -> Element<'_, Message> {
    let viewport = viewer.viewport();
    let picture = mouse_area(patch_view(viewer.patch(), viewport)).on_scroll(|delta| {
        let y = match delta {
            mouse::ScrollDelta::Lines { y, .. } => y,
            mouse::ScrollDelta::Pixels { y, .. } => y,
        };
        Message::ViewerScrolled(y)
    });

    let mut content = Column::new().spacing(10).push(picture);
    if !viewer.caption.trim().is_empty() {
        content = content.push(text(&viewer.caption).size(15));
    }
    content = content.push(
        row![
            text(format!("Zoom {:.0}%  (scroll to zoom)", viewer.zoom() * 100.0)).size(13),
            horizontal_space(),
            button("Close").on_press(Message::Cancel),
        ]
        .align_y(Alignment::Center)
        .width(Length::Fixed(viewport.width)),
    );

    dialog(content)
}
