use iced::keyboard::{self, key::Named, Key, Modifiers};
use iced::widget::text_editor;
use iced::{window, Element, Subscription, Task, Theme};
use image::DynamicImage;
use rfd::FileDialog;
use std::path::PathBuf;
use std::sync::Arc;

mod config;
mod crop;
mod error;
mod media;
mod pdf;
mod state;
mod transfer;
mod ui;

use config::AppConfig;
use crop::{CropKey, CropSession, Size};
use error::{ErrorSeverity, NoteVaultError, ResultExt};
use media::{IngestReport, Intake};
use state::autosave::Ticket;
use state::{AddImagesOutcome, LastCrop, Library, Note, NoteEdit, Workspace};
use ui::cropper::CropEvent;
use ui::viewer::ImageViewer;
use ui::viewport::{render_patch, Patch};

/// Message for the user: a banner at the top of the window, or a
/// dialog above everything else for `Error` severity
#[derive(Debug, Clone)]
pub struct Notice {
    pub message: String,
    pub severity: ErrorSeverity,
}

impl Notice {
    /// Blocking notices stay on top until dismissed
    pub fn is_blocking(&self) -> bool {
        self.severity == ErrorSeverity::Error
    }
}

/// An action waiting for the user to confirm it
#[derive(Debug, Clone)]
pub enum Pending {
    OversizedImages {
        note_id: String,
        paths: Vec<PathBuf>,
        oversized: usize,
        limit_bytes: u64,
    },
    DeleteNote(String),
    DeleteProfile(String),
    Import {
        path: PathBuf,
        notes: Vec<Note>,
    },
    /// The final save before closing failed
    CloseWithoutSaving {
        window: window::Id,
        reason: String,
    },
}

impl Pending {
    pub fn prompt(&self) -> String {
        match self {
            Pending::OversizedImages {
                oversized,
                limit_bytes,
                ..
            } => format!(
                "{} of the selected files are larger than {} MB and may be slow to process. Continue?",
                oversized,
                limit_bytes / (1024 * 1024)
            ),
            Pending::DeleteNote(_) => "Delete this note and all of its images?".to_string(),
            Pending::DeleteProfile(name) => {
                format!("Delete profile \"{}\" and all of its notes?", name)
            }
            Pending::Import { path, notes } => format!(
                "Replace every note in this profile with the {} notes from {}?",
                notes.len(),
                path.display()
            ),
            Pending::CloseWithoutSaving { reason, .. } => format!(
                "Your latest edits could not be saved. {} Close anyway and lose them?",
                reason
            ),
        }
    }
}

/// Open cropper: interaction state plus the decoded original
pub struct CropUi {
    pub session: CropSession,
    pub source: Arc<DynamicImage>,
    pub original_data_url: String,
    pub patch: Option<Patch>,
    pub rendering: bool,
}

impl CropUi {
    fn refresh_patch(&mut self) {
        self.patch = render_patch(&self.source, self.session.stage(), self.session.zoom());
    }
}

/// Whatever is shown on top of the main layout
pub enum Modal {
    Confirm(Pending),
    Cropper(CropUi),
    Viewer(ImageViewer),
    Profiles,
}

/// Main application state
struct NoteVault {
    config: AppConfig,
    /// Notes of the active profile and their persistence
    workspace: Workspace<Library>,
    /// Editing buffer for the selected note's body
    body: text_editor::Content,
    /// Note whose body is loaded in `body`
    body_note: Option<String>,
    thumbnails: ui::handles::HandleCache,
    profile_names: Vec<String>,
    new_profile_name: String,
    modal: Option<Modal>,
    notice: Option<Notice>,
    expanded: bool,
    busy: Option<String>,
}

/// Application messages (events)
#[derive(Debug, Clone)]
pub enum Message {
    // Notes
    FilterChanged(String),
    SelectNote(String),
    NewNote,
    PartIdChanged(String),
    BodyEdited(text_editor::Action),
    DuplicateNote,
    DeleteNote,
    SaveNow,
    AutosaveDue(Ticket),
    ToggleExpanded,

    // Images
    AddImages,
    ImagesIngested { note_id: String, report: IngestReport },
    /// Smaller encodings for a batch whose first save failed
    ImagesShrunk {
        note_id: String,
        image_ids: Vec<String>,
        smaller: Vec<(String, String)>,
    },
    CaptionChanged(String, String),
    RemoveImage(String),
    OpenViewer(String),
    ViewerLoaded(String, Result<Arc<DynamicImage>, String>),
    ViewerScrolled(f32),

    // Cropper
    OpenCropper(String),
    CropSourceLoaded {
        note_id: String,
        image_id: String,
        original_data_url: String,
        last_crop: Option<LastCrop>,
        /// Width and height read from the image header
        natural: (u32, u32),
        result: Result<Arc<DynamicImage>, String>,
    },
    Crop(CropEvent),
    CropKey(CropKey, bool),
    CropZoom(f32),
    CropSize(f32),
    CropCenter,
    ApplyCrop,
    CropRendered {
        note_id: String,
        image_id: String,
        crop: LastCrop,
        result: Result<String, String>,
    },

    // Profiles
    SwitchProfile(String),
    NewProfileNameChanged(String),
    CreateProfile,
    ManageProfiles,
    DeleteProfile(String),

    // Files
    ExportJson,
    ImportJson,
    PrintPdf,
    PdfWritten(Result<PathBuf, String>),

    // Dialogs
    Confirm,
    Cancel,
    DismissNotice,
    CloseRequested(window::Id),
}

impl NoteVault {
    /// Create a new instance of the application
    fn new() -> (Self, Task<Message>) {
        let config = AppConfig::load();

        // If this fails, we panic because the app cannot function without its database
        let library = Library::open(&config.database_path(), config.max_record_bytes)
            .expect("Failed to open the note database. Check permissions and disk space.");
        let workspace = Workspace::open(library, &config)
            .expect("Failed to load profiles from the note database.");

        let app = Self::with_workspace(config, workspace);
        log::info!(
            "NoteVault initialized with profile '{}' ({} notes, database {})",
            app.workspace.active_profile(),
            app.workspace.notebook().notes().len(),
            app.workspace.profiles().backend().path().display()
        );
        (app, Task::none())
    }

    fn with_workspace(config: AppConfig, workspace: Workspace<Library>) -> Self {
        let mut app = NoteVault {
            config,
            workspace,
            body: text_editor::Content::new(),
            body_note: None,
            thumbnails: ui::handles::HandleCache::new(),
            profile_names: Vec::new(),
            new_profile_name: String::new(),
            modal: None,
            notice: None,
            expanded: false,
            busy: None,
        };
        app.refresh_profiles();
        app.sync_editor();
        app.refresh_thumbnails();
        app
    }

    fn title(&self) -> String {
        format!("NoteVault - {}", self.workspace.active_profile())
    }

    // ========== Helpers ==========

    fn report(&mut self, err: NoteVaultError) {
        log::warn!("{}", err);
        self.notice = Some(Notice {
            message: err.user_message(),
            severity: err.severity(),
        });
    }

    fn inform(&mut self, message: impl Into<String>, severity: ErrorSeverity) {
        self.notice = Some(Notice {
            message: message.into(),
            severity,
        });
    }

    fn show_add_images_outcome(&mut self, outcome: AddImagesOutcome) {
        match outcome {
            AddImagesOutcome::Saved { added } => log::info!("Added {} images", added),
            AddImagesOutcome::NeedsRecompress(unsaved) => {
                log::warn!("Batch for note {} still waits for a smaller encoding", unsaved.note_id)
            }
            AddImagesOutcome::SavedAfterRecompress { added } => self.inform(
                format!("Storage is nearly full: {} images were saved at reduced quality.", added),
                ErrorSeverity::Warning,
            ),
            AddImagesOutcome::RolledBack { removed, reason } => self.inform(
                format!("{} images could not be saved and were removed. {}", removed, reason),
                ErrorSeverity::Error,
            ),
        }
    }

    fn refresh_profiles(&mut self) {
        if let Some(names) = self.workspace.profile_names().log_err() {
            self.profile_names = names.into_iter().collect();
        }
    }

    fn refresh_thumbnails(&mut self) {
        self.thumbnails.sync(self.workspace.notebook().notes());
        log::debug!("{} thumbnails cached", self.thumbnails.len());
    }

    /// Reload the body editor when the selected note changed
    fn sync_editor(&mut self) {
        let selected = self.workspace.notebook().selected_note_id().map(str::to_string);
        if selected == self.body_note {
            return;
        }
        self.body = match self.workspace.notebook().selected_note() {
            Some(note) => text_editor::Content::with_text(&note.body),
            None => text_editor::Content::new(),
        };
        self.body_note = selected;
    }

    /// Force the body editor to reload (e.g. after an import)
    fn reload_editor(&mut self) {
        self.body_note = None;
        self.sync_editor();
    }

    fn selected_note_id(&self) -> Option<String> {
        self.workspace.notebook().selected_note_id().map(str::to_string)
    }

    fn schedule_autosave(&self, ticket: Option<Ticket>) -> Task<Message> {
        match ticket {
            Some(ticket) => {
                let delay = self.workspace.autosave_delay();
                Task::perform(tokio::time::sleep(delay), move |_| {
                    Message::AutosaveDue(ticket.clone())
                })
            }
            None => Task::none(),
        }
    }

    fn start_ingest(&mut self, note_id: String, paths: Vec<PathBuf>) -> Task<Message> {
        self.busy = Some(format!("Processing {} images...", paths.len()));
        let opts = self.config.ingest_options();
        Task::perform(media::ingest_files(paths, opts), move |report| {
            Message::ImagesIngested {
                note_id: note_id.clone(),
                report,
            }
        })
    }

    fn crop_ui(&mut self) -> Option<&mut CropUi> {
        match &mut self.modal {
            Some(Modal::Cropper(crop)) => Some(crop),
            _ => None,
        }
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        if self.notice.as_ref().is_some_and(Notice::is_blocking) && is_shortcut(&message) {
            return Task::none();
        }

        match message {
            // ========== Notes ==========
            Message::FilterChanged(filter) => {
                self.workspace.notebook_mut().set_filter(filter);
                self.sync_editor();
                Task::none()
            }
            Message::SelectNote(id) => {
                self.workspace.notebook_mut().select_note(&id);
                self.sync_editor();
                Task::none()
            }
            Message::NewNote => {
                if let Err(e) = self.workspace.create_note() {
                    self.report(e);
                }
                self.sync_editor();
                Task::none()
            }
            Message::PartIdChanged(part_id) => {
                let Some(id) = self.selected_note_id() else {
                    return Task::none();
                };
                let ticket = self.workspace.edit_note(&id, NoteEdit::part_id(part_id));
                self.schedule_autosave(ticket)
            }
            Message::BodyEdited(action) => {
                let is_edit = action.is_edit();
                self.body.perform(action);
                if !is_edit {
                    return Task::none();
                }
                let Some(id) = self.selected_note_id() else {
                    return Task::none();
                };
                let ticket = self.workspace.edit_note(&id, NoteEdit::body(self.body.text()));
                self.schedule_autosave(ticket)
            }
            Message::DuplicateNote => {
                if let Some(id) = self.selected_note_id() {
                    match self.workspace.duplicate_note(&id) {
                        Ok(_) => self.refresh_thumbnails(),
                        Err(e) => self.report(e),
                    }
                    self.sync_editor();
                }
                Task::none()
            }
            Message::DeleteNote => {
                if let Some(id) = self.selected_note_id() {
                    self.modal = Some(Modal::Confirm(Pending::DeleteNote(id)));
                }
                Task::none()
            }
            Message::SaveNow => {
                match self.workspace.flush() {
                    Ok(()) => self.inform("All changes saved.", ErrorSeverity::Info),
                    Err(e) => self.report(e),
                }
                Task::none()
            }
            Message::AutosaveDue(ticket) => {
                if let Err(e) = self.workspace.autosave_due(&ticket) {
                    self.report(e);
                }
                Task::none()
            }
            Message::ToggleExpanded => {
                self.expanded = !self.expanded;
                Task::none()
            }

            // ========== Images ==========
            Message::AddImages => {
                let Some(note_id) = self.selected_note_id() else {
                    return Task::none();
                };
                let Some(paths) = FileDialog::new()
                    .set_title("Add Images")
                    .add_filter("Images", &["jpg", "jpeg", "png", "gif", "webp", "bmp", "tif", "tiff"])
                    .pick_files()
                else {
                    return Task::none();
                };

                match media::plan_intake(paths, self.config.oversize_warning_bytes) {
                    Intake::Ready(paths) => self.start_ingest(note_id, paths),
                    Intake::NeedsConfirmation { paths, oversized } => {
                        self.modal = Some(Modal::Confirm(Pending::OversizedImages {
                            note_id,
                            paths,
                            oversized,
                            limit_bytes: self.config.oversize_warning_bytes,
                        }));
                        Task::none()
                    }
                }
            }
            Message::ImagesIngested { note_id, report } => {
                self.busy = None;
                let failed = report.failures.len();
                if failed > 0 {
                    self.inform(
                        format!("{} of the selected files could not be read.", failed),
                        ErrorSeverity::Warning,
                    );
                }
                let task = match self.workspace.add_images(&note_id, report.images) {
                    Ok(AddImagesOutcome::NeedsRecompress(unsaved)) => {
                        self.busy = Some(format!("Storage is full, shrinking {} images...", unsaved.images.len()));
                        let image_ids = unsaved.image_ids();
                        let fallback = self.config.fallback_options();
                        Task::perform(media::shrink_images(unsaved.images, fallback), move |smaller| {
                            Message::ImagesShrunk {
                                note_id: note_id.clone(),
                                image_ids: image_ids.clone(),
                                smaller,
                            }
                        })
                    }
                    Ok(outcome) => {
                        self.show_add_images_outcome(outcome);
                        Task::none()
                    }
                    Err(e) => {
                        self.report(e);
                        Task::none()
                    }
                };
                self.refresh_thumbnails();
                task
            }
            Message::ImagesShrunk {
                note_id,
                image_ids,
                smaller,
            } => {
                self.busy = None;
                let outcome = self.workspace.finish_recompressed(&note_id, &image_ids, smaller);
                self.show_add_images_outcome(outcome);
                self.refresh_thumbnails();
                Task::none()
            }
            Message::CaptionChanged(image_id, caption) => {
                let Some(note_id) = self.selected_note_id() else {
                    return Task::none();
                };
                let ticket = self.workspace.update_caption(&note_id, &image_id, caption);
                self.schedule_autosave(ticket)
            }
            Message::RemoveImage(image_id) => {
                if let Some(note_id) = self.selected_note_id() {
                    if let Err(e) = self.workspace.remove_image(&note_id, &image_id) {
                        self.report(e);
                    }
                    self.refresh_thumbnails();
                }
                Task::none()
            }
            Message::OpenViewer(image_id) => {
                self.workspace.notebook_mut().select_image(&image_id);
                let Some(image) = self.workspace.notebook().selected_image() else {
                    return Task::none();
                };
                let data_url = image.data_url.clone();
                Task::perform(ui::viewport::decode_for_display(data_url), move |result| {
                    Message::ViewerLoaded(image_id.clone(), result)
                })
            }
            Message::ViewerLoaded(image_id, result) => {
                match result {
                    Ok(source) => {
                        let caption = self
                            .workspace
                            .notebook()
                            .selected_image()
                            .map(|img| img.caption.clone())
                            .unwrap_or_default();
                        let (width, height) = ui::viewer::VIEWER_VIEWPORT;
                        self.modal = Some(Modal::Viewer(ImageViewer::new(
                            image_id,
                            caption,
                            source,
                            Size::new(width, height),
                        )));
                    }
                    Err(reason) => self.inform(reason, ErrorSeverity::Warning),
                }
                Task::none()
            }
            Message::ViewerScrolled(y) => {
                if let Some(Modal::Viewer(viewer)) = &mut self.modal {
                    viewer.wheel(y);
                }
                Task::none()
            }

            // ========== Cropper ==========
            Message::OpenCropper(image_id) => {
                let Some(note_id) = self.selected_note_id() else {
                    return Task::none();
                };
                self.workspace.notebook_mut().select_image(&image_id);
                let source = match self.workspace.prepare_crop(&note_id, &image_id) {
                    Ok(Some(source)) => source,
                    Ok(None) => return Task::none(),
                    Err(e) => {
                        self.report(e);
                        return Task::none();
                    }
                };
                // The header tells whether the image can be cropped at all
                // before the full decode starts
                let natural = match media::natural_size(&source.original_data_url) {
                    Ok(natural) => natural,
                    Err(e) => {
                        log::warn!("Image {} has no readable size: {}", image_id, e);
                        self.inform("This image has no readable size and cannot be cropped.", ErrorSeverity::Warning);
                        return Task::none();
                    }
                };
                let url = source.original_data_url.clone();
                Task::perform(ui::viewport::decode_for_display(url), move |result| {
                    Message::CropSourceLoaded {
                        note_id: note_id.clone(),
                        image_id: image_id.clone(),
                        original_data_url: source.original_data_url.clone(),
                        last_crop: source.last_crop,
                        natural,
                        result,
                    }
                })
            }
            Message::CropSourceLoaded {
                note_id,
                image_id,
                original_data_url,
                last_crop,
                natural,
                result,
            } => {
                let source = match result {
                    Ok(source) => source,
                    Err(reason) => {
                        self.inform(reason, ErrorSeverity::Warning);
                        return Task::none();
                    }
                };
                let stage = Size::new(self.config.stage_width, self.config.stage_height);
                match CropSession::open(note_id, image_id, stage, natural, last_crop) {
                    Some(session) => {
                        let mut crop = CropUi {
                            session,
                            source,
                            original_data_url,
                            patch: None,
                            rendering: false,
                        };
                        crop.refresh_patch();
                        self.modal = Some(Modal::Cropper(crop));
                    }
                    None => self.inform("This image has no size and cannot be cropped.", ErrorSeverity::Warning),
                }
                Task::none()
            }
            Message::Crop(event) => {
                if let Some(crop) = self.crop_ui() {
                    ui::cropper::apply_event(&mut crop.session, event);
                }
                Task::none()
            }
            Message::CropKey(key, large) => {
                if let Some(crop) = self.crop_ui() {
                    crop.session.key(key, large);
                }
                Task::none()
            }
            Message::CropZoom(delta) => {
                if let Some(crop) = self.crop_ui() {
                    crop.session.zoom_by(delta);
                    crop.refresh_patch();
                }
                Task::none()
            }
            Message::CropSize(size) => {
                if let Some(crop) = self.crop_ui() {
                    crop.session.set_size(size);
                }
                Task::none()
            }
            Message::CropCenter => {
                if let Some(crop) = self.crop_ui() {
                    crop.session.center();
                }
                Task::none()
            }
            Message::ApplyCrop => {
                let output_size = self.config.crop_output_size;
                let quality = self.config.crop_quality;
                let Some(crop) = self.crop_ui() else {
                    return Task::none();
                };
                if crop.rendering {
                    return Task::none();
                }
                // Degenerate geometry: nothing to apply
                let Some(plan) = crop.session.plan() else {
                    return Task::none();
                };
                crop.rendering = true;
                let note_id = crop.session.note_id().to_string();
                let image_id = crop.session.image_id().to_string();
                let source = crop.original_data_url.clone();
                Task::perform(
                    media::render_crop_async(source, plan.region, output_size, quality),
                    move |result| Message::CropRendered {
                        note_id: note_id.clone(),
                        image_id: image_id.clone(),
                        crop: plan.crop,
                        result,
                    },
                )
            }
            Message::CropRendered {
                note_id,
                image_id,
                crop,
                result,
            } => {
                let still_open = matches!(
                    &self.modal,
                    Some(Modal::Cropper(open)) if open.session.image_id() == image_id
                );
                if !still_open {
                    log::info!("Cropper for image {} was closed, dropping the rendered crop", image_id);
                    return Task::none();
                }
                match result {
                    Ok(data_url) => {
                        match self.workspace.apply_crop(&note_id, &image_id, data_url, crop) {
                            Ok(()) => self.modal = None,
                            Err(e) => {
                                self.report(e);
                                if let Some(crop) = self.crop_ui() {
                                    crop.rendering = false;
                                }
                            }
                        }
                        self.refresh_thumbnails();
                    }
                    Err(reason) => {
                        self.inform(reason, ErrorSeverity::Warning);
                        if let Some(crop) = self.crop_ui() {
                            crop.rendering = false;
                        }
                    }
                }
                Task::none()
            }

            // ========== Profiles ==========
            Message::SwitchProfile(name) => {
                match self.workspace.switch_profile(&name) {
                    Ok(()) => {
                        self.reload_editor();
                        self.refresh_thumbnails();
                    }
                    Err(e) => self.report(e),
                }
                self.refresh_profiles();
                Task::none()
            }
            Message::NewProfileNameChanged(name) => {
                self.new_profile_name = name;
                Task::none()
            }
            Message::CreateProfile => {
                match self.workspace.create_profile(&self.new_profile_name) {
                    Ok(name) => {
                        log::info!("Now using profile '{}'", name);
                        self.new_profile_name.clear();
                        self.reload_editor();
                        self.refresh_thumbnails();
                    }
                    Err(e) => self.report(e),
                }
                self.refresh_profiles();
                Task::none()
            }
            Message::ManageProfiles => {
                self.refresh_profiles();
                self.modal = Some(Modal::Profiles);
                Task::none()
            }
            Message::DeleteProfile(name) => {
                if name == self.workspace.active_profile() {
                    self.report(NoteVaultError::ProfileActive(name));
                } else {
                    self.modal = Some(Modal::Confirm(Pending::DeleteProfile(name)));
                }
                Task::none()
            }

            // ========== Files ==========
            Message::ExportJson => {
                let Some(path) = FileDialog::new()
                    .set_title("Export Notes")
                    .add_filter("JSON", &["json"])
                    .set_file_name(transfer::export_file_name(self.workspace.active_profile()))
                    .save_file()
                else {
                    return Task::none();
                };
                match transfer::export_notes(&path, self.workspace.notebook().notes()) {
                    Ok(()) => self.inform(format!("Exported to {}", path.display()), ErrorSeverity::Info),
                    Err(e) => self.report(e),
                }
                Task::none()
            }
            Message::ImportJson => {
                let Some(path) = FileDialog::new()
                    .set_title("Import Notes")
                    .add_filter("JSON", &["json"])
                    .pick_file()
                else {
                    return Task::none();
                };
                match transfer::import_notes(&path) {
                    Ok(notes) => self.modal = Some(Modal::Confirm(Pending::Import { path, notes })),
                    Err(e) => self.report(e),
                }
                Task::none()
            }
            Message::PrintPdf => {
                let Some(note) = self.workspace.notebook().selected_note().cloned() else {
                    return Task::none();
                };
                let Some(path) = FileDialog::new()
                    .set_title("Print Note to PDF")
                    .add_filter("PDF", &["pdf"])
                    .set_file_name(pdf::pdf_file_name(&note))
                    .save_file()
                else {
                    return Task::none();
                };
                self.busy = Some("Writing PDF...".to_string());
                Task::perform(write_pdf_async(note, path), Message::PdfWritten)
            }
            Message::PdfWritten(result) => {
                self.busy = None;
                match result {
                    Ok(path) => self.inform(format!("Saved PDF to {}", path.display()), ErrorSeverity::Info),
                    Err(reason) => self.inform(reason, ErrorSeverity::Error),
                }
                Task::none()
            }

            // ========== Dialogs ==========
            Message::Confirm => {
                let Some(Modal::Confirm(pending)) = self.modal.take() else {
                    return Task::none();
                };
                self.run_confirmed(pending)
            }
            Message::Cancel => {
                // Closing the cropper discards the box; closing the viewer
                // resets its zoom since the next open starts fresh
                self.modal = None;
                Task::none()
            }
            Message::DismissNotice => {
                self.notice = None;
                Task::none()
            }
            Message::CloseRequested(id) => {
                if let Err(e) = self.workspace.flush() {
                    log::error!("Pending edits could not be saved on exit: {}", e);
                    self.modal = Some(Modal::Confirm(Pending::CloseWithoutSaving {
                        window: id,
                        reason: e.user_message(),
                    }));
                    return Task::none();
                }
                log::info!("Closing NoteVault");
                window::close(id)
            }
        }
    }

    fn run_confirmed(&mut self, pending: Pending) -> Task<Message> {
        match pending {
            Pending::CloseWithoutSaving { window: id, .. } => {
                log::warn!("Closing NoteVault with unsaved edits");
                window::close(id)
            }
            Pending::OversizedImages { note_id, paths, .. } => self.start_ingest(note_id, paths),
            Pending::DeleteNote(id) => {
                if let Err(e) = self.workspace.delete_note(&id) {
                    self.report(e);
                }
                self.sync_editor();
                self.refresh_thumbnails();
                Task::none()
            }
            Pending::DeleteProfile(name) => {
                if let Err(e) = self.workspace.delete_profile(&name) {
                    self.report(e);
                }
                self.refresh_profiles();
                self.modal = Some(Modal::Profiles);
                Task::none()
            }
            Pending::Import { path, notes } => {
                let count = notes.len();
                match self.workspace.replace_notes(notes) {
                    Ok(()) => self.inform(
                        format!("Imported {} notes from {}", count, path.display()),
                        ErrorSeverity::Info,
                    ),
                    Err(e) => self.report(e),
                }
                self.reload_editor();
                self.refresh_thumbnails();
                Task::none()
            }
        }
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        let base = ui::panels::main_layout(ui::panels::MainView {
            notebook: self.workspace.notebook(),
            body: &self.body,
            thumbnails: &self.thumbnails,
            profile_names: &self.profile_names,
            active_profile: self.workspace.active_profile(),
            new_profile_name: &self.new_profile_name,
            notice: self.notice.as_ref(),
            busy: self.busy.as_deref(),
            expanded: self.expanded,
        });

        let dismiss = Some(Message::Cancel);
        let content = match &self.modal {
            None => base,
            Some(Modal::Confirm(pending)) => {
                ui::panels::modal(base, ui::panels::confirm_dialog(pending.prompt()), dismiss)
            }
            Some(Modal::Cropper(crop)) => ui::panels::modal(base, ui::panels::crop_dialog(crop), dismiss),
            Some(Modal::Viewer(viewer)) => {
                ui::panels::modal(base, ui::panels::viewer_dialog(viewer), dismiss)
            }
            Some(Modal::Profiles) => ui::panels::modal(
                base,
                ui::panels::profiles_dialog(&self.profile_names, self.workspace.active_profile()),
                dismiss,
            ),
        };

        // Errors go above any open dialog; only their own button closes them
        match &self.notice {
            Some(notice) if notice.is_blocking() => {
                ui::panels::modal(content, ui::panels::error_dialog(notice), None)
            }
            _ => content,
        }
    }

    fn subscription(&self) -> Subscription<Message> {
        Subscription::batch([
            keyboard::on_key_press(key_to_message),
            window::close_requests().map(Message::CloseRequested),
        ])
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

/// Keyboard shortcuts not consumed by a focused widget
fn key_to_message(key: Key, modifiers: Modifiers) -> Option<Message> {
    let large = modifiers.shift();
    match key.as_ref() {
        Key::Character("s") if modifiers.command() => Some(Message::SaveNow),
        Key::Named(Named::Escape) => Some(Message::Cancel),
        Key::Named(Named::ArrowLeft) => Some(Message::CropKey(CropKey::Left, large)),
        Key::Named(Named::ArrowRight) => Some(Message::CropKey(CropKey::Right, large)),
        Key::Named(Named::ArrowUp) => Some(Message::CropKey(CropKey::Up, large)),
        Key::Named(Named::ArrowDown) => Some(Message::CropKey(CropKey::Down, large)),
        Key::Character("+") | Key::Character("=") => Some(Message::CropKey(CropKey::Grow, large)),
        Key::Character("-") | Key::Character("_") => Some(Message::CropKey(CropKey::Shrink, large)),
        Key::Named(Named::Enter) => Some(Message::ApplyCrop),
        _ => None,
    }
}

/// Messages sent by keyboard shortcuts rather than by a widget
fn is_shortcut(message: &Message) -> bool {
    matches!(
        message,
        Message::SaveNow | Message::Cancel | Message::CropKey(..) | Message::ApplyCrop
    )
}

/// Render the PDF on a blocking thread
async fn write_pdf_async(note: Note, path: PathBuf) -> Result<PathBuf, String> {
    tokio::task::spawn_blocking(move || {
        pdf::write_note_pdf(&note, &path)
            .map(|()| path)
            .map_err(|e| e.user_message())
    })
    .await
    .map_err(|e| format!("Task join error: {}", e))?
}

fn main() -> iced::Result {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("notevault=info")).init();

    iced::application(NoteVault::title, NoteVault::update, NoteVault::view)
        .subscription(NoteVault::subscription)
        .theme(NoteVault::theme)
        .exit_on_close_request(false)
        .centered()
        .run_with(NoteVault::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shortcuts() {
        assert!(matches!(
            key_to_message(Key::Character("s".into()), Modifiers::CTRL),
            Some(Message::SaveNow)
        ));
        assert!(matches!(
            key_to_message(Key::Named(Named::ArrowLeft), Modifiers::SHIFT),
            Some(Message::CropKey(CropKey::Left, true))
        ));
        assert!(matches!(
            key_to_message(Key::Character("=".into()), Modifiers::empty()),
            Some(Message::CropKey(CropKey::Grow, false))
        ));
        assert!(key_to_message(Key::Character("s".into()), Modifiers::empty()).is_none());
    }

    #[test]
    fn test_pending_prompts() {
        let prompt = Pending::OversizedImages {
            note_id: "n".into(),
            paths: vec![],
            oversized: 2,
            limit_bytes: 50 * 1024 * 1024,
        }
        .prompt();
        assert!(prompt.starts_with("2 of the selected files are larger than 50 MB"));
        assert!(Pending::DeleteProfile("Shop".into()).prompt().contains("\"Shop\""));
    }

    fn app_with_limit(dir: &tempfile::TempDir, max_value_bytes: usize) -> NoteVault {
        let library = Library::open(&dir.path().join("notes.db"), max_value_bytes).unwrap();
        let config = AppConfig::default();
        let workspace = Workspace::open(library, &config).unwrap();
        NoteVault::with_workspace(config, workspace)
    }

    #[test]
    fn test_failed_crop_save_blocks_until_dismissed() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with_limit(&dir, 4096);
        let note_id = app.workspace.create_note().unwrap();
        app.workspace
            .add_images(&note_id, vec!["data:image/png;base64,AAAA".into()])
            .unwrap();
        let image_id = app.workspace.notebook().note(&note_id).unwrap().images[0].id.clone();

        let session = CropSession::open(
            note_id.clone(),
            image_id.clone(),
            Size::new(400.0, 300.0),
            (100, 100),
            None,
        )
        .unwrap();
        app.modal = Some(Modal::Cropper(CropUi {
            session,
            source: Arc::new(DynamicImage::new_rgb8(100, 100)),
            original_data_url: "data:image/png;base64,AAAA".into(),
            patch: None,
            rendering: true,
        }));

        let too_big = format!("data:image/jpeg;base64,{}", "A".repeat(8192));
        let _ = app.update(Message::CropRendered {
            note_id: note_id.clone(),
            image_id: image_id.clone(),
            crop: LastCrop {
                rel_x: 0.1,
                rel_y: 0.1,
                rel_size: 0.5,
            },
            result: Ok(too_big),
        });

        assert!(app.notice.as_ref().is_some_and(Notice::is_blocking));
        assert!(matches!(&app.modal, Some(Modal::Cropper(crop)) if !crop.rendering));
        let image = &app.workspace.notebook().note(&note_id).unwrap().images[0];
        assert_eq!(image.data_url, "data:image/png;base64,AAAA");

        // Escape cannot reach the cropper underneath the error
        let _ = app.update(Message::Cancel);
        assert!(app.notice.is_some());
        assert!(app.modal.is_some());

        let _ = app.update(Message::DismissNotice);
        assert!(app.notice.is_none());
        let _ = app.update(Message::Cancel);
        assert!(app.modal.is_none());
    }

    #[test]
    fn test_unreadable_image_does_not_open_cropper() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with_limit(&dir, 4096);
        let note_id = app.workspace.create_note().unwrap();
        app.workspace
            .add_images(&note_id, vec!["data:image/png;base64,AAAA".into()])
            .unwrap();
        let image_id = app.workspace.notebook().note(&note_id).unwrap().images[0].id.clone();

        let _ = app.update(Message::OpenCropper(image_id));
        assert!(app.modal.is_none());
        let notice = app.notice.as_ref().unwrap();
        assert_eq!(notice.severity, ErrorSeverity::Warning);
        assert!(notice.message.contains("cannot be cropped"));
    }

    #[test]
    fn test_close_asks_before_dropping_unsaved_edits() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with_limit(&dir, 2048);
        let note_id = app.workspace.create_note().unwrap();
        app.workspace.edit_note(&note_id, NoteEdit::body("z".repeat(4096)));

        let _ = app.update(Message::CloseRequested(window::Id::unique()));
        assert!(matches!(
            &app.modal,
            Some(Modal::Confirm(Pending::CloseWithoutSaving { .. }))
        ));
        assert_eq!(app.workspace.notebook().note(&note_id).unwrap().body.len(), 4096);
    }

    #[test]
    fn test_blocking_notice_swallows_shortcuts_only() {
        assert!(is_shortcut(&Message::SaveNow));
        assert!(is_shortcut(&Message::CropKey(CropKey::Up, false)));
        assert!(!is_shortcut(&Message::DismissNotice));
        assert!(Notice {
            message: String::new(),
            severity: ErrorSeverity::Error
        }
        .is_blocking());
        assert!(!Notice {
            message: String::new(),
            severity: ErrorSeverity::Warning
        }
        .is_blocking());
    }
}
