use crate::commands::EditorCommand;
use crate::events::EditorEvent;
use crossbeam_channel::{Receiver, Sender};
use tas_core::playback::TickOutcome;
use tas_core::prelude::*;
use tas_core::splicer::ClipboardPort;

/// Drives one editing session from a host loop.
///
/// Everything happens on the thread calling `tick()`: queued commands are
/// drained first, then playback advances by at most one step or turbo
/// batch. That ordering is what guarantees an edit submitted mid-seek takes
/// effect (and cancels the seek) before the next advancement reads the
/// timeline.
pub struct SessionRuntime {
    session: EditingSession,
    clipboard: Box<dyn ClipboardPort>,
    command_rx: Receiver<EditorCommand>,
    event_tx: Sender<EditorEvent>,
}

impl SessionRuntime {
    pub fn new(
        session: EditingSession,
        clipboard: Box<dyn ClipboardPort>,
        command_rx: Receiver<EditorCommand>,
        event_tx: Sender<EditorEvent>,
    ) -> SessionRuntime {
        SessionRuntime {
            session,
            clipboard,
            command_rx,
            event_tx,
        }
    }

    pub fn session(&self) -> &EditingSession {
        &self.session
    }

    /// One host tick.
    pub fn tick(&mut self) {
        self.process_commands();
        match self.session.tick() {
            TickOutcome::Idle => {}
            TickOutcome::Advanced(frame) => {
                self.emit(EditorEvent::CursorMoved(frame));
            }
            TickOutcome::SeekFinished(frame) => {
                self.emit(EditorEvent::SeekFinished(frame));
            }
        }
    }

    /// Handle EditorCommands received from the shell
    pub fn process_commands(&mut self) {
        while let Ok(command) = self.command_rx.try_recv() {
            self.apply_command(command);
        }
    }

    fn emit(&self, event: EditorEvent) {
        self.event_tx.send(event).ok();
    }

    fn report<E: std::fmt::Display>(&self, err: E) {
        log::warn!("{err}");
        self.emit(EditorEvent::Error(err.to_string()));
    }

    fn apply_command(&mut self, command: EditorCommand) {
        let session = &mut self.session;
        match command {
            EditorCommand::ToggleInput {
                frame,
                pad,
                button,
                drag,
            } => {
                if let Err(err) = session.toggle_input(frame, pad, button, drag) {
                    self.report(err);
                }
            }
            EditorCommand::ColumnSet { pad, button } => session.column_set(pad, button),

            EditorCommand::SelectRow(frame) => session.selection.select_row(frame),
            EditorCommand::ToggleRow(frame) => session.selection.toggle_row(frame),
            EditorCommand::SetRegion { start, end } => session.selection.set_region(start, end),
            EditorCommand::SetRegionStride { start, end, stride } => {
                session.selection.set_region_stride(start, end, stride);
            }
            EditorCommand::SelectAll => {
                let frames = session.timeline().len();
                session.selection.select_all(frames);
            }
            EditorCommand::ClearSelection => session.selection.clear(),

            EditorCommand::Copy => {
                if let Err(err) = session.copy(self.clipboard.as_mut()) {
                    self.report(err);
                }
            }
            EditorCommand::Cut => {
                if let Err(err) = session.cut(self.clipboard.as_mut()) {
                    self.report(err);
                }
            }
            EditorCommand::Paste => {
                if let Err(err) = session.paste(self.clipboard.as_mut()) {
                    self.report(err);
                }
            }
            EditorCommand::PasteInsert => {
                if let Err(err) = session.paste_insert(self.clipboard.as_mut()) {
                    self.report(err);
                }
            }
            EditorCommand::CloneFrames => session.clone_frames(),
            EditorCommand::InsertFrames => session.insert_frames(),
            EditorCommand::InsertNumFrames(count) => session.insert_num_frames(count),
            EditorCommand::DeleteFrames => {
                if let Err(err) = session.delete_frames() {
                    self.report(err);
                }
            }
            EditorCommand::ClearFrames => session.clear_frames(),
            EditorCommand::Truncate => {
                if let Err(err) = session.truncate_selection() {
                    self.report(err);
                }
            }

            EditorCommand::Jump(frame) => match session.jump(frame) {
                Ok(JumpOutcome::Arrived) => {
                    self.emit(EditorEvent::CursorMoved(session.playback().cursor()));
                }
                Ok(JumpOutcome::SeekStarted) => {}
                Err(err) => self.report(err),
            },
            EditorCommand::Play => session.play(),
            EditorCommand::Pause => session.pause(),
            EditorCommand::StopSeeking => session.stop_seeking(),

            EditorCommand::Undo => {
                if let Some(description) = session.undo() {
                    self.emit(EditorEvent::Log(format!("undid: {description}")));
                }
            }
            EditorCommand::Redo => {
                if let Some(description) = session.redo() {
                    self.emit(EditorEvent::Log(format!("redid: {description}")));
                }
            }

            EditorCommand::SetMarker(frame) => {
                session.set_marker(frame);
            }
            EditorCommand::RemoveMarker(frame) => session.remove_marker(frame),
            EditorCommand::SetNote { id, text } => session.set_note(id, &text),

            EditorCommand::SubmitInputChange {
                frame,
                target,
                bits,
            } => session.submit_input_change(frame, target, bits),
            EditorCommand::SubmitInsertFrames { frame, count } => {
                session.submit_insert_frames(frame, count);
            }
            EditorCommand::SubmitDeleteFrames { frame, count } => {
                session.submit_delete_frames(frame, count);
            }
            EditorCommand::ApplyInputChanges(name) => {
                if let Some(frame) = session.apply_input_changes(&name) {
                    self.emit(EditorEvent::Log(format!(
                        "batch '{name}' invalidated from frame {frame}"
                    )));
                }
            }
            EditorCommand::ClearInputChanges => session.clear_input_changes(),

            EditorCommand::LockGreenzone(frame) => session.lock_greenzone(frame),
            EditorCommand::SaveProject => {
                let bytes = session.serialize_project();
                session.mark_saved();
                self.emit(EditorEvent::ProjectSerialized(bytes));
            }
            EditorCommand::LoadProject(bytes) => {
                if let Err(err) = session.load_project(&bytes) {
                    self.report(err);
                }
            }
        }
    }
}
